use std::collections::VecDeque;

use crate::{backend::TextModel, Result};

/// Queue of pre-generated lines, so callers asking for a few lines at a time
/// do not pay for a generation pass on every request.
pub struct LineBuffer<M: TextModel> {
    model: M,
    lines: VecDeque<String>,
    capacity: usize,
    temperature: f64,
    max_chars: usize,
}

impl<M: TextModel> LineBuffer<M> {
    pub fn new(model: M, capacity: usize, temperature: f64, max_chars: usize) -> Self {
        Self {
            model,
            lines: VecDeque::with_capacity(capacity),
            capacity,
            temperature,
            max_chars,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Top the queue up to capacity. Empty lines are dropped, so a single call
    /// may leave the queue short. Returns how many lines were added.
    pub fn repopulate(&mut self) -> Result<usize> {
        let missing = self.capacity.saturating_sub(self.lines.len());
        if missing == 0 {
            return Ok(0);
        }

        let before = self.lines.len();
        let generated = self
            .model
            .generate(missing, self.temperature, self.max_chars)?;
        self.lines
            .extend(generated.into_iter().filter(|line| !line.is_empty()));

        let added = self.lines.len() - before;
        log::debug!("buffered {added} new line(s), {} queued", self.lines.len());
        Ok(added)
    }

    /// Take `n` lines from the queue. If it holds fewer than `n`, the queue is
    /// left alone and `n` lines are generated directly instead.
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<String>> {
        if self.lines.len() >= n {
            return Ok(self.lines.drain(..n).collect());
        }

        log::debug!("only {} line(s) buffered, generating {n}", self.lines.len());
        self.model.generate(n, self.temperature, self.max_chars)
    }
}
