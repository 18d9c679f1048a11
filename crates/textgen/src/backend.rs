use std::path::Path;

use candle_core::Device;
use chartok::tokenizers::Tokenizer;
use rand::SeedableRng;

use crate::{
    dataset::{Corpus, RngType},
    model::{CharRnn, TrainReport},
    Config, Result,
};

/// The operations the entry points need from a text model. Any backend
/// implementing this can be dropped in behind `train` and `generate`.
pub trait TextModel: Sized {
    /// Load a previously saved model.
    fn load(path: &Path, config: &Config) -> Result<Self>;
    /// Untrained model for `corpus`.
    fn fresh(corpus: &Corpus, config: &Config) -> Result<Self>;
    /// Run `epochs` passes over `corpus`, updating the model in place.
    fn train(&mut self, corpus: &Corpus, epochs: usize) -> Result<TrainReport>;
    fn save(&self, path: &Path) -> Result<()>;
    /// Exactly `count` lines of at most `max_chars` characters each.
    fn generate(&mut self, count: usize, temperature: f64, max_chars: usize)
        -> Result<Vec<String>>;

    fn create(existing: Option<&Path>, corpus: &Corpus, config: &Config) -> Result<Self> {
        match existing {
            Some(path) => Self::load(path, config),
            None => Self::fresh(corpus, config),
        }
    }
}

/// Continue from the model at `save_path` if one exists, otherwise start a
/// fresh one.
pub fn resume_or_create<M: TextModel>(
    save_path: &Path,
    corpus: &Corpus,
    config: &Config,
) -> Result<M> {
    let existing = save_path.is_file().then_some(save_path);
    match existing {
        Some(path) => log::info!("Resuming from checkpoint {path:?}"),
        None => log::info!("No checkpoint at {save_path:?}, starting from scratch"),
    }

    M::create(existing, corpus, config)
}

fn rng_for(config: &Config) -> RngType {
    match config.seed {
        Some(seed) => RngType::seed_from_u64(seed),
        None => RngType::from_entropy(),
    }
}

impl TextModel for CharRnn {
    fn load(path: &Path, config: &Config) -> Result<Self> {
        log::info!("Loading model from {path:?}");
        let model = CharRnn::load(path, &config.training, &Device::Cpu, &rng_for(config))?;
        log::info!("Vocab [{} chars] | {}", model.tokenizer().len(), model.tokenizer());
        Ok(model)
    }

    fn fresh(corpus: &Corpus, config: &Config) -> Result<Self> {
        CharRnn::from_corpus(
            corpus,
            &config.hyperparams,
            &config.training,
            &Device::Cpu,
            &rng_for(config),
        )
    }

    fn train(&mut self, corpus: &Corpus, epochs: usize) -> Result<TrainReport> {
        CharRnn::train(self, corpus, epochs)
    }

    fn save(&self, path: &Path) -> Result<()> {
        CharRnn::save(self, path)
    }

    fn generate(
        &mut self,
        count: usize,
        temperature: f64,
        max_chars: usize,
    ) -> Result<Vec<String>> {
        CharRnn::generate(self, count, temperature, max_chars)
    }
}
