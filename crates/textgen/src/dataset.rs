use std::path::Path;

use candle_core::{Device, Tensor};
use chartok::{
    split_lines,
    tokenizers::{CharTokenizer, TokenId, LINE_END_ID, PAD_ID},
    LINE_SEPARATORS,
};
use rand::seq::SliceRandom;
use rand_pcg::Lcg64Xsh32;

use crate::{Error, Result};

pub type RngType = Lcg64Xsh32;

/// Training text, one sample per non-empty line.
#[derive(Clone, Debug)]
pub struct Corpus {
    lines: Vec<String>,
}

impl Corpus {
    pub fn from_text(text: &str) -> Result<Self> {
        let lines = split_lines(text, LINE_SEPARATORS)
            .into_iter()
            .map(str::to_owned)
            .collect::<Vec<_>>();
        if lines.is_empty() {
            return Err(Error::config("corpus contains no text"));
        }

        Ok(Self { lines })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| Error::config(format!("unable to read corpus {path:?}: {err}")))?;
        Self::from_text(&text).map_err(|err| match err {
            Error::Configuration(msg) => Error::config(format!("{msg}: {path:?}")),
            err => err,
        })
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn char_count(&self) -> usize {
        self.lines.iter().map(|line| line.chars().count()).sum()
    }

    pub fn print_stats(&self) {
        log::info!(
            "Corpus: {} line(s), {} char(s)",
            self.len(),
            self.char_count()
        );
    }
}

/// Position of one next-token prediction: the token at `pos` of `line`,
/// predicted from everything before it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    line: usize,
    pos: usize,
}

/// Encoded corpus split into training and validation samples.
pub struct Dataset {
    lines: Vec<Vec<TokenId>>,
    training: Vec<Sample>,
    validation: Vec<Sample>,
    context_len: usize,
    rng: RngType,
}

impl Dataset {
    pub fn new(
        rng: &RngType,
        corpus: &Corpus,
        tokenizer: &CharTokenizer,
        context_len: usize,
        validation_split: f64,
    ) -> Result<Self> {
        let mut skipped = 0;
        let mut lines = Vec::with_capacity(corpus.len());
        for line in corpus.lines() {
            let (mut encoded, line_skipped) = tokenizer.encode_lossy(line);
            skipped += line_skipped;
            if encoded.is_empty() {
                continue;
            }
            encoded.push(LINE_END_ID);
            lines.push(encoded);
        }

        if skipped > 0 {
            log::warn!("Skipped {skipped} corpus char(s) missing from the model vocab");
        }
        if lines.is_empty() {
            return Err(Error::config(
                "corpus has no characters in the model vocab",
            ));
        }

        let mut rng = rng.clone();
        let mut order = (0..lines.len()).collect::<Vec<_>>();
        order.shuffle(&mut rng);

        let validation_lines = if validation_split > 0.0 && lines.len() > 1 {
            ((lines.len() as f64 * validation_split).round() as usize).clamp(1, lines.len() - 1)
        } else {
            0
        };
        let (validation_order, training_order) = order.split_at(validation_lines);

        let samples = |indices: &[usize]| {
            indices
                .iter()
                .flat_map(|line| {
                    (0..lines[*line].len()).map(move |pos| Sample { line: *line, pos })
                })
                .collect::<Vec<_>>()
        };
        let training = samples(training_order);
        let validation = samples(validation_order);

        Ok(Self {
            training,
            validation,
            lines,
            context_len,
            rng,
        })
    }

    pub fn len(&self) -> usize {
        self.training.len() + self.validation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn training_len(&self) -> usize {
        self.training.len()
    }

    pub fn validation_len(&self) -> usize {
        self.validation.len()
    }

    /// Shuffle the training samples and cut them into batches.
    pub fn training_batches(&mut self, batch_size: usize) -> Vec<Vec<Sample>> {
        self.training.shuffle(&mut self.rng);
        self.training
            .chunks(batch_size)
            .map(<[Sample]>::to_vec)
            .collect()
    }

    pub fn validation_batches(&self, batch_size: usize) -> Vec<Vec<Sample>> {
        self.validation
            .chunks(batch_size)
            .map(<[Sample]>::to_vec)
            .collect()
    }

    /// Generate (inputs, targets) for a batch: inputs are [B, T] context
    /// windows, targets the [B] tokens that follow them.
    pub fn get_batch(&self, batch: &[Sample], device: &Device) -> Result<(Tensor, Tensor)> {
        let mut inputs = Vec::with_capacity(batch.len() * self.context_len);
        let mut targets = Vec::with_capacity(batch.len());
        for sample in batch {
            let tokens = &self.lines[sample.line];
            inputs.extend(context_window(&tokens[..sample.pos], self.context_len));
            targets.push(tokens[sample.pos]);
        }

        Ok((
            Tensor::from_vec(inputs, (batch.len(), self.context_len), device)?,
            Tensor::from_vec(targets, batch.len(), device)?,
        ))
    }

    pub fn print_stats(&self) {
        log::info!("Total dataset size: {}", self.len());
        log::info!("Training set size: {}", self.training_len());
        log::info!("Validation set size: {}", self.validation_len());
    }
}

/// The last `context_len` tokens of `history`, left padded with [`PAD_ID`].
pub fn context_window(history: &[TokenId], context_len: usize) -> Vec<TokenId> {
    let start = history.len().saturating_sub(context_len);
    let kept = &history[start..];

    let mut window = vec![PAD_ID; context_len - kept.len()];
    window.extend_from_slice(kept);
    window
}

#[cfg(test)]
mod test {
    use super::*;
    use chartok::tokenizers::Tokenizer;
    use rand::SeedableRng;

    fn tokenizer_for(text: &str) -> CharTokenizer {
        let mut tokenizer = CharTokenizer::new();
        tokenizer.train(text);
        tokenizer
    }

    #[test]
    fn test_corpus_lines() {
        let corpus = Corpus::from_text("hello\r\n\r\nworld\n").unwrap();
        assert_eq!(corpus.lines(), &["hello".to_string(), "world".to_string()]);
        assert_eq!(corpus.char_count(), 10);
    }

    #[test]
    fn test_empty_corpus() {
        assert!(matches!(
            Corpus::from_text("\n\n"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_corpus() {
        let path = std::env::temp_dir().join("textgen-missing-corpus.txt");
        assert!(matches!(Corpus::load(path), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_context_window() {
        assert_eq!(context_window(&[], 3), vec![PAD_ID, PAD_ID, PAD_ID]);
        assert_eq!(context_window(&[5], 3), vec![PAD_ID, PAD_ID, 5]);
        assert_eq!(context_window(&[5, 6, 7, 8], 3), vec![6, 7, 8]);
    }

    #[test]
    fn test_one_sample_per_char_and_line_end() {
        let corpus = Corpus::from_text("ab\ncde").unwrap();
        let tokenizer = tokenizer_for("abcde");
        let rng = RngType::seed_from_u64(1337);

        let dataset = Dataset::new(&rng, &corpus, &tokenizer, 4, 0.0).unwrap();
        assert_eq!(dataset.training_len(), 3 + 4);
        assert_eq!(dataset.validation_len(), 0);
    }

    #[test]
    fn test_validation_split() {
        let corpus = Corpus::from_text("aa\nbb\ncc\ndd").unwrap();
        let tokenizer = tokenizer_for("abcd");
        let rng = RngType::seed_from_u64(1337);

        let dataset = Dataset::new(&rng, &corpus, &tokenizer, 4, 0.25).unwrap();
        assert_eq!(dataset.validation_len(), 3);
        assert_eq!(dataset.training_len(), 9);
    }

    #[test]
    fn test_unknown_chars() {
        let corpus = Corpus::from_text("xyz\nab").unwrap();
        let tokenizer = tokenizer_for("ab");
        let rng = RngType::seed_from_u64(1337);

        // "xyz" has nothing in the vocab and is dropped.
        let dataset = Dataset::new(&rng, &corpus, &tokenizer, 4, 0.0).unwrap();
        assert_eq!(dataset.training_len(), 3);

        let corpus = Corpus::from_text("xyz").unwrap();
        assert!(matches!(
            Dataset::new(&rng, &corpus, &tokenizer, 4, 0.0),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_batching() {
        let corpus = Corpus::from_text("abc\nba").unwrap();
        let tokenizer = tokenizer_for("abc");
        let rng = RngType::seed_from_u64(1337);
        let device = Device::Cpu;

        let mut dataset = Dataset::new(&rng, &corpus, &tokenizer, 2, 0.0).unwrap();
        let batches = dataset.training_batches(4);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 4);
        assert_eq!(batches[1].len(), 3);

        let (input, target) = dataset.get_batch(&batches[0], &device).unwrap();
        let (x, y) = input.shape().dims2().unwrap();
        assert_eq!(x, 4);
        assert_eq!(y, 2);
        assert_eq!(target.shape().dims1().unwrap(), 4);
    }

    #[test]
    fn test_batch_contents() {
        let corpus = Corpus::from_text("abc").unwrap();
        let tokenizer = tokenizer_for("abc");
        let rng = RngType::seed_from_u64(1337);
        let device = Device::Cpu;

        let dataset = Dataset::new(&rng, &corpus, &tokenizer, 2, 0.0).unwrap();
        let last = Sample { line: 0, pos: 3 };
        let (input, target) = dataset.get_batch(&[last], &device).unwrap();

        // "bc" predicts the line end
        assert_eq!(input.to_vec2::<u32>().unwrap(), vec![vec![3, 4]]);
        assert_eq!(target.to_vec1::<u32>().unwrap(), vec![LINE_END_ID]);
    }
}
