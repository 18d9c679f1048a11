use candle_core::{DType, Device, Tensor};
use candle_nn::{
    embedding, linear, lstm, AdamW, Embedding, LSTMConfig, Linear, Module, Optimizer, VarMap,
    LSTM, RNN,
};
use chartok::tokenizers::{CharTokenizer, TokenId, Tokenizer, LINE_END_ID};
use rand::Rng;
use serde::Deserialize;

use crate::{
    config::TrainingParams,
    dataset::{context_window, Corpus, Dataset, RngType},
    sampling, Error, Result,
};

pub mod artifact;
pub mod attention;
pub mod init;

use attention::AttentionWeightedAverage;
use init::SeededVarMap;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Hyperparams {
    pub embed_dim: usize,
    pub hidden_dim: usize,
    pub num_layers: usize,
    /// Number of previous characters the model sees, T.
    pub context_len: usize,
}

impl std::fmt::Display for Hyperparams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Hyperparams: embed_dim={}, hidden_dim={}, num_layers={}, context_len={}",
            self.embed_dim, self.hidden_dim, self.num_layers, self.context_len
        )
    }
}

impl Default for Hyperparams {
    fn default() -> Self {
        Hyperparams {
            embed_dim: 100,
            hidden_dim: 128,
            num_layers: 2,
            context_len: 40,
        }
    }
}

impl Hyperparams {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("embed_dim", self.embed_dim),
            ("hidden_dim", self.hidden_dim),
            ("num_layers", self.num_layers),
            ("context_len", self.context_len),
        ] {
            if value == 0 {
                return Err(Error::config(format!(
                    "hyperparams.{name} must be positive"
                )));
            }
        }

        Ok(())
    }

    /// Width of the features fed to the attention layer: the embedding plus
    /// the output of every LSTM layer.
    pub fn feature_dim(&self) -> usize {
        self.embed_dim + self.num_layers * self.hidden_dim
    }
}

/// Loss of every epoch of one training run.
#[derive(Clone, Debug, Default)]
pub struct TrainReport {
    pub train_losses: Vec<f32>,
    pub val_losses: Vec<f32>,
}

impl TrainReport {
    pub fn epochs(&self) -> usize {
        self.train_losses.len()
    }
}

/// Character level language model: embedding, stacked LSTMs, attention over
/// the time steps and a projection back onto the vocab.
pub struct CharRnn {
    token_embedding_table: Embedding,
    layers: Vec<LSTM>,
    attention: AttentionWeightedAverage,
    lm_head: Linear,
    tokenizer: CharTokenizer,
    hyperparams: Hyperparams,
    training: TrainingParams,
    device: Device,
    rng: RngType,
    pub parameters: VarMap,
}

impl CharRnn {
    pub fn new(
        hyperparams: &Hyperparams,
        training: &TrainingParams,
        tokenizer: CharTokenizer,
        device: &Device,
        rng: &RngType,
    ) -> Result<Self> {
        hyperparams.validate()?;

        // Similar to nn.Parameter in pytorch.
        let var_map = VarMap::new();
        let mut rng = rng.clone();
        let init_rng = RngType::new(rng.gen(), rng.gen());
        let var_builder =
            SeededVarMap::new(&var_map, init_rng).into_var_builder(DType::F32, device);

        let token_embedding_table = embedding(
            tokenizer.len(),
            hyperparams.embed_dim,
            var_builder.push_prefix("token_embedding"),
        )?;

        let mut layers = Vec::with_capacity(hyperparams.num_layers);
        let mut in_dim = hyperparams.embed_dim;
        for layer_idx in 0..hyperparams.num_layers {
            layers.push(lstm(
                in_dim,
                hyperparams.hidden_dim,
                LSTMConfig::default(),
                var_builder.push_prefix(format!("lstm_{layer_idx}")),
            )?);
            in_dim = hyperparams.hidden_dim;
        }

        let attention = AttentionWeightedAverage::new(
            hyperparams.feature_dim(),
            var_builder.push_prefix("attention"),
        )?;

        let lm_head = linear(
            hyperparams.feature_dim(),
            tokenizer.len(),
            var_builder.push_prefix("lm"),
        )?;
        drop(var_builder);

        Ok(Self {
            token_embedding_table,
            layers,
            attention,
            lm_head,
            tokenizer,
            hyperparams: hyperparams.clone(),
            training: training.clone(),
            device: device.clone(),
            rng,
            parameters: var_map,
        })
    }

    /// Untrained model whose vocab is every character of `corpus`.
    pub fn from_corpus(
        corpus: &Corpus,
        hyperparams: &Hyperparams,
        training: &TrainingParams,
        device: &Device,
        rng: &RngType,
    ) -> Result<Self> {
        let mut tokenizer = CharTokenizer::new();
        for line in corpus.lines() {
            tokenizer.train(line);
        }
        log::info!("Vocab [{} chars] | {tokenizer}", tokenizer.len());

        Self::new(hyperparams, training, tokenizer, device, rng)
    }

    pub fn hyperparams(&self) -> &Hyperparams {
        &self.hyperparams
    }

    pub fn tokenizer(&self) -> &CharTokenizer {
        &self.tokenizer
    }

    /// Training settings are not part of the artifact, a resumed model takes
    /// the ones of the current run.
    pub fn set_training_params(&mut self, training: &TrainingParams) {
        self.training = training.clone();
    }

    pub fn train(&mut self, corpus: &Corpus, epochs: usize) -> Result<TrainReport> {
        let mut dataset = Dataset::new(
            &RngType::new(self.rng.gen(), self.rng.gen()),
            corpus,
            &self.tokenizer,
            self.hyperparams.context_len,
            self.training.validation_split,
        )?;
        dataset.print_stats();
        log::info!("{}", self.hyperparams);
        log::info!("{}", self.training);

        // setup some timers for see how efficient we are.
        let train_start = std::time::Instant::now();
        let mut report = TrainReport::default();

        let mut optimizer =
            AdamW::new_lr(self.parameters.all_vars(), self.training.learning_rate)?;
        for epoch in 1..=epochs {
            let timer = std::time::Instant::now();
            let mut total_loss = 0.0;
            let mut seen = 0;
            for batch in dataset.training_batches(self.training.batch_size) {
                let (input, target) = dataset.get_batch(&batch, &self.device)?;
                let logits = self.forward(&input)?;
                let loss = candle_nn::loss::cross_entropy(&logits, &target)?;
                // Combines loss.backward() & optimizer.step() from pytorch.
                optimizer.backward_step(&loss)?;

                total_loss += loss.to_scalar::<f32>()? * batch.len() as f32;
                seen += batch.len();
            }
            let train_loss = total_loss / seen.max(1) as f32;
            report.train_losses.push(train_loss);

            if dataset.validation_len() > 0 {
                let val_loss = self.evaluate(&dataset)?;
                report.val_losses.push(val_loss);
                log::info!(
                    "epoch {epoch}/{epochs} - train loss = {train_loss:0.3}, val loss = {val_loss:0.3}, took {:0.3}s",
                    timer.elapsed().as_secs_f32()
                );
            } else {
                log::info!(
                    "epoch {epoch}/{epochs} - train loss = {train_loss:0.3}, took {:0.3}s",
                    timer.elapsed().as_secs_f32()
                );
            }
        }

        log::info!(
            "total training time: {:0.3}s",
            train_start.elapsed().as_secs_f32()
        );
        Ok(report)
    }

    fn evaluate(&self, dataset: &Dataset) -> Result<f32> {
        let mut total_loss = 0.0;
        let mut seen = 0;
        for batch in dataset.validation_batches(self.training.batch_size) {
            let (input, target) = dataset.get_batch(&batch, &self.device)?;
            let logits = self.forward(&input)?;
            let loss = candle_nn::loss::cross_entropy(&logits, &target)?.to_scalar::<f32>()?;
            total_loss += loss * batch.len() as f32;
            seen += batch.len();
        }

        Ok(total_loss / seen.max(1) as f32)
    }

    /// Sample `count` independent lines, each ending at the line end token or
    /// after `max_chars` characters, whichever comes first.
    pub fn generate(
        &mut self,
        count: usize,
        temperature: f64,
        max_chars: usize,
    ) -> Result<Vec<String>> {
        log::info!(
            "Generating {count} line(s) of up to {max_chars} char(s) @ temperature {temperature}"
        );

        let mut histories: Vec<Vec<TokenId>> = Vec::with_capacity(count);
        let batch_size = self.training.batch_size.max(1);
        for start in (0..count).step_by(batch_size) {
            let rows = batch_size.min(count - start);
            histories.extend(self.generate_batch(rows, temperature, max_chars)?);
        }

        Ok(histories
            .iter()
            .map(|history| self.tokenizer.decode(history))
            .collect())
    }

    /// Advance `rows` lines together as one batch.
    fn generate_batch(
        &mut self,
        rows: usize,
        temperature: f64,
        max_chars: usize,
    ) -> Result<Vec<Vec<TokenId>>> {
        let context_len = self.hyperparams.context_len;
        let mut histories: Vec<Vec<TokenId>> = vec![Vec::new(); rows];
        let mut finished = vec![false; rows];

        for _ in 0..max_chars {
            if finished.iter().all(|done| *done) {
                break;
            }

            let ctxt = histories
                .iter()
                .flat_map(|history| context_window(history, context_len))
                .collect::<Vec<_>>();
            let ctxt = Tensor::from_vec(ctxt, (rows, context_len), &self.device)?;
            let logits = self.forward(&ctxt)?.to_vec2::<f32>()?;

            for (idx, row) in logits.iter().enumerate() {
                if finished[idx] {
                    continue;
                }

                let next_token = sampling::sample_token(row, temperature, &mut self.rng)?;
                if next_token == LINE_END_ID {
                    finished[idx] = true;
                } else {
                    histories[idx].push(next_token);
                }
            }
        }

        Ok(histories)
    }
}

impl Module for CharRnn {
    /// input: [B, T] token ids. Returns the [B, vocab] logits of the next token.
    fn forward(&self, input: &Tensor) -> candle_core::Result<Tensor> {
        log::debug!("encoding embeddings");
        // shape = [B, T, C]
        let tok_embed = self.token_embedding_table.forward(input)?;

        log::debug!("applying lstm layers");
        let mut features = Vec::with_capacity(self.layers.len() + 1);
        let mut xs = tok_embed.clone();
        features.push(tok_embed);
        for layer in self.layers.iter() {
            let states = layer.seq(&xs)?;
            // shape = [B, T, H]
            xs = layer.states_to_tensor(&states)?;
            features.push(xs.clone());
        }

        log::debug!("applying attention");
        let features = Tensor::cat(&features, 2)?;
        let pooled = self.attention.forward(&features)?; // shape = [B, F]

        log::debug!("applying lm_head");
        self.lm_head.forward(&pooled)
    }
}
