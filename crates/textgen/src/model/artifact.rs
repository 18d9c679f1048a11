//! Model artifact: a single safetensors file holding the weights along with
//! the vocab and architecture needed to rebuild the model before loading them.

use std::{collections::HashMap, path::Path};

use candle_core::{Device, Tensor};
use chartok::tokenizers::CharTokenizer;

use super::{CharRnn, Hyperparams};
use crate::{config::TrainingParams, dataset::RngType, Error, Result};

pub const FORMAT_VERSION: u32 = 1;

const VOCAB_KEY: &str = "meta.vocab";
const HEADER_KEY: &str = "meta.header";

impl Hyperparams {
    /// `[format_version, embed_dim, hidden_dim, num_layers, context_len]`
    fn to_header(&self) -> Result<Vec<u32>> {
        let mut header = vec![FORMAT_VERSION];
        for value in [
            self.embed_dim,
            self.hidden_dim,
            self.num_layers,
            self.context_len,
        ] {
            header.push(
                u32::try_from(value)
                    .map_err(|_| Error::config(format!("hyperparameter {value} is too large")))?,
            );
        }

        Ok(header)
    }

    fn from_header(header: &[u32]) -> Result<Self> {
        match header {
            [FORMAT_VERSION, embed_dim, hidden_dim, num_layers, context_len] => {
                let hyperparams = Self {
                    embed_dim: *embed_dim as usize,
                    hidden_dim: *hidden_dim as usize,
                    num_layers: *num_layers as usize,
                    context_len: *context_len as usize,
                };
                hyperparams.validate()?;
                Ok(hyperparams)
            }
            [FORMAT_VERSION, ..] => Err(Error::config("malformed model header")),
            [version, ..] => Err(Error::config(format!(
                "unsupported model format version {version}"
            ))),
            [] => Err(Error::config("empty model header")),
        }
    }
}

impl CharRnn {
    /// Write the model to `path`, replacing any previous artifact.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut tensors: HashMap<String, Tensor> = HashMap::new();
        {
            let vars = self
                .parameters
                .data()
                .lock()
                .map_err(|_| candle_core::Error::Msg("parameter map lock poisoned".into()))?;
            for (name, var) in vars.iter() {
                tensors.insert(name.clone(), var.as_tensor().clone());
            }
        }
        tensors.insert(
            VOCAB_KEY.to_string(),
            Tensor::new(self.tokenizer.code_points(), &Device::Cpu)?,
        );
        tensors.insert(
            HEADER_KEY.to_string(),
            Tensor::new(self.hyperparams.to_header()?, &Device::Cpu)?,
        );

        candle_core::safetensors::save(&tensors, path)?;
        Ok(())
    }

    /// Rebuild a model from an artifact written by [`CharRnn::save`].
    pub fn load(
        path: impl AsRef<Path>,
        training: &TrainingParams,
        device: &Device,
        rng: &RngType,
    ) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::config(format!("no model found at {path:?}")));
        }

        let invalid =
            |reason: String| Error::config(format!("{path:?} is not a valid model: {reason}"));
        let metadata = candle_core::safetensors::load(path, &Device::Cpu)
            .map_err(|err| invalid(err.to_string()))?;
        let read_u32s = |key: &str| -> Result<Vec<u32>> {
            metadata
                .get(key)
                .ok_or_else(|| invalid(format!("missing {key}")))?
                .to_vec1::<u32>()
                .map_err(|err| invalid(format!("{key}: {err}")))
        };

        let hyperparams = Hyperparams::from_header(&read_u32s(HEADER_KEY)?)?;
        let tokenizer = CharTokenizer::from_code_points(&read_u32s(VOCAB_KEY)?)
            .ok_or_else(|| invalid("malformed vocab".to_string()))?;

        let mut model = Self::new(&hyperparams, training, tokenizer, device, rng)?;
        model
            .parameters
            .load(path)
            .map_err(|err| invalid(err.to_string()))?;

        Ok(model)
    }
}
