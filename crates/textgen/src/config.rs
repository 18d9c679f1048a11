use std::path::Path;

use serde::Deserialize;

use crate::{model::Hyperparams, Error, Result};

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Seed for weight init, shuffling and sampling. Entropy when unset.
    pub seed: Option<u64>,
    /// Architecture of freshly created models. A resumed model keeps its own.
    pub hyperparams: Hyperparams,
    pub training: TrainingParams,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingParams {
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Fraction of corpus lines held out to report a validation loss.
    pub validation_split: f64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            batch_size: 128,
            learning_rate: 4e-3,
            validation_split: 0.0,
        }
    }
}

impl std::fmt::Display for TrainingParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TrainingParams: batch_size={}, learning_rate={}, validation_split={}",
            self.batch_size, self.learning_rate, self.validation_split
        )
    }
}

impl Config {
    /// Read `path` if it exists, otherwise fall back to the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        log::info!("Loading config from {path:?}");
        let contents = std::fs::read_to_string(path)
            .map_err(|err| Error::config(format!("unable to read {path:?}: {err}")))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|err| Error::config(format!("invalid config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.hyperparams.validate()?;

        let training = &self.training;
        if training.batch_size == 0 {
            return Err(Error::config("training.batch_size must be positive"));
        }
        if !(training.learning_rate.is_finite() && training.learning_rate > 0.0) {
            return Err(Error::config("training.learning_rate must be positive"));
        }
        if !(0.0..1.0).contains(&training.validation_split) {
            return Err(Error::config(
                "training.validation_split must be within [0, 1)",
            ));
        }

        Ok(())
    }
}
