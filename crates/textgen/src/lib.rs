pub mod affinity;
pub mod backend;
pub mod buffer;
pub mod cli;
pub mod commands;
pub mod config;
pub mod dataset;
pub mod error;
pub mod model;
pub mod sampling;

pub use backend::TextModel;
pub use config::Config;
pub use error::{Error, Result};
pub use model::CharRnn;

pub const EPS: f64 = 1e-5;

/// Optional configuration file, looked up in the working directory.
pub const CONFIG_FILE: &str = "config.toml";
/// Number of allowed CPU threads the trainer leaves to other workloads.
pub const RESERVED_THREADS: usize = 2;
