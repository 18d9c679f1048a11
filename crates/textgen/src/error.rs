use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad paths, unreadable input or invalid settings.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The OS refused a resource adjustment.
    #[error("resource error: {0}")]
    Resource(String),
    #[error("model error: {0}")]
    Library(#[from] candle_core::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
