use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Failed to set up connections: {0:#}")]
    Setup(anyhow::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
