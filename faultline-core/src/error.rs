use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaultlineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Malformed snapshot {key}: {reason}")]
    MalformedSnapshot { key: String, reason: String },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Artifact write error: {0}")]
    ArtifactWrite(String),
}
