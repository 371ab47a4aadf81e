use thiserror::Error;

pub type Result<T> = std::result::Result<T, LifecycleError>;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid event: {message}")]
    InvalidEvent { message: String },

    #[error("Sink error: {message}")]
    Sink { message: String },

    #[error("Telemetry error: {message}")]
    Telemetry { message: String },
}
