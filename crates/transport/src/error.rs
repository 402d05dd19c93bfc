use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("transport is not started")]
    NotStarted,
    #[error("transport is already started")]
    AlreadyStarted,
    #[error("io error {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error {0}")]
    Codec(#[from] serde_json::Error),
    #[error("no peer accepted the message, last error: {0}")]
    Unreachable(std::io::Error),
}
