use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScpError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("SSH error: {0}")]
    Ssh(#[from] ssh2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    /// Error text reported by the remote scp process, verbatim.
    #[error("{0}")]
    Remote(String),

    #[error("invalid permission mode {0:?}")]
    InvalidMode(String),

    #[error("short transfer: expected {expected} bytes, got {actual}")]
    ShortTransfer { expected: u64, actual: u64 },

    #[error("too many bytes written: entry declared {declared} bytes")]
    TooManyBytes { declared: u64 },

    #[error("no entry is active for data transfer")]
    NoActiveEntry,

    #[error("not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
}

impl From<ScpError> for std::io::Error {
    fn from(err: ScpError) -> Self {
        match err {
            ScpError::Io(err) => err,
            other => std::io::Error::new(std::io::ErrorKind::Other, other),
        }
    }
}
