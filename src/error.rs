// Error taxonomy shared by every module of the library. The binary wraps
// these in `anyhow` for context.

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while talking to the game API or touching
/// the local hash list files.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("no API token found: {0}")]
    MissingCredential(String),

    #[error("invalid hash list id {0:?}: {1}")]
    InvalidId(String, &'static str),

    #[error("invalid client configuration: {0}")]
    Config(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    #[error("{}: {source}", .path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ClientError::FileIo {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
