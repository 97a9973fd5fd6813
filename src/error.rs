use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed value stored under `{key}`: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("unable to decrypt storage: {0}")]
    Decrypt(String),

    #[error("`{key}` changed since it was read; write batch rejected")]
    Conflict { key: String },

    #[error("invalid storage name: {0:?}")]
    InvalidName(String),

    #[error("storage lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn decode(key: impl Into<String>, source: serde_json::Error) -> Self {
        StoreError::Decode {
            key: key.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum RolloverError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown time zone `{0}`")]
    InvalidTimeZone(String),

    #[error("storage is encrypted but no password was supplied")]
    MissingPassword,

    #[error(transparent)]
    Store(#[from] StoreError),
}
