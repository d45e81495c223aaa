//! Error types shared by the renderer, the executor and the generator.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed attribute or index schema handed to the renderer or executor.
    #[error("Invalid schema for `{table}`: {message}")]
    Schema { table: String, message: String },

    /// A `name[:type][:index]` argument that cannot be parsed.
    #[error("Invalid attribute `{token}`: {message}")]
    InvalidAttribute { token: String, message: String },

    #[error("Invalid model name `{0}`")]
    InvalidModelName(String),

    #[error("{} already exists (use --force to overwrite)", .0.display())]
    FileExists(PathBuf),

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid schema file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Database failures are passed through untouched.
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl Error {
    pub(crate) fn schema(table: &str, message: impl Into<String>) -> Self {
        Error::Schema {
            table: table.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn attribute(token: &str, message: impl Into<String>) -> Self {
        Error::InvalidAttribute {
            token: token.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
