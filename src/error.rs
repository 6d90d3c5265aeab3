use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;
use tokio::sync::mpsc::error::SendError as TokioSendError;

#[cfg(feature = "service")]
use sqlx::Error as SqlxError;

use crate::event::GraphEvent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum OrbitError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Graph structure error: {0}")]
    Structural(String),
}

impl OrbitError {
    /// Persistence failures are recovered locally and retried later; everything else is
    /// reported to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, OrbitError::Persistence(_) | OrbitError::Io(_))
    }
}

impl From<toml::de::Error> for OrbitError {
    fn from(src: toml::de::Error) -> OrbitError {
        OrbitError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for OrbitError {
    fn from(src: toml::ser::Error) -> OrbitError {
        OrbitError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for OrbitError {
    fn from(src: JsonError) -> OrbitError {
        OrbitError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<io::Error> for OrbitError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => OrbitError::NotFound(format!("{x}")),
            _ => OrbitError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<TokioSendError<GraphEvent>> for OrbitError {
    fn from(x: TokioSendError<GraphEvent>) -> Self {
        OrbitError::Io(format!(
            "Channel update send Error, could not transmit graph event {}",
            x.0
        ))
    }
}

#[cfg(feature = "service")]
impl From<SqlxError> for OrbitError {
    fn from(db_error: SqlxError) -> Self {
        OrbitError::Persistence(format!("database error: {db_error:?}"))
    }
}
