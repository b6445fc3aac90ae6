use rusqlite;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LegacyError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Malformed record: {0}")]
    Decode(String),
    #[error("Malformed token: {0}")]
    TokenDecode(String),
    #[error("Cannot decrypt legacy password: {0}")]
    Decrypt(String),
    #[error("Schema error: {0}")]
    Schema(String),
    #[error("{0} store used before init")]
    NotInitialized(&'static str),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl From<serde_json::Error> for LegacyError {
    fn from(e: serde_json::Error) -> Self {
        LegacyError::Decode(e.to_string())
    }
}
