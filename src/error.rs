//! Error types for the store.

use crate::types::BlockHeight;
use thiserror::Error;

/// Malformed batch payloads or patterns. Always fatal for the batch or query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("Unsupported value at '{path}': expected object, null or string")]
    UnsupportedValue { path: String },

    #[error("Pattern '{pattern}': '**' can only be used as the last segment")]
    RecursiveWildcardNotLast { pattern: String },
}

/// Invalid requests. Reported to the caller, state is never touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Missing {0}")]
    MissingField(&'static str),

    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error("Empty pattern")]
    EmptyPattern,
}

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Structural error: {0}")]
    Structural(#[from] StructuralError),

    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    #[error("Invalid block height: {height:?} (head is {head:?})")]
    InvalidHeight {
        height: BlockHeight,
        head: BlockHeight,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid snapshot format: {0}")]
    InvalidFormat(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Snapshot is locked by another process")]
    Locked,

    #[error("Change feed error: {0}")]
    Feed(String),
}

impl StoreError {
    /// Whether the error was caused by the caller's input rather than the store.
    pub fn is_client_error(&self) -> bool {
        matches!(self, StoreError::Request(_) | StoreError::Structural(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for StoreError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for StoreError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        StoreError::Deserialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
