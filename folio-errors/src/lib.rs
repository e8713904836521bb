//! The error taxonomy shared by every `folio-*` crate.
//!
//! One enum variant per distinguishable failure mode named in the storage
//! engine's design, so callers can match on `FolioError` rather than on
//! a string. Transport-level detail (`io::Error`, parse failures) is kept
//! out of this crate's public surface by wrapping it in [`TransportError`]
//! and [`ProtocolError`].

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Failure of the underlying socket: connect, read, write, or timeout.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to {endpoint} failed: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{op} on {endpoint} timed out after {timeout:?}")]
    Timeout {
        endpoint: String,
        op: &'static str,
        timeout: Duration,
    },
    #[error("connection to {endpoint} closed (eof) during {op}")]
    Eof { endpoint: String, op: &'static str },
    #[error("io error on {endpoint} during {op}: {source}")]
    Io {
        endpoint: String,
        op: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// The remote store returned a reply that doesn't fit the wire grammar.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unexpected reply frame byte {found:#x}")]
    UnknownFrame { found: u8 },
    #[error("malformed integer reply: {0}")]
    BadInteger(String),
    #[error("malformed bulk length: {0}")]
    BadBulkLength(String),
    #[error("truncated reply: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },
}

/// The remote store processed the request but reported an application error.
#[derive(Debug, Error)]
#[error("remote error: {0}")]
pub struct RemoteError(pub String);

/// Every error the Folio engine can surface to its host.
#[derive(Debug, Error)]
pub enum FolioError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("unknown record {id}")]
    UnknownRec { id: String },

    #[error("record {id} already exists")]
    AlreadyExists { id: String },

    #[error("concurrent change on {id}: {detail}")]
    ConcurrentChange { id: String, detail: String },

    #[error("commit rejected: {0}")]
    Commit(String),

    #[error("history operation on {id} invalid: {detail}")]
    HisConfig { id: String, detail: String },

    #[error("failed to decode record {id}: {detail}")]
    Encoding { id: String, detail: String },

    #[error("connection pool is closed")]
    PoolClosed,

    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, FolioError>;

impl FolioError {
    pub fn commit(msg: impl Into<String>) -> Self {
        FolioError::Commit(msg.into())
    }

    pub fn unknown_rec(id: impl Into<String>) -> Self {
        FolioError::UnknownRec { id: id.into() }
    }

    pub fn already_exists(id: impl Into<String>) -> Self {
        FolioError::AlreadyExists { id: id.into() }
    }

    pub fn concurrent_change(id: impl Into<String>, detail: impl Into<String>) -> Self {
        FolioError::ConcurrentChange {
            id: id.into(),
            detail: detail.into(),
        }
    }

    pub fn his_config(id: impl Into<String>, detail: impl Into<String>) -> Self {
        FolioError::HisConfig {
            id: id.into(),
            detail: detail.into(),
        }
    }

    pub fn encoding(id: impl Into<String>, detail: impl fmt::Display) -> Self {
        FolioError::Encoding {
            id: id.into(),
            detail: detail.to_string(),
        }
    }
}
