//! This module defines the client/user visible errors that can be returned by ringkv.
use std::fmt::Display;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::utils::serde_utf8_bytes;

pub type Result<T> = std::result::Result<T, Error>;

/// Error enum with all possible variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Error {
    /// Variant returned for GET requests when every replica either reported the
    /// key as absent or failed. A transport-only failure on all replicas is
    /// indistinguishable from a true absence.
    NotFound {
        #[serde(with = "serde_utf8_bytes")]
        key: Bytes,
    },
    /// The ring contained no nodes at request time
    NoReplicas,
    /// At least one replica failed during a PUT/DELETE fan-out. The operation is
    /// not rolled back; replicas that acknowledged keep the write.
    ReplicationPartial {
        operation: String,
        errors: Vec<Error>,
    },
    /// A single replica call failed - either the transport itself or a
    /// non-success response from the remote node
    Transport { host: String, reason: String },
    /// Returned by the internal replica endpoints when the request body or query
    /// string cannot be parsed
    MalformedRequest { reason: String },
    /// The rebalance scan was aborted because its deadline expired
    Cancelled,
    /// Returned during node bootstrap if any configuration is invalid
    InvalidServerConfig { reason: String },
    /// Self explanatory
    Io { reason: String },
    /// Internal error that should be opaque to an external client
    Internal { reason: String },
}

impl Error {
    /// Returns true if this is an instance of a [`Error::NotFound`] variant
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Returns true if this is an instance of a [`Error::Cancelled`] variant
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            reason: err.to_string(),
        }
    }
}

impl From<crate::storage_engine::Error> for Error {
    fn from(err: crate::storage_engine::Error) -> Self {
        Self::Internal {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedRequest {
            reason: err.to_string(),
        }
    }
}
