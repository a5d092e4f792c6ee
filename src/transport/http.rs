//! HTTP+JSON [`ReplicaTransport`] implementation.
//!
//! This is the wire format existing nodes interoperate on: the three replica
//! verbs, their request shapes and their status codes must not change.
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{event, Level};

use super::{
    ReplicaDelete, ReplicaPut, ReplicaTransport, REPLICA_DELETE_PATH, REPLICA_GET_PATH,
    REPLICA_PUT_PATH,
};
use crate::error::{Error, Result};

/// Per-call timeout applied to every replica request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct HttpReplicaTransport {
    client: reqwest::Client,
}

impl HttpReplicaTransport {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        // the builder only fails on malformed TLS/proxy settings, neither of
        // which is configured here
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("default reqwest client must build");
        Self { client }
    }

    fn transport_error(host: &str, err: reqwest::Error) -> Error {
        Error::Transport {
            host: host.to_string(),
            reason: err.to_string(),
        }
    }

    fn status_error(host: &str, status: reqwest::StatusCode) -> Error {
        Error::Transport {
            host: host.to_string(),
            reason: format!("status={}", status.as_u16()),
        }
    }
}

impl Default for HttpReplicaTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplicaTransport for HttpReplicaTransport {
    async fn put(&self, host: &str, key: Bytes, value: Bytes) -> Result<()> {
        let url = format!("http://{}{}", host, REPLICA_PUT_PATH);
        let response = self
            .client
            .post(url)
            .json(&ReplicaPut { key, value })
            .send()
            .await
            .map_err(|e| Self::transport_error(host, e))?;

        if response.status().as_u16() >= 300 {
            return Err(Self::status_error(host, response.status()));
        }
        Ok(())
    }

    async fn get(&self, host: &str, key: &[u8]) -> Result<Option<Bytes>> {
        let key = std::str::from_utf8(key).map_err(|e| {
            event!(Level::ERROR, "Unable to parse key as utf8 {}", e.to_string());
            Error::Internal {
                reason: e.to_string(),
            }
        })?;

        let url = format!("http://{}{}", host, REPLICA_GET_PATH);
        let response = self
            .client
            .get(url)
            .query(&[("key", key)])
            .send()
            .await
            .map_err(|e| Self::transport_error(host, e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if response.status().as_u16() >= 300 {
            return Err(Self::status_error(host, response.status()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Self::transport_error(host, e))?;
        Ok(Some(body))
    }

    async fn delete(&self, host: &str, key: Bytes) -> Result<()> {
        let url = format!("http://{}{}", host, REPLICA_DELETE_PATH);
        let response = self
            .client
            .post(url)
            .json(&ReplicaDelete { key })
            .send()
            .await
            .map_err(|e| Self::transport_error(host, e))?;

        if response.status().as_u16() >= 300 {
            return Err(Self::status_error(host, response.status()));
        }
        Ok(())
    }
}
