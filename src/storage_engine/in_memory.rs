use async_trait::async_trait;
use bytes::Bytes;
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use super::{Error, Result, StorageEngine};

/// In-memory [`StorageEngine`] backed by a [`HashMap`] under a readers-writer
/// lock: concurrent readers, a single writer. All state is lost on restart.
#[derive(Clone, Debug, Default)]
pub struct InMemory {
    inner: Arc<RwLock<HashMap<Bytes, Bytes>>>,
}

const LOCK_ERR: &str = "Unable to acquire InMemory lock. This should never happen";

#[async_trait]
impl StorageEngine for InMemory {
    async fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        if let Ok(guard) = self.inner.read() {
            Ok(guard.get(key).map(Clone::clone))
        } else {
            Err(Error::Logic {
                reason: LOCK_ERR.to_string(),
            })
        }
    }

    async fn put(&self, key: Bytes, value: Bytes) -> Result<()> {
        if let Ok(mut guard) = self.inner.write() {
            guard.insert(key, value);
            Ok(())
        } else {
            Err(Error::Logic {
                reason: LOCK_ERR.to_string(),
            })
        }
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        if let Ok(mut guard) = self.inner.write() {
            guard.remove(key);
            Ok(())
        } else {
            Err(Error::Logic {
                reason: LOCK_ERR.to_string(),
            })
        }
    }

    async fn keys(&self) -> Result<Vec<Bytes>> {
        if let Ok(guard) = self.inner.read() {
            Ok(guard.keys().map(Clone::clone).collect())
        } else {
            Err(Error::Logic {
                reason: LOCK_ERR.to_string(),
            })
        }
    }
}
