//! In-memory [`ReplicaTransport`] implementation.
//!
//! Each host string addresses its own key/value map, so a single test can
//! stand in for a whole cluster. Faults are injected per host via
//! [`crate::test_utils::fault::Fault`] to simulate unreachable peers.
use std::{
    collections::HashMap,
    sync::Mutex,
};

use async_trait::async_trait;
use bytes::Bytes;

use super::ReplicaTransport;
use crate::error::{Error, Result};
use crate::test_utils::fault::Fault;

#[derive(Debug, Default)]
pub struct Stats {
    pub puts: usize,
    pub gets: usize,
    pub deletes: usize,
}

#[derive(Debug, Default)]
pub struct MockReplicaTransport {
    stores: Mutex<HashMap<String, HashMap<Bytes, Bytes>>>,
    faults: Mutex<HashMap<String, Fault>>,
    stats: Mutex<Stats>,
}

impl MockReplicaTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Injects a fault for `host`. While the fault is active every call
    /// against that host fails the way an unreachable peer would.
    pub fn inject_fault(&self, host: &str, fault: Fault) {
        self.faults
            .lock()
            .expect("mock faults lock")
            .insert(host.to_string(), fault);
    }

    pub fn clear_fault(&self, host: &str) {
        self.faults.lock().expect("mock faults lock").remove(host);
    }

    /// Pre-populates `host` with a key/value pair.
    pub fn seed(&self, host: &str, key: Bytes, value: Bytes) {
        self.stores
            .lock()
            .expect("mock stores lock")
            .entry(host.to_string())
            .or_default()
            .insert(key, value);
    }

    /// Snapshot of what `host` currently holds.
    pub fn contents(&self, host: &str) -> HashMap<Bytes, Bytes> {
        self.stores
            .lock()
            .expect("mock stores lock")
            .get(host)
            .cloned()
            .unwrap_or_default()
    }

    pub fn stats(&self) -> Stats {
        let guard = self.stats.lock().expect("mock stats lock");
        Stats {
            puts: guard.puts,
            gets: guard.gets,
            deletes: guard.deletes,
        }
    }

    fn check_fault(&self, host: &str) -> Result<()> {
        let faults = self.faults.lock().expect("mock faults lock");
        if let Some(fault) = faults.get(host) {
            if fault.is_active() {
                return Err(Error::Transport {
                    host: host.to_string(),
                    reason: "Mocked transport error".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ReplicaTransport for MockReplicaTransport {
    async fn put(&self, host: &str, key: Bytes, value: Bytes) -> Result<()> {
        self.stats.lock().expect("mock stats lock").puts += 1;
        self.check_fault(host)?;
        self.stores
            .lock()
            .expect("mock stores lock")
            .entry(host.to_string())
            .or_default()
            .insert(key, value);
        Ok(())
    }

    async fn get(&self, host: &str, key: &[u8]) -> Result<Option<Bytes>> {
        self.stats.lock().expect("mock stats lock").gets += 1;
        self.check_fault(host)?;
        Ok(self
            .stores
            .lock()
            .expect("mock stores lock")
            .get(host)
            .and_then(|store| store.get(key).cloned()))
    }

    async fn delete(&self, host: &str, key: Bytes) -> Result<()> {
        self.stats.lock().expect("mock stats lock").deletes += 1;
        self.check_fault(host)?;
        if let Some(store) = self
            .stores
            .lock()
            .expect("mock stores lock")
            .get_mut(host)
        {
            store.remove(&key);
        }
        Ok(())
    }
}
