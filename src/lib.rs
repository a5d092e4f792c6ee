//! ringkv is a distributed key-value store that partitions a flat keyspace of
//! opaque string keys across a static set of peer nodes using a consistent-hash
//! ring. Every node holds an in-memory store, acts as a coordinator for client
//! requests and fans writes out to the replicas chosen by the ring. Reads walk
//! the replica list in ring order and return the first answer.
pub mod cluster;
pub mod error;
pub mod router;
pub mod server;
pub mod storage_engine;
pub mod telemetry;
pub mod test_utils;
pub mod transport;
pub mod utils;

#[cfg(test)]
extern crate quickcheck;

#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;
