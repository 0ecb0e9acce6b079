//! Vault KV integration.
//!
//! Reads and writes secret records over the Vault HTTP API. Two protocol
//! variants are supported and selected by configuration: KV v1 (flat records)
//! and KV v2 (versioned records).

mod backend;
mod kv_v1;
mod kv_v2;
mod store;
pub mod transport;

pub use backend::{KvBackend, KvVersion, SecretRecord, SecretValue, StoreError};
pub use kv_v1::KvV1Backend;
pub use kv_v2::KvV2Backend;
pub use store::{SecretStore, backend_for};
pub use transport::{ReqwestTransport, VaultTransport};

#[cfg(test)]
pub use transport::MemoryTransport;
