//! KV v1 (flat) backend.

use super::backend::{KvBackend, KvVersion, SecretRecord, SecretValue, StoreError, take_field};
use super::transport::VaultTransport;
use crate::coordinate::{Coordinate, FieldKey, SENTINEL_FIELD};
use serde_json::Value;
use std::sync::Arc;

/// Flat KV backend.
///
/// A relative placeholder path is the API path as written; a named mount is
/// prefixed onto it. Records are replaced on every write and only ever hold
/// the sentinel field, so there is no partial update.
pub struct KvV1Backend {
    transport: Arc<dyn VaultTransport>,
}

impl KvV1Backend {
    pub fn new(transport: Arc<dyn VaultTransport>) -> Self {
        Self { transport }
    }
}

impl KvBackend for KvV1Backend {
    fn version(&self) -> KvVersion {
        KvVersion::V1
    }

    fn read(&self, coordinate: &Coordinate) -> Result<SecretRecord, StoreError> {
        let api_path = coordinate.flat_path();
        let response = self
            .transport
            .get(&api_path)?
            .ok_or(StoreError::NotFound {
                secret: api_path,
                field: None,
            })?;

        Ok(response
            .get("data")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default())
    }

    /// The key is not part of the record layout: whatever the placeholder
    /// names, the value is stored as the sentinel field.
    fn write(&self, coordinate: &Coordinate, value: Value) -> Result<(), StoreError> {
        let mut record = SecretRecord::new();
        record.insert(SENTINEL_FIELD.to_string(), value);

        self.transport
            .post(&coordinate.flat_path(), &Value::Object(record))
    }

    fn lookup(&self, coordinate: &Coordinate) -> Result<SecretValue, StoreError> {
        let record = self.read(coordinate)?;
        take_field(record, &coordinate.flat_path(), &coordinate.field_key)
    }

    fn stored_at(&self, coordinate: &Coordinate) -> Coordinate {
        Coordinate {
            field_key: FieldKey::Sentinel,
            ..coordinate.clone()
        }
    }
}
