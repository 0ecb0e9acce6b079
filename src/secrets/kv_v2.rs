//! KV v2 (versioned) backend.

use super::backend::{KvBackend, KvVersion, SecretRecord, SecretValue, StoreError, take_field};
use super::transport::VaultTransport;
use crate::coordinate::Coordinate;
use serde_json::{Value, json};
use std::sync::Arc;

/// Versioned KV backend.
///
/// Reads return the latest version. Writing a field reads the current record,
/// merges the field in and posts the merged record as a new version, so sibling
/// fields survive.
pub struct KvV2Backend {
    transport: Arc<dyn VaultTransport>,
}

impl KvV2Backend {
    pub fn new(transport: Arc<dyn VaultTransport>) -> Self {
        Self { transport }
    }

    fn api_path(coordinate: &Coordinate) -> String {
        format!("{}/data/{}", coordinate.mount_point, coordinate.secret_path)
    }

    fn secret(coordinate: &Coordinate) -> String {
        format!("{}/{}", coordinate.mount_point, coordinate.secret_path)
    }

    fn missing(coordinate: &Coordinate) -> StoreError {
        StoreError::NotFound {
            secret: Self::secret(coordinate),
            field: None,
        }
    }
}

impl KvBackend for KvV2Backend {
    fn version(&self) -> KvVersion {
        KvVersion::V2
    }

    fn read(&self, coordinate: &Coordinate) -> Result<SecretRecord, StoreError> {
        let response = self
            .transport
            .get(&Self::api_path(coordinate))?
            .ok_or_else(|| Self::missing(coordinate))?;

        // A deleted latest version answers with `data: null`
        match response.get("data").and_then(|d| d.get("data")) {
            Some(Value::Object(fields)) => Ok(fields.clone()),
            _ => Err(Self::missing(coordinate)),
        }
    }

    fn write(&self, coordinate: &Coordinate, value: Value) -> Result<(), StoreError> {
        let mut record = match self.read(coordinate) {
            Ok(record) => record,
            Err(StoreError::NotFound { .. }) => SecretRecord::new(),
            Err(e) => return Err(e),
        };

        record.insert(coordinate.field_key.as_str().to_string(), value);

        self.transport
            .post(&Self::api_path(coordinate), &json!({ "data": record }))
    }

    fn lookup(&self, coordinate: &Coordinate) -> Result<SecretValue, StoreError> {
        let record = self.read(coordinate)?;

        if coordinate.field_key.is_sentinel() {
            return Ok(SecretValue::Fields(record));
        }

        take_field(record, &Self::secret(coordinate), &coordinate.field_key)
    }

    /// The mount is always spelled out so the placeholder does not depend on
    /// the default mount of whoever decodes it later.
    fn stored_at(&self, coordinate: &Coordinate) -> Coordinate {
        Coordinate {
            explicit_mount: true,
            ..coordinate.clone()
        }
    }
}
