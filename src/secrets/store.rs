//! Session-scoped handle on the secret store.

use super::backend::{KvBackend, KvVersion, SecretValue, StoreError};
use super::kv_v1::KvV1Backend;
use super::kv_v2::KvV2Backend;
use super::transport::{TOKEN_LOOKUP_PATH, VaultTransport};
use crate::coordinate::Coordinate;
use serde_json::Value;
use std::sync::Arc;

/// Connected secret store, created once per session
pub struct SecretStore {
    backend: Box<dyn KvBackend>,
}

impl SecretStore {
    /// Verify the token and select the backend for `version`.
    ///
    /// A failure here is fatal to the session and happens before any document
    /// traversal.
    pub fn connect(
        version: KvVersion,
        transport: Arc<dyn VaultTransport>,
    ) -> Result<Self, StoreError> {
        let rejected = |detail: String| {
            StoreError::Configuration(format!(
                "token lookup failed, check VAULT_ADDR and VAULT_TOKEN ({})",
                detail
            ))
        };

        match transport.get(TOKEN_LOOKUP_PATH) {
            Ok(Some(_)) => Ok(Self::with_backend(backend_for(version, transport))),
            Ok(None) => Err(rejected(format!("{} not found", TOKEN_LOOKUP_PATH))),
            Err(StoreError::Denied(msg)) => Err(rejected(msg)),
            Err(e) => Err(e),
        }
    }

    pub fn with_backend(backend: Box<dyn KvBackend>) -> Self {
        Self { backend }
    }

    pub fn version(&self) -> KvVersion {
        self.backend.version()
    }

    /// Read what a coordinate resolves to
    pub fn lookup(&self, coordinate: &Coordinate) -> Result<SecretValue, StoreError> {
        self.backend.lookup(coordinate)
    }

    /// Set the field a coordinate points at
    pub fn store(&self, coordinate: &Coordinate, value: Value) -> Result<(), StoreError> {
        self.backend.write(coordinate, value)
    }

    /// Placeholder that reads back what `store` wrote for `coordinate`
    pub fn placeholder(&self, coordinate: &Coordinate, trigger: &str) -> String {
        self.backend.stored_at(coordinate).to_placeholder(trigger)
    }
}

/// Pick the backend implementing a KV version
pub fn backend_for(version: KvVersion, transport: Arc<dyn VaultTransport>) -> Box<dyn KvBackend> {
    match version {
        KvVersion::V1 => Box::new(KvV1Backend::new(transport)),
        KvVersion::V2 => Box::new(KvV2Backend::new(transport)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::FieldKey;
    use crate::secrets::MemoryTransport;
    use serde_json::json;

    #[test]
    fn test_connect_verifies_token_first() {
        let transport = Arc::new(MemoryTransport::new(KvVersion::V2));
        let store = SecretStore::connect(KvVersion::V2, transport.clone()).unwrap();

        assert_eq!(store.version(), KvVersion::V2);
        assert_eq!(transport.requests(), vec![format!("GET {}", TOKEN_LOOKUP_PATH)]);
    }

    #[test]
    fn test_connect_fails_when_unreachable() {
        let transport = Arc::new(MemoryTransport::unreachable(KvVersion::V2));
        let result = SecretStore::connect(KvVersion::V2, transport);
        assert!(matches!(result, Err(StoreError::Transport(_))));
    }

    #[test]
    fn test_backend_selection() {
        let transport: Arc<dyn VaultTransport> = Arc::new(MemoryTransport::new(KvVersion::V1));
        assert_eq!(backend_for(KvVersion::V1, transport.clone()).version(), KvVersion::V1);
        assert_eq!(backend_for(KvVersion::V2, transport).version(), KvVersion::V2);
    }

    #[test]
    fn test_store_then_lookup_both_variants() {
        for version in [KvVersion::V1, KvVersion::V2] {
            let transport = Arc::new(MemoryTransport::new(version));
            let store = SecretStore::connect(version, transport).unwrap();
            let coordinate = Coordinate {
                mount_point: "secret".to_string(),
                secret_path: "helm/app/password".to_string(),
                field_key: FieldKey::Named("value".to_string()),
                explicit_mount: true,
            };

            store.store(&coordinate, json!("hunter2")).unwrap();
            assert_eq!(
                store.lookup(&coordinate).unwrap(),
                SecretValue::Scalar(json!("hunter2")),
                "round trip failed for {}",
                version
            );
        }
    }

    #[test]
    fn test_connect_with_rejected_token_is_configuration_error() {
        let transport = Arc::new(MemoryTransport::new(KvVersion::V2));
        transport.deny(TOKEN_LOOKUP_PATH);

        let result = SecretStore::connect(KvVersion::V2, transport);
        match result {
            Err(StoreError::Configuration(msg)) => assert!(msg.contains("VAULT_TOKEN")),
            _ => panic!("expected a configuration error"),
        }
    }

    #[test]
    fn test_placeholder_per_variant() {
        let coordinate = Coordinate {
            mount_point: "secret".to_string(),
            secret_path: "helm/app/db".to_string(),
            field_key: FieldKey::Named("password".to_string()),
            explicit_mount: false,
        };

        let flat =
            SecretStore::connect(KvVersion::V1, Arc::new(MemoryTransport::new(KvVersion::V1)))
                .unwrap();
        assert_eq!(
            flat.placeholder(&coordinate, "VAULT:"),
            "VAULT:helm/app/db:value"
        );

        let versioned =
            SecretStore::connect(KvVersion::V2, Arc::new(MemoryTransport::new(KvVersion::V2)))
                .unwrap();
        assert_eq!(
            versioned.placeholder(&coordinate, "VAULT:"),
            "VAULT:/secret/helm/app/db:password"
        );
    }
}
