//! KvBackend trait and related types for the two KV protocol variants.

use crate::coordinate::{Coordinate, FieldKey};
use serde_json::{Map, Value};
use std::fmt;

/// Field map stored at one Vault path
pub type SecretRecord = Map<String, Value>;

/// KV secrets engine version
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum KvVersion {
    /// Flat records, one request per path
    V1,
    /// Versioned records under `<mount>/data/<path>`
    V2,
}

impl fmt::Display for KvVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KvVersion::V1 => write!(f, "v1"),
            KvVersion::V2 => write!(f, "v2"),
        }
    }
}

/// What a lookup hands back to the document
#[derive(Debug, Clone, PartialEq)]
pub enum SecretValue {
    /// A single field
    Scalar(Value),
    /// A whole record, expanded into a mapping
    Fields(SecretRecord),
}

impl SecretValue {
    /// Convert into a YAML node for insertion into the document
    pub fn into_yaml(self) -> Result<serde_yaml::Value, serde_yaml::Error> {
        match self {
            SecretValue::Scalar(value) => serde_yaml::to_value(value),
            SecretValue::Fields(record) => serde_yaml::to_value(Value::Object(record)),
        }
    }
}

/// Errors raised at the store boundary
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// No record at the address, or the record lacks the field
    NotFound {
        secret: String,
        field: Option<String>,
    },

    /// Vault rejected the request for this one secret (403 and other 4xx)
    Denied(String),

    /// Vault could not be reached or failed to answer
    Transport(String),

    /// Address or token missing or malformed
    Configuration(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound {
                secret,
                field: Some(field),
            } => write!(f, "field '{}' not found in {}", field, secret),
            StoreError::NotFound {
                secret,
                field: None,
            } => write!(f, "no secret at {}", secret),
            StoreError::Denied(msg) => write!(f, "{}", msg),
            StoreError::Transport(msg) => write!(f, "{}", msg),
            StoreError::Configuration(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Trait implemented by each KV protocol variant.
///
/// Callers always think in terms of "read a record" and "set one field";
/// each variant maps a coordinate onto its own addresses and request and
/// response shapes.
pub trait KvBackend: Send + Sync {
    /// Variant implemented by this backend
    fn version(&self) -> KvVersion;

    /// Read the full field map the coordinate points into
    fn read(&self, coordinate: &Coordinate) -> Result<SecretRecord, StoreError>;

    /// Set the coordinate's field, leaving what the variant can preserve untouched
    fn write(&self, coordinate: &Coordinate, value: Value) -> Result<(), StoreError>;

    /// Fetch what a placeholder resolves to
    fn lookup(&self, coordinate: &Coordinate) -> Result<SecretValue, StoreError>;

    /// Where a write to `coordinate` actually lands, in a form that reads
    /// back the stored value
    fn stored_at(&self, coordinate: &Coordinate) -> Coordinate;
}

/// Pull one field out of the record stored at `secret`
pub(crate) fn take_field(
    mut record: SecretRecord,
    secret: &str,
    key: &FieldKey,
) -> Result<SecretValue, StoreError> {
    let field = key.as_str();
    record
        .remove(field)
        .map(SecretValue::Scalar)
        .ok_or_else(|| StoreError::NotFound {
            secret: secret.to_string(),
            field: Some(field.to_string()),
        })
}
