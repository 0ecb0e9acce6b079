use std::fmt;

use crate::coordinate::ResolutionError;
use crate::secrets::StoreError;

/// Error types surfaced by a helm-vault session
#[derive(Debug)]
pub enum HelmVaultError {
    /// Missing or unusable store endpoint/credential. Fatal, raised before traversal.
    Configuration(String),

    /// Malformed placeholder at a document location
    Resolution { location: String, message: String },

    /// Requested secret or field absent in the store
    NotFound { location: String, coordinate: String },

    /// Store refused access to the secret behind one placeholder
    Denied { location: String, message: String },

    /// Store unreachable or failing. Later store calls are not attempted.
    Transport(String),

    /// Source document (or companion secret file) failed to parse
    Serialization { file: String, message: String },

    /// Companion secret file name or content rejected
    SecretFile(String),

    /// Traversal finished but some placeholders could not be processed
    PartialFailure { failed: usize, total: usize },
}

impl fmt::Display for HelmVaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HelmVaultError::Configuration(msg) => {
                write!(f, "Vault not configured correctly: {}", msg)
            }
            HelmVaultError::Resolution { location, message } => {
                write!(f, "Invalid placeholder at {}: {}", location, message)
            }
            HelmVaultError::NotFound {
                location,
                coordinate,
            } => {
                write!(f, "Secret not found for {}: {}", location, coordinate)
            }
            HelmVaultError::Denied { location, message } => {
                write!(f, "Vault denied access for {}: {}", location, message)
            }
            HelmVaultError::Transport(msg) => {
                write!(f, "Unable to reach Vault: {}", msg)
            }
            HelmVaultError::Serialization { file, message } => {
                write!(f, "Failed to parse YAML file '{}': {}", file, message)
            }
            HelmVaultError::SecretFile(msg) => {
                write!(f, "Invalid secret file: {}", msg)
            }
            HelmVaultError::PartialFailure { failed, total } => {
                write!(
                    f,
                    "{} of {} placeholder(s) could not be processed",
                    failed, total
                )
            }
        }
    }
}

impl std::error::Error for HelmVaultError {}

impl HelmVaultError {
    /// Attach a document location to a resolver error
    pub fn resolution(location: &str, err: ResolutionError) -> Self {
        HelmVaultError::Resolution {
            location: location.to_string(),
            message: err.to_string(),
        }
    }

    /// Attach a document location to a store error
    pub fn from_store(location: &str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => HelmVaultError::NotFound {
                location: location.to_string(),
                coordinate: err.to_string(),
            },
            StoreError::Denied(message) => HelmVaultError::Denied {
                location: location.to_string(),
                message,
            },
            StoreError::Transport(msg) => HelmVaultError::Transport(msg),
            StoreError::Configuration(msg) => HelmVaultError::Configuration(msg),
        }
    }

    /// Whether this error means further store calls will fail the same way
    pub fn is_transport(&self) -> bool {
        matches!(self, HelmVaultError::Transport(_))
    }
}

impl From<StoreError> for HelmVaultError {
    fn from(err: StoreError) -> Self {
        HelmVaultError::from_store("-", err)
    }
}
