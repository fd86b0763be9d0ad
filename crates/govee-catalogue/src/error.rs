//! Error types for govee-catalogue.

use govee_protocol::{Direction, OpCode};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a catalogue load.
#[derive(Debug, Error)]
pub enum CatalogueError {
    /// Source cannot be parsed or violates a layout rule.
    #[error("malformed catalogue: {detail}")]
    Malformed {
        /// What is wrong.
        detail: String,
    },

    /// Two definitions claim the same (device type, code, direction) slot.
    #[error("duplicate op code: {detail}")]
    DuplicateCode {
        /// Which slot collides.
        detail: String,
    },

    /// An op code or field feeds a key the device type does not declare.
    #[error("unknown state key: {detail}")]
    UnknownStateKey {
        /// Which key is undeclared, and where.
        detail: String,
    },

    /// Catalogue file could not be read.
    #[error("failed to read catalogue {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Coarse classification of a [`CatalogueError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogueErrorKind {
    Malformed,
    DuplicateCode,
    UnknownStateKey,
    Io,
}

impl CatalogueError {
    /// Classify this error.
    pub fn kind(&self) -> CatalogueErrorKind {
        match self {
            CatalogueError::Malformed { .. } => CatalogueErrorKind::Malformed,
            CatalogueError::DuplicateCode { .. } => CatalogueErrorKind::DuplicateCode,
            CatalogueError::UnknownStateKey { .. } => CatalogueErrorKind::UnknownStateKey,
            CatalogueError::Io { .. } => CatalogueErrorKind::Io,
        }
    }

    /// Create a malformed-source error.
    pub fn malformed(detail: impl Into<String>) -> Self {
        CatalogueError::Malformed {
            detail: detail.into(),
        }
    }

    /// Create a duplicate-slot error.
    pub fn duplicate(detail: impl Into<String>) -> Self {
        CatalogueError::DuplicateCode {
            detail: detail.into(),
        }
    }

    /// Create an undeclared-key error.
    pub fn unknown_key(detail: impl Into<String>) -> Self {
        CatalogueError::UnknownStateKey {
            detail: detail.into(),
        }
    }
}

/// Lookup failures against a loaded catalogue.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Device type is not in the catalogue.
    #[error("unknown device type '{0}'")]
    UnknownDeviceType(String),

    /// Device type has no definition for this code and direction.
    #[error("device type '{device_type}' does not support op code {op_code} ({direction})")]
    UnsupportedOpCode {
        /// Device type.
        device_type: String,
        /// Requested op code.
        op_code: OpCode,
        /// Requested direction.
        direction: Direction,
    },
}

/// Coarse classification of a [`RegistryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryErrorKind {
    UnknownDeviceType,
    UnsupportedOpCode,
}

impl RegistryError {
    /// Classify this error.
    pub fn kind(&self) -> RegistryErrorKind {
        match self {
            RegistryError::UnknownDeviceType(_) => RegistryErrorKind::UnknownDeviceType,
            RegistryError::UnsupportedOpCode { .. } => RegistryErrorKind::UnsupportedOpCode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CatalogueError::duplicate("H6072 0x05 COMMAND");
        assert_eq!(err.to_string(), "duplicate op code: H6072 0x05 COMMAND");
        assert_eq!(err.kind(), CatalogueErrorKind::DuplicateCode);

        let err = RegistryError::UnsupportedOpCode {
            device_type: "H6072".into(),
            op_code: OpCode::new(0x99),
            direction: Direction::Report,
        };
        assert_eq!(
            err.to_string(),
            "device type 'H6072' does not support op code 0x99 (REPORT)"
        );
        assert_eq!(err.kind(), RegistryErrorKind::UnsupportedOpCode);
    }
}
