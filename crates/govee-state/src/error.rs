//! Error types for govee-state.

use govee_catalogue::RegistryError;
use govee_protocol::CodecError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from the state store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Device has no snapshot.
    #[error("unknown device '{0}'")]
    UnknownDevice(String),

    /// Device snapshot holds no value for the key.
    #[error("device '{device_id}' has no value for '{state_key}'")]
    UnknownKey {
        /// Device identifier.
        device_id: String,
        /// Requested key.
        state_key: String,
    },

    /// Device is known under a different device type.
    #[error("device '{device_id}' is a {expected}, not a {actual}")]
    DeviceTypeMismatch {
        /// Device identifier.
        device_id: String,
        /// Device type the snapshot was created with.
        expected: String,
        /// Device type supplied by the caller.
        actual: String,
    },

    /// Catalogue lookup failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Payload could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Coarse classification of a [`StateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateErrorKind {
    UnknownDevice,
    UnknownKey,
    DeviceTypeMismatch,
    Registry,
    Codec,
}

impl StateError {
    /// Classify this error.
    pub fn kind(&self) -> StateErrorKind {
        match self {
            StateError::UnknownDevice(_) => StateErrorKind::UnknownDevice,
            StateError::UnknownKey { .. } => StateErrorKind::UnknownKey,
            StateError::DeviceTypeMismatch { .. } => StateErrorKind::DeviceTypeMismatch,
            StateError::Registry(_) => StateErrorKind::Registry,
            StateError::Codec(_) => StateErrorKind::Codec,
        }
    }

    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            StateError::UnknownDevice(_) => "unknown_device",
            StateError::UnknownKey { .. } => "unknown_key",
            StateError::DeviceTypeMismatch { .. } => "device_type_mismatch",
            StateError::Registry(RegistryError::UnknownDeviceType(_)) => "unknown_device_type",
            StateError::Registry(RegistryError::UnsupportedOpCode { .. }) => "unsupported_op_code",
            StateError::Codec(_) => "codec",
        }
    }
}

/// Errors from the command builder.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Device has no snapshot, so its type is unknown.
    #[error("unknown device '{0}'")]
    UnknownDevice(String),

    /// No command can set this key on this device type.
    #[error("device type '{device_type}' cannot set '{state_key}'")]
    UnsupportedState {
        /// Device type.
        device_type: String,
        /// Requested key.
        state_key: String,
    },

    /// Requested value violates a field constraint.
    #[error("validation failed: {constraint}")]
    ValidationFailed {
        /// The violated constraint.
        constraint: String,
    },

    /// Validated value could not be encoded.
    #[error("encoding failed: {0}")]
    EncodingFailed(#[from] CodecError),

    /// Catalogue lookup failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Coarse classification of a [`CommandError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandErrorKind {
    UnknownDevice,
    UnsupportedState,
    ValidationFailed,
    EncodingFailed,
    Registry,
}

impl CommandError {
    /// Classify this error.
    pub fn kind(&self) -> CommandErrorKind {
        match self {
            CommandError::UnknownDevice(_) => CommandErrorKind::UnknownDevice,
            CommandError::UnsupportedState { .. } => CommandErrorKind::UnsupportedState,
            CommandError::ValidationFailed { .. } => CommandErrorKind::ValidationFailed,
            CommandError::EncodingFailed(_) => CommandErrorKind::EncodingFailed,
            CommandError::Registry(_) => CommandErrorKind::Registry,
        }
    }

    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self.kind() {
            CommandErrorKind::UnknownDevice => "unknown_device",
            CommandErrorKind::UnsupportedState => "unsupported_state",
            CommandErrorKind::ValidationFailed => "validation_failed",
            CommandErrorKind::EncodingFailed => "encoding_failed",
            CommandErrorKind::Registry => "registry",
        }
    }

    /// Create a validation error.
    pub fn validation(constraint: impl Into<String>) -> Self {
        CommandError::ValidationFailed {
            constraint: constraint.into(),
        }
    }
}

/// Errors loading an engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Text is not a valid configuration.
    #[error("invalid config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CommandError::validation("color.r must be between 0 and 255, got 300");
        assert_eq!(
            err.to_string(),
            "validation failed: color.r must be between 0 and 255, got 300"
        );
        assert_eq!(err.kind(), CommandErrorKind::ValidationFailed);

        let err = StateError::DeviceTypeMismatch {
            device_id: "lamp".into(),
            expected: "H6072".into(),
            actual: "H6199".into(),
        };
        assert_eq!(err.to_string(), "device 'lamp' is a H6072, not a H6199");
        assert_eq!(err.reason(), "device_type_mismatch");
    }

    #[test]
    fn test_transparent_sources() {
        let err: StateError = CodecError::MissingField("color".into()).into();
        assert_eq!(err.to_string(), "missing value for field 'color'");
        assert_eq!(err.kind(), StateErrorKind::Codec);
    }
}
