//! Error types for govee-protocol.

use thiserror::Error;

/// Errors that can occur while decoding or encoding a payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Payload is shorter than the layout requires.
    #[error("payload too short: expected at least {expected} bytes, got {actual}")]
    LengthMismatch {
        /// Bytes required by the layout.
        expected: usize,
        /// Bytes actually supplied.
        actual: usize,
    },

    /// Raw enum value has no label in the field's table.
    #[error("unknown value 0x{value:X} for enum field '{field}'")]
    UnknownEnumValue {
        /// Field name.
        field: String,
        /// Raw value read from the payload.
        value: u64,
    },

    /// Label has no raw value in the field's table.
    #[error("unknown label '{label}' for enum field '{field}'")]
    UnknownEnumLabel {
        /// Field name.
        field: String,
        /// Label supplied for encoding.
        label: String,
    },

    /// Numeric value does not fit the field.
    #[error("value {value} out of range for field '{field}' (max {max})")]
    OutOfRange {
        /// Field name.
        field: String,
        /// Supplied value.
        value: u64,
        /// Largest value the field can hold.
        max: u64,
    },

    /// A required field has no supplied value.
    #[error("missing value for field '{0}'")]
    MissingField(String),

    /// Supplied value has a different kind than the field.
    #[error("field '{field}' expects a {expected} value, got {actual}")]
    TypeMismatch {
        /// Field name.
        field: String,
        /// Kind declared by the layout.
        expected: &'static str,
        /// Kind of the supplied value.
        actual: &'static str,
    },

    /// Flag name is not declared by the bitfield.
    #[error("unknown flag '{flag}' for bitfield '{field}'")]
    UnknownFlag {
        /// Field name.
        field: String,
        /// Flag name supplied for encoding.
        flag: String,
    },

    /// Raw byte value has the wrong length for its field.
    #[error("field '{field}' is {expected} bytes wide, got {actual}")]
    WidthMismatch {
        /// Field name.
        field: String,
        /// Declared width.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },

    /// A constant field holds something other than its declared value.
    #[error("field '{field}' must be 0x{expected:X}, got 0x{actual:X}")]
    ConstantMismatch {
        /// Field name.
        field: String,
        /// Declared constant.
        expected: u64,
        /// Value read from the payload.
        actual: u64,
    },
}

/// Coarse classification of a [`CodecError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecErrorKind {
    /// See [`CodecError::LengthMismatch`].
    LengthMismatch,
    /// See [`CodecError::UnknownEnumValue`].
    UnknownEnumValue,
    /// See [`CodecError::UnknownEnumLabel`].
    UnknownEnumLabel,
    /// See [`CodecError::OutOfRange`].
    OutOfRange,
    /// See [`CodecError::MissingField`].
    MissingField,
    /// See [`CodecError::TypeMismatch`].
    TypeMismatch,
    /// See [`CodecError::UnknownFlag`].
    UnknownFlag,
    /// See [`CodecError::WidthMismatch`].
    WidthMismatch,
    /// See [`CodecError::ConstantMismatch`].
    ConstantMismatch,
}

impl CodecError {
    /// Classify this error.
    pub fn kind(&self) -> CodecErrorKind {
        match self {
            CodecError::LengthMismatch { .. } => CodecErrorKind::LengthMismatch,
            CodecError::UnknownEnumValue { .. } => CodecErrorKind::UnknownEnumValue,
            CodecError::UnknownEnumLabel { .. } => CodecErrorKind::UnknownEnumLabel,
            CodecError::OutOfRange { .. } => CodecErrorKind::OutOfRange,
            CodecError::MissingField(_) => CodecErrorKind::MissingField,
            CodecError::TypeMismatch { .. } => CodecErrorKind::TypeMismatch,
            CodecError::UnknownFlag { .. } => CodecErrorKind::UnknownFlag,
            CodecError::WidthMismatch { .. } => CodecErrorKind::WidthMismatch,
            CodecError::ConstantMismatch { .. } => CodecErrorKind::ConstantMismatch,
        }
    }

    /// Create an out-of-range error.
    pub fn out_of_range(field: impl Into<String>, value: u64, max: u64) -> Self {
        CodecError::OutOfRange {
            field: field.into(),
            value,
            max,
        }
    }
}

/// Errors found while constructing an op-code layout.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// Layout declares no fields.
    #[error("layout is empty")]
    Empty,

    /// Field extends past the declared maximum payload size.
    #[error("field '{field}' ends at byte {end}, beyond max payload size {max}")]
    OutOfBounds {
        /// Field name.
        field: String,
        /// First byte past the field.
        end: usize,
        /// Declared maximum payload size.
        max: usize,
    },

    /// Width is not allowed for the field's kind.
    #[error("field '{field}' has invalid width {width} for kind {kind}")]
    InvalidWidth {
        /// Field name.
        field: String,
        /// Field kind.
        kind: &'static str,
        /// Declared width.
        width: usize,
    },

    /// Two fields share a name.
    #[error("duplicate field name '{0}'")]
    DuplicateField(String),

    /// Two fields share payload bytes.
    #[error("field '{field}' overlaps field '{other}'")]
    Overlap {
        /// Later field.
        field: String,
        /// Earlier field it collides with.
        other: String,
    },

    /// Kind-specific parameters are inconsistent.
    #[error("field '{field}': {detail}")]
    InvalidField {
        /// Field name.
        field: String,
        /// What is wrong.
        detail: String,
    },
}

impl LayoutError {
    /// Create a kind-specific field error.
    pub fn invalid_field(field: impl Into<String>, detail: impl Into<String>) -> Self {
        LayoutError::InvalidField {
            field: field.into(),
            detail: detail.into(),
        }
    }
}

/// Errors that can occur while assembling or parsing BLE frames.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Frame content leaves no room for the checksum.
    #[error("frame content too long: maximum {max} bytes, got {actual}")]
    TooLong {
        /// Maximum content length.
        max: usize,
        /// Actual content length.
        actual: usize,
    },

    /// Frame is not exactly one frame long.
    #[error("frame has wrong length: expected {expected} bytes, got {actual}")]
    Length {
        /// Expected frame length.
        expected: usize,
        /// Actual frame length.
        actual: usize,
    },

    /// Frame prefix is not the one expected for its direction.
    #[error("unexpected frame prefix: expected 0x{expected:02X}, got 0x{actual:02X}")]
    UnexpectedPrefix {
        /// Prefix required by the caller.
        expected: u8,
        /// Prefix carried by the frame.
        actual: u8,
    },

    /// XOR checksum does not match the frame content.
    #[error("checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    Checksum {
        /// Checksum computed over the content.
        expected: u8,
        /// Checksum carried by the frame.
        actual: u8,
    },

    /// Cloud payload is not valid base64.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Errors that can occur when parsing an op code from text or a number.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OpCodeError {
    /// Op code text is empty.
    #[error("op code string is empty")]
    Empty,

    /// Op code text is not hexadecimal.
    #[error("invalid op code string: '{0}'")]
    InvalidHex(String),

    /// Op code does not fit in one byte.
    #[error("op code {0} does not fit in one byte")]
    TooLarge(String),
}
