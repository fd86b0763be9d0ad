//! Common types used in the protocol.

use crate::error::OpCodeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// A one-byte operation code.
///
/// Catalogue data writes op codes either as integers (`5`) or as hex text
/// (`"0x05"`, `"05"`, `"0x5"`). Both forms normalise to the same value and
/// display as `0x05`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct OpCode(pub u8);

impl OpCode {
    /// Create a new op code.
    pub const fn new(code: u8) -> Self {
        OpCode(code)
    }

    /// Get the raw byte.
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Parse an op code from hex text, with or without a `0x` prefix.
    pub fn parse(text: &str) -> Result<Self, OpCodeError> {
        let trimmed: String = text.trim().chars().filter(|c| !c.is_whitespace()).collect();
        if trimmed.is_empty() {
            return Err(OpCodeError::Empty);
        }
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(&trimmed);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(OpCodeError::InvalidHex(text.to_string()));
        }
        let value =
            u64::from_str_radix(digits, 16).map_err(|_| OpCodeError::TooLarge(text.to_string()))?;
        Self::try_from(value).map_err(|_| OpCodeError::TooLarge(text.to_string()))
    }
}

impl TryFrom<u64> for OpCode {
    type Error = OpCodeError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map(OpCode)
            .map_err(|_| OpCodeError::TooLarge(value.to_string()))
    }
}

impl From<u8> for OpCode {
    fn from(code: u8) -> Self {
        OpCode(code)
    }
}

impl From<OpCode> for u8 {
    fn from(code: OpCode) -> Self {
        code.0
    }
}

impl FromStr for OpCode {
    type Err = OpCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OpCode::parse(s)
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

impl Serialize for OpCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for OpCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(i64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) if n < 0 => Err(serde::de::Error::custom(format!(
                "op code cannot be negative: {}",
                n
            ))),
            Repr::Number(n) => OpCode::try_from(n as u64).map_err(serde::de::Error::custom),
            Repr::Text(s) => OpCode::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}

/// Which way an op code travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Device → host telemetry.
    #[serde(alias = "report")]
    Report,
    /// Host → device command.
    #[serde(alias = "command")]
    Command,
    /// Used in both directions with the same layout.
    #[serde(alias = "both")]
    Both,
}

impl Direction {
    /// Whether a definition with this direction answers a lookup for `wanted`.
    ///
    /// `Both` answers `Report` and `Command` lookups; a `Both` lookup is only
    /// answered by a `Both` definition.
    pub fn serves(self, wanted: Direction) -> bool {
        self == wanted || self == Direction::Both
    }

    /// Whether two definitions of the same code would claim the same slot.
    pub fn overlaps(self, other: Direction) -> bool {
        self == other || self == Direction::Both || other == Direction::Both
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Report => write!(f, "REPORT"),
            Direction::Command => write!(f, "COMMAND"),
            Direction::Both => write!(f, "BOTH"),
        }
    }
}
