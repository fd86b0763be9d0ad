//! Typed field and state values.
//!
//! This module provides:
//! - [`FieldValue`] - The decoded value of one layout field
//! - [`StateValue`] - The value stored under one state key
//! - [`Rgb`], [`Schedule`], [`TimeOfDay`] - Structured field payloads

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Decoded fields of one payload, keyed by field name.
pub type FieldValues = BTreeMap<String, FieldValue>;

// ============================================================================
// Structured Values
// ============================================================================

/// An RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }
}

/// Hour and minute of a day.
///
/// Decoding never rejects out-of-range values; they are reported as read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    pub const fn new(hour: u8, minute: u8) -> Self {
        TimeOfDay { hour, minute }
    }

    /// Whether this is a real wall-clock time.
    pub fn is_valid(&self) -> bool {
        self.hour <= 23 && self.minute <= 59
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// A timer window with a weekday repeat mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schedule {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    /// One bit per weekday.
    pub repeat: u8,
}

// ============================================================================
// Field Value
// ============================================================================

/// The value of one layout field.
///
/// Serialized untagged so that values read naturally in JSON: a number, a
/// label string, a byte array, a map of flags, an `{r,g,b}` object or a
/// `{start,end,repeat}` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Unsigned integer.
    Uint(u64),
    /// Enum label.
    Enum(String),
    /// Opaque bytes.
    Raw(Vec<u8>),
    /// Named boolean flags.
    Flags(BTreeMap<String, bool>),
    /// RGB colour.
    Rgb(Rgb),
    /// Timer window.
    Schedule(Schedule),
}

impl FieldValue {
    /// Catalogue name of the field kind this value belongs to.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Uint(_) => "uint",
            FieldValue::Enum(_) => "enum",
            FieldValue::Raw(_) => "raw",
            FieldValue::Flags(_) => "bitfield",
            FieldValue::Rgb(_) => "rgbTriple",
            FieldValue::Schedule(_) => "schedule",
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            FieldValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&str> {
        match self {
            FieldValue::Enum(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Raw(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_flags(&self) -> Option<&BTreeMap<String, bool>> {
        match self {
            FieldValue::Flags(v) => Some(v),
            _ => None,
        }
    }

    /// Look up one flag of a bitfield value.
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.as_flags().and_then(|flags| flags.get(name).copied())
    }

    pub fn as_rgb(&self) -> Option<Rgb> {
        match self {
            FieldValue::Rgb(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_schedule(&self) -> Option<Schedule> {
        match self {
            FieldValue::Schedule(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Uint(v) => write!(f, "{}", v),
            FieldValue::Enum(v) => write!(f, "{}", v),
            FieldValue::Raw(v) => write!(f, "{}", hex::encode(v)),
            FieldValue::Flags(v) => {
                let strs: Vec<String> = v.iter().map(|(k, on)| format!("{}={}", k, on)).collect();
                write!(f, "{{{}}}", strs.join(", "))
            }
            FieldValue::Rgb(c) => write!(f, "#{:02x}{:02x}{:02x}", c.r, c.g, c.b),
            FieldValue::Schedule(s) => write!(f, "{}-{} repeat 0x{:02X}", s.start, s.end, s.repeat),
        }
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Uint(v)
    }
}

impl From<Rgb> for FieldValue {
    fn from(v: Rgb) -> Self {
        FieldValue::Rgb(v)
    }
}

impl From<Schedule> for FieldValue {
    fn from(v: Schedule) -> Self {
        FieldValue::Schedule(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Enum(v.to_string())
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(v: Vec<u8>) -> Self {
        FieldValue::Raw(v)
    }
}

// ============================================================================
// State Value
// ============================================================================

/// The value stored under one state key.
///
/// A key fed by exactly one field holds that field's value; a key fed by
/// several fields of the same payload holds them grouped by field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Single(FieldValue),
    Group(FieldValues),
}

impl StateValue {
    /// The single field value, if this key is fed by one field.
    pub fn as_single(&self) -> Option<&FieldValue> {
        match self {
            StateValue::Single(v) => Some(v),
            StateValue::Group(_) => None,
        }
    }

    /// Value of one named field.
    ///
    /// For a single value the field name is not checked.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        match self {
            StateValue::Single(v) => Some(v),
            StateValue::Group(g) => g.get(name),
        }
    }
}

impl From<FieldValue> for StateValue {
    fn from(v: FieldValue) -> Self {
        StateValue::Single(v)
    }
}

impl std::fmt::Display for StateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateValue::Single(v) => write!(f, "{}", v),
            StateValue::Group(g) => {
                let strs: Vec<String> = g.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", strs.join(", "))
            }
        }
    }
}
