//! Payload layouts.
//!
//! An [`OpCodeDefinition`] describes one protocol operation: its code, its
//! direction, the state key it reports or sets, and the ordered list of
//! [`FieldSpec`]s that give meaning to its payload bytes. Definitions are
//! validated once, at construction, so the codec never has to re-check shape.

use crate::constants::{MAX_ENUM_WIDTH, MAX_UINT_WIDTH, RGB_WIDTH, SCHEDULE_WIDTH};
use crate::error::LayoutError;
use crate::types::{Direction, OpCode};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

// ============================================================================
// Field Kinds
// ============================================================================

/// A named bit inside a bitfield.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitFlag {
    /// Flag name.
    pub name: String,
    /// Bit index, counted from the least-significant bit of the field.
    pub bit: u8,
}

impl BitFlag {
    /// Create a new flag.
    pub fn new(name: impl Into<String>, bit: u8) -> Self {
        BitFlag {
            name: name.into(),
            bit,
        }
    }
}

/// How the bytes of a field are interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FieldKind {
    /// Big-endian unsigned integer.
    Uint {
        /// Smallest value a command may set.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<u64>,
        /// Largest value a command may set.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<u64>,
        /// Fixed value always written by the encoder.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        constant: Option<u64>,
    },
    /// Named bits of a big-endian integer.
    Bitfield {
        /// Declared flags.
        flags: Vec<BitFlag>,
    },
    /// Red, green and blue channel bytes.
    RgbTriple,
    /// Big-endian value mapped to a label.
    Enum {
        /// Raw value to label table.
        #[serde(deserialize_with = "deserialize_enum_table")]
        values: BTreeMap<u64, String>,
    },
    /// Start time, end time and repeat mask.
    Schedule,
    /// Opaque bytes.
    Raw,
}

impl FieldKind {
    /// Unbounded unsigned integer.
    pub const fn uint() -> Self {
        FieldKind::Uint {
            min: None,
            max: None,
            constant: None,
        }
    }

    /// Catalogue name of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Uint { .. } => "uint",
            FieldKind::Bitfield { .. } => "bitfield",
            FieldKind::RgbTriple => "rgbTriple",
            FieldKind::Enum { .. } => "enum",
            FieldKind::Schedule => "schedule",
            FieldKind::Raw => "raw",
        }
    }

    fn width_allowed(&self, width: usize) -> bool {
        match self {
            FieldKind::Uint { .. } | FieldKind::Bitfield { .. } => {
                (1..=MAX_UINT_WIDTH).contains(&width)
            }
            FieldKind::RgbTriple => width == RGB_WIDTH,
            FieldKind::Enum { .. } => (1..=MAX_ENUM_WIDTH).contains(&width),
            FieldKind::Schedule => width == SCHEDULE_WIDTH,
            FieldKind::Raw => width >= 1,
        }
    }
}

/// Enum tables are written with string keys in JSON and integer keys in YAML.
/// Text keys may be decimal or `0x` hex.
fn deserialize_enum_table<'de, D>(deserializer: D) -> Result<BTreeMap<u64, String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize, PartialEq, Eq, PartialOrd, Ord)]
    #[serde(untagged)]
    enum RawKey {
        Int(u64),
        Text(String),
    }

    let raw: BTreeMap<RawKey, String> = BTreeMap::deserialize(deserializer)?;
    let mut table = BTreeMap::new();
    for (key, label) in raw {
        let value = match key {
            RawKey::Int(n) => n,
            RawKey::Text(s) => parse_table_key(&s).ok_or_else(|| {
                serde::de::Error::custom(format!("invalid enum value key: '{}'", s))
            })?,
        };
        if table.insert(value, label).is_some() {
            return Err(serde::de::Error::custom(format!(
                "duplicate enum value key: {}",
                value
            )));
        }
    }
    Ok(table)
}

fn parse_table_key(s: &str) -> Option<u64> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

// ============================================================================
// Field Specification
// ============================================================================

/// One field of a payload layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    /// Field name, unique within the layout.
    #[serde(rename = "field")]
    pub name: String,
    /// Byte offset into the payload.
    pub offset: usize,
    /// Width in bytes.
    pub width: usize,
    /// State key this field feeds, when it differs from the op code's key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    /// Interpretation of the field bytes.
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldSpec {
    /// Create a new field.
    pub fn new(name: impl Into<String>, offset: usize, width: usize, kind: FieldKind) -> Self {
        FieldSpec {
            name: name.into(),
            offset,
            width,
            state_key: None,
            kind,
        }
    }

    /// Route this field to a different state key.
    pub fn with_state_key(mut self, key: impl Into<String>) -> Self {
        self.state_key = Some(key.into());
        self
    }

    /// First byte past this field.
    pub fn end(&self) -> usize {
        self.offset + self.width
    }

    /// Fixed value for constant uint fields.
    pub fn constant(&self) -> Option<u64> {
        match self.kind {
            FieldKind::Uint { constant, .. } => constant,
            _ => None,
        }
    }

    /// Largest integer that fits in this field's width.
    pub fn max_value(&self) -> u64 {
        if self.width >= 8 {
            u64::MAX
        } else {
            (1u64 << (self.width * 8)) - 1
        }
    }

    fn overlaps(&self, other: &FieldSpec) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }

    fn validate(&self, max_payload_size: usize) -> Result<(), LayoutError> {
        if !self.kind.width_allowed(self.width) {
            return Err(LayoutError::InvalidWidth {
                field: self.name.clone(),
                kind: self.kind.name(),
                width: self.width,
            });
        }
        if self.end() > max_payload_size {
            return Err(LayoutError::OutOfBounds {
                field: self.name.clone(),
                end: self.end(),
                max: max_payload_size,
            });
        }

        let limit = self.max_value();
        match &self.kind {
            FieldKind::Uint { min, max, constant } => {
                let lo = min.unwrap_or(0);
                let hi = max.unwrap_or(limit);
                if hi > limit {
                    return Err(LayoutError::invalid_field(
                        &self.name,
                        format!("max {} does not fit in {} bytes", hi, self.width),
                    ));
                }
                if lo > hi {
                    return Err(LayoutError::invalid_field(
                        &self.name,
                        format!("min {} is greater than max {}", lo, hi),
                    ));
                }
                if let Some(c) = constant {
                    if *c < lo || *c > hi {
                        return Err(LayoutError::invalid_field(
                            &self.name,
                            format!("constant {} outside {}..={}", c, lo, hi),
                        ));
                    }
                }
            }
            FieldKind::Bitfield { flags } => {
                if flags.is_empty() {
                    return Err(LayoutError::invalid_field(&self.name, "bitfield declares no flags"));
                }
                let bits = self.width * 8;
                let mut names = HashSet::new();
                for flag in flags {
                    if usize::from(flag.bit) >= bits {
                        return Err(LayoutError::invalid_field(
                            &self.name,
                            format!("flag '{}' uses bit {} of a {}-bit field", flag.name, flag.bit, bits),
                        ));
                    }
                    if !names.insert(flag.name.as_str()) {
                        return Err(LayoutError::invalid_field(
                            &self.name,
                            format!("duplicate flag '{}'", flag.name),
                        ));
                    }
                }
            }
            FieldKind::Enum { values } => {
                if values.is_empty() {
                    return Err(LayoutError::invalid_field(&self.name, "enum table is empty"));
                }
                let mut labels = HashSet::new();
                for (raw, label) in values {
                    if *raw > limit {
                        return Err(LayoutError::invalid_field(
                            &self.name,
                            format!("enum value {} does not fit in {} bytes", raw, self.width),
                        ));
                    }
                    if !labels.insert(label.as_str()) {
                        return Err(LayoutError::invalid_field(
                            &self.name,
                            format!("duplicate enum label '{}'", label),
                        ));
                    }
                }
            }
            FieldKind::RgbTriple | FieldKind::Schedule | FieldKind::Raw => {}
        }
        Ok(())
    }
}

// ============================================================================
// Op-Code Definition
// ============================================================================

/// A validated protocol operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpCodeDefinition {
    code: OpCode,
    direction: Direction,
    state_key: String,
    max_payload_size: usize,
    layout: Vec<FieldSpec>,
}

impl OpCodeDefinition {
    /// Build a definition, checking every layout rule.
    pub fn new(
        code: OpCode,
        direction: Direction,
        state_key: impl Into<String>,
        max_payload_size: usize,
        layout: Vec<FieldSpec>,
    ) -> Result<Self, LayoutError> {
        if layout.is_empty() {
            return Err(LayoutError::Empty);
        }

        let mut names = HashSet::new();
        for (i, field) in layout.iter().enumerate() {
            if !names.insert(field.name.as_str()) {
                return Err(LayoutError::DuplicateField(field.name.clone()));
            }
            field.validate(max_payload_size)?;
            if let Some(other) = layout[..i].iter().find(|o| o.overlaps(field)) {
                return Err(LayoutError::Overlap {
                    field: field.name.clone(),
                    other: other.name.clone(),
                });
            }
        }

        Ok(OpCodeDefinition {
            code,
            direction,
            state_key: state_key.into(),
            max_payload_size,
            layout,
        })
    }

    /// Op code.
    pub fn code(&self) -> OpCode {
        self.code
    }

    /// Direction this definition is used in.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Default state key of every field.
    pub fn state_key(&self) -> &str {
        &self.state_key
    }

    /// Declared maximum payload size.
    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }

    /// Ordered fields.
    pub fn layout(&self) -> &[FieldSpec] {
        &self.layout
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.layout.iter().find(|f| f.name == name)
    }

    /// Minimum payload length: the end of the furthest field.
    pub fn required_len(&self) -> usize {
        self.layout.iter().map(FieldSpec::end).max().unwrap_or(0)
    }

    /// State key a field feeds.
    pub fn key_of<'a>(&'a self, field: &'a FieldSpec) -> &'a str {
        field.state_key.as_deref().unwrap_or(&self.state_key)
    }

    /// Non-constant fields that feed `key`, in layout order.
    pub fn fields_for<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a FieldSpec> + 'a {
        self.layout
            .iter()
            .filter(move |f| f.constant().is_none() && self.key_of(f) == key)
    }

    /// Every state key fed by a non-constant field.
    pub fn state_keys(&self) -> BTreeSet<&str> {
        self.layout
            .iter()
            .filter(|f| f.constant().is_none())
            .map(|f| self.key_of(f))
            .collect()
    }
}
