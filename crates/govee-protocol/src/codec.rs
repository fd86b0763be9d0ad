//! Payload decoding and encoding.
//!
//! Converts between raw payload bytes and [`FieldValues`] according to an
//! [`OpCodeDefinition`]'s layout.
//!
//! ## Field Encodings
//!
//! | Kind        | Bytes                                   | Value                         |
//! |-------------|-----------------------------------------|-------------------------------|
//! | `uint`      | big-endian, 1-8 bytes                   | [`FieldValue::Uint`]          |
//! | `bitfield`  | big-endian, bit 0 = least significant   | [`FieldValue::Flags`]         |
//! | `rgbTriple` | `r g b`                                 | [`FieldValue::Rgb`]           |
//! | `enum`      | big-endian, 1-4 bytes, looked up        | [`FieldValue::Enum`]          |
//! | `schedule`  | `startH startM endH endM repeat`        | [`FieldValue::Schedule`]      |
//! | `raw`       | as-is                                   | [`FieldValue::Raw`]           |

use crate::{
    CodecError, FieldKind, FieldSpec, FieldValue, FieldValues, OpCodeDefinition, Rgb, Schedule,
    TimeOfDay,
};
use std::collections::BTreeMap;

// ============================================================================
// Decoding Functions
// ============================================================================

/// Decode a payload into its field values.
///
/// Payloads longer than the layout are accepted; the extra bytes are
/// transport padding. Constant fields must hold their declared value and
/// are left out of the result.
pub fn decode(def: &OpCodeDefinition, raw: &[u8]) -> Result<FieldValues, CodecError> {
    let required = def.required_len();
    if raw.len() < required {
        return Err(CodecError::LengthMismatch {
            expected: required,
            actual: raw.len(),
        });
    }

    let mut values = FieldValues::new();
    for field in def.layout() {
        let bytes = &raw[field.offset..field.end()];
        if let Some(expected) = field.constant() {
            let actual = read_be(bytes);
            if actual != expected {
                return Err(CodecError::ConstantMismatch {
                    field: field.name.clone(),
                    expected,
                    actual,
                });
            }
            continue;
        }
        values.insert(field.name.clone(), decode_field(field, bytes)?);
    }
    Ok(values)
}

/// Decode a single field from exactly its own bytes.
pub fn decode_field(field: &FieldSpec, bytes: &[u8]) -> Result<FieldValue, CodecError> {
    match &field.kind {
        FieldKind::Uint { .. } => Ok(FieldValue::Uint(read_be(bytes))),
        FieldKind::Bitfield { flags } => {
            let bits = read_be(bytes);
            let decoded = flags
                .iter()
                .map(|flag| (flag.name.clone(), (bits >> flag.bit) & 1 == 1))
                .collect();
            Ok(FieldValue::Flags(decoded))
        }
        FieldKind::RgbTriple => Ok(FieldValue::Rgb(Rgb::new(bytes[0], bytes[1], bytes[2]))),
        FieldKind::Enum { values } => {
            let raw = read_be(bytes);
            values
                .get(&raw)
                .map(|label| FieldValue::Enum(label.clone()))
                .ok_or_else(|| CodecError::UnknownEnumValue {
                    field: field.name.clone(),
                    value: raw,
                })
        }
        FieldKind::Schedule => Ok(FieldValue::Schedule(Schedule {
            start: TimeOfDay::new(bytes[0], bytes[1]),
            end: TimeOfDay::new(bytes[2], bytes[3]),
            repeat: bytes[4],
        })),
        FieldKind::Raw => Ok(FieldValue::Raw(bytes.to_vec())),
    }
}

fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

// ============================================================================
// Encoding Functions
// ============================================================================

/// Encode field values into a payload.
///
/// The output is exactly [`OpCodeDefinition::required_len`] bytes; bytes not
/// covered by a field are zero. Constant fields are always written and need
/// no value; every other field must be present in `values`.
pub fn encode(def: &OpCodeDefinition, values: &FieldValues) -> Result<Vec<u8>, CodecError> {
    let mut buf = vec![0u8; def.required_len()];

    for field in def.layout() {
        let out = &mut buf[field.offset..field.end()];
        if let Some(constant) = field.constant() {
            write_be(out, constant);
            continue;
        }
        let value = values
            .get(&field.name)
            .ok_or_else(|| CodecError::MissingField(field.name.clone()))?;
        encode_field(field, value, out)?;
    }

    Ok(buf)
}

/// Encode a single field into exactly its own bytes.
pub fn encode_field(field: &FieldSpec, value: &FieldValue, out: &mut [u8]) -> Result<(), CodecError> {
    match (&field.kind, value) {
        (FieldKind::Uint { .. }, FieldValue::Uint(v)) => {
            check_fits(field, *v)?;
            write_be(out, *v);
        }
        (FieldKind::Bitfield { flags }, FieldValue::Flags(set)) => {
            if let Some(unknown) = set.keys().find(|name| !flags.iter().any(|f| &f.name == *name)) {
                return Err(CodecError::UnknownFlag {
                    field: field.name.clone(),
                    flag: unknown.clone(),
                });
            }
            let mut bits = 0u64;
            for flag in flags {
                let on = set
                    .get(&flag.name)
                    .ok_or_else(|| CodecError::MissingField(format!("{}.{}", field.name, flag.name)))?;
                if *on {
                    bits |= 1 << flag.bit;
                }
            }
            write_be(out, bits);
        }
        (FieldKind::RgbTriple, FieldValue::Rgb(c)) => {
            out.copy_from_slice(&[c.r, c.g, c.b]);
        }
        (FieldKind::Enum { values }, FieldValue::Enum(label)) => {
            let raw = lookup_label(values, label).ok_or_else(|| CodecError::UnknownEnumLabel {
                field: field.name.clone(),
                label: label.clone(),
            })?;
            write_be(out, raw);
        }
        (FieldKind::Schedule, FieldValue::Schedule(s)) => {
            check_time(field, "start", s.start)?;
            check_time(field, "end", s.end)?;
            out.copy_from_slice(&[s.start.hour, s.start.minute, s.end.hour, s.end.minute, s.repeat]);
        }
        (FieldKind::Raw, FieldValue::Raw(bytes)) => {
            if bytes.len() != field.width {
                return Err(CodecError::WidthMismatch {
                    field: field.name.clone(),
                    expected: field.width,
                    actual: bytes.len(),
                });
            }
            out.copy_from_slice(bytes);
        }
        (kind, value) => {
            return Err(CodecError::TypeMismatch {
                field: field.name.clone(),
                expected: kind.name(),
                actual: value.kind_name(),
            })
        }
    }
    Ok(())
}

/// Find the raw value for an enum label.
pub fn lookup_label(table: &BTreeMap<u64, String>, label: &str) -> Option<u64> {
    table.iter().find(|(_, l)| l.as_str() == label).map(|(raw, _)| *raw)
}

fn check_fits(field: &FieldSpec, value: u64) -> Result<(), CodecError> {
    let max = field.max_value();
    if value > max {
        return Err(CodecError::out_of_range(&field.name, value, max));
    }
    Ok(())
}

fn check_time(field: &FieldSpec, which: &str, time: TimeOfDay) -> Result<(), CodecError> {
    if time.hour > 23 {
        return Err(CodecError::out_of_range(
            format!("{}.{}Hour", field.name, which),
            u64::from(time.hour),
            23,
        ));
    }
    if time.minute > 59 {
        return Err(CodecError::out_of_range(
            format!("{}.{}Minute", field.name, which),
            u64::from(time.minute),
            59,
        ));
    }
    Ok(())
}

fn write_be(out: &mut [u8], value: u64) {
    let bytes = value.to_be_bytes();
    out.copy_from_slice(&bytes[8 - out.len()..]);
}
