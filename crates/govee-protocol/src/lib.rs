//! Govee op-code protocol primitives.
//!
//! This crate provides the data-driven pieces shared by every Govee transport:
//! op-code identifiers, payload layouts, the field codec, and the 20-byte BLE
//! frame format that is also relayed (base64-encoded) by the cloud.
//!
//! # Protocol Overview
//!
//! Every exchange with a device is an *op code* plus a short payload:
//!
//! - **Commands** (host → device): framed as `0x33 | op | payload | pad | xor`
//! - **Reports** (device → host): framed as `0xAA | op | payload | pad | xor`
//!
//! What the payload bytes mean depends on the device type. That meaning is
//! described by an [`OpCodeDefinition`], an ordered list of [`FieldSpec`]s,
//! and [`decode`]/[`encode`] convert between bytes and typed [`FieldValue`]s.
//!
//! # Example
//!
//! ```rust
//! use govee_protocol::{decode, encode, Direction, FieldKind, FieldSpec, FieldValue, FieldValues, OpCode, OpCodeDefinition, Rgb};
//!
//! let def = OpCodeDefinition::new(
//!     OpCode::new(0x05),
//!     Direction::Both,
//!     "color",
//!     17,
//!     vec![FieldSpec::new("color", 0, 3, FieldKind::RgbTriple)],
//! )?;
//!
//! let mut values = FieldValues::new();
//! values.insert("color".to_string(), FieldValue::Rgb(Rgb::new(255, 0, 128)));
//!
//! let bytes = encode(&def, &values)?;
//! assert_eq!(bytes, vec![255, 0, 128]);
//! assert_eq!(decode(&def, &bytes)?, values);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod codec;
mod constants;
mod error;
mod frame;
mod layout;
mod types;
mod value;

pub use codec::*;
pub use constants::*;
pub use error::*;
pub use frame::*;
pub use layout::*;
pub use types::*;
pub use value::*;
