//! Raw catalogue records as they appear in JSON or YAML.
//!
//! These types carry no invariants; [`crate::Catalogue::from_records`]
//! validates them into strong types.

use govee_protocol::{Direction, FieldSpec, OpCode};
use serde::{Deserialize, Serialize};

/// Top-level catalogue document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CatalogueRecord {
    pub device_types: Vec<DeviceTypeRecord>,
}

/// One device type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeviceTypeRecord {
    /// Product-family identifier, e.g. `H6072`.
    pub device_type: String,
    /// Logical attributes this device type exposes.
    pub state_keys: Vec<String>,
    /// Default payload bound for every op code of this device type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload_size: Option<usize>,
    pub op_codes: Vec<OpCodeRecord>,
}

/// One op-code definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OpCodeRecord {
    pub code: OpCode,
    pub direction: Direction,
    pub state_key: String,
    /// Overrides the device type's payload bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload_size: Option<usize>,
    pub layout: Vec<FieldSpec>,
}
