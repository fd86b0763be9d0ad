//! Device state snapshots.

use chrono::{DateTime, Utc};
use govee_protocol::{OpCode, StateValue};
use serde::Serialize;
use std::collections::BTreeMap;

/// The stored value of one state key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateEntry {
    pub value: StateValue,
    /// Sequence of the report that last wrote or confirmed this value.
    pub sequence: u64,
    pub updated_at: DateTime<Utc>,
    pub source_op_code: OpCode,
}

/// Reconciled state of one device.
///
/// Snapshots are immutable; the store replaces them wholesale on every
/// update, so a snapshot held by a reader never changes under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStateSnapshot {
    pub device_id: String,
    pub device_type: String,
    pub values: BTreeMap<String, StateEntry>,
}

impl DeviceStateSnapshot {
    /// An empty snapshot.
    pub fn new(device_id: impl Into<String>, device_type: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            device_type: device_type.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn get(&self, state_key: &str) -> Option<&StateEntry> {
        self.values.get(state_key)
    }

    /// Current value of a key.
    pub fn value(&self, state_key: &str) -> Option<&StateValue> {
        self.values.get(state_key).map(|entry| &entry.value)
    }

    /// Stored sequence of a key, if it has one.
    pub fn sequence(&self, state_key: &str) -> Option<u64> {
        self.values.get(state_key).map(|entry| entry.sequence)
    }
}

/// One decoded key update from a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedUpdate {
    pub state_key: String,
    pub value: StateValue,
    pub source_op_code: OpCode,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
}

impl DecodedUpdate {
    pub(crate) fn into_entry(self) -> StateEntry {
        StateEntry {
            value: self.value,
            sequence: self.sequence,
            updated_at: self.timestamp,
            source_op_code: self.source_op_code,
        }
    }
}
