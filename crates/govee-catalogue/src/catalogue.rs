//! Validated, immutable catalogue.

use crate::error::CatalogueError;
use crate::schema::{CatalogueRecord, DeviceTypeRecord};
use govee_protocol::{Direction, OpCode, OpCodeDefinition, DEFAULT_MAX_PAYLOAD_SIZE};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Everything known about one device type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTypeSchema {
    device_type: String,
    state_keys: BTreeSet<String>,
    op_codes: Vec<Arc<OpCodeDefinition>>,
}

impl DeviceTypeSchema {
    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    pub fn state_keys(&self) -> &BTreeSet<String> {
        &self.state_keys
    }

    pub fn has_state_key(&self, key: &str) -> bool {
        self.state_keys.contains(key)
    }

    /// Every definition, in catalogue order.
    pub fn supported_op_codes(&self) -> &[Arc<OpCodeDefinition>] {
        &self.op_codes
    }

    /// Find the definition answering `code` in `direction`.
    ///
    /// A `BOTH` definition answers report and command lookups.
    pub fn find(&self, code: OpCode, direction: Direction) -> Option<&Arc<OpCodeDefinition>> {
        self.op_codes
            .iter()
            .find(|def| def.code() == code && def.direction().serves(direction))
    }

    /// Command-capable definitions with a field feeding `key`, in catalogue order.
    pub fn command_defs_for<'a>(
        &'a self,
        key: &'a str,
    ) -> impl Iterator<Item = &'a Arc<OpCodeDefinition>> + 'a {
        self.op_codes.iter().filter(move |def| {
            def.direction().serves(Direction::Command) && def.fields_for(key).next().is_some()
        })
    }

    fn from_record(record: DeviceTypeRecord) -> Result<Self, CatalogueError> {
        let device_type = record.device_type;
        if device_type.trim().is_empty() {
            return Err(CatalogueError::malformed("device type identifier is empty"));
        }

        let mut state_keys = BTreeSet::new();
        for key in record.state_keys {
            if !state_keys.insert(key.clone()) {
                return Err(CatalogueError::malformed(format!(
                    "{}: state key '{}' declared twice",
                    device_type, key
                )));
            }
        }

        let default_max = record.max_payload_size.unwrap_or(DEFAULT_MAX_PAYLOAD_SIZE);
        let mut op_codes: Vec<Arc<OpCodeDefinition>> = Vec::with_capacity(record.op_codes.len());

        for op in record.op_codes {
            let code = op.code;
            let def = OpCodeDefinition::new(
                code,
                op.direction,
                op.state_key,
                op.max_payload_size.unwrap_or(default_max),
                op.layout,
            )
            .map_err(|e| CatalogueError::malformed(format!("{} {}: {}", device_type, code, e)))?;

            if !state_keys.contains(def.state_key()) {
                return Err(CatalogueError::unknown_key(format!(
                    "{} {} reports '{}'",
                    device_type,
                    code,
                    def.state_key()
                )));
            }
            for field in def.layout() {
                let key = def.key_of(field);
                if !state_keys.contains(key) {
                    return Err(CatalogueError::unknown_key(format!(
                        "{} {} field '{}' feeds '{}'",
                        device_type, code, field.name, key
                    )));
                }
            }

            if let Some(existing) = op_codes
                .iter()
                .find(|d| d.code() == code && d.direction().overlaps(def.direction()))
            {
                return Err(CatalogueError::duplicate(format!(
                    "{} {} {} collides with {}",
                    device_type,
                    code,
                    def.direction(),
                    existing.direction()
                )));
            }

            op_codes.push(Arc::new(def));
        }

        Ok(DeviceTypeSchema {
            device_type,
            state_keys,
            op_codes,
        })
    }
}

/// An immutable set of device-type schemas.
///
/// Built only through validation; a partially valid source never yields a
/// `Catalogue`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalogue {
    device_types: BTreeMap<String, Arc<DeviceTypeSchema>>,
}

impl Catalogue {
    /// An empty catalogue.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate raw records into a catalogue.
    pub fn from_records(record: CatalogueRecord) -> Result<Self, CatalogueError> {
        let mut device_types = BTreeMap::new();
        for device in record.device_types {
            let schema = DeviceTypeSchema::from_record(device)?;
            let id = schema.device_type.clone();
            if device_types.insert(id.clone(), Arc::new(schema)).is_some() {
                return Err(CatalogueError::malformed(format!(
                    "device type '{}' declared twice",
                    id
                )));
            }
        }
        Ok(Catalogue { device_types })
    }

    /// Schema for one device type.
    pub fn get(&self, device_type: &str) -> Option<&Arc<DeviceTypeSchema>> {
        self.device_types.get(device_type)
    }

    /// Device type identifiers, sorted.
    pub fn device_types(&self) -> impl Iterator<Item = &str> {
        self.device_types.keys().map(String::as_str)
    }

    /// All schemas, sorted by device type.
    pub fn schemas(&self) -> impl Iterator<Item = &Arc<DeviceTypeSchema>> {
        self.device_types.values()
    }

    pub fn len(&self) -> usize {
        self.device_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.device_types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogueErrorKind;

    fn load(json: &str) -> Result<Catalogue, CatalogueError> {
        Catalogue::from_json(json)
    }

    #[test]
    fn test_both_answers_either_direction() {
        let cat = load(
            r#"{"deviceTypes": [{"deviceType": "H6072", "stateKeys": ["color"], "opCodes": [
                {"code": "0x05", "direction": "BOTH", "stateKey": "color",
                 "layout": [{"field": "color", "offset": 0, "width": 3, "kind": "rgbTriple"}]}]}]}"#,
        )
        .unwrap();
        let schema = cat.get("H6072").unwrap();
        assert!(schema.find(OpCode::new(0x05), Direction::Report).is_some());
        assert!(schema.find(OpCode::new(0x05), Direction::Command).is_some());
        assert!(schema.find(OpCode::new(0x06), Direction::Report).is_none());
        assert_eq!(schema.command_defs_for("color").count(), 1);
    }

    #[test]
    fn test_both_conflicts_with_report() {
        let err = load(
            r#"{"deviceTypes": [{"deviceType": "H6072", "stateKeys": ["color"], "opCodes": [
                {"code": 5, "direction": "BOTH", "stateKey": "color",
                 "layout": [{"field": "color", "offset": 0, "width": 3, "kind": "rgbTriple"}]},
                {"code": "0x05", "direction": "REPORT", "stateKey": "color",
                 "layout": [{"field": "color", "offset": 0, "width": 3, "kind": "rgbTriple"}]}]}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), CatalogueErrorKind::DuplicateCode);
    }

    #[test]
    fn test_report_and_command_share_code() {
        let cat = load(
            r#"{"deviceTypes": [{"deviceType": "H6008", "stateKeys": ["color"], "opCodes": [
                {"code": 5, "direction": "REPORT", "stateKey": "color",
                 "layout": [{"field": "color", "offset": 1, "width": 3, "kind": "rgbTriple"}]},
                {"code": 5, "direction": "COMMAND", "stateKey": "color",
                 "layout": [{"field": "color", "offset": 0, "width": 3, "kind": "rgbTriple"}]}]}]}"#,
        )
        .unwrap();
        let schema = cat.get("H6008").unwrap();
        let report = schema.find(OpCode::new(5), Direction::Report).unwrap();
        assert_eq!(report.layout()[0].offset, 1);
        let command = schema.find(OpCode::new(5), Direction::Command).unwrap();
        assert_eq!(command.layout()[0].offset, 0);
    }

    #[test]
    fn test_field_state_key_must_be_declared() {
        let err = load(
            r#"{"deviceTypes": [{"deviceType": "H6072", "stateKeys": ["color"], "opCodes": [
                {"code": 5, "direction": "REPORT", "stateKey": "color",
                 "layout": [{"field": "color", "offset": 0, "width": 3, "kind": "rgbTriple"},
                            {"field": "kelvin", "offset": 3, "width": 2, "kind": "uint", "stateKey": "colorTemp"}]}]}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), CatalogueErrorKind::UnknownStateKey);
        assert!(err.to_string().contains("colorTemp"));
    }

    #[test]
    fn test_duplicate_device_type() {
        let err = load(
            r#"{"deviceTypes": [
                {"deviceType": "H6072", "stateKeys": [], "opCodes": []},
                {"deviceType": "H6072", "stateKeys": [], "opCodes": []}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), CatalogueErrorKind::Malformed);
    }

    #[test]
    fn test_device_payload_bound_is_inherited() {
        let err = load(
            r#"{"deviceTypes": [{"deviceType": "H6072", "stateKeys": ["blob"], "maxPayloadSize": 4, "opCodes": [
                {"code": 9, "direction": "REPORT", "stateKey": "blob",
                 "layout": [{"field": "blob", "offset": 0, "width": 5, "kind": "raw"}]}]}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), CatalogueErrorKind::Malformed);
        assert!(err.to_string().contains("beyond max payload size 4"));
    }
}
