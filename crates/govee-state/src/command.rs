//! Command construction.
//!
//! Turns a desired state value into the op code and payload that sets it,
//! validating the value against the catalogue layout before encoding.

use crate::error::CommandError;
use crate::snapshot::DeviceStateSnapshot;
use crate::store::StateStore;
use govee_catalogue::DeviceTypeSchema;
use govee_metrics::{metric_defs, MetricLabels};
use govee_protocol::{
    command_frame, encode, lookup_label, to_base64, FieldKind, FieldSpec, FieldValue, FieldValues,
    FrameError, OpCode, OpCodeDefinition, Rgb, Schedule, StateValue, TimeOfDay,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// A validated, encoded command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Identifier used to correlate a confirming report.
    pub id: Uuid,
    pub device_id: String,
    pub device_type: String,
    pub state_key: String,
    pub op_code: OpCode,
    pub payload: Vec<u8>,
    /// The value a confirming report will carry for `state_key`.
    pub expected: StateValue,
}

impl Command {
    /// The 20-byte BLE write for this command.
    pub fn ble_frame(&self) -> Result<Vec<u8>, FrameError> {
        command_frame(self.op_code, &self.payload)
    }

    /// The base64 frame carried in cloud command messages.
    pub fn iot_payload(&self) -> Result<String, FrameError> {
        Ok(to_base64(&self.ble_frame()?))
    }
}

/// Builds commands against the store's current snapshots and catalogue.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    store: Arc<StateStore>,
}

impl CommandBuilder {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    /// Build a command setting `state_key` to a JSON value.
    ///
    /// A key fed by one field takes that field's JSON shape; a key fed by
    /// several takes an object of field names.
    pub fn build(
        &self,
        device_id: &str,
        state_key: &str,
        desired: &Value,
    ) -> Result<Command, CommandError> {
        let result = self.build_inner(device_id, state_key, desired);
        self.record(device_id, state_key, &result);
        result
    }

    /// Build a command setting `state_key` to a typed value.
    pub fn build_value(
        &self,
        device_id: &str,
        state_key: &str,
        desired: &StateValue,
    ) -> Result<Command, CommandError> {
        let json = serde_json::to_value(desired)
            .map_err(|e| CommandError::validation(format!("{}: {}", state_key, e)))?;
        self.build(device_id, state_key, &json)
    }

    /// Build a command restoring the key's most recent earlier value.
    pub fn build_previous(&self, device_id: &str, state_key: &str) -> Result<Command, CommandError> {
        let previous = self
            .store
            .previous_value(device_id, state_key)
            .map_err(|_| CommandError::UnknownDevice(device_id.to_string()))?;
        match previous {
            Some(value) => self.build_value(device_id, state_key, &value),
            None => {
                let result = Err(CommandError::validation(format!(
                    "no earlier value recorded for '{}'",
                    state_key
                )));
                self.record(device_id, state_key, &result);
                result
            }
        }
    }

    fn build_inner(
        &self,
        device_id: &str,
        state_key: &str,
        desired: &Value,
    ) -> Result<Command, CommandError> {
        let snapshot = self
            .store
            .snapshot(device_id)
            .map_err(|_| CommandError::UnknownDevice(device_id.to_string()))?;
        let schema = self.store.registry().schema_for(&snapshot.device_type)?;
        let def = select_definition(&schema, state_key).ok_or_else(|| {
            CommandError::UnsupportedState {
                device_type: snapshot.device_type.clone(),
                state_key: state_key.to_string(),
            }
        })?;

        let specs: Vec<&FieldSpec> = def.fields_for(state_key).collect();
        let current = snapshot.value(state_key);
        let requested = parse_requested(state_key, &specs, desired, current)?;

        let expected = match specs.as_slice() {
            [single] => requested
                .get(&single.name)
                .cloned()
                .map(StateValue::Single)
                .ok_or_else(|| CommandError::validation(format!("{} is missing", single.name)))?,
            _ => StateValue::Group(requested.clone()),
        };

        let mut values = requested;
        fill_from_snapshot(&def, state_key, &snapshot, &mut values)?;
        let payload = encode(&def, &values)?;

        Ok(Command {
            id: Uuid::new_v4(),
            device_id: device_id.to_string(),
            device_type: snapshot.device_type.clone(),
            state_key: state_key.to_string(),
            op_code: def.code(),
            payload,
            expected,
        })
    }

    fn record(&self, device_id: &str, state_key: &str, result: &Result<Command, CommandError>) {
        match result {
            Ok(command) => {
                debug!(
                    "CommandBuilder[{}]: {} -> {} {}",
                    device_id,
                    state_key,
                    command.op_code,
                    hex::encode(&command.payload)
                );
                let labels =
                    MetricLabels::new(&command.device_type).with_state_key(&command.state_key);
                metrics::counter!(metric_defs::COMMANDS_BUILT.name, &labels.to_labels())
                    .increment(1);
            }
            Err(err) => {
                if matches!(err, CommandError::ValidationFailed { .. }) {
                    debug!("CommandBuilder[{}]: {} rejected: {}", device_id, state_key, err);
                } else {
                    warn!("CommandBuilder[{}]: {} rejected: {}", device_id, state_key, err);
                }
                let device_type = self
                    .store
                    .snapshot(device_id)
                    .map(|s| s.device_type.clone())
                    .unwrap_or_else(|_| "unknown".to_string());
                let labels = MetricLabels::new(device_type);
                metrics::counter!(
                    metric_defs::COMMANDS_REJECTED.name,
                    &labels.with(&[("reason", err.reason().to_string())])
                )
                .increment(1);
            }
        }
    }
}

/// Pick the command definition for a key.
///
/// A definition that sets only `key` wins over one that also carries other
/// keys.
fn select_definition(schema: &DeviceTypeSchema, key: &str) -> Option<Arc<OpCodeDefinition>> {
    if !schema.has_state_key(key) {
        return None;
    }
    schema
        .command_defs_for(key)
        .find(|def| def.state_keys().len() == 1)
        .or_else(|| schema.command_defs_for(key).next())
        .cloned()
}

/// Fields of `def` that feed other keys take their current stored value.
fn fill_from_snapshot(
    def: &OpCodeDefinition,
    key: &str,
    snapshot: &DeviceStateSnapshot,
    values: &mut FieldValues,
) -> Result<(), CommandError> {
    for field in def.layout() {
        let other = def.key_of(field);
        if field.constant().is_some() || other == key {
            continue;
        }
        let value = snapshot
            .value(other)
            .and_then(|v| v.field(&field.name))
            .cloned()
            .ok_or_else(|| {
                CommandError::validation(format!(
                    "setting '{}' also writes '{}', which has no known value",
                    key, other
                ))
            })?;
        values.insert(field.name.clone(), value);
    }
    Ok(())
}

fn parse_requested(
    key: &str,
    specs: &[&FieldSpec],
    desired: &Value,
    current: Option<&StateValue>,
) -> Result<FieldValues, CommandError> {
    let mut values = FieldValues::new();

    if let [field] = specs {
        let value = parse_field(field, desired, current.and_then(|c| c.field(&field.name)))?;
        values.insert(field.name.clone(), value);
        return Ok(values);
    }

    let names: Vec<&str> = specs.iter().map(|f| f.name.as_str()).collect();
    let obj = desired.as_object().ok_or_else(|| {
        CommandError::validation(format!("{} expects an object with {}", key, names.join(", ")))
    })?;
    if let Some(unknown) = obj.keys().find(|k| !names.contains(&k.as_str())) {
        return Err(CommandError::validation(format!(
            "{} has no field '{}'",
            key, unknown
        )));
    }
    for field in specs {
        let raw = obj.get(&field.name).ok_or_else(|| {
            CommandError::validation(format!("{}.{} is missing", key, field.name))
        })?;
        let value = parse_field(field, raw, current.and_then(|c| c.field(&field.name)))?;
        values.insert(field.name.clone(), value);
    }
    Ok(values)
}

// ============================================================================
// Field Validation
// ============================================================================

/// Validate one JSON value against a field.
///
/// `current` is the field's stored value, used to fill bitfield flags the
/// request leaves out.
fn parse_field(
    field: &FieldSpec,
    desired: &Value,
    current: Option<&FieldValue>,
) -> Result<FieldValue, CommandError> {
    let name = &field.name;
    match &field.kind {
        FieldKind::Uint { min, max, .. } => {
            let n = desired.as_u64().ok_or_else(|| {
                CommandError::validation(format!(
                    "{} expects a non-negative integer, got {}",
                    name, desired
                ))
            })?;
            let limit = field.max_value();
            if n > limit {
                return Err(CommandError::validation(format!(
                    "{} must fit in {} byte(s) (max {}), got {}",
                    name, field.width, limit, n
                )));
            }
            let lo = min.unwrap_or(0);
            let hi = max.unwrap_or(limit);
            if n < lo || n > hi {
                return Err(CommandError::validation(format!(
                    "{} must be between {} and {}, got {}",
                    name, lo, hi, n
                )));
            }
            Ok(FieldValue::Uint(n))
        }
        FieldKind::Bitfield { flags } => {
            let obj = expect_object(name, desired, "flag names mapped to booleans")?;
            let mut set = BTreeMap::new();
            for (flag, on) in obj {
                if !flags.iter().any(|f| &f.name == flag) {
                    return Err(CommandError::validation(format!(
                        "{} has no flag '{}'",
                        name, flag
                    )));
                }
                let on = on.as_bool().ok_or_else(|| {
                    CommandError::validation(format!("{}.{} expects a boolean, got {}", name, flag, on))
                })?;
                set.insert(flag.clone(), on);
            }
            for flag in flags {
                if !set.contains_key(&flag.name) {
                    let on = current.and_then(|c| c.flag(&flag.name)).unwrap_or(false);
                    set.insert(flag.name.clone(), on);
                }
            }
            Ok(FieldValue::Flags(set))
        }
        FieldKind::RgbTriple => {
            let obj = expect_object(name, desired, "r, g and b")?;
            let channel = |ch: &str| bounded_member(obj, name, ch, 255);
            Ok(FieldValue::Rgb(Rgb::new(
                channel("r")?,
                channel("g")?,
                channel("b")?,
            )))
        }
        FieldKind::Enum { values } => {
            let labels: Vec<&str> = values.values().map(String::as_str).collect();
            let label = desired.as_str().ok_or_else(|| {
                CommandError::validation(format!(
                    "{} must be one of [{}], got {}",
                    name,
                    labels.join(", "),
                    desired
                ))
            })?;
            if lookup_label(values, label).is_none() {
                return Err(CommandError::validation(format!(
                    "{} must be one of [{}], got '{}'",
                    name,
                    labels.join(", "),
                    label
                )));
            }
            Ok(FieldValue::Enum(label.to_string()))
        }
        FieldKind::Schedule => {
            let obj = expect_object(name, desired, "start, end and repeat")?;
            let start = parse_time(obj, name, "start")?;
            let end = parse_time(obj, name, "end")?;
            let repeat = match obj.get("repeat") {
                Some(_) => bounded_member(obj, name, "repeat", 255)?,
                None => 0,
            };
            Ok(FieldValue::Schedule(Schedule { start, end, repeat }))
        }
        FieldKind::Raw => {
            let bytes = match desired {
                Value::String(text) => hex::decode(text).map_err(|e| {
                    CommandError::validation(format!("{} is not valid hex: {}", name, e))
                })?,
                Value::Array(items) => items
                    .iter()
                    .map(|item| {
                        item.as_u64()
                            .and_then(|b| u8::try_from(b).ok())
                            .ok_or_else(|| {
                                CommandError::validation(format!(
                                    "{} bytes must be between 0 and 255, got {}",
                                    name, item
                                ))
                            })
                    })
                    .collect::<Result<Vec<u8>, _>>()?,
                other => {
                    return Err(CommandError::validation(format!(
                        "{} expects a hex string or byte array, got {}",
                        name, other
                    )))
                }
            };
            if bytes.len() != field.width {
                return Err(CommandError::validation(format!(
                    "{} must be exactly {} bytes, got {}",
                    name,
                    field.width,
                    bytes.len()
                )));
            }
            Ok(FieldValue::Raw(bytes))
        }
    }
}

fn expect_object<'a>(
    name: &str,
    desired: &'a Value,
    shape: &str,
) -> Result<&'a Map<String, Value>, CommandError> {
    desired.as_object().ok_or_else(|| {
        CommandError::validation(format!(
            "{} expects an object with {}, got {}",
            name, shape, desired
        ))
    })
}

/// Read `obj[member]` as an integer in `0..=max`.
fn bounded_member(
    obj: &Map<String, Value>,
    name: &str,
    member: &str,
    max: u8,
) -> Result<u8, CommandError> {
    let raw = obj
        .get(member)
        .ok_or_else(|| CommandError::validation(format!("{}.{} is missing", name, member)))?;
    raw.as_u64()
        .filter(|n| *n <= u64::from(max))
        .and_then(|n| u8::try_from(n).ok())
        .ok_or_else(|| {
            CommandError::validation(format!(
                "{}.{} must be between 0 and {}, got {}",
                name, member, max, raw
            ))
        })
}

fn parse_time(obj: &Map<String, Value>, name: &str, member: &str) -> Result<TimeOfDay, CommandError> {
    let path = format!("{}.{}", name, member);
    let time = obj
        .get(member)
        .ok_or_else(|| CommandError::validation(format!("{} is missing", path)))?;
    let time = expect_object(&path, time, "hour and minute")?;
    Ok(TimeOfDay::new(
        bounded_member(time, &path, "hour", 23)?,
        bounded_member(time, &path, "minute", 59)?,
    ))
}
