//! Per-device state store and report reconciliation.
//!
//! Each device lives in its own slot behind a mutex, indexed by a concurrent
//! map. Updating a device locks only that device; readers clone the slot's
//! current `Arc<DeviceStateSnapshot>` and never observe a half-applied
//! report.

use crate::config::EngineConfig;
use crate::error::StateError;
use crate::notify::{ChangeFeed, ChangeFilter, StateChange};
use crate::snapshot::{DecodedUpdate, DeviceStateSnapshot, StateEntry};
use chrono::Utc;
use crossbeam_channel::Receiver;
use dashmap::DashMap;
use govee_catalogue::Registry;
use govee_metrics::{metric_defs, MetricLabels};
use govee_protocol::{
    decode, Direction, FieldValues, Frame, FrameError, OpCode, OpCodeDefinition, StateValue,
    REPORT_PREFIX,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

// ============================================================================
// Inbound Reports
// ============================================================================

/// A framed, de-duplicated payload delivered by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub device_id: String,
    pub device_type: String,
    pub op_code: OpCode,
    pub payload: Vec<u8>,
    /// Monotonic per-device ordering hint supplied by the transport.
    pub sequence: u64,
}

impl Report {
    pub fn new(
        device_id: impl Into<String>,
        device_type: impl Into<String>,
        op_code: OpCode,
        payload: impl Into<Vec<u8>>,
        sequence: u64,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            device_type: device_type.into(),
            op_code,
            payload: payload.into(),
            sequence,
        }
    }

    /// Build a report from a 20-byte BLE status frame.
    pub fn from_ble_frame(
        device_id: impl Into<String>,
        device_type: impl Into<String>,
        frame: &[u8],
        sequence: u64,
    ) -> Result<Self, FrameError> {
        let frame = Frame::parse(frame)?;
        if !frame.is_report() {
            return Err(FrameError::UnexpectedPrefix {
                expected: REPORT_PREFIX,
                actual: frame.prefix,
            });
        }
        Ok(Self::new(
            device_id,
            device_type,
            frame.op_code,
            frame.payload,
            sequence,
        ))
    }
}

/// What one report did to a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportOutcome {
    /// Every key decoded from the payload.
    pub updates: Vec<DecodedUpdate>,
    /// Keys whose value changed.
    pub changed: Vec<String>,
    /// Keys discarded because a newer sequence was already stored.
    pub stale: Vec<String>,
}

/// Group decoded fields by the state key they feed.
///
/// A key fed by one field takes that field's value; a key fed by several
/// becomes a group. Constant fields feed nothing.
pub fn group_fields(def: &OpCodeDefinition, fields: &FieldValues) -> Vec<(String, StateValue)> {
    def.state_keys()
        .into_iter()
        .map(|key| {
            let specs: Vec<_> = def.fields_for(key).collect();
            let value = match specs.as_slice() {
                [single] => fields.get(&single.name).cloned().map(StateValue::Single),
                many => Some(StateValue::Group(
                    many.iter()
                        .filter_map(|f| fields.get(&f.name).map(|v| (f.name.clone(), v.clone())))
                        .collect(),
                )),
            };
            (key.to_string(), value)
        })
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
}

// ============================================================================
// Device Slots
// ============================================================================

/// A built command awaiting a confirming report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub id: Uuid,
    pub state_key: String,
    pub expected: StateValue,
}

struct DeviceSlot {
    snapshot: Arc<DeviceStateSnapshot>,
    history: HashMap<String, VecDeque<StateEntry>>,
    pending: VecDeque<PendingCommand>,
}

impl DeviceSlot {
    fn new(device_id: &str, device_type: &str) -> Self {
        Self {
            snapshot: Arc::new(DeviceStateSnapshot::new(device_id, device_type)),
            history: HashMap::new(),
            pending: VecDeque::new(),
        }
    }

    /// Remove the oldest pending command that expects `value` for `key`.
    fn confirm(&mut self, key: &str, value: &StateValue) -> Option<Uuid> {
        let pos = self
            .pending
            .iter()
            .position(|p| p.state_key == key && &p.expected == value)?;
        self.pending.remove(pos).map(|p| p.id)
    }

    fn push_history(&mut self, key: &str, entry: StateEntry, limit: usize) {
        if limit == 0 {
            return;
        }
        let history = self.history.entry(key.to_string()).or_default();
        while history.len() >= limit {
            history.pop_front();
        }
        history.push_back(entry);
    }
}

// ============================================================================
// State Store
// ============================================================================

/// Owns every device snapshot and reconciles reports into them.
pub struct StateStore {
    registry: Arc<Registry>,
    config: EngineConfig,
    devices: DashMap<String, Arc<Mutex<DeviceSlot>>>,
    feed: ChangeFeed,
}

impl StateStore {
    pub fn new(registry: Arc<Registry>, config: EngineConfig) -> Self {
        Self {
            registry,
            config,
            devices: DashMap::new(),
            feed: ChangeFeed::default(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn slot(&self, device_id: &str) -> Result<Arc<Mutex<DeviceSlot>>, StateError> {
        self.devices
            .get(device_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| StateError::UnknownDevice(device_id.to_string()))
    }

    fn record_device_count(&self) {
        metrics::gauge!(metric_defs::TRACKED_DEVICES.name).set(self.devices.len() as f64);
    }

    /// Create an empty snapshot for a device.
    ///
    /// Registering a known device again under the same type is a no-op.
    pub fn register(
        &self,
        device_id: &str,
        device_type: &str,
    ) -> Result<Arc<DeviceStateSnapshot>, StateError> {
        self.registry.schema_for(device_type)?;

        let slot = Arc::clone(
            self.devices
                .entry(device_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(DeviceSlot::new(device_id, device_type))))
                .value(),
        );
        self.record_device_count();

        let guard = slot.lock();
        if guard.snapshot.device_type != device_type {
            return Err(StateError::DeviceTypeMismatch {
                device_id: device_id.to_string(),
                expected: guard.snapshot.device_type.clone(),
                actual: device_type.to_string(),
            });
        }
        debug!("StateStore[{}]: Registered as {}", device_id, device_type);
        Ok(Arc::clone(&guard.snapshot))
    }

    /// Destroy a device's snapshot, history and pending commands.
    pub fn remove(&self, device_id: &str) -> Option<Arc<DeviceStateSnapshot>> {
        let removed = self
            .devices
            .remove(device_id)
            .map(|(_, slot)| Arc::clone(&slot.lock().snapshot));
        if removed.is_some() {
            debug!("StateStore[{}]: Removed", device_id);
            self.record_device_count();
        }
        removed
    }

    /// Known device ids, sorted.
    pub fn devices(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.devices.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn snapshot(&self, device_id: &str) -> Result<Arc<DeviceStateSnapshot>, StateError> {
        let slot = self.slot(device_id)?;
        let snapshot = Arc::clone(&slot.lock().snapshot);
        Ok(snapshot)
    }

    pub fn get(&self, device_id: &str, state_key: &str) -> Result<StateValue, StateError> {
        self.snapshot(device_id)?
            .value(state_key)
            .cloned()
            .ok_or_else(|| StateError::UnknownKey {
                device_id: device_id.to_string(),
                state_key: state_key.to_string(),
            })
    }

    /// Values a key held before its current one, oldest first.
    pub fn history(&self, device_id: &str, state_key: &str) -> Result<Vec<StateEntry>, StateError> {
        let slot = self.slot(device_id)?;
        let guard = slot.lock();
        Ok(guard
            .history
            .get(state_key)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// The most recent historical value that differs from the current one.
    pub fn previous_value(
        &self,
        device_id: &str,
        state_key: &str,
    ) -> Result<Option<StateValue>, StateError> {
        let slot = self.slot(device_id)?;
        let guard = slot.lock();
        let current = guard.snapshot.value(state_key);
        Ok(guard.history.get(state_key).and_then(|h| {
            h.iter()
                .rev()
                .map(|entry| &entry.value)
                .find(|value| Some(*value) != current)
                .cloned()
        }))
    }

    /// Remember a built command until a report confirms it.
    pub fn track_pending(&self, device_id: &str, command: PendingCommand) -> Result<(), StateError> {
        let limit = self.config.max_pending_per_device;
        if limit == 0 {
            return Ok(());
        }
        let slot = self.slot(device_id)?;
        let mut guard = slot.lock();
        while guard.pending.len() >= limit {
            if let Some(evicted) = guard.pending.pop_front() {
                debug!(
                    "StateStore[{}]: Evicted unconfirmed command {} ({})",
                    device_id, evicted.id, evicted.state_key
                );
                let labels = MetricLabels::new(&guard.snapshot.device_type);
                metrics::counter!(metric_defs::PENDING_EVICTED.name, &labels.to_labels())
                    .increment(1);
            }
        }
        trace!(
            "StateStore[{}]: Tracking command {} for {}",
            device_id,
            command.id,
            command.state_key
        );
        guard.pending.push_back(command);
        Ok(())
    }

    /// Commands awaiting confirmation, oldest first.
    pub fn pending_commands(&self, device_id: &str) -> Result<Vec<PendingCommand>, StateError> {
        let slot = self.slot(device_id)?;
        let pending = slot.lock().pending.iter().cloned().collect();
        Ok(pending)
    }

    pub fn subscribe(&self) -> Receiver<StateChange> {
        self.feed.subscribe(ChangeFilter::all())
    }

    pub fn subscribe_filtered(&self, filter: ChangeFilter) -> Receiver<StateChange> {
        self.feed.subscribe(filter)
    }

    fn reject(&self, report: &Report, err: StateError) -> StateError {
        warn!(
            "StateStore[{}]: Rejected {} report {} (seq {}): {}",
            report.device_id, report.device_type, report.op_code, report.sequence, err
        );
        let labels = MetricLabels::new(&report.device_type);
        metrics::counter!(
            metric_defs::REPORTS_REJECTED.name,
            &labels.with(&[("reason", err.reason().to_string())])
        )
        .increment(1);
        err
    }

    /// Decode a report and reconcile it into the device's snapshot.
    ///
    /// Each decoded key is applied only if the report's sequence is newer
    /// than the key's stored sequence. A newer sequence carrying the same
    /// value advances the stored sequence without notifying. On error the
    /// snapshot is untouched.
    pub fn apply_report(&self, report: &Report) -> Result<ReportOutcome, StateError> {
        // One catalogue snapshot for the whole report.
        let catalogue = self.registry.catalogue();
        let def = catalogue
            .resolve(&report.device_type, report.op_code, Direction::Report)
            .map_err(|e| self.reject(report, e.into()))?;
        let fields = decode(&def, &report.payload).map_err(|e| self.reject(report, e.into()))?;

        let timestamp = Utc::now();
        let updates: Vec<DecodedUpdate> = group_fields(&def, &fields)
            .into_iter()
            .map(|(state_key, value)| DecodedUpdate {
                state_key,
                value,
                source_op_code: report.op_code,
                sequence: report.sequence,
                timestamp,
            })
            .collect();

        let mut created = false;
        let slot = Arc::clone(
            self.devices
                .entry(report.device_id.clone())
                .or_insert_with(|| {
                    created = true;
                    Arc::new(Mutex::new(DeviceSlot::new(
                        &report.device_id,
                        &report.device_type,
                    )))
                })
                .value(),
        );
        if created {
            debug!(
                "StateStore[{}]: First report, tracking as {}",
                report.device_id, report.device_type
            );
            self.record_device_count();
        }

        let mut guard = slot.lock();
        if guard.snapshot.device_type != report.device_type {
            let err = StateError::DeviceTypeMismatch {
                device_id: report.device_id.clone(),
                expected: guard.snapshot.device_type.clone(),
                actual: report.device_type.clone(),
            };
            return Err(self.reject(report, err));
        }

        let labels = MetricLabels::new(&report.device_type);
        let mut next = (*guard.snapshot).clone();
        let mut outcome = ReportOutcome::default();
        let mut changes = Vec::new();
        let mut dirty = false;

        for update in &updates {
            let key = &update.state_key;
            if let Some(stored) = next.values.get(key) {
                if update.sequence <= stored.sequence {
                    trace!(
                        "StateStore[{}]: Stale {} (seq {} <= {})",
                        report.device_id,
                        key,
                        update.sequence,
                        stored.sequence
                    );
                    metrics::counter!(
                        metric_defs::STALE_UPDATES.name,
                        &labels.with(&[("state_key", key.clone())])
                    )
                    .increment(1);
                    outcome.stale.push(key.clone());
                    continue;
                }
            }

            dirty = true;
            let confirmed = guard.confirm(key, &update.value);
            if let Some(id) = confirmed {
                debug!(
                    "StateStore[{}]: Command {} confirmed by seq {}",
                    report.device_id, id, update.sequence
                );
                metrics::counter!(
                    metric_defs::PENDING_CONFIRMED.name,
                    &labels.with(&[("state_key", key.clone())])
                )
                .increment(1);
            }

            match next.values.insert(key.clone(), update.clone().into_entry()) {
                Some(old) if old.value == update.value => {
                    trace!(
                        "StateStore[{}]: {} unchanged, seq now {}",
                        report.device_id,
                        key,
                        update.sequence
                    );
                }
                old => {
                    debug!(
                        "StateStore[{}]: {} = {} (seq {})",
                        report.device_id, key, update.value, update.sequence
                    );
                    let old_value = old.as_ref().map(|entry| entry.value.clone());
                    if let Some(old) = old {
                        guard.push_history(key, old, self.config.history_size);
                    }
                    metrics::counter!(
                        metric_defs::STATE_CHANGES.name,
                        &labels.with(&[("state_key", key.clone())])
                    )
                    .increment(1);
                    outcome.changed.push(key.clone());
                    changes.push(StateChange {
                        device_id: report.device_id.clone(),
                        device_type: report.device_type.clone(),
                        state_key: key.clone(),
                        old_value,
                        new_value: update.value.clone(),
                        sequence: update.sequence,
                        source_op_code: report.op_code,
                        confirmed_command: confirmed,
                    });
                }
            }
        }

        if dirty {
            guard.snapshot = Arc::new(next);
        }
        // Sent under the slot lock so per-device order matches apply order.
        self.feed.publish(&changes);
        drop(guard);

        metrics::counter!(metric_defs::REPORTS_APPLIED.name, &labels.to_labels()).increment(1);
        outcome.updates = updates;
        Ok(outcome)
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("config", &self.config)
            .field("devices", &self.devices.len())
            .field("feed", &self.feed)
            .finish()
    }
}
