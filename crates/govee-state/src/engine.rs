//! Top-level handle tying the registry, store and command builder together.

use crate::command::{Command, CommandBuilder};
use crate::config::EngineConfig;
use crate::error::{CommandError, StateError};
use crate::notify::{ChangeFilter, StateChange};
use crate::snapshot::{DeviceStateSnapshot, StateEntry};
use crate::store::{PendingCommand, Report, ReportOutcome, StateStore};
use crossbeam_channel::Receiver;
use govee_catalogue::{Catalogue, Registry};
use govee_protocol::StateValue;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Shared entry point for transports and callers.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
#[derive(Debug)]
pub struct Engine {
    registry: Arc<Registry>,
    store: Arc<StateStore>,
    builder: CommandBuilder,
}

impl Engine {
    pub fn new(catalogue: Catalogue, config: EngineConfig) -> Self {
        Self::with_registry(Arc::new(Registry::new(catalogue)), config)
    }

    /// Build around an existing registry, e.g. one shared with another engine.
    pub fn with_registry(registry: Arc<Registry>, config: EngineConfig) -> Self {
        let store = Arc::new(StateStore::new(Arc::clone(&registry), config));
        let builder = CommandBuilder::new(Arc::clone(&store));
        Self {
            registry,
            store,
            builder,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        self.store.config()
    }

    /// Swap in a new catalogue. Existing snapshots are kept.
    pub fn reload(&self, catalogue: Catalogue) -> Arc<Catalogue> {
        self.registry.reload(catalogue)
    }

    pub fn register(
        &self,
        device_id: &str,
        device_type: &str,
    ) -> Result<Arc<DeviceStateSnapshot>, StateError> {
        self.store.register(device_id, device_type)
    }

    pub fn remove(&self, device_id: &str) -> Option<Arc<DeviceStateSnapshot>> {
        self.store.remove(device_id)
    }

    pub fn apply_report(&self, report: &Report) -> Result<ReportOutcome, StateError> {
        self.store.apply_report(report)
    }

    pub fn snapshot(&self, device_id: &str) -> Result<Arc<DeviceStateSnapshot>, StateError> {
        self.store.snapshot(device_id)
    }

    pub fn get(&self, device_id: &str, state_key: &str) -> Result<StateValue, StateError> {
        self.store.get(device_id, state_key)
    }

    pub fn history(&self, device_id: &str, state_key: &str) -> Result<Vec<StateEntry>, StateError> {
        self.store.history(device_id, state_key)
    }

    pub fn pending_commands(&self, device_id: &str) -> Result<Vec<PendingCommand>, StateError> {
        self.store.pending_commands(device_id)
    }

    pub fn subscribe(&self) -> Receiver<StateChange> {
        self.store.subscribe()
    }

    pub fn subscribe_filtered(&self, filter: ChangeFilter) -> Receiver<StateChange> {
        self.store.subscribe_filtered(filter)
    }

    /// Build a command from JSON and, if enabled, track it until confirmed.
    pub fn build(
        &self,
        device_id: &str,
        state_key: &str,
        desired: &Value,
    ) -> Result<Command, CommandError> {
        let command = self.builder.build(device_id, state_key, desired)?;
        self.track(&command);
        Ok(command)
    }

    pub fn build_value(
        &self,
        device_id: &str,
        state_key: &str,
        desired: &StateValue,
    ) -> Result<Command, CommandError> {
        let command = self.builder.build_value(device_id, state_key, desired)?;
        self.track(&command);
        Ok(command)
    }

    /// Build a command restoring the key's previous value.
    pub fn build_previous(&self, device_id: &str, state_key: &str) -> Result<Command, CommandError> {
        let command = self.builder.build_previous(device_id, state_key)?;
        self.track(&command);
        Ok(command)
    }

    fn track(&self, command: &Command) {
        if !self.store.config().track_pending {
            return;
        }
        let pending = PendingCommand {
            id: command.id,
            state_key: command.state_key.clone(),
            expected: command.expected.clone(),
        };
        // The device may have been removed since the command was built.
        if let Err(err) = self.store.track_pending(&command.device_id, pending) {
            debug!(
                "Engine[{}]: Not tracking command {}: {}",
                command.device_id, command.id, err
            );
        }
    }
}
