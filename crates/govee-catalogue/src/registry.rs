//! Device-type registry with atomic catalogue reload.

use crate::catalogue::{Catalogue, DeviceTypeSchema};
use crate::error::RegistryError;
use arc_swap::ArcSwap;
use govee_metrics::metric_defs;
use govee_protocol::{Direction, OpCode, OpCodeDefinition};
use std::sync::Arc;
use tracing::info;

impl Catalogue {
    /// Schema for a device type, or `UnknownDeviceType`.
    pub fn schema_for(&self, device_type: &str) -> Result<Arc<DeviceTypeSchema>, RegistryError> {
        self.get(device_type)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownDeviceType(device_type.to_string()))
    }

    /// Definition for a device type, code and direction.
    pub fn resolve(
        &self,
        device_type: &str,
        op_code: OpCode,
        direction: Direction,
    ) -> Result<Arc<OpCodeDefinition>, RegistryError> {
        let schema = self
            .get(device_type)
            .ok_or_else(|| RegistryError::UnknownDeviceType(device_type.to_string()))?;
        schema
            .find(op_code, direction)
            .cloned()
            .ok_or_else(|| RegistryError::UnsupportedOpCode {
                device_type: device_type.to_string(),
                op_code,
                direction,
            })
    }
}

/// Shared handle to the active catalogue.
///
/// Lookups are lock-free. [`Registry::reload`] swaps the whole catalogue in
/// one pointer store, so a caller holding [`Registry::catalogue`] keeps a
/// consistent view for as long as it needs one.
#[derive(Debug)]
pub struct Registry {
    current: ArcSwap<Catalogue>,
}

impl Registry {
    pub fn new(catalogue: Catalogue) -> Self {
        metrics::gauge!(metric_defs::CATALOGUE_DEVICE_TYPES.name).set(catalogue.len() as f64);
        Self {
            current: ArcSwap::from_pointee(catalogue),
        }
    }

    /// The active catalogue snapshot.
    pub fn catalogue(&self) -> Arc<Catalogue> {
        self.current.load_full()
    }

    pub fn resolve(
        &self,
        device_type: &str,
        op_code: OpCode,
        direction: Direction,
    ) -> Result<Arc<OpCodeDefinition>, RegistryError> {
        self.current.load().resolve(device_type, op_code, direction)
    }

    pub fn schema_for(&self, device_type: &str) -> Result<Arc<DeviceTypeSchema>, RegistryError> {
        self.current.load().schema_for(device_type)
    }

    /// Replace the active catalogue, returning the previous one.
    pub fn reload(&self, catalogue: Catalogue) -> Arc<Catalogue> {
        let device_types = catalogue.len();
        let previous = self.current.swap(Arc::new(catalogue));
        info!(
            previous_device_types = previous.len(),
            device_types, "Catalogue reloaded"
        );
        metrics::counter!(metric_defs::CATALOGUE_RELOADS.name).increment(1);
        metrics::gauge!(metric_defs::CATALOGUE_DEVICE_TYPES.name).set(device_types as f64);
        previous
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Catalogue::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryErrorKind;

    #[test]
    fn test_resolve_builtin() {
        let registry = Registry::new(Catalogue::builtin().unwrap());
        let def = registry
            .resolve("H6072", OpCode::new(0x05), Direction::Report)
            .unwrap();
        assert_eq!(def.state_key(), "color");
        assert_eq!(def.direction(), Direction::Both);

        let err = registry
            .resolve("H6072", OpCode::new(0xEE), Direction::Report)
            .unwrap_err();
        assert_eq!(err.kind(), RegistryErrorKind::UnsupportedOpCode);

        let err = registry.schema_for("H0000").unwrap_err();
        assert_eq!(err, RegistryError::UnknownDeviceType("H0000".into()));
    }

    #[test]
    fn test_reload_swaps_whole_catalogue() {
        let registry = Registry::new(Catalogue::builtin().unwrap());
        let pinned = registry.catalogue();

        let previous = registry.reload(Catalogue::empty());
        assert_eq!(previous.len(), pinned.len());
        assert!(registry.schema_for("H6072").is_err());
        assert!(pinned.schema_for("H6072").is_ok());
    }
}
