//! Metrics declarations for the Govee op-code engine.
//!
//! This crate describes every metric the engine records as a structured
//! [`Metric`] constant, plus a small label helper. It re-exports the
//! `metrics` crate so callers record through the same facade; without an
//! installed recorder every call is a no-op.
//!
//! # Example
//!
//! ```rust
//! use govee_metrics::{metric_defs, MetricLabels};
//!
//! let labels = MetricLabels::new("H6072").with_state_key("color");
//! metrics::counter!(metric_defs::STATE_CHANGES.name, &labels.to_labels()).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, Unit};

/// The kind of metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// ```rust
/// use govee_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const REPORTS: Metric = Metric::counter("govee.reports")
///     .with_description("Reports seen")
///     .with_unit(Unit::Count)
///     .with_labels(&["device_type"]);
///
/// assert_eq!(REPORTS.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "govee.state.changes").
    pub name: &'static str,
    /// The kind of metric.
    pub kind: MetricKind,
    /// Human-readable description.
    pub description: &'static str,
    /// The unit of measurement (optional).
    pub unit: Option<Unit>,
    /// Expected label keys.
    pub labels: &'static [&'static str],
}

impl Metric {
    /// Creates a new counter metric.
    pub const fn counter(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Counter,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Creates a new gauge metric.
    pub const fn gauge(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Gauge,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the engine.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Standard Label Keys
    // ========================================================================

    /// Labels present on every device-scoped metric.
    pub const STANDARD_LABELS: &[&str] = &["device_type"];

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Reports decoded and applied to a snapshot.
    ///
    /// Labels: device_type
    pub const REPORTS_APPLIED: Metric = Metric::counter("govee.reports.applied")
        .with_description("Reports decoded and applied to a device snapshot")
        .with_unit(Unit::Count)
        .with_labels(&["device_type"]);

    /// Reports dropped because lookup or decoding failed.
    ///
    /// Labels: device_type, reason
    pub const REPORTS_REJECTED: Metric = Metric::counter("govee.reports.rejected")
        .with_description("Reports rejected by the registry or the codec")
        .with_unit(Unit::Count)
        .with_labels(&["device_type", "reason"]);

    /// Per-key updates discarded because a newer sequence was already stored.
    ///
    /// Labels: device_type, state_key
    pub const STALE_UPDATES: Metric = Metric::counter("govee.state.stale_updates")
        .with_description("Decoded updates discarded as older than the stored value")
        .with_unit(Unit::Count)
        .with_labels(&["device_type", "state_key"]);

    /// Keys whose value actually changed.
    ///
    /// Labels: device_type, state_key
    pub const STATE_CHANGES: Metric = Metric::counter("govee.state.changes")
        .with_description("State keys whose value changed")
        .with_unit(Unit::Count)
        .with_labels(&["device_type", "state_key"]);

    /// Devices currently held by the state store.
    pub const TRACKED_DEVICES: Metric = Metric::gauge("govee.state.devices")
        .with_description("Devices held by the state store")
        .with_unit(Unit::Count);

    // ========================================================================
    // Commands
    // ========================================================================

    /// Commands encoded successfully.
    ///
    /// Labels: device_type, state_key
    pub const COMMANDS_BUILT: Metric = Metric::counter("govee.commands.built")
        .with_description("Commands validated and encoded")
        .with_unit(Unit::Count)
        .with_labels(&["device_type", "state_key"]);

    /// Command requests refused.
    ///
    /// Labels: device_type, reason
    pub const COMMANDS_REJECTED: Metric = Metric::counter("govee.commands.rejected")
        .with_description("Command requests refused by validation or encoding")
        .with_unit(Unit::Count)
        .with_labels(&["device_type", "reason"]);

    /// Pending commands confirmed by a matching report.
    ///
    /// Labels: device_type, state_key
    pub const PENDING_CONFIRMED: Metric = Metric::counter("govee.commands.confirmed")
        .with_description("Pending commands confirmed by a device report")
        .with_unit(Unit::Count)
        .with_labels(&["device_type", "state_key"]);

    /// Pending commands evicted before confirmation.
    ///
    /// Labels: device_type
    pub const PENDING_EVICTED: Metric = Metric::counter("govee.commands.evicted")
        .with_description("Pending commands evicted before any confirming report")
        .with_unit(Unit::Count)
        .with_labels(&["device_type"]);

    // ========================================================================
    // Catalogue
    // ========================================================================

    /// Atomic catalogue swaps.
    pub const CATALOGUE_RELOADS: Metric = Metric::counter("govee.catalogue.reloads")
        .with_description("Catalogue reloads swapped into the registry")
        .with_unit(Unit::Count);

    /// Device types in the active catalogue.
    pub const CATALOGUE_DEVICE_TYPES: Metric = Metric::gauge("govee.catalogue.device_types")
        .with_description("Device types in the active catalogue")
        .with_unit(Unit::Count);

    /// Returns a slice of all defined metrics.
    pub const ALL: &[&Metric] = &[
        // Reconciliation
        &REPORTS_APPLIED,
        &REPORTS_REJECTED,
        &STALE_UPDATES,
        &STATE_CHANGES,
        &TRACKED_DEVICES,
        // Commands
        &COMMANDS_BUILT,
        &COMMANDS_REJECTED,
        &PENDING_CONFIRMED,
        &PENDING_EVICTED,
        // Catalogue
        &CATALOGUE_RELOADS,
        &CATALOGUE_DEVICE_TYPES,
    ];
}

/// Labels identifying the device type and, optionally, the state key.
///
/// ```rust
/// use govee_metrics::MetricLabels;
///
/// let labels = MetricLabels::new("H6199").with_state_key("brightness");
/// assert_eq!(labels.to_labels().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MetricLabels {
    /// Device type identifier.
    pub device_type: String,
    /// State key, for key-scoped metrics.
    pub state_key: Option<String>,
}

impl MetricLabels {
    pub fn new(device_type: impl Into<String>) -> Self {
        Self {
            device_type: device_type.into(),
            state_key: None,
        }
    }

    pub fn with_state_key(mut self, state_key: impl Into<String>) -> Self {
        self.state_key = Some(state_key.into());
        self
    }

    /// Converts the labels to the metrics crate label format.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        let mut labels = vec![("device_type", self.device_type.clone())];
        if let Some(key) = &self.state_key {
            labels.push(("state_key", key.clone()));
        }
        labels
    }

    /// Returns labels with additional key-value pairs.
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.extend_from_slice(extra);
        labels
    }
}

/// Describes all metrics used by the engine.
///
/// Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_labels_new() {
        let labels = MetricLabels::new("H6072");
        assert_eq!(labels.device_type, "H6072");
        assert!(labels.state_key.is_none());
        assert_eq!(labels.to_labels(), vec![("device_type", "H6072".to_string())]);
    }

    #[test]
    fn test_metric_labels_with_state_key() {
        let labels = MetricLabels::new("H6072").with_state_key("color");
        let label_vec = labels.to_labels();

        assert_eq!(label_vec.len(), 2);
        assert!(label_vec.contains(&("state_key", "color".to_string())));
    }

    #[test]
    fn test_with_extra_labels() {
        let labels = MetricLabels::new("H6008");
        let extended = labels.with(&[("reason", "length_mismatch".to_string())]);

        assert_eq!(extended.len(), 2);
        assert!(extended.contains(&("reason", "length_mismatch".to_string())));
    }

    #[test]
    fn test_metric_definitions() {
        assert_eq!(metric_defs::REPORTS_APPLIED.name, "govee.reports.applied");
        assert_eq!(metric_defs::REPORTS_APPLIED.kind, MetricKind::Counter);
        assert_eq!(metric_defs::REPORTS_APPLIED.unit, Some(Unit::Count));
        assert_eq!(metric_defs::TRACKED_DEVICES.kind, MetricKind::Gauge);
        assert_eq!(metric_defs::CATALOGUE_DEVICE_TYPES.kind, MetricKind::Gauge);
        assert_eq!(metric_defs::STALE_UPDATES.labels, &["device_type", "state_key"]);
    }

    #[test]
    fn test_all_metrics_unique() {
        let mut names: Vec<_> = metric_defs::ALL.iter().map(|m| m.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), metric_defs::ALL.len());
        assert_eq!(metric_defs::ALL.len(), 11);
    }

    #[test]
    fn test_gauge_builder() {
        const QUEUE_DEPTH: Metric = Metric::gauge("test.queue_depth")
            .with_description("A test gauge")
            .with_labels(&["device_type"]);

        assert_eq!(QUEUE_DEPTH.kind, MetricKind::Gauge);
        assert_eq!(QUEUE_DEPTH.unit, None);
        assert_eq!(QUEUE_DEPTH.labels, &["device_type"]);
        assert_eq!(QUEUE_DEPTH.kind.to_string(), "gauge");
    }

    #[test]
    fn test_describe_without_recorder() {
        describe_metrics();
    }
}
