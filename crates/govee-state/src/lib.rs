//! Govee device state store and command builder.
//!
//! Reports decoded through the active catalogue are reconciled into one
//! immutable snapshot per device. Each state key keeps the sequence of the
//! report that last wrote it, so late or replayed reports never overwrite
//! newer state. Every value change is published once to subscribers.
//!
//! Commands go the other way: a desired value is validated against the
//! device type's layout, encoded, and optionally tracked until a report
//! confirms it.
//!
//! ```rust
//! use govee_catalogue::Catalogue;
//! use govee_protocol::OpCode;
//! use govee_state::{Engine, EngineConfig, Report};
//! use serde_json::json;
//!
//! let engine = Engine::new(Catalogue::builtin()?, EngineConfig::default());
//! let changes = engine.subscribe();
//!
//! engine.apply_report(&Report::new("lamp", "H6072", OpCode::new(0x04), vec![40], 1))?;
//! assert_eq!(changes.try_iter().count(), 1);
//!
//! let command = engine.build("lamp", "brightness", &json!(75))?;
//! assert_eq!(command.payload, vec![75]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod command;
mod config;
mod engine;
mod error;
mod notify;
mod snapshot;
mod store;

pub use command::{Command, CommandBuilder};
pub use config::{EngineConfig, DEFAULT_HISTORY_SIZE, DEFAULT_MAX_PENDING_PER_DEVICE};
pub use engine::Engine;
pub use error::{CommandError, CommandErrorKind, ConfigError, StateError, StateErrorKind};
pub use notify::{ChangeFilter, StateChange};
pub use snapshot::{DecodedUpdate, DeviceStateSnapshot, StateEntry};
pub use store::{group_fields, PendingCommand, Report, ReportOutcome, StateStore};
