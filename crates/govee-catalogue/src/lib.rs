//! Govee op-code catalogue and device-type registry.
//!
//! A catalogue is plain data (JSON or YAML) describing, per device type, the
//! state keys it exposes and the op codes that report or set them. Loading
//! validates every rule up front; [`Catalogue`] values are immutable and
//! shared behind `Arc`. The [`Registry`] holds the active catalogue and
//! swaps it atomically on reload.
//!
//! ```rust
//! use govee_catalogue::{Catalogue, Registry};
//! use govee_protocol::{Direction, OpCode};
//!
//! let registry = Registry::new(Catalogue::builtin()?);
//! let def = registry.resolve("H6072", OpCode::new(0x04), Direction::Command)?;
//! assert_eq!(def.state_key(), "brightness");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod catalogue;
mod error;
mod load;
mod registry;
pub mod schema;

pub use catalogue::{Catalogue, DeviceTypeSchema};
pub use error::{CatalogueError, CatalogueErrorKind, RegistryError, RegistryErrorKind};
pub use load::{load, CatalogueFormat};
pub use registry::Registry;
