//! Protocol constants
//!
//! Frame geometry and field-width limits used by the Govee BLE protocol and
//! by the catalogue validator.

// ============================================================================
// Frame Geometry
// ============================================================================

/// Size of every BLE frame, command or report.
pub const FRAME_SIZE: usize = 20;
/// Identifier prefix for host → device command frames.
pub const COMMAND_PREFIX: u8 = 0x33;
/// Identifier prefix for device → host status report frames.
pub const REPORT_PREFIX: u8 = 0xAA;
/// Bytes available for payload inside one frame (prefix, op code and checksum excluded).
pub const MAX_FRAME_PAYLOAD: usize = FRAME_SIZE - 3;
/// Maximum payload size assumed for an op code when the catalogue does not declare one.
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = MAX_FRAME_PAYLOAD;

// ============================================================================
// Field Widths
// ============================================================================

/// Widest unsigned integer or bitfield a layout may declare.
pub const MAX_UINT_WIDTH: usize = 8;
/// Widest enum field a layout may declare.
pub const MAX_ENUM_WIDTH: usize = 4;
/// Width of an RGB triple.
pub const RGB_WIDTH: usize = 3;
/// Width of a schedule record: start hour, start minute, end hour, end minute, repeat mask.
pub const SCHEDULE_WIDTH: usize = 5;
