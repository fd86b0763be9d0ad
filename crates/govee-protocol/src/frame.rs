//! BLE frame assembly and parsing.
//!
//! Every BLE exchange is a fixed 20-byte frame:
//!
//! | Offset | Size | Description                                   |
//! |--------|------|-----------------------------------------------|
//! | 0      | 1    | Prefix: `0x33` command, `0xAA` report          |
//! | 1      | 1    | Op code                                       |
//! | 2      | 17   | Payload, zero padded                          |
//! | 19     | 1    | XOR of bytes 0..19                            |
//!
//! The cloud relay carries the same frame base64-encoded.

use crate::{FrameError, OpCode, COMMAND_PREFIX, FRAME_SIZE, MAX_FRAME_PAYLOAD, REPORT_PREFIX};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// XOR of all bytes.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Build a frame from its parts.
///
/// The parts are concatenated, zero-padded to 19 bytes and followed by the
/// XOR checksum.
pub fn assemble(identifiers: &[u8], payload: &[u8], extra: &[u8]) -> Result<Vec<u8>, FrameError> {
    let content = identifiers.len() + payload.len() + extra.len();
    if content >= FRAME_SIZE {
        return Err(FrameError::TooLong {
            max: FRAME_SIZE - 1,
            actual: content,
        });
    }

    let mut frame = Vec::with_capacity(FRAME_SIZE);
    frame.extend_from_slice(identifiers);
    frame.extend_from_slice(payload);
    frame.extend_from_slice(extra);
    frame.resize(FRAME_SIZE - 1, 0);
    frame.push(checksum(&frame));
    Ok(frame)
}

/// Build a host → device command frame.
pub fn command_frame(op_code: OpCode, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    assemble(&[COMMAND_PREFIX, op_code.value()], payload, &[])
}

/// Build a device → host report frame.
pub fn report_frame(op_code: OpCode, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    assemble(&[REPORT_PREFIX, op_code.value()], payload, &[])
}

/// Encode bytes for the cloud relay (standard alphabet, padded).
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a cloud relay payload.
pub fn from_base64(text: &str) -> Result<Vec<u8>, FrameError> {
    Ok(STANDARD.decode(text.trim())?)
}

/// A parsed, checksum-verified BLE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Identifier prefix.
    pub prefix: u8,
    /// Op code.
    pub op_code: OpCode,
    /// Payload bytes, including trailing padding.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Parse a 20-byte frame, verifying its checksum.
    pub fn parse(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() != FRAME_SIZE {
            return Err(FrameError::Length {
                expected: FRAME_SIZE,
                actual: bytes.len(),
            });
        }

        let expected = checksum(&bytes[..FRAME_SIZE - 1]);
        let actual = bytes[FRAME_SIZE - 1];
        if expected != actual {
            return Err(FrameError::Checksum { expected, actual });
        }

        Ok(Frame {
            prefix: bytes[0],
            op_code: OpCode::new(bytes[1]),
            payload: bytes[2..2 + MAX_FRAME_PAYLOAD].to_vec(),
        })
    }

    /// Parse a base64 cloud payload.
    pub fn from_base64(text: &str) -> Result<Self, FrameError> {
        Frame::parse(&from_base64(text)?)
    }

    /// Device → host status report.
    pub fn is_report(&self) -> bool {
        self.prefix == REPORT_PREFIX
    }

    /// Host → device command.
    pub fn is_command(&self) -> bool {
        self.prefix == COMMAND_PREFIX
    }

    /// Re-serialize to 20 bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FrameError> {
        assemble(&[self.prefix, self.op_code.value()], &self.payload, &[])
    }
}

/// Parse a 20-byte frame, verifying its checksum.
pub fn parse_frame(bytes: &[u8]) -> Result<Frame, FrameError> {
    Frame::parse(bytes)
}
