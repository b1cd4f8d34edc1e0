//! Command frame shared by both inbound channels.
//!
//! Wire layout (9 bytes, little-endian): `[opcode: u8][arg0..arg3: i16]`.

use thiserror::Error;

use crate::consts::{FRAME_ARGS, FRAME_LEN};

/// Arguments carried by a command frame.
pub type CommandArgs = [i16; FRAME_ARGS];

/// Malformed frame on an inbound channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Frame is not exactly `FRAME_LEN` bytes.
    #[error("Command frame must be {expected} bytes, got {actual}")]
    Length {
        /// Always `FRAME_LEN`
        expected: usize,
        /// Received byte count
        actual: usize,
    },
}

/// One inbound command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandFrame {
    /// Handler selector.
    pub opcode: u8,
    /// Handler arguments; unused trailing arguments are zero.
    pub args: CommandArgs,
}

impl CommandFrame {
    /// Build a frame; missing arguments are zero-filled.
    pub fn new(opcode: u8, args: &[i16]) -> Self {
        let mut frame = Self {
            opcode,
            args: [0; FRAME_ARGS],
        };
        for (slot, &arg) in frame.args.iter_mut().zip(args) {
            *slot = arg;
        }
        frame
    }

    /// Encode into wire bytes.
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut bytes = [0u8; FRAME_LEN];
        bytes[0] = self.opcode;
        for (i, arg) in self.args.iter().enumerate() {
            let offset = 1 + i * 2;
            bytes[offset..offset + 2].copy_from_slice(&arg.to_le_bytes());
        }
        bytes
    }

    /// Decode from wire bytes.
    ///
    /// # Errors
    /// Returns `FrameError::Length` unless `bytes` is exactly `FRAME_LEN` long.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let bytes: &[u8; FRAME_LEN] = bytes.try_into().map_err(|_| FrameError::Length {
            expected: FRAME_LEN,
            actual: bytes.len(),
        })?;

        let mut args = [0i16; FRAME_ARGS];
        for (i, arg) in args.iter_mut().enumerate() {
            let offset = 1 + i * 2;
            *arg = i16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
        }
        Ok(Self {
            opcode: bytes[0],
            args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_wire_layout() {
        let frame = CommandFrame::new(0x41, &[2, -300]);
        assert_eq!(
            frame.encode(),
            [0x41, 0x02, 0x00, 0xD4, 0xFE, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(CommandFrame::decode(&frame.encode()), Ok(frame));
    }

    #[test]
    fn frame_rejects_wrong_length() {
        assert_eq!(
            CommandFrame::decode(&[0x20; 8]),
            Err(FrameError::Length {
                expected: 9,
                actual: 8
            })
        );
        assert!(CommandFrame::decode(&[0u8; 10]).is_err());
        assert!(CommandFrame::decode(&[]).is_err());
    }

    #[test]
    fn zeroed_frame_is_noop_opcode() {
        let frame = CommandFrame::decode(&[0u8; FRAME_LEN]).unwrap();
        assert_eq!(frame, CommandFrame::default());
        assert_eq!(frame.opcode, 0);
    }
}
