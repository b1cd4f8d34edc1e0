//! Outbound telemetry buffer and inbound command slot.
//!
//! Both wrap a [`SharedSlot`]: a single last-write-wins region that is either
//! private to the process or mapped from a file a host process can open.

use std::path::Path;

use hub_common::consts::{FRAME_LEN, MAX_RECORD_LEN};
use hub_common::frame::{CommandFrame, FrameError};
use hub_common::telemetry::{CodecError, TelemetryRecord};
use hub_shared_memory::{SharedSlot, ShmError, ShmResult};
use thiserror::Error;
use tracing::trace;

/// Failure reading a typed value out of a slot.
#[derive(Debug, Error)]
pub enum SlotError {
    /// Underlying slot could not be read.
    #[error(transparent)]
    Shm(#[from] ShmError),

    /// Buffer holds bytes that are not a telemetry record.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Command slot holds something other than a 9-byte frame.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// The outbound broadcast buffer, sized for the largest telemetry record.
pub struct BroadcastBuffer {
    slot: SharedSlot,
}

impl BroadcastBuffer {
    /// In-process buffer.
    pub fn in_memory() -> ShmResult<Self> {
        Ok(Self {
            slot: SharedSlot::in_memory("telemetry", MAX_RECORD_LEN)?,
        })
    }

    /// Buffer backed by a file at `path` that a host can map.
    pub fn mapped(path: &Path) -> ShmResult<Self> {
        Ok(Self {
            slot: SharedSlot::create_mapped("telemetry", path, MAX_RECORD_LEN)?,
        })
    }

    /// Replace the buffer contents with `bytes`.
    pub fn write(&mut self, bytes: &[u8]) -> ShmResult<()> {
        self.slot.write(bytes)
    }

    /// Encode `record` and write it.
    pub fn publish(&mut self, record: &TelemetryRecord) -> ShmResult<()> {
        let encoded = record.encode();
        trace!(tag = record.tag(), len = encoded.len(), "publish");
        self.slot.write(&encoded)
    }

    /// Current contents. Never consumes them.
    pub fn read(&self) -> ShmResult<Vec<u8>> {
        self.slot.read()
    }

    /// Current contents decoded, or `None` before the first write.
    pub fn latest(&self) -> Result<Option<TelemetryRecord>, SlotError> {
        let bytes = self.slot.read()?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(TelemetryRecord::decode(&bytes)?))
    }

    /// Writes since creation.
    pub fn writes(&self) -> u64 {
        self.slot.writes()
    }

    /// Backing file, when mapped.
    pub fn path(&self) -> Option<&Path> {
        self.slot.path()
    }
}

/// The inbound command slot polled by the slot channel.
pub struct CommandSlot {
    slot: SharedSlot,
}

impl CommandSlot {
    /// In-process slot.
    pub fn in_memory() -> ShmResult<Self> {
        Ok(Self {
            slot: SharedSlot::in_memory("commands", FRAME_LEN)?,
        })
    }

    /// Slot backed by a file at `path` that a host can write.
    pub fn mapped(path: &Path) -> ShmResult<Self> {
        Ok(Self {
            slot: SharedSlot::create_mapped("commands", path, FRAME_LEN)?,
        })
    }

    /// Replace the pending command.
    pub fn write_frame(&mut self, frame: &CommandFrame) -> ShmResult<()> {
        self.slot.write(&frame.encode())
    }

    /// Current command. A slot nobody has written yet reads as the
    /// all-zero no-op frame.
    pub fn read_frame(&self) -> Result<CommandFrame, SlotError> {
        let mut buf = [0u8; FRAME_LEN];
        let len = self.slot.read_into(&mut buf)?;
        if len == 0 {
            return Ok(CommandFrame::default());
        }
        Ok(CommandFrame::decode(&buf[..len])?)
    }

    /// Backing file, when mapped.
    pub fn path(&self) -> Option<&Path> {
        self.slot.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_common::port::Port;

    #[test]
    fn second_write_hides_first() {
        let mut buffer = BroadcastBuffer::in_memory().unwrap();
        let w1 = TelemetryRecord::HubBattery { percentage: 80 };
        let w2 = TelemetryRecord::MotorState {
            port: Port::C,
            angle: 100,
            speed: -50,
            load: 7,
            stalled: true,
        };
        buffer.publish(&w1).unwrap();
        buffer.publish(&w2).unwrap();

        assert_eq!(buffer.read().unwrap(), w2.encode().to_vec());
        assert_eq!(buffer.latest().unwrap(), Some(w2));
        assert_eq!(buffer.writes(), 2);
    }

    #[test]
    fn empty_buffer_has_no_record() {
        let buffer = BroadcastBuffer::in_memory().unwrap();
        assert!(buffer.latest().unwrap().is_none());
    }

    #[test]
    fn garbage_in_buffer_is_codec_error() {
        let mut buffer = BroadcastBuffer::in_memory().unwrap();
        buffer.write(&[0x7F, 1, 2]).unwrap();
        assert!(matches!(buffer.latest(), Err(SlotError::Codec(_))));
    }

    #[test]
    fn fresh_command_slot_reads_noop() {
        let slot = CommandSlot::in_memory().unwrap();
        assert_eq!(slot.read_frame().unwrap(), CommandFrame::default());
    }

    #[test]
    fn command_slot_persists_across_reads() {
        let mut slot = CommandSlot::in_memory().unwrap();
        let frame = CommandFrame::new(0x41, &[0, 360]);
        slot.write_frame(&frame).unwrap();
        assert_eq!(slot.read_frame().unwrap(), frame);
        assert_eq!(slot.read_frame().unwrap(), frame);
    }
}
