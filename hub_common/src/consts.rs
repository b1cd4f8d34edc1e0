//! System-wide constants for the hub node.
//!
//! Single source of truth for wire sizes, opcode ranges and default cadences.
//! Imported by every crate in the workspace.

use static_assertions::const_assert;

/// Number of physical port connectors a hub can expose (A..F).
pub const PORT_COUNT: usize = 6;

/// Size of one command frame on either inbound channel: opcode + 4 × i16.
pub const FRAME_LEN: usize = 9;

/// Number of signed 16-bit arguments carried by a command frame.
pub const FRAME_ARGS: usize = 4;

/// Size of the largest telemetry record (0x30: tag + port + 4 × i16).
pub const MAX_RECORD_LEN: usize = 10;

/// First opcode reserved for telemetry tags.
pub const TELEMETRY_TAG_BASE: u8 = 0x10;

/// First opcode reserved for stream-channel commands.
///
/// 0x20 is the first printable character (space), so command bytes never
/// collide with REPL control characters such as ctrl+c (0x03).
pub const STREAM_OPCODE_BASE: u8 = 0x20;

/// Default cadence of the battery producer [ms].
pub const BATTERY_PERIOD_MS: u64 = 60_000;

/// Default cadence of the IMU, motor and sensor producers [ms].
pub const TELEMETRY_PERIOD_MS: u64 = 100;

/// Default polling period of the shared command slot [ms].
pub const COMMAND_SLOT_PERIOD_MS: u64 = 100;

const_assert!(FRAME_LEN == 1 + 2 * FRAME_ARGS);
const_assert!(MAX_RECORD_LEN <= u8::MAX as usize);
const_assert!(TELEMETRY_TAG_BASE < STREAM_OPCODE_BASE);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(PORT_COUNT > 0 && PORT_COUNT <= 6);
        assert_eq!(FRAME_LEN, 9);
        assert!(BATTERY_PERIOD_MS > TELEMETRY_PERIOD_MS);
    }

    #[test]
    fn device_table_record_fits_largest_record() {
        // 0x10 carries one byte per port after the tag.
        assert!(1 + PORT_COUNT <= MAX_RECORD_LEN);
    }
}
