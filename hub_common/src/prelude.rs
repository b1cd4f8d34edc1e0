//! Prelude module for common re-exports.
//!
//! ```rust
//! use hub_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{FRAME_LEN, MAX_RECORD_LEN, PORT_COUNT};

// ─── Devices ────────────────────────────────────────────────────────
pub use crate::device::{
    ColorDistanceState, DeviceCommand, DeviceError, DeviceState, MotorLimits, MotorState,
    PortDevice,
};
pub use crate::hub::{BatteryCurve, HubKind, HubServices, ImuReading, LightColor};
pub use crate::port::{DeviceEntry, DeviceType, Port};

// ─── Wire formats ───────────────────────────────────────────────────
pub use crate::frame::{CommandArgs, CommandFrame, FrameError};
pub use crate::telemetry::{CodecError, EncodedRecord, TelemetryRecord};
