//! Device capability trait and error types.
//!
//! This module defines:
//! - `PortDevice` trait - Capability interface every identified device exposes
//! - `DeviceError` enum - Absent devices and failed capability calls
//! - `DeviceState` / `MotorLimits` - Values returned by capability queries
//! - `DeviceCommand` - Commands applied to a device

use crate::port::{DeviceType, Port};
use thiserror::Error;

/// Error types for device operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// No device of the requested category answers on this port.
    ///
    /// Expected during probing; never an error condition there.
    #[error("No compatible device on port {port}")]
    Absent {
        /// Port that was probed
        port: Port,
    },

    /// A capability call failed at the moment of use (transient fault).
    #[error("Device on port {port} failed: {reason}")]
    OperationFailed {
        /// Port of the failing device
        port: Port,
        /// Driver-provided description
        reason: String,
    },
}

impl DeviceError {
    /// Shorthand for an `OperationFailed` error.
    pub fn failed(port: Port, reason: impl Into<String>) -> Self {
        Self::OperationFailed {
            port,
            reason: reason.into(),
        }
    }
}

/// Motor feedback sample.
///
/// Values are driver-native and may exceed 16 bits (the angle accumulates);
/// producers saturate them before encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotorState {
    /// Accumulated rotation [deg]
    pub angle: i32,
    /// Rotation speed [deg/s]
    pub speed: i32,
    /// Estimated load [mNm]
    pub load: i32,
    /// Motor is stalled
    pub stalled: bool,
}

/// Motor controller limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotorLimits {
    /// Maximum speed [deg/s]
    pub speed: i32,
    /// Maximum acceleration [deg/s²]
    pub acceleration: i32,
    /// Maximum torque [mNm]
    pub torque: i32,
}

/// Color/distance sensor sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorDistanceState {
    /// Hue [deg, 0..360]
    pub hue: i32,
    /// Saturation [%]
    pub saturation: i32,
    /// Value / brightness [%]
    pub value: i32,
    /// Distance to object [%]
    pub distance: i32,
}

/// State sample returned by `PortDevice::query_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Motor feedback
    Motor(MotorState),
    /// Color/distance sensor reading
    ColorDistance(ColorDistanceState),
}

/// Command applied to a device through `PortDevice::apply_command`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Run at constant speed [deg/s] until told otherwise.
    Run {
        /// Target speed [deg/s]
        speed: i32,
    },
    /// Stop and coast.
    Stop,
}

/// Capability interface of a device attached to a port.
///
/// Drivers own the semantics of each call; the node only samples state,
/// reads limits once at startup, and forwards commands.
///
/// # Failure contract
///
/// | Call | On failure |
/// |------|------------|
/// | `query_state()` | producer skips this sample, retries next period |
/// | `query_limits()` | limits record is not published |
/// | `apply_command()` | command frame is dropped with a warning |
pub trait PortDevice: Send {
    /// Category of this device.
    fn device_type(&self) -> DeviceType;

    /// Port the device is attached to.
    fn port(&self) -> Port;

    /// Sample the current device state.
    fn query_state(&mut self) -> Result<DeviceState, DeviceError>;

    /// Read controller limits. Devices without limits return `Ok(None)`.
    fn query_limits(&mut self) -> Result<Option<MotorLimits>, DeviceError> {
        Ok(None)
    }

    /// Apply a command to the device.
    fn apply_command(&mut self, command: DeviceCommand) -> Result<(), DeviceError>;
}
