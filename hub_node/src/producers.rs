//! Telemetry producer tasks.
//!
//! Each task samples one kind of state and publishes it to the broadcast
//! buffer. Producers never wait for a reader: the next write simply replaces
//! the previous record.

use std::time::Duration;

use hub_common::consts::PORT_COUNT;
use hub_common::device::DeviceState;
use hub_common::port::{DeviceType, Port};
use hub_common::telemetry::{TelemetryRecord, saturate_i16};
use hub_shared_memory::ShmResult;
use tracing::{debug, info, warn};

use crate::node::NodeResources;
use crate::scheduler::{Flow, Task, TaskError};

/// Publish the device table, then the limits of every motor.
///
/// A motor whose limits cannot be read is skipped with a warning.
pub fn announce(res: &mut NodeResources) -> ShmResult<()> {
    let device_types = res.devices.device_types();
    res.broadcast
        .publish(&TelemetryRecord::HubDevices { device_types })?;
    info!("Announced devices {:?}", device_types);

    let motors: heapless::Vec<Port, PORT_COUNT> = res.devices.ports_with(DeviceType::Motor).collect();
    for port in motors {
        let Some(motor) = res.devices.device_mut(port) else {
            continue;
        };
        match motor.query_limits() {
            Ok(Some(limits)) => {
                res.broadcast.publish(&TelemetryRecord::MotorLimits {
                    port,
                    speed: saturate_i16(limits.speed),
                    acceleration: saturate_i16(limits.acceleration),
                    torque: saturate_i16(limits.torque),
                })?;
                debug!("Announced limits for motor on port {}", port);
            }
            Ok(None) => {}
            Err(e) => warn!("Limits unavailable for port {}: {}", port, e),
        }
    }
    Ok(())
}

/// Battery percentage (0x11).
pub struct BatteryTask {
    period: Duration,
}

impl BatteryTask {
    /// Task sampling every `period`.
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

impl Task for BatteryTask {
    fn name(&self) -> &'static str {
        "battery"
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn step(&mut self, res: &mut NodeResources) -> Result<Flow, TaskError> {
        let mv = res.hub.battery_voltage_mv().map_err(TaskError::Hub)?;
        let percentage = res.hub.kind().battery_curve().percentage(mv);
        res.broadcast
            .publish(&TelemetryRecord::HubBattery { percentage })?;
        Ok(Flow::Continue)
    }
}

/// Hub tilt and heading (0x12), in whole degrees.
pub struct ImuTask {
    period: Duration,
}

impl ImuTask {
    /// Task sampling every `period`.
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

impl Task for ImuTask {
    fn name(&self) -> &'static str {
        "imu"
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn step(&mut self, res: &mut NodeResources) -> Result<Flow, TaskError> {
        let imu = res.hub.imu().map_err(TaskError::Hub)?;
        // `as` saturates float to int and maps NaN to 0.
        res.broadcast.publish(&TelemetryRecord::HubImu {
            pitch: imu.pitch as i16,
            roll: imu.roll as i16,
            heading: imu.heading as i16,
        })?;
        Ok(Flow::Continue)
    }
}

/// State of every motor (0x21), one record per motor per step.
///
/// A failing motor does not stop the others from being sampled; the first
/// failure is returned once the round is done.
pub struct MotorStateTask {
    period: Duration,
}

impl MotorStateTask {
    /// Task sampling every `period`.
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

impl Task for MotorStateTask {
    fn name(&self) -> &'static str {
        "motor_state"
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn step(&mut self, res: &mut NodeResources) -> Result<Flow, TaskError> {
        let ports: heapless::Vec<Port, PORT_COUNT> =
            res.devices.ports_with(DeviceType::Motor).collect();
        let mut first_error = None;

        for port in ports {
            let Some(motor) = res.devices.device_mut(port) else {
                continue;
            };
            match motor.query_state() {
                Ok(DeviceState::Motor(state)) => {
                    res.broadcast.publish(&TelemetryRecord::MotorState {
                        port,
                        angle: saturate_i16(state.angle),
                        speed: saturate_i16(state.speed),
                        load: saturate_i16(state.load),
                        stalled: state.stalled,
                    })?;
                }
                Ok(other) => debug!("Port {} returned non-motor state {:?}", port, other),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(Flow::Continue),
        }
    }
}

/// Reading of every color/distance sensor (0x30).
pub struct ColorDistanceTask {
    period: Duration,
}

impl ColorDistanceTask {
    /// Task sampling every `period`.
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

impl Task for ColorDistanceTask {
    fn name(&self) -> &'static str {
        "color_distance"
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn step(&mut self, res: &mut NodeResources) -> Result<Flow, TaskError> {
        let ports: heapless::Vec<Port, PORT_COUNT> =
            res.devices.ports_with(DeviceType::ColorDistanceSensor).collect();
        let mut first_error = None;

        for port in ports {
            let Some(sensor) = res.devices.device_mut(port) else {
                continue;
            };
            match sensor.query_state() {
                Ok(DeviceState::ColorDistance(state)) => {
                    res.broadcast.publish(&TelemetryRecord::ColorDistanceState {
                        port,
                        hue: saturate_i16(state.hue),
                        saturation: saturate_i16(state.saturation),
                        value: saturate_i16(state.value),
                        distance: saturate_i16(state.distance),
                    })?;
                }
                Ok(other) => debug!("Port {} returned non-sensor state {:?}", port, other),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(Flow::Continue),
        }
    }
}
