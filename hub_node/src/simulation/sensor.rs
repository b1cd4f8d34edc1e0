//! Simulated color/distance sensor.

use std::sync::Arc;

use hub_common::device::{ColorDistanceState, DeviceCommand, DeviceError, DeviceState, PortDevice};
use hub_common::port::{DeviceType, Port};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct SensorModel {
    reading: ColorDistanceState,
    failing: bool,
}

/// Caller-side view of a simulated sensor.
#[derive(Debug, Clone, Default)]
pub struct SensorHandle {
    model: Arc<Mutex<SensorModel>>,
}

impl SensorHandle {
    /// Set what the sensor sees.
    pub fn set_reading(&self, reading: ColorDistanceState) {
        self.model.lock().reading = reading;
    }

    /// Make every query fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.model.lock().failing = failing;
    }
}

/// `PortDevice` over a [`SensorHandle`].
pub struct SimColorDistanceSensor {
    port: Port,
    handle: SensorHandle,
}

impl SimColorDistanceSensor {
    /// Sensor on `port` sharing state with `handle`.
    pub fn new(port: Port, handle: SensorHandle) -> Self {
        Self { port, handle }
    }
}

impl PortDevice for SimColorDistanceSensor {
    fn device_type(&self) -> DeviceType {
        DeviceType::ColorDistanceSensor
    }

    fn port(&self) -> Port {
        self.port
    }

    fn query_state(&mut self) -> Result<DeviceState, DeviceError> {
        let model = self.handle.model.lock();
        if model.failing {
            return Err(DeviceError::failed(self.port, "simulated fault"));
        }
        Ok(DeviceState::ColorDistance(model.reading))
    }

    fn apply_command(&mut self, command: DeviceCommand) -> Result<(), DeviceError> {
        Err(DeviceError::failed(
            self.port,
            format!("sensor does not accept {command:?}"),
        ))
    }
}
