//! Simulation backend.
//!
//! Software stand-ins for the hub and its port devices so the node can run
//! and be tested without hardware. Every simulated device shares its state
//! with a handle the caller keeps, which is how tests inspect commands and
//! inject failures.

mod hub;
mod motor;
mod sensor;

pub use hub::{HubHandle, SimulatedHub};
pub use motor::{MotorHandle, SimMotor};
pub use sensor::{SensorHandle, SimColorDistanceSensor};

use std::collections::BTreeMap;
use std::sync::Arc;

use hub_common::device::{DeviceError, PortDevice};
use hub_common::hub::{HubKind, HubServices};
use hub_common::port::{DeviceType, Port};
use tracing::info;

use crate::clock::Clock;
use crate::registry::{DeviceFactory, ProbeList};

/// Simulated hub plus whatever is plugged into it.
pub struct SimulationBackend {
    /// Hub model
    kind: HubKind,
    /// Shared time source for motor integration
    clock: Arc<dyn Clock>,
    /// Motors by port
    motors: BTreeMap<Port, MotorHandle>,
    /// Color/distance sensors by port
    sensors: BTreeMap<Port, SensorHandle>,
    /// Hub peripherals
    hub: HubHandle,
}

impl SimulationBackend {
    /// Backend for `kind` with the given attached devices.
    ///
    /// Ports the hub model does not have are ignored.
    pub fn new(
        kind: HubKind,
        attached: &[(Port, DeviceType)],
        battery_mv: u32,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut motors = BTreeMap::new();
        let mut sensors = BTreeMap::new();
        for &(port, device_type) in attached {
            if !kind.has_port(port) {
                continue;
            }
            match device_type {
                DeviceType::Motor => {
                    motors.insert(port, MotorHandle::new(clock.now()));
                }
                DeviceType::ColorDistanceSensor => {
                    sensors.insert(port, SensorHandle::default());
                }
                DeviceType::None => {}
            }
        }
        info!(
            "Simulated {:?}: {} motor(s), {} sensor(s), battery {} mV",
            kind,
            motors.len(),
            sensors.len(),
            battery_mv
        );
        Self {
            kind,
            clock,
            motors,
            sensors,
            hub: HubHandle::new(battery_mv),
        }
    }

    /// Candidates in probe priority order: motor, then color/distance sensor.
    pub fn probe_list(&self) -> ProbeList {
        let motors = self.motors.clone();
        let clock = Arc::clone(&self.clock);
        let motor_factory: DeviceFactory = Box::new(move |port: Port| -> Result<Box<dyn PortDevice>, DeviceError> {
            match motors.get(&port) {
                Some(handle) => Ok(Box::new(SimMotor::new(port, handle.clone(), Arc::clone(&clock)))),
                None => Err(DeviceError::Absent { port }),
            }
        });

        let sensors = self.sensors.clone();
        let sensor_factory: DeviceFactory = Box::new(move |port: Port| -> Result<Box<dyn PortDevice>, DeviceError> {
            match sensors.get(&port) {
                Some(handle) => Ok(Box::new(SimColorDistanceSensor::new(port, handle.clone()))),
                None => Err(DeviceError::Absent { port }),
            }
        });

        ProbeList::new()
            .with(DeviceType::Motor, motor_factory)
            .with(DeviceType::ColorDistanceSensor, sensor_factory)
    }

    /// Hub services backed by this simulation.
    pub fn hub_services(&self) -> Box<dyn HubServices> {
        Box::new(SimulatedHub::new(self.kind, self.hub.clone()))
    }

    /// Hub model.
    pub fn kind(&self) -> HubKind {
        self.kind
    }

    /// Handle to the motor on `port`.
    pub fn motor(&self, port: Port) -> Option<MotorHandle> {
        self.motors.get(&port).cloned()
    }

    /// Handle to the sensor on `port`.
    pub fn sensor(&self, port: Port) -> Option<SensorHandle> {
        self.sensors.get(&port).cloned()
    }

    /// Handle to the hub peripherals.
    pub fn hub(&self) -> HubHandle {
        self.hub.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::registry::DeviceRegistry;

    #[test]
    fn probe_finds_configured_devices() {
        let sim = SimulationBackend::new(
            HubKind::TechnicHub,
            &[
                (Port::A, DeviceType::Motor),
                (Port::C, DeviceType::ColorDistanceSensor),
                (Port::F, DeviceType::Motor),
            ],
            7600,
            Arc::new(ManualClock::new()),
        );
        let registry = DeviceRegistry::probe(sim.kind().ports(), &sim.probe_list());
        assert_eq!(registry.device_type(Port::A), DeviceType::Motor);
        assert_eq!(registry.device_type(Port::C), DeviceType::ColorDistanceSensor);
        assert_eq!(registry.device_type(Port::F), DeviceType::None);
        assert!(sim.motor(Port::F).is_none());
    }
}
