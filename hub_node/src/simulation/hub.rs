//! Simulated hub peripherals.

use std::sync::Arc;

use hub_common::hub::{HubKind, HubServices, ImuReading, LightColor};
use parking_lot::Mutex;
use tracing::info;

#[derive(Debug)]
struct HubModel {
    battery_mv: u32,
    imu: ImuReading,
    light: Option<LightColor>,
    powered_off: bool,
    failing: bool,
}

/// Caller-side view of the simulated hub.
#[derive(Debug, Clone)]
pub struct HubHandle {
    model: Arc<Mutex<HubModel>>,
}

impl HubHandle {
    pub(super) fn new(battery_mv: u32) -> Self {
        Self {
            model: Arc::new(Mutex::new(HubModel {
                battery_mv,
                imu: ImuReading::default(),
                light: None,
                powered_off: false,
                failing: false,
            })),
        }
    }

    /// Set the pack voltage [mV].
    pub fn set_battery_mv(&self, mv: u32) {
        self.model.lock().battery_mv = mv;
    }

    /// Set the IMU orientation.
    pub fn set_imu(&self, imu: ImuReading) {
        self.model.lock().imu = imu;
    }

    /// Make battery and IMU reads fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.model.lock().failing = failing;
    }

    /// Status light color, `None` when off.
    pub fn light(&self) -> Option<LightColor> {
        self.model.lock().light
    }

    /// Returns true once a shutdown command powered the hub off.
    pub fn is_powered_off(&self) -> bool {
        self.model.lock().powered_off
    }
}

/// `HubServices` over a [`HubHandle`].
pub struct SimulatedHub {
    kind: HubKind,
    handle: HubHandle,
}

impl SimulatedHub {
    /// Simulated `kind` hub sharing state with `handle`.
    pub fn new(kind: HubKind, handle: HubHandle) -> Self {
        Self { kind, handle }
    }
}

impl HubServices for SimulatedHub {
    fn kind(&self) -> HubKind {
        self.kind
    }

    fn battery_voltage_mv(&mut self) -> Result<u32, String> {
        let model = self.handle.model.lock();
        if model.failing {
            return Err("battery gauge not responding".to_string());
        }
        Ok(model.battery_mv)
    }

    fn imu(&mut self) -> Result<ImuReading, String> {
        let model = self.handle.model.lock();
        if model.failing {
            return Err("IMU not responding".to_string());
        }
        Ok(model.imu)
    }

    fn light_on(&mut self, color: LightColor) -> Result<(), String> {
        self.handle.model.lock().light = Some(color);
        Ok(())
    }

    fn light_off(&mut self) -> Result<(), String> {
        self.handle.model.lock().light = None;
        Ok(())
    }

    fn power_off(&mut self) {
        info!("Simulated hub powered off");
        let mut model = self.handle.model.lock();
        model.light = None;
        model.powered_off = true;
    }
}
