//! Hub profiles and hub-level services.
//!
//! A hub exposes a fixed set of ports and a handful of built-in peripherals
//! (battery gauge, IMU, status light, power switch). `HubKind` captures the
//! per-model constants; `HubServices` is the capability interface for the
//! built-in peripherals.

use serde::{Deserialize, Serialize};

use crate::port::Port;

/// Hub model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HubKind {
    /// Four-port Technic hub (A..D).
    #[default]
    TechnicHub,
    /// Six-port Prime hub (A..F).
    PrimeHub,
}

impl HubKind {
    /// Ports physically present on this hub.
    pub fn ports(self) -> &'static [Port] {
        match self {
            Self::TechnicHub => &Port::ALL[..4],
            Self::PrimeHub => &Port::ALL,
        }
    }

    /// Returns true if `port` exists on this hub.
    pub fn has_port(self, port: Port) -> bool {
        self.ports().contains(&port)
    }

    /// Battery discharge curve for this hub's pack.
    pub const fn battery_curve(self) -> BatteryCurve {
        match self {
            Self::TechnicHub => BatteryCurve {
                nominal_mv: 7200.0,
                steepness: 0.005,
            },
            Self::PrimeHub => BatteryCurve {
                nominal_mv: 7400.0,
                steepness: 0.006,
            },
        }
    }
}

/// Logistic model mapping pack voltage to a charge percentage.
///
/// Li-ion packs sit on a long plateau around the nominal voltage and drop
/// off steeply at both ends, which a logistic curve captures well.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryCurve {
    /// Voltage at 50 % [mV]
    pub nominal_mv: f64,
    /// Curve steepness [1/mV]
    pub steepness: f64,
}

impl BatteryCurve {
    /// Charge percentage for a pack voltage, truncated to 0..=100.
    pub fn percentage(&self, voltage_mv: u32) -> u8 {
        let exponent = -self.steepness * (f64::from(voltage_mv) - self.nominal_mv);
        let value = 100.0 / (1.0 + exponent.exp());
        value.clamp(0.0, 100.0) as u8
    }
}

/// IMU sample [deg].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImuReading {
    /// Pitch
    pub pitch: f32,
    /// Roll
    pub roll: f32,
    /// Heading
    pub heading: f32,
}

/// Status light color in HSV.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LightColor {
    /// Hue [deg]
    pub hue: i16,
    /// Saturation [%]
    pub saturation: i16,
    /// Value [%]
    pub value: i16,
}

/// Hub-level peripherals, owned by the platform layer.
///
/// Failures are reported as strings; the node logs them and moves on.
pub trait HubServices: Send {
    /// Hub model.
    fn kind(&self) -> HubKind;

    /// Pack voltage [mV].
    fn battery_voltage_mv(&mut self) -> Result<u32, String>;

    /// Current tilt and heading.
    fn imu(&mut self) -> Result<ImuReading, String>;

    /// Turn the status light on with a color.
    fn light_on(&mut self, color: LightColor) -> Result<(), String>;

    /// Turn the status light off.
    fn light_off(&mut self) -> Result<(), String>;

    /// Power the hub down.
    ///
    /// On hardware this does not return; platform layers that can return
    /// (simulation) must leave the hub in a powered-off state.
    fn power_off(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_ports() {
        assert_eq!(HubKind::TechnicHub.ports(), &[Port::A, Port::B, Port::C, Port::D]);
        assert_eq!(HubKind::PrimeHub.ports().len(), 6);
        assert!(!HubKind::TechnicHub.has_port(Port::E));
        assert!(HubKind::PrimeHub.has_port(Port::F));
    }

    #[test]
    fn battery_curve_midpoint_is_fifty_percent() {
        let curve = HubKind::TechnicHub.battery_curve();
        assert_eq!(curve.percentage(7200), 50);
    }

    #[test]
    fn battery_curve_saturates() {
        let curve = HubKind::PrimeHub.battery_curve();
        assert_eq!(curve.percentage(0), 0);
        assert!(curve.percentage(9000) >= 99);
        assert!(curve.percentage(8400) > curve.percentage(7400));
    }
}
