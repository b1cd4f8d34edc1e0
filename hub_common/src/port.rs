//! Physical ports and device categories.
//!
//! Defines the `Port` identifier for the hub's connectors, the `DeviceType`
//! category assigned to each port at startup, and the immutable
//! `DeviceEntry` pairing the two.

use serde::{Deserialize, Serialize};

use crate::consts::PORT_COUNT;

/// Physical connector on the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Port {
    /// Port A
    A = 0,
    /// Port B
    B = 1,
    /// Port C
    C = 2,
    /// Port D
    D = 3,
    /// Port E
    E = 4,
    /// Port F
    F = 5,
}

impl Port {
    /// All ports in connector order.
    pub const ALL: [Port; PORT_COUNT] = [Port::A, Port::B, Port::C, Port::D, Port::E, Port::F];

    /// Convert from a wire port index. Returns `None` for indices >= 6.
    #[inline]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::A),
            1 => Some(Self::B),
            2 => Some(Self::C),
            3 => Some(Self::D),
            4 => Some(Self::E),
            5 => Some(Self::F),
            _ => None,
        }
    }

    /// Parse a connector letter (`'A'..='F'`, case-insensitive).
    pub fn from_letter(letter: char) -> Option<Self> {
        let upper = letter.to_ascii_uppercase();
        if !upper.is_ascii_uppercase() {
            return None;
        }
        Self::from_index(upper as u8 - b'A')
    }

    /// Wire index of this port (0..6).
    #[inline]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Connector letter, as printed on the hub.
    pub const fn letter(self) -> char {
        (b'A' + self as u8) as char
    }
}

impl std::fmt::Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Category of device identified on a port.
///
/// Numeric values are part of the telemetry wire format (record 0x10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DeviceType {
    /// Nothing attached, or nothing recognised.
    #[default]
    None = 0,
    /// Tacho motor with position/speed/load feedback.
    Motor = 2,
    /// Combined color and distance sensor.
    ColorDistanceSensor = 5,
}

impl DeviceType {
    /// Convert from the wire value. Returns `None` for unknown categories.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            2 => Some(Self::Motor),
            5 => Some(Self::ColorDistanceSensor),
            _ => None,
        }
    }

    /// Returns true unless this is the `None` sentinel.
    #[inline]
    pub const fn is_present(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// One row of the port → device-type table.
///
/// Created once by probing, never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceEntry {
    /// Connector this entry describes.
    pub port: Port,
    /// Category identified on the connector.
    pub device_type: DeviceType,
}
