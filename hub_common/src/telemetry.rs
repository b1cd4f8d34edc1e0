//! Telemetry record codec.
//!
//! Each record is a single tag byte followed by a fixed little-endian
//! payload whose layout depends only on the tag:
//!
//! | tag  | payload                                                    | len |
//! |------|------------------------------------------------------------|-----|
//! | 0x10 | 6 × device type (u8), one per port                         | 7   |
//! | 0x11 | battery percentage (u8)                                    | 2   |
//! | 0x12 | pitch, roll, heading (3 × i16)                             | 7   |
//! | 0x20 | port (u8), speed, acceleration, torque limits (3 × i16)    | 8   |
//! | 0x21 | port (u8), angle, speed, load (3 × i16), stalled (u8)      | 9   |
//! | 0x30 | port (u8), hue, saturation, value, distance (4 × i16)      | 10  |
//!
//! Encoding is infallible: field types already bound every value to its wire
//! width. Narrowing driver values (e.g. an `i32` motor angle) into those
//! types is the caller's job.

use thiserror::Error;

use crate::consts::{MAX_RECORD_LEN, PORT_COUNT};
use crate::port::{DeviceType, Port};

/// Telemetry tags.
pub mod tag {
    /// Port → device type table.
    pub const HUB_DEVICES: u8 = 0x10;
    /// Battery percentage.
    pub const HUB_BATTERY: u8 = 0x11;
    /// Tilt and heading.
    pub const HUB_IMU: u8 = 0x12;
    /// Motor controller limits.
    pub const MOTOR_LIMITS: u8 = 0x20;
    /// Motor feedback.
    pub const MOTOR_STATE: u8 = 0x21;
    /// Color/distance sensor reading.
    pub const COLOR_DISTANCE_STATE: u8 = 0x30;
}

/// Encoded record bytes (tag included).
pub type EncodedRecord = heapless::Vec<u8, MAX_RECORD_LEN>;

/// Errors produced while decoding a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// No bytes at all.
    #[error("Empty telemetry record")]
    Empty,

    /// Leading byte is not a known tag.
    #[error("Unknown telemetry tag: {0:#04x}")]
    UnknownTag(u8),

    /// Byte count does not match the tag's layout.
    #[error("Record {tag:#04x} must be {expected} bytes, got {actual}")]
    Length {
        /// Record tag
        tag: u8,
        /// Layout length
        expected: usize,
        /// Received length
        actual: usize,
    },

    /// Device table holds an unknown category.
    #[error("Invalid device type: {0}")]
    InvalidDeviceType(u8),

    /// Port byte out of range.
    #[error("Invalid port index: {0}")]
    InvalidPort(u8),
}

/// Total record length (tag included) for a tag, or `None` if unknown.
pub const fn record_len(tag: u8) -> Option<usize> {
    match tag {
        tag::HUB_DEVICES => Some(1 + PORT_COUNT),
        tag::HUB_BATTERY => Some(2),
        tag::HUB_IMU => Some(7),
        tag::MOTOR_LIMITS => Some(8),
        tag::MOTOR_STATE => Some(9),
        tag::COLOR_DISTANCE_STATE => Some(10),
        _ => None,
    }
}

/// A decoded telemetry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryRecord {
    /// 0x10: device type per port, ports A..F.
    HubDevices {
        /// Device types in port order
        device_types: [DeviceType; PORT_COUNT],
    },
    /// 0x11: battery charge.
    HubBattery {
        /// Charge [%], 0..=100
        percentage: u8,
    },
    /// 0x12: hub orientation [deg].
    HubImu {
        /// Pitch
        pitch: i16,
        /// Roll
        roll: i16,
        /// Heading
        heading: i16,
    },
    /// 0x20: motor controller limits.
    MotorLimits {
        /// Motor port
        port: Port,
        /// Speed limit [deg/s]
        speed: i16,
        /// Acceleration limit [deg/s²]
        acceleration: i16,
        /// Torque limit [mNm]
        torque: i16,
    },
    /// 0x21: motor feedback.
    MotorState {
        /// Motor port
        port: Port,
        /// Angle [deg]
        angle: i16,
        /// Speed [deg/s]
        speed: i16,
        /// Load [mNm]
        load: i16,
        /// Stall flag
        stalled: bool,
    },
    /// 0x30: color/distance sensor reading.
    ColorDistanceState {
        /// Sensor port
        port: Port,
        /// Hue [deg]
        hue: i16,
        /// Saturation [%]
        saturation: i16,
        /// Value [%]
        value: i16,
        /// Distance [%]
        distance: i16,
    },
}

impl TelemetryRecord {
    /// Leading tag byte of this record.
    pub const fn tag(&self) -> u8 {
        match self {
            Self::HubDevices { .. } => tag::HUB_DEVICES,
            Self::HubBattery { .. } => tag::HUB_BATTERY,
            Self::HubImu { .. } => tag::HUB_IMU,
            Self::MotorLimits { .. } => tag::MOTOR_LIMITS,
            Self::MotorState { .. } => tag::MOTOR_STATE,
            Self::ColorDistanceState { .. } => tag::COLOR_DISTANCE_STATE,
        }
    }

    /// Encode into wire bytes.
    pub fn encode(&self) -> EncodedRecord {
        let mut out = RecordWriter::new(self.tag());
        match *self {
            Self::HubDevices { device_types } => {
                for device_type in device_types {
                    out.u8(device_type as u8);
                }
            }
            Self::HubBattery { percentage } => out.u8(percentage),
            Self::HubImu {
                pitch,
                roll,
                heading,
            } => {
                out.i16(pitch);
                out.i16(roll);
                out.i16(heading);
            }
            Self::MotorLimits {
                port,
                speed,
                acceleration,
                torque,
            } => {
                out.u8(port.index());
                out.i16(speed);
                out.i16(acceleration);
                out.i16(torque);
            }
            Self::MotorState {
                port,
                angle,
                speed,
                load,
                stalled,
            } => {
                out.u8(port.index());
                out.i16(angle);
                out.i16(speed);
                out.i16(load);
                out.u8(u8::from(stalled));
            }
            Self::ColorDistanceState {
                port,
                hue,
                saturation,
                value,
                distance,
            } => {
                out.u8(port.index());
                out.i16(hue);
                out.i16(saturation);
                out.i16(value);
                out.i16(distance);
            }
        }
        out.finish()
    }

    /// Decode a record from wire bytes.
    ///
    /// # Errors
    /// Returns `CodecError` for empty input, unknown tags, length mismatches,
    /// and out-of-range port or device-type bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let (&tag, _) = bytes.split_first().ok_or(CodecError::Empty)?;
        let expected = record_len(tag).ok_or(CodecError::UnknownTag(tag))?;
        if bytes.len() != expected {
            return Err(CodecError::Length {
                tag,
                expected,
                actual: bytes.len(),
            });
        }

        let b = bytes;
        let record = match tag {
            tag::HUB_DEVICES => {
                let mut device_types = [DeviceType::None; PORT_COUNT];
                for (slot, &raw) in device_types.iter_mut().zip(&b[1..]) {
                    *slot = DeviceType::from_u8(raw).ok_or(CodecError::InvalidDeviceType(raw))?;
                }
                Self::HubDevices { device_types }
            }
            tag::HUB_BATTERY => Self::HubBattery { percentage: b[1] },
            tag::HUB_IMU => Self::HubImu {
                pitch: read_i16(b, 1),
                roll: read_i16(b, 3),
                heading: read_i16(b, 5),
            },
            tag::MOTOR_LIMITS => Self::MotorLimits {
                port: read_port(b[1])?,
                speed: read_i16(b, 2),
                acceleration: read_i16(b, 4),
                torque: read_i16(b, 6),
            },
            tag::MOTOR_STATE => Self::MotorState {
                port: read_port(b[1])?,
                angle: read_i16(b, 2),
                speed: read_i16(b, 4),
                load: read_i16(b, 6),
                stalled: b[8] != 0,
            },
            tag::COLOR_DISTANCE_STATE => Self::ColorDistanceState {
                port: read_port(b[1])?,
                hue: read_i16(b, 2),
                saturation: read_i16(b, 4),
                value: read_i16(b, 6),
                distance: read_i16(b, 8),
            },
            other => return Err(CodecError::UnknownTag(other)),
        };
        Ok(record)
    }
}

/// Saturating narrowing of a driver value into an i16 wire field.
#[inline]
pub fn saturate_i16(value: i32) -> i16 {
    value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

struct RecordWriter {
    buf: EncodedRecord,
}

impl RecordWriter {
    fn new(tag: u8) -> Self {
        let mut writer = Self {
            buf: EncodedRecord::new(),
        };
        writer.u8(tag);
        writer
    }

    fn put(&mut self, bytes: &[u8]) {
        let pushed = self.buf.extend_from_slice(bytes);
        debug_assert!(pushed.is_ok(), "record layout exceeds MAX_RECORD_LEN");
    }

    fn u8(&mut self, value: u8) {
        self.put(&[value]);
    }

    fn i16(&mut self, value: i16) {
        self.put(&value.to_le_bytes());
    }

    fn finish(self) -> EncodedRecord {
        self.buf
    }
}

#[inline]
fn read_i16(bytes: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

#[inline]
fn read_port(raw: u8) -> Result<Port, CodecError> {
    Port::from_index(raw).ok_or(CodecError::InvalidPort(raw))
}
