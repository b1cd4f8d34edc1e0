//! Telemetry codec properties.
//!
//! Every record decodes back to the value it was encoded from, for any field
//! values within their wire widths.

use hub_common::prelude::*;
use hub_common::telemetry::record_len;
use proptest::prelude::*;

fn port() -> impl Strategy<Value = Port> {
    (0u8..6).prop_map(|i| Port::from_index(i).unwrap())
}

fn device_type() -> impl Strategy<Value = DeviceType> {
    prop_oneof![
        Just(DeviceType::None),
        Just(DeviceType::Motor),
        Just(DeviceType::ColorDistanceSensor),
    ]
}

fn record() -> impl Strategy<Value = TelemetryRecord> {
    prop_oneof![
        prop::array::uniform6(device_type())
            .prop_map(|device_types| TelemetryRecord::HubDevices { device_types }),
        (0u8..=100).prop_map(|percentage| TelemetryRecord::HubBattery { percentage }),
        (any::<i16>(), any::<i16>(), any::<i16>()).prop_map(|(pitch, roll, heading)| {
            TelemetryRecord::HubImu {
                pitch,
                roll,
                heading,
            }
        }),
        (port(), any::<i16>(), any::<i16>(), any::<i16>()).prop_map(
            |(port, speed, acceleration, torque)| TelemetryRecord::MotorLimits {
                port,
                speed,
                acceleration,
                torque,
            }
        ),
        (port(), any::<i16>(), any::<i16>(), any::<i16>(), any::<bool>()).prop_map(
            |(port, angle, speed, load, stalled)| TelemetryRecord::MotorState {
                port,
                angle,
                speed,
                load,
                stalled,
            }
        ),
        (port(), any::<i16>(), any::<i16>(), any::<i16>(), any::<i16>()).prop_map(
            |(port, hue, saturation, value, distance)| TelemetryRecord::ColorDistanceState {
                port,
                hue,
                saturation,
                value,
                distance,
            }
        ),
    ]
}

proptest! {
    #[test]
    fn decode_inverts_encode(record in record()) {
        let bytes = record.encode();
        prop_assert_eq!(Some(bytes.len()), record_len(bytes[0]));
        prop_assert_eq!(TelemetryRecord::decode(&bytes), Ok(record));
    }

    #[test]
    fn frame_decode_inverts_encode(opcode in any::<u8>(), args in any::<[i16; 4]>()) {
        let frame = CommandFrame { opcode, args };
        prop_assert_eq!(CommandFrame::decode(&frame.encode()), Ok(frame));
    }

    #[test]
    fn truncated_records_never_decode(record in record(), cut in 1usize..10) {
        let bytes = record.encode();
        let cut = cut.min(bytes.len() - 1);
        prop_assert!(TelemetryRecord::decode(&bytes[..cut]).is_err());
    }
}
