//! Hub Common Library
//!
//! Shared vocabulary for the hub node: ports and device categories, the
//! device capability interface, the telemetry and command wire formats,
//! and configuration loading.
//!
//! # Module Structure
//!
//! - [`consts`] - Wire sizes, opcode ranges, default cadences
//! - [`port`] - `Port`, `DeviceType`, `DeviceEntry`
//! - [`device`] - `PortDevice` capability trait and `DeviceError`
//! - [`hub`] - Hub profiles and hub-level services
//! - [`telemetry`] - Telemetry record codec
//! - [`frame`] - 9-byte command frame
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use hub_common::prelude::*;
//!
//! let record = TelemetryRecord::HubBattery { percentage: 87 };
//! assert_eq!(record.encode().as_slice(), &[0x11, 87]);
//! ```

pub mod config;
pub mod consts;
pub mod device;
pub mod frame;
pub mod hub;
pub mod port;
pub mod prelude;
pub mod telemetry;
