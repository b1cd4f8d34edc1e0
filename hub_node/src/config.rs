//! Node configuration (`hub.toml`).
//!
//! Every section is optional; a missing file section takes its defaults.
//!
//! ```toml
//! [shared]
//! node_name = "hub-01"
//!
//! [hub]
//! kind = "prime_hub"
//!
//! [timing]
//! motor_state_period_ms = 50
//!
//! [commands]
//! motor_stop = "slot"
//!
//! [shared_memory]
//! telemetry_path = "/dev/shm/hub_telemetry"
//! command_path = "/dev/shm/hub_commands"
//!
//! [simulation]
//! ports = { A = "motor", C = "color_distance_sensor" }
//! battery_mv = 7600
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hub_common::config::{ConfigError, ConfigLoader, SharedConfig};
use hub_common::consts::{BATTERY_PERIOD_MS, COMMAND_SLOT_PERIOD_MS, TELEMETRY_PERIOD_MS};
use hub_common::hub::HubKind;
use hub_common::port::{DeviceType, Port};
use serde::{Deserialize, Serialize};

use crate::commands::CommandRoutes;
use crate::dispatch::ChannelKind;
use crate::scheduler::SchedulerOptions;

/// Hub model selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubSection {
    /// Hub model; selects the ports and battery curve.
    #[serde(default)]
    pub kind: HubKind,
}

const fn default_battery_period_ms() -> u64 {
    BATTERY_PERIOD_MS
}

const fn default_telemetry_period_ms() -> u64 {
    TELEMETRY_PERIOD_MS
}

const fn default_command_slot_period_ms() -> u64 {
    COMMAND_SLOT_PERIOD_MS
}

const fn default_idle_sleep_ms() -> u64 {
    1
}

const fn default_stats_interval_passes() -> u64 {
    10_000
}

/// Task periods and scheduler tuning, all in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Battery percentage (0x11)
    #[serde(default = "default_battery_period_ms")]
    pub battery_period_ms: u64,
    /// Hub IMU (0x12)
    #[serde(default = "default_telemetry_period_ms")]
    pub imu_period_ms: u64,
    /// Motor state (0x21)
    #[serde(default = "default_telemetry_period_ms")]
    pub motor_state_period_ms: u64,
    /// Color/distance state (0x30)
    #[serde(default = "default_telemetry_period_ms")]
    pub color_distance_period_ms: u64,
    /// Shared command slot poll
    #[serde(default = "default_command_slot_period_ms")]
    pub command_slot_period_ms: u64,
    /// Stream channel poll; zero polls on every pass
    #[serde(default)]
    pub stream_period_ms: u64,
    /// Minimum sleep between scheduler passes
    #[serde(default = "default_idle_sleep_ms")]
    pub idle_sleep_ms: u64,
    /// Statistics log interval in passes (0 disables)
    #[serde(default = "default_stats_interval_passes")]
    pub stats_interval_passes: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            battery_period_ms: default_battery_period_ms(),
            imu_period_ms: default_telemetry_period_ms(),
            motor_state_period_ms: default_telemetry_period_ms(),
            color_distance_period_ms: default_telemetry_period_ms(),
            command_slot_period_ms: default_command_slot_period_ms(),
            stream_period_ms: 0,
            idle_sleep_ms: default_idle_sleep_ms(),
            stats_interval_passes: default_stats_interval_passes(),
        }
    }
}

impl TimingConfig {
    /// Periods that must be non-zero, with their names.
    fn periodic(&self) -> [(&'static str, u64); 5] {
        [
            ("battery_period_ms", self.battery_period_ms),
            ("imu_period_ms", self.imu_period_ms),
            ("motor_state_period_ms", self.motor_state_period_ms),
            ("color_distance_period_ms", self.color_distance_period_ms),
            ("command_slot_period_ms", self.command_slot_period_ms),
        ]
    }

    /// Scheduler options derived from this section.
    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            idle_sleep: Duration::from_millis(self.idle_sleep_ms),
            stats_interval_passes: self.stats_interval_passes,
        }
    }
}

/// Optional file backing for the two shared slots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SharedMemoryConfig {
    /// Broadcast buffer file; in-process when unset
    #[serde(default)]
    pub telemetry_path: Option<PathBuf>,
    /// Command slot file; in-process when unset
    #[serde(default)]
    pub command_path: Option<PathBuf>,
}

const fn default_battery_mv() -> u32 {
    7600
}

/// Simulated devices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Port letter → attached device
    #[serde(default)]
    pub ports: BTreeMap<String, DeviceType>,
    /// Pack voltage [mV]
    #[serde(default = "default_battery_mv")]
    pub battery_mv: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ports: BTreeMap::new(),
            battery_mv: default_battery_mv(),
        }
    }
}

/// Complete node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Common fields.
    #[serde(default)]
    pub shared: SharedConfig,
    /// Hub model.
    #[serde(default)]
    pub hub: HubSection,
    /// Task periods.
    #[serde(default)]
    pub timing: TimingConfig,
    /// Command channel assignment.
    #[serde(default)]
    pub commands: CommandRoutes,
    /// Slot files.
    #[serde(default)]
    pub shared_memory: SharedMemoryConfig,
    /// Simulated devices.
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl NodeConfig {
    /// Load from a TOML file and validate.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    /// `ConfigError::ValidationError` naming the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        for (name, value) in self.timing.periodic() {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "timing.{name} must be greater than 0"
                )));
            }
        }

        if self.commands.shutdown != ChannelKind::Stream {
            return Err(ConfigError::ValidationError(
                "commands.shutdown must be routed to the stream channel".to_string(),
            ));
        }

        self.simulated_ports()?;
        Ok(())
    }

    /// Simulated devices as typed ports, in port order.
    ///
    /// # Errors
    /// `ConfigError::ValidationError` for a key that is not a port letter or
    /// names a port the configured hub does not have, or for two keys naming
    /// the same port (`a` and `A`).
    pub fn simulated_ports(&self) -> Result<Vec<(Port, DeviceType)>, ConfigError> {
        let mut ports = Vec::with_capacity(self.simulation.ports.len());
        for (key, &device_type) in &self.simulation.ports {
            let mut chars = key.chars();
            let port = match (chars.next(), chars.next()) {
                (Some(letter), None) => Port::from_letter(letter),
                _ => None,
            }
            .ok_or_else(|| {
                ConfigError::ValidationError(format!("simulation.ports: '{key}' is not a port"))
            })?;
            if !self.hub.kind.has_port(port) {
                return Err(ConfigError::ValidationError(format!(
                    "simulation.ports: {:?} has no port {}",
                    self.hub.kind, port
                )));
            }
            if ports.iter().any(|(seen, _)| *seen == port) {
                return Err(ConfigError::ValidationError(format!(
                    "simulation.ports: port {port} is listed twice"
                )));
            }
            ports.push((port, device_type));
        }
        ports.sort_by_key(|(port, _)| *port);
        Ok(ports)
    }
}
