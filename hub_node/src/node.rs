//! Node assembly.
//!
//! `NodeResources` bundles everything tasks and command handlers share.
//! `build_scheduler` wires the resources, the dispatch tables and the
//! standard task set into a ready-to-run [`Scheduler`].

use std::sync::Arc;
use std::time::Duration;

use hub_common::config::ConfigError;
use hub_common::hub::HubServices;
use hub_shared_memory::ShmError;
use thiserror::Error;
use tracing::info;

use crate::channel::StreamChannel;
use crate::clock::Clock;
use crate::commands::build_tables;
use crate::config::NodeConfig;
use crate::dispatch::DispatchError;
use crate::pollers::{SlotCommandTask, StreamCommandTask};
use crate::producers::{BatteryTask, ColorDistanceTask, ImuTask, MotorStateTask, announce};
use crate::registry::DeviceRegistry;
use crate::scheduler::{Scheduler, SchedulerError};
use crate::slots::{BroadcastBuffer, CommandSlot};

/// Top-level node failure.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Dispatch tables are incomplete.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Shared slot could not be created or written.
    #[error(transparent)]
    Shm(#[from] ShmError),

    /// Scheduler stopped on a fatal task error.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// State shared by tasks and command handlers.
///
/// Only one task step runs at a time, so plain ownership is enough.
pub struct NodeResources {
    /// Probed devices
    pub devices: DeviceRegistry,
    /// Hub peripherals
    pub hub: Box<dyn HubServices>,
    /// Outbound telemetry
    pub broadcast: BroadcastBuffer,
    /// Inbound command slot
    pub inbound: CommandSlot,
}

impl NodeResources {
    /// Bundle the node's shared state.
    pub fn new(
        devices: DeviceRegistry,
        hub: Box<dyn HubServices>,
        broadcast: BroadcastBuffer,
        inbound: CommandSlot,
    ) -> Self {
        Self {
            devices,
            hub,
            broadcast,
            inbound,
        }
    }
}

/// Build the scheduler for `config`.
///
/// Publishes the startup announcements, then registers tasks in this order:
/// battery, IMU, motor state, color/distance, stream commands, slot commands.
pub fn build_scheduler(
    config: &NodeConfig,
    mut resources: NodeResources,
    stream: Box<dyn StreamChannel>,
    clock: Arc<dyn Clock>,
) -> Result<Scheduler, NodeError> {
    let (stream_table, slot_table) = build_tables(&config.commands)?;
    info!(
        "Dispatch tables ready: stream {:?}, slot {:?}",
        stream_table.opcodes().collect::<Vec<_>>(),
        slot_table.opcodes().collect::<Vec<_>>()
    );

    announce(&mut resources)?;

    let timing = &config.timing;
    let ms = Duration::from_millis;
    let mut scheduler = Scheduler::new(resources, clock, timing.scheduler_options());
    scheduler.add_task(Box::new(BatteryTask::new(ms(timing.battery_period_ms))));
    scheduler.add_task(Box::new(ImuTask::new(ms(timing.imu_period_ms))));
    scheduler.add_task(Box::new(MotorStateTask::new(ms(timing.motor_state_period_ms))));
    scheduler.add_task(Box::new(ColorDistanceTask::new(ms(
        timing.color_distance_period_ms,
    ))));
    scheduler.add_task(Box::new(StreamCommandTask::new(
        stream,
        stream_table,
        ms(timing.stream_period_ms),
    )));
    scheduler.add_task(Box::new(SlotCommandTask::new(
        slot_table,
        ms(timing.command_slot_period_ms),
    )));
    Ok(scheduler)
}
