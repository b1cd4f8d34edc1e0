//! Fixtures for unit tests.

use std::sync::Arc;

use hub_common::hub::HubKind;
use hub_common::port::{DeviceType, Port};

use crate::clock::ManualClock;
use crate::node::NodeResources;
use crate::registry::DeviceRegistry;
use crate::simulation::SimulationBackend;
use crate::slots::{BroadcastBuffer, CommandSlot};

/// Technic hub with `attached` devices on a manual clock.
pub fn resources_with(attached: &[(Port, DeviceType)]) -> (NodeResources, SimulationBackend) {
    let sim = SimulationBackend::new(
        HubKind::TechnicHub,
        attached,
        7600,
        Arc::new(ManualClock::new()),
    );
    let devices = DeviceRegistry::probe(sim.kind().ports(), &sim.probe_list());
    let res = NodeResources::new(
        devices,
        sim.hub_services(),
        BroadcastBuffer::in_memory().unwrap(),
        CommandSlot::in_memory().unwrap(),
    );
    (res, sim)
}

/// Single motor on `port`.
pub fn resources_with_motor_on(port: Port) -> (NodeResources, SimulationBackend) {
    resources_with(&[(port, DeviceType::Motor)])
}

/// Nothing attached.
pub fn resources() -> NodeResources {
    resources_with(&[]).0
}
