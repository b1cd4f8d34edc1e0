//! # Hub Node
//!
//! Telemetry and command loop for a motion-controller hub.
//!
//! At startup the node probes the hub's ports, announces what it found, and
//! then runs a cooperative scheduler forever:
//!
//! - **Producers** sample the battery, IMU, motors and color/distance
//!   sensors and publish fixed-layout telemetry records into a single
//!   last-write-wins broadcast buffer.
//! - **Pollers** read 9-byte command frames from a byte stream (whenever
//!   input is waiting) and from a shared command slot (on a fixed period),
//!   and dispatch them through per-channel opcode tables.
//!
//! An opcode with no handler on its channel stops the node with an error.
//! A stream shutdown command powers the hub off and ends the loop.

#![deny(warnings)]
#![deny(missing_docs)]

pub mod channel;
pub mod clock;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod node;
pub mod pollers;
pub mod producers;
pub mod registry;
pub mod scheduler;
pub mod simulation;
pub mod slots;

#[cfg(test)]
pub(crate) mod testing;

pub use node::{NodeError, NodeResources, build_scheduler};
pub use scheduler::{ExitReason, Scheduler};
