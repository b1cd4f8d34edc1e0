//! Opcode dispatch tables.
//!
//! Each inbound channel owns one table: a 256-entry array indexed by opcode.
//! Tables are built once at startup and checked for completeness before the
//! scheduler starts. Looking up an opcode nobody registered is fatal.

use std::fmt;

use hub_common::device::DeviceError;
use hub_common::frame::{CommandArgs, CommandFrame};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::node::NodeResources;
use crate::scheduler::Flow;

/// Inbound command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Byte stream, read whenever input is waiting.
    Stream,
    /// Shared command slot, polled on a fixed period.
    Slot,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream => f.write_str("stream"),
            Self::Slot => f.write_str("slot"),
        }
    }
}

/// Errors raised while dispatching a command.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No handler registered for this opcode on this channel.
    #[error("Unknown command 0x{opcode:02X} on {channel} channel")]
    UnknownCommand {
        /// Channel the frame arrived on
        channel: ChannelKind,
        /// Offending opcode
        opcode: u8,
    },

    /// Startup completeness check found a routed command without a handler.
    #[error("No handler for 0x{opcode:02X} on {channel} channel")]
    MissingHandler {
        /// Channel that should carry the command
        channel: ChannelKind,
        /// Opcode that should be registered
        opcode: u8,
    },

    /// Handler rejected its arguments.
    #[error("Invalid argument for 0x{opcode:02X}: {reason}")]
    InvalidArgument {
        /// Command opcode
        opcode: u8,
        /// What was wrong
        reason: String,
    },

    /// Device refused or failed the command.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Hub peripheral failed.
    #[error("Hub service failed: {0}")]
    Hub(String),
}

impl DispatchError {
    /// Returns true for errors that indicate a host/node protocol mismatch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnknownCommand { .. })
    }
}

/// Command handler signature.
pub type CommandHandler = fn(&mut NodeResources, &CommandArgs) -> Result<Flow, DispatchError>;

type Registration = (&'static str, CommandHandler);

/// Opcode → handler table for one channel.
pub struct DispatchTable {
    channel: ChannelKind,
    handlers: [Option<Registration>; 256],
}

impl DispatchTable {
    /// Empty table for `channel`.
    pub fn new(channel: ChannelKind) -> Self {
        Self {
            channel,
            handlers: [None; 256],
        }
    }

    /// Channel this table serves.
    pub fn channel(&self) -> ChannelKind {
        self.channel
    }

    /// Register `handler` under `opcode`. A later registration replaces an
    /// earlier one.
    pub fn register(&mut self, opcode: u8, name: &'static str, handler: CommandHandler) {
        let slot = &mut self.handlers[opcode as usize];
        if let Some((previous, _)) = slot {
            debug!(
                "{} 0x{:02X}: {} replaces {}",
                self.channel, opcode, name, previous
            );
        } else {
            debug!("{} 0x{:02X}: {}", self.channel, opcode, name);
        }
        *slot = Some((name, handler));
    }

    /// Handler registered under `opcode`, with its name.
    pub fn handler(&self, opcode: u8) -> Option<(&'static str, CommandHandler)> {
        self.handlers[opcode as usize]
    }

    /// Fail unless `opcode` is registered.
    pub fn require(&self, opcode: u8) -> Result<(), DispatchError> {
        if self.handlers[opcode as usize].is_some() {
            Ok(())
        } else {
            Err(DispatchError::MissingHandler {
                channel: self.channel,
                opcode,
            })
        }
    }

    /// Registered opcodes in ascending order.
    pub fn opcodes(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=u8::MAX).filter(move |&op| self.handlers[op as usize].is_some())
    }

    /// Invoke the handler for `frame.opcode`.
    ///
    /// # Errors
    /// `DispatchError::UnknownCommand` if the opcode is unregistered, otherwise
    /// whatever the handler returns.
    pub fn dispatch(
        &self,
        frame: &CommandFrame,
        resources: &mut NodeResources,
    ) -> Result<Flow, DispatchError> {
        let (name, handler) =
            self.handler(frame.opcode)
                .ok_or(DispatchError::UnknownCommand {
                    channel: self.channel,
                    opcode: frame.opcode,
                })?;
        trace!(channel = %self.channel, opcode = frame.opcode, args = ?frame.args, "{}", name);
        handler(resources, &frame.args)
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("channel", &self.channel)
            .field("opcodes", &self.opcodes().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::resources;

    fn cont(_: &mut NodeResources, _: &CommandArgs) -> Result<Flow, DispatchError> {
        Ok(Flow::Continue)
    }

    fn stop(_: &mut NodeResources, _: &CommandArgs) -> Result<Flow, DispatchError> {
        Ok(Flow::Shutdown)
    }

    #[test]
    fn unregistered_opcode_is_unknown_command() {
        let table = DispatchTable::new(ChannelKind::Stream);
        let mut res = resources();
        let err = table
            .dispatch(&CommandFrame::new(0x55, &[]), &mut res)
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::UnknownCommand {
                channel: ChannelKind::Stream,
                opcode: 0x55
            }
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn last_registration_wins() {
        let mut table = DispatchTable::new(ChannelKind::Slot);
        table.register(0x41, "first", cont);
        table.register(0x41, "second", stop);
        let mut res = resources();
        assert_eq!(table.handler(0x41).map(|(n, _)| n), Some("second"));
        assert_eq!(
            table.dispatch(&CommandFrame::new(0x41, &[]), &mut res).unwrap(),
            Flow::Shutdown
        );
        assert_eq!(table.opcodes().collect::<Vec<_>>(), vec![0x41]);
    }

    #[test]
    fn require_reports_missing_opcode() {
        let mut table = DispatchTable::new(ChannelKind::Slot);
        table.register(0x00, "noop", cont);
        assert!(table.require(0x00).is_ok());
        assert!(matches!(
            table.require(0x41),
            Err(DispatchError::MissingHandler {
                channel: ChannelKind::Slot,
                opcode: 0x41
            })
        ));
    }

    #[test]
    fn tables_are_independent() {
        let mut stream = DispatchTable::new(ChannelKind::Stream);
        let slot = DispatchTable::new(ChannelKind::Slot);
        stream.register(0x20, "shutdown", stop);
        assert!(stream.handler(0x20).is_some());
        assert!(slot.handler(0x20).is_none());
    }
}
