//! Command poller tasks, one per inbound channel.

use std::time::Duration;

use hub_common::consts::FRAME_LEN;
use hub_common::frame::CommandFrame;
use tracing::debug;

use crate::channel::StreamChannel;
use crate::dispatch::DispatchTable;
use crate::node::NodeResources;
use crate::scheduler::{Flow, Task, TaskError};

/// Reads one frame from the byte stream whenever input is waiting.
///
/// Handlers on this channel may block or end the node.
pub struct StreamCommandTask {
    channel: Box<dyn StreamChannel>,
    table: DispatchTable,
    period: Duration,
}

impl StreamCommandTask {
    /// Poller over `channel` dispatching through `table`.
    pub fn new(channel: Box<dyn StreamChannel>, table: DispatchTable, period: Duration) -> Self {
        Self {
            channel,
            table,
            period,
        }
    }
}

impl Task for StreamCommandTask {
    fn name(&self) -> &'static str {
        "stream_commands"
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn step(&mut self, res: &mut NodeResources) -> Result<Flow, TaskError> {
        if !self.channel.poll_ready()? {
            return Ok(Flow::Continue);
        }
        let mut buf = [0u8; FRAME_LEN];
        let len = self.channel.read_frame_bytes(&mut buf)?;
        if len == 0 {
            return Ok(Flow::Continue);
        }
        let frame = CommandFrame::decode(&buf[..len])?;
        debug!("stream <- 0x{:02X} {:?}", frame.opcode, frame.args);
        Ok(self.table.dispatch(&frame, res)?)
    }
}

/// Polls the shared command slot on a fixed period.
///
/// The slot is not cleared after reading, so a command that stays in place
/// is dispatched again on every poll.
pub struct SlotCommandTask {
    table: DispatchTable,
    period: Duration,
}

impl SlotCommandTask {
    /// Poller dispatching through `table` every `period`.
    pub fn new(table: DispatchTable, period: Duration) -> Self {
        Self { table, period }
    }
}

impl Task for SlotCommandTask {
    fn name(&self) -> &'static str {
        "slot_commands"
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn step(&mut self, res: &mut NodeResources) -> Result<Flow, TaskError> {
        let frame = res.inbound.read_frame()?;
        Ok(self.table.dispatch(&frame, res)?)
    }
}
