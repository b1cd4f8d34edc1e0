//! Built-in command set and channel routing.
//!
//! | opcode | command    | args                  | default channel |
//! |--------|------------|-----------------------|-----------------|
//! | 0x00   | no-op      |                       | slot (fixed)    |
//! | 0x20   | shutdown   |                       | stream          |
//! | 0x30   | light on   | hue, saturation, value| stream          |
//! | 0x31   | light off  |                       | stream          |
//! | 0x40   | motor stop | port                  | stream          |
//! | 0x41   | motor run  | port, speed [deg/s]   | slot            |

use hub_common::device::DeviceCommand;
use hub_common::frame::CommandArgs;
use hub_common::hub::LightColor;
use hub_common::port::{DeviceType, Port};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dispatch::{ChannelKind, CommandHandler, DispatchError, DispatchTable};
use crate::node::NodeResources;
use crate::scheduler::Flow;

/// Command opcodes.
pub mod opcode {
    /// Do nothing; the content of a command slot nobody has written.
    pub const NOOP: u8 = 0x00;
    /// Power the hub off and stop the node.
    pub const SHUTDOWN: u8 = 0x20;
    /// Status light on.
    pub const LIGHT_ON: u8 = 0x30;
    /// Status light off.
    pub const LIGHT_OFF: u8 = 0x31;
    /// Stop a motor.
    pub const MOTOR_STOP: u8 = 0x40;
    /// Run a motor at constant speed.
    pub const MOTOR_RUN: u8 = 0x41;
}

/// Routable commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// 0x20
    Shutdown,
    /// 0x30
    LightOn,
    /// 0x31
    LightOff,
    /// 0x40
    MotorStop,
    /// 0x41
    MotorRun,
}

impl Command {
    /// Every routable command.
    pub const ALL: [Command; 5] = [
        Command::Shutdown,
        Command::LightOn,
        Command::LightOff,
        Command::MotorStop,
        Command::MotorRun,
    ];

    /// Wire opcode.
    pub const fn opcode(self) -> u8 {
        match self {
            Self::Shutdown => opcode::SHUTDOWN,
            Self::LightOn => opcode::LIGHT_ON,
            Self::LightOff => opcode::LIGHT_OFF,
            Self::MotorStop => opcode::MOTOR_STOP,
            Self::MotorRun => opcode::MOTOR_RUN,
        }
    }

    /// Name used in logs and config keys.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Shutdown => "shutdown",
            Self::LightOn => "light_on",
            Self::LightOff => "light_off",
            Self::MotorStop => "motor_stop",
            Self::MotorRun => "motor_run",
        }
    }

    /// Handler implementing the command.
    pub fn handler(self) -> CommandHandler {
        match self {
            Self::Shutdown => shutdown,
            Self::LightOn => light_on,
            Self::LightOff => light_off,
            Self::MotorStop => motor_stop,
            Self::MotorRun => motor_run,
        }
    }
}

fn default_stream() -> ChannelKind {
    ChannelKind::Stream
}

fn default_slot() -> ChannelKind {
    ChannelKind::Slot
}

/// Channel assignment per command.
///
/// # TOML Example
///
/// ```toml
/// [commands]
/// motor_stop = "slot"
/// motor_run = "slot"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandRoutes {
    /// Must stay on the stream channel.
    #[serde(default = "default_stream")]
    pub shutdown: ChannelKind,
    /// Hub status light on.
    #[serde(default = "default_stream")]
    pub light_on: ChannelKind,
    /// Hub status light off.
    #[serde(default = "default_stream")]
    pub light_off: ChannelKind,
    /// Stop one motor.
    #[serde(default = "default_stream")]
    pub motor_stop: ChannelKind,
    /// Run one motor at a speed. Defaults to the slot channel.
    #[serde(default = "default_slot")]
    pub motor_run: ChannelKind,
}

impl Default for CommandRoutes {
    fn default() -> Self {
        Self {
            shutdown: default_stream(),
            light_on: default_stream(),
            light_off: default_stream(),
            motor_stop: default_stream(),
            motor_run: default_slot(),
        }
    }
}

impl CommandRoutes {
    /// Channel carrying `command`.
    pub fn channel(&self, command: Command) -> ChannelKind {
        match command {
            Command::Shutdown => self.shutdown,
            Command::LightOn => self.light_on,
            Command::LightOff => self.light_off,
            Command::MotorStop => self.motor_stop,
            Command::MotorRun => self.motor_run,
        }
    }
}

/// Build the stream and slot tables for `routes`, then check that every
/// routed command landed in its table.
pub fn build_tables(
    routes: &CommandRoutes,
) -> Result<(DispatchTable, DispatchTable), DispatchError> {
    let mut stream = DispatchTable::new(ChannelKind::Stream);
    let mut slot = DispatchTable::new(ChannelKind::Slot);

    slot.register(opcode::NOOP, "noop", noop);
    for command in Command::ALL {
        let table = match routes.channel(command) {
            ChannelKind::Stream => &mut stream,
            ChannelKind::Slot => &mut slot,
        };
        table.register(command.opcode(), command.name(), command.handler());
    }

    slot.require(opcode::NOOP)?;
    for command in Command::ALL {
        match routes.channel(command) {
            ChannelKind::Stream => stream.require(command.opcode())?,
            ChannelKind::Slot => slot.require(command.opcode())?,
        }
    }
    Ok((stream, slot))
}

fn noop(_: &mut NodeResources, _: &CommandArgs) -> Result<Flow, DispatchError> {
    Ok(Flow::Continue)
}

fn shutdown(res: &mut NodeResources, _: &CommandArgs) -> Result<Flow, DispatchError> {
    info!("Shutdown requested, powering off");
    res.hub.power_off();
    Ok(Flow::Shutdown)
}

fn light_on(res: &mut NodeResources, args: &CommandArgs) -> Result<Flow, DispatchError> {
    let color = LightColor {
        hue: args[0],
        saturation: args[1],
        value: args[2],
    };
    res.hub.light_on(color).map_err(DispatchError::Hub)?;
    Ok(Flow::Continue)
}

fn light_off(res: &mut NodeResources, _: &CommandArgs) -> Result<Flow, DispatchError> {
    res.hub.light_off().map_err(DispatchError::Hub)?;
    Ok(Flow::Continue)
}

fn motor_stop(res: &mut NodeResources, args: &CommandArgs) -> Result<Flow, DispatchError> {
    apply_to_motor(res, opcode::MOTOR_STOP, args[0], DeviceCommand::Stop)
}

fn motor_run(res: &mut NodeResources, args: &CommandArgs) -> Result<Flow, DispatchError> {
    let speed = i32::from(args[1]);
    apply_to_motor(res, opcode::MOTOR_RUN, args[0], DeviceCommand::Run { speed })
}

fn apply_to_motor(
    res: &mut NodeResources,
    opcode: u8,
    raw_port: i16,
    command: DeviceCommand,
) -> Result<Flow, DispatchError> {
    let port = u8::try_from(raw_port)
        .ok()
        .and_then(Port::from_index)
        .ok_or_else(|| DispatchError::InvalidArgument {
            opcode,
            reason: format!("port index {raw_port} out of range"),
        })?;

    if res.devices.device_type(port) != DeviceType::Motor {
        return Err(DispatchError::InvalidArgument {
            opcode,
            reason: format!("no motor on port {port}"),
        });
    }
    let motor = res
        .devices
        .device_mut(port)
        .ok_or_else(|| DispatchError::InvalidArgument {
            opcode,
            reason: format!("no motor on port {port}"),
        })?;
    motor.apply_command(command)?;
    Ok(Flow::Continue)
}
