//! Simulated tacho motor.

use std::sync::Arc;
use std::time::Duration;

use hub_common::device::{
    DeviceCommand, DeviceError, DeviceState, MotorLimits, MotorState, PortDevice,
};
use hub_common::port::{DeviceType, Port};
use parking_lot::Mutex;

use crate::clock::Clock;

const DEFAULT_LIMITS: MotorLimits = MotorLimits {
    speed: 1000,
    acceleration: 2000,
    torque: 560,
};

/// Load reported while the motor is held stalled [mNm].
const STALL_LOAD: i32 = 400;

#[derive(Debug)]
struct MotorModel {
    angle: f64,
    commanded_speed: i32,
    updated_at: Duration,
    stalled: bool,
    failing: bool,
    limits: MotorLimits,
}

impl MotorModel {
    /// Integrate the angle up to `now`.
    fn advance(&mut self, now: Duration) {
        let dt = now.saturating_sub(self.updated_at).as_secs_f64();
        self.updated_at = now;
        if !self.stalled {
            self.angle += f64::from(self.commanded_speed) * dt;
        }
    }
}

/// Caller-side view of a simulated motor.
#[derive(Debug, Clone)]
pub struct MotorHandle {
    model: Arc<Mutex<MotorModel>>,
}

impl MotorHandle {
    pub(super) fn new(now: Duration) -> Self {
        Self {
            model: Arc::new(Mutex::new(MotorModel {
                angle: 0.0,
                commanded_speed: 0,
                updated_at: now,
                stalled: false,
                failing: false,
                limits: DEFAULT_LIMITS,
            })),
        }
    }

    /// Last commanded speed [deg/s], after limiting.
    pub fn commanded_speed(&self) -> i32 {
        self.model.lock().commanded_speed
    }

    /// Angle as of the last query [deg].
    pub fn angle(&self) -> f64 {
        self.model.lock().angle
    }

    /// Hold the shaft (or release it).
    pub fn set_stalled(&self, stalled: bool) {
        self.model.lock().stalled = stalled;
    }

    /// Make every capability call fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.model.lock().failing = failing;
    }
}

/// `PortDevice` over a [`MotorHandle`].
pub struct SimMotor {
    port: Port,
    handle: MotorHandle,
    clock: Arc<dyn Clock>,
}

impl SimMotor {
    /// Motor on `port` sharing state with `handle`.
    pub fn new(port: Port, handle: MotorHandle, clock: Arc<dyn Clock>) -> Self {
        Self {
            port,
            handle,
            clock,
        }
    }

    fn check(&self, model: &MotorModel) -> Result<(), DeviceError> {
        if model.failing {
            return Err(DeviceError::failed(self.port, "simulated fault"));
        }
        Ok(())
    }
}

impl PortDevice for SimMotor {
    fn device_type(&self) -> DeviceType {
        DeviceType::Motor
    }

    fn port(&self) -> Port {
        self.port
    }

    fn query_state(&mut self) -> Result<DeviceState, DeviceError> {
        let mut model = self.handle.model.lock();
        self.check(&model)?;
        model.advance(self.clock.now());

        let (speed, load) = if model.stalled {
            (0, if model.commanded_speed != 0 { STALL_LOAD } else { 0 })
        } else {
            (model.commanded_speed, 0)
        };
        let stalled = model.stalled && model.commanded_speed != 0;
        Ok(DeviceState::Motor(MotorState {
            angle: model.angle.round() as i32,
            speed,
            load,
            stalled,
        }))
    }

    fn query_limits(&mut self) -> Result<Option<MotorLimits>, DeviceError> {
        let model = self.handle.model.lock();
        self.check(&model)?;
        Ok(Some(model.limits))
    }

    fn apply_command(&mut self, command: DeviceCommand) -> Result<(), DeviceError> {
        let mut model = self.handle.model.lock();
        self.check(&model)?;
        model.advance(self.clock.now());
        model.commanded_speed = match command {
            DeviceCommand::Run { speed } => speed.clamp(-model.limits.speed, model.limits.speed),
            DeviceCommand::Stop => 0,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn motor() -> (SimMotor, MotorHandle, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let handle = MotorHandle::new(clock.now());
        let motor = SimMotor::new(Port::A, handle.clone(), clock.clone());
        (motor, handle, clock)
    }

    #[test]
    fn angle_integrates_commanded_speed() {
        let (mut motor, handle, clock) = motor();
        motor.apply_command(DeviceCommand::Run { speed: 90 }).unwrap();
        clock.advance(Duration::from_secs(2));
        match motor.query_state().unwrap() {
            DeviceState::Motor(state) => {
                assert_eq!(state.angle, 180);
                assert_eq!(state.speed, 90);
                assert!(!state.stalled);
            }
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(handle.commanded_speed(), 90);
    }

    #[test]
    fn run_speed_is_limited() {
        let (mut motor, handle, _) = motor();
        motor.apply_command(DeviceCommand::Run { speed: -5000 }).unwrap();
        assert_eq!(handle.commanded_speed(), -DEFAULT_LIMITS.speed);
    }

    #[test]
    fn stalled_motor_holds_angle() {
        let (mut motor, handle, clock) = motor();
        motor.apply_command(DeviceCommand::Run { speed: 100 }).unwrap();
        handle.set_stalled(true);
        clock.advance(Duration::from_secs(1));
        let DeviceState::Motor(state) = motor.query_state().unwrap() else {
            panic!("not a motor state");
        };
        assert_eq!(state.angle, 0);
        assert!(state.stalled);
        assert_eq!(state.load, STALL_LOAD);
    }

    #[test]
    fn failing_motor_reports_operation_failed() {
        let (mut motor, handle, _) = motor();
        handle.set_failing(true);
        assert!(matches!(
            motor.query_state(),
            Err(DeviceError::OperationFailed { port: Port::A, .. })
        ));
        assert!(motor.apply_command(DeviceCommand::Stop).is_err());
        handle.set_failing(false);
        assert_eq!(motor.query_limits().unwrap(), Some(DEFAULT_LIMITS));
    }
}
