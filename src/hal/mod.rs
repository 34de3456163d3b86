//! Hardware abstraction layer.
//!
//! The flight core talks to the board only through these traits.

use crate::{command::Setpoint, estimator::SensorSample};

pub mod esc;
pub use esc::{Esc, RcEsc};

pub mod quad;
pub use quad::QuadMotors;

/// Per-axis thrust contributions produced by the controller, in thrust units.
///
/// `height` excludes the hover offset, which is added by the motor mixer.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MotorThrust {
    pub pitch: f32,
    pub roll: f32,
    pub yaw: f32,
    pub height: f32,
}

impl MotorThrust {
    pub const fn new(pitch: f32, roll: f32, yaw: f32, height: f32) -> Self {
        Self {
            pitch,
            roll,
            yaw,
            height,
        }
    }

    /// Constrain every axis to `[low, high]`.
    pub fn constrain(self, low: f32, high: f32) -> Self {
        Self {
            pitch: constrain_float(self.pitch, low, high),
            roll: constrain_float(self.roll, low, high),
            yaw: constrain_float(self.yaw, low, high),
            height: constrain_float(self.height, low, high),
        }
    }
}

/// Constrain `amt` to `[low, high]`, mapping NaN to the midpoint.
pub fn constrain_float(amt: f32, low: f32, high: f32) -> f32 {
    if amt.is_nan() {
        return (low + high) / 2.;
    }

    if amt < low {
        return low;
    }

    if amt > high {
        return high;
    }

    amt
}

/// Inertial measurement unit.
pub trait SensorSource {
    type Error: core::fmt::Debug;

    fn read(&mut self) -> Result<SensorSample, Self::Error>;
}

/// Pilot command receiver.
pub trait CommandSource {
    type Error: core::fmt::Debug;

    /// Receive the latest command.
    /// An error skips command processing for this tick.
    fn command(&mut self) -> Result<Setpoint, Self::Error>;
}

/// Motor stage of the vehicle.
pub trait MotorOutput {
    /// Spin up the motors.
    fn start(&mut self);

    /// Stop the motors.
    fn stop(&mut self);

    /// Output the thrust of one control tick.
    fn output(&mut self, thrust: MotorThrust);
}

impl<T: MotorOutput + ?Sized> MotorOutput for &mut T {
    fn start(&mut self) {
        (**self).start()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn output(&mut self, thrust: MotorThrust) {
        (**self).output(thrust)
    }
}

/// Status LED.
pub trait StatusIndicator {
    fn set_on(&mut self, on: bool);

    fn blink(&mut self, times: u8);
}

impl StatusIndicator for () {
    fn set_on(&mut self, _on: bool) {}

    fn blink(&mut self, _times: u8) {}
}
