//! Cascaded attitude controller.
//!
//! ```text
//! acceleration ─▶ [A] ─▶ attitude ─▶ [B] ─▶ attitude rate ─▶ [C] ─▶ thrust
//! ```
//!
//! Stage A is only used in [`ControlMode::Acceleration`]; in [`ControlMode::Attitude`]
//! the pilot commands the attitude directly. Yaw is never closed on angle,
//! its rate setpoint always comes from the pilot.

mod acceleration;
pub use acceleration::AccelerationController;

mod pid;
pub use pid::{Info, Pid};

use crate::{
    command::{Gain, GainNudge, Setpoint},
    config::{Axis, ControlMode, FlightConfig, PidGains},
    estimator::{Attitude, AttitudeEstimate},
    hal::MotorThrust,
};
use nalgebra::Vector2;

/// A stage of the cascade holding PIDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Attitude to attitude rate (pitch and roll only).
    Attitude,
    /// Attitude rate to thrust.
    Rate,
}

pub struct CascadedController {
    mode: ControlMode,
    acceleration: AccelerationController,
    attitude_pitch: Pid,
    attitude_roll: Pid,
    rate_pitch: Pid,
    rate_roll: Pid,
    rate_yaw: Pid,
    height_gain: f32,
    thrust_min: f32,
    thrust_max: f32,
    setpoint: Setpoint,
    estimate: AttitudeEstimate,
    attitude_setpoint: Attitude,
    rate_setpoint: Attitude,
}

impl CascadedController {
    /// Create a new controller run every `period_ms` milliseconds.
    pub fn new(config: &FlightConfig, period_ms: u32) -> Self {
        let gains = &config.gains;
        Self {
            mode: config.mode,
            acceleration: AccelerationController::new(crate::config::GRAVITY),
            attitude_pitch: Pid::new(gains.attitude_pitch, period_ms),
            attitude_roll: Pid::new(gains.attitude_roll, period_ms),
            rate_pitch: Pid::new(gains.rate_pitch, period_ms),
            rate_roll: Pid::new(gains.rate_roll, period_ms),
            rate_yaw: Pid::new(gains.rate_yaw, period_ms),
            height_gain: config.height_gain,
            thrust_min: config.thrust_min,
            thrust_max: config.thrust_max,
            setpoint: Setpoint::neutral(config.mode),
            estimate: AttitudeEstimate::default(),
            attitude_setpoint: Attitude::default(),
            rate_setpoint: Attitude::default(),
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    /// Set the period of every PID.
    pub fn set_period_ms(&mut self, period_ms: u32) {
        self.set_attitude_period_ms(period_ms);
        self.set_rate_period_ms(period_ms);
    }

    /// Set the period of the attitude stage PIDs.
    pub fn set_attitude_period_ms(&mut self, period_ms: u32) {
        self.attitude_pitch.set_period_ms(period_ms);
        self.attitude_roll.set_period_ms(period_ms);
    }

    /// Set the period of the attitude-rate stage PIDs.
    pub fn set_rate_period_ms(&mut self, period_ms: u32) {
        self.rate_pitch.set_period_ms(period_ms);
        self.rate_roll.set_period_ms(period_ms);
        self.rate_yaw.set_period_ms(period_ms);
    }

    /// Set the pilot setpoint.
    ///
    /// Returns `false` and keeps the previous setpoint if `setpoint` does not match the control mode.
    pub fn set_setpoint(&mut self, setpoint: Setpoint) -> bool {
        if setpoint.mode() != self.mode {
            return false;
        }
        self.setpoint = setpoint;
        true
    }

    pub fn setpoint(&self) -> &Setpoint {
        &self.setpoint
    }

    /// Set the current attitude and attitude rate.
    pub fn set_estimate(&mut self, estimate: AttitudeEstimate) {
        self.estimate = estimate;
    }

    pub fn estimate(&self) -> &AttitudeEstimate {
        &self.estimate
    }

    /// Attitude setpoint of the last run (yaw is unused).
    pub fn attitude_setpoint(&self) -> &Attitude {
        &self.attitude_setpoint
    }

    /// Attitude-rate setpoint of the last run.
    pub fn rate_setpoint(&self) -> &Attitude {
        &self.rate_setpoint
    }

    /// The PID of `axis` in `stage`, if that stage controls the axis.
    pub fn pid(&self, stage: Stage, axis: Axis) -> Option<&Pid> {
        match (stage, axis) {
            (Stage::Attitude, Axis::Pitch) => Some(&self.attitude_pitch),
            (Stage::Attitude, Axis::Roll) => Some(&self.attitude_roll),
            (Stage::Attitude, Axis::Yaw) => None,
            (Stage::Rate, Axis::Pitch) => Some(&self.rate_pitch),
            (Stage::Rate, Axis::Roll) => Some(&self.rate_roll),
            (Stage::Rate, Axis::Yaw) => Some(&self.rate_yaw),
        }
    }

    pub fn pid_mut(&mut self, stage: Stage, axis: Axis) -> Option<&mut Pid> {
        match (stage, axis) {
            (Stage::Attitude, Axis::Pitch) => Some(&mut self.attitude_pitch),
            (Stage::Attitude, Axis::Roll) => Some(&mut self.attitude_roll),
            (Stage::Attitude, Axis::Yaw) => None,
            (Stage::Rate, Axis::Pitch) => Some(&mut self.rate_pitch),
            (Stage::Rate, Axis::Roll) => Some(&mut self.rate_roll),
            (Stage::Rate, Axis::Yaw) => Some(&mut self.rate_yaw),
        }
    }

    /// Move one gain of the attitude-rate PID of `axis` by `step` and return the new gains.
    ///
    /// Gains never go below zero.
    pub fn tune(&mut self, axis: Axis, nudge: GainNudge, step: f32) -> PidGains {
        let delta = if nudge.increase { step } else { -step };
        let pid = match axis {
            Axis::Pitch => &mut self.rate_pitch,
            Axis::Roll => &mut self.rate_roll,
            Axis::Yaw => &mut self.rate_yaw,
        };

        match nudge.gain {
            Gain::Kp => pid.set_kp((pid.kp() + delta).max(0.)),
            Gain::Ki => pid.set_ki((pid.ki() + delta).max(0.)),
            Gain::Kd => pid.set_kd((pid.kd() + delta).max(0.)),
        }
        pid.gains()
    }

    /// Clear the history of every PID.
    pub fn reset(&mut self) {
        self.attitude_pitch.reset();
        self.attitude_roll.reset();
        self.rate_pitch.reset();
        self.rate_roll.reset();
        self.rate_yaw.reset();
        self.attitude_setpoint = Attitude::default();
        self.rate_setpoint = Attitude::default();
    }

    /// Run one control period and return the clamped per-axis thrust.
    pub fn run(&mut self) -> MotorThrust {
        let current = self.estimate.attitude;

        // Stage A
        let (pitch, roll, accel_z) = match self.setpoint {
            Setpoint::Acceleration { accel, .. } => {
                let (pitch, roll) = self
                    .acceleration
                    .attitude(Vector2::new(accel.x, accel.y), current.yaw);
                (pitch, roll, accel.z)
            }
            Setpoint::Attitude {
                pitch,
                roll,
                accel_z,
                ..
            } => (pitch, roll, accel_z),
        };
        self.attitude_setpoint = Attitude::new(0., pitch, roll);

        // Stage B
        self.rate_setpoint = Attitude::new(
            self.setpoint.yaw_rate(),
            self.attitude_pitch.update(pitch, current.pitch),
            self.attitude_roll.update(roll, current.roll),
        );

        // Stage C
        let rate = self.estimate.rate;
        let thrust = MotorThrust::new(
            self.rate_pitch.update(self.rate_setpoint.pitch, rate.pitch),
            self.rate_roll.update(self.rate_setpoint.roll, rate.roll),
            self.rate_yaw.update(self.rate_setpoint.yaw, rate.yaw),
            self.height_gain * accel_z,
        );

        thrust.constrain(self.thrust_min, self.thrust_max)
    }
}
