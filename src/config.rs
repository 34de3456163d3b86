//! Flight configuration and the default constants of the airframe.
//!
//! Every value the control loop depends on is collected in [`FlightConfig`].
//! The defaults mirror the tuned values of the reference quad-copter.

use crate::error::ConfigError;
use embedded_time::{duration::Milliseconds, rate::Hertz};

/// Gravity at the reference site (in m/s^2).
pub const GRAVITY: f32 = 9.776;

/// Lower bound of every per-axis thrust contribution.
pub const THRUST_MIN: f32 = -125.;

/// Upper bound of every per-axis thrust contribution.
pub const THRUST_MAX: f32 = 125.;

/// Acceleration command range (in m/s^2).
pub const CMD_ACC_MIN: f32 = -1.;
pub const CMD_ACC_MAX: f32 = 1.;

/// Attitude command range (in degrees).
pub const CMD_PITCH_MIN: f32 = -20.;
pub const CMD_PITCH_MAX: f32 = 20.;
pub const CMD_ROLL_MIN: f32 = -20.;
pub const CMD_ROLL_MAX: f32 = 20.;

/// Yaw-rate command range (in degrees/second).
pub const CMD_YAW_RATE_MIN: f32 = -90.;
pub const CMD_YAW_RATE_MAX: f32 = 90.;

/// Gain mapping the vertical acceleration setpoint to height thrust.
pub const HEIGHT_THRUST_GAIN: f32 = 400.;

/// Base frequency of the hardware timer.
pub const CORE_TIMER_HZ: u32 = 1000;

/// The tick counter wraps back to zero after this many ticks.
pub const TIMER_CNT_MAX: u32 = 5000;

pub const READ_SENSOR_PERIOD_MS: u32 = 20;
pub const ESTIMATE_STATE_PERIOD_MS: u32 = 20;
pub const CONTROLLER_PERIOD_MS: u32 = 50;
pub const LISTEN_CMD_PERIOD_MS: u32 = 500;

/// Amount a single tuning command moves a gain.
pub const TUNING_STEP: f32 = 0.1;

/// The shape of the setpoints the pilot sends.
///
/// Exactly one mode is active for the lifetime of a [`FlightController`](crate::FlightController).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlMode {
    /// The pilot commands map-frame acceleration and yaw rate.
    Acceleration,
    /// The pilot commands pitch and roll angles, vertical acceleration and yaw rate.
    Attitude,
}

/// Controlled axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Pitch,
    Roll,
    Yaw,
}

/// Proportional, integral and derivative gains of one PID.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl PidGains {
    pub const fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self { kp, ki, kd }
    }
}

/// Initial gains of every PID in the cascade.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gains {
    pub attitude_pitch: PidGains,
    pub attitude_roll: PidGains,
    pub rate_pitch: PidGains,
    pub rate_roll: PidGains,
    pub rate_yaw: PidGains,
}

impl Default for Gains {
    fn default() -> Self {
        Self {
            attitude_pitch: PidGains::new(0., 0., 0.),
            attitude_roll: PidGains::new(0., 0., 0.),
            rate_pitch: PidGains::new(0.35, 0., 0.),
            rate_roll: PidGains::new(0.35, 0., 0.),
            rate_yaw: PidGains::new(0.05, 0., 0.),
        }
    }
}

/// Minimum and maximum of one command channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }
}

/// Extremes of every command channel.
///
/// The receiver quantizes stick extremes to exactly these values,
/// so they double as the sentinel encoding of arm, disarm and tuning commands.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CommandLimits {
    pub acc: Range,
    pub pitch: Range,
    pub roll: Range,
    pub yaw_rate: Range,
}

impl Default for CommandLimits {
    fn default() -> Self {
        Self {
            acc: Range::new(CMD_ACC_MIN, CMD_ACC_MAX),
            pitch: Range::new(CMD_PITCH_MIN, CMD_PITCH_MAX),
            roll: Range::new(CMD_ROLL_MIN, CMD_ROLL_MAX),
            yaw_rate: Range::new(CMD_YAW_RATE_MIN, CMD_YAW_RATE_MAX),
        }
    }
}

/// Periods of the four scheduled tasks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskPeriods {
    pub read_sensor: Milliseconds<u32>,
    pub estimate_state: Milliseconds<u32>,
    pub listen_command: Milliseconds<u32>,
    pub run_controller: Milliseconds<u32>,
}

impl Default for TaskPeriods {
    fn default() -> Self {
        Self {
            read_sensor: Milliseconds(READ_SENSOR_PERIOD_MS),
            estimate_state: Milliseconds(ESTIMATE_STATE_PERIOD_MS),
            listen_command: Milliseconds(LISTEN_CMD_PERIOD_MS),
            run_controller: Milliseconds(CONTROLLER_PERIOD_MS),
        }
    }
}

/// Tuning of the default complementary filter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EstimatorConfig {
    /// Weight of the integrated gyro against the accelerometer tilt, in 0 ~ 1.
    pub gyro_weight: f32,
    /// Gain of the pitch/roll gyro bias integrator.
    pub bias_gain: f32,
    /// Cutoff of the accelerometer low-pass filter (in hz).
    pub acc_cutoff_hz: f32,
    /// Static yaw-rate bias (in degrees/second).
    pub yaw_bias: f32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            gyro_weight: 0.98,
            bias_gain: 0.02,
            acc_cutoff_hz: 5.,
            yaw_bias: 0.,
        }
    }
}

/// Complete configuration of the flight core.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlightConfig {
    pub tick_rate: Hertz<u32>,
    /// Number of ticks after which the tick counter wraps.
    pub horizon: u32,
    pub periods: TaskPeriods,
    pub mode: ControlMode,
    pub gains: Gains,
    pub limits: CommandLimits,
    pub thrust_min: f32,
    pub thrust_max: f32,
    pub height_gain: f32,
    /// The attitude-rate PID nudged by tuning commands.
    pub tuning_axis: Axis,
    pub tuning_step: f32,
    pub estimator: EstimatorConfig,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self::new(ControlMode::Attitude)
    }
}

impl FlightConfig {
    /// Create a new config for the control `mode` with the airframe defaults.
    pub fn new(mode: ControlMode) -> Self {
        Self {
            tick_rate: Hertz(CORE_TIMER_HZ),
            horizon: TIMER_CNT_MAX,
            periods: TaskPeriods::default(),
            mode,
            gains: Gains::default(),
            limits: CommandLimits::default(),
            thrust_min: THRUST_MIN,
            thrust_max: THRUST_MAX,
            height_gain: HEIGHT_THRUST_GAIN,
            tuning_axis: Axis::Pitch,
            tuning_step: TUNING_STEP,
            estimator: EstimatorConfig::default(),
        }
    }

    /// Builder method to set `tick_rate` and return `self`
    pub fn with_tick_rate(mut self, tick_rate: Hertz<u32>) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    /// Builder method to set `horizon` and return `self`
    pub fn with_horizon(mut self, horizon: u32) -> Self {
        self.horizon = horizon;
        self
    }

    /// Builder method to set `periods` and return `self`
    pub fn with_periods(mut self, periods: TaskPeriods) -> Self {
        self.periods = periods;
        self
    }

    /// Builder method to set `gains` and return `self`
    pub fn with_gains(mut self, gains: Gains) -> Self {
        self.gains = gains;
        self
    }

    /// Builder method to set `limits` and return `self`
    pub fn with_limits(mut self, limits: CommandLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Builder method to set the thrust range and return `self`
    pub fn with_thrust_limits(mut self, min: f32, max: f32) -> Self {
        self.thrust_min = min;
        self.thrust_max = max;
        self
    }

    /// Builder method to set `height_gain` and return `self`
    pub fn with_height_gain(mut self, gain: f32) -> Self {
        self.height_gain = gain;
        self
    }

    /// Builder method to set `tuning_axis` and return `self`
    pub fn with_tuning_axis(mut self, axis: Axis) -> Self {
        self.tuning_axis = axis;
        self
    }

    /// Builder method to set `tuning_step` and return `self`
    pub fn with_tuning_step(mut self, step: f32) -> Self {
        self.tuning_step = step;
        self
    }

    /// Builder method to set `estimator` and return `self`
    pub fn with_estimator(mut self, estimator: EstimatorConfig) -> Self {
        self.estimator = estimator;
        self
    }

    /// Convert a task period to scheduler ticks.
    pub fn ticks(&self, period: Milliseconds<u32>) -> Result<u32, ConfigError> {
        if self.tick_rate.0 == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        if period.0 == 0 {
            return Err(ConfigError::ZeroPeriod);
        }

        let scaled = period
            .0
            .checked_mul(self.tick_rate.0)
            .ok_or(ConfigError::Overflow)?;
        if !scaled.is_multiple_of(1000) {
            return Err(ConfigError::FractionalPeriod(period.0));
        }

        Ok(scaled / 1000)
    }

    /// Check that every period is a whole number of ticks that evenly divides the horizon.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thrust_min > self.thrust_max {
            return Err(ConfigError::ThrustRange);
        }

        let periods = [
            self.periods.read_sensor,
            self.periods.estimate_state,
            self.periods.listen_command,
            self.periods.run_controller,
        ];
        for period in periods {
            let ticks = self.ticks(period)?;
            if self.horizon == 0 || !self.horizon.is_multiple_of(ticks) {
                return Err(ConfigError::HorizonNotMultiple {
                    horizon: self.horizon,
                    period: ticks,
                });
            }
        }

        Ok(())
    }
}
