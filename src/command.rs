//! Pilot command interpretation.
//!
//! Arm, disarm and tuning requests are not separate messages: they are encoded as
//! combinations of stick extremes (sentinel patterns) on the regular setpoint channels.
//! The receiver quantizes extremes to exactly the configured limits,
//! so patterns are matched with exact float equality.

use crate::{
    config::{CommandLimits, ControlMode, Range},
    flight::FlightState,
};
use nalgebra::Vector3;

/// A pilot setpoint. The variant must match the configured [`ControlMode`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Setpoint {
    /// Map-frame acceleration (in m/s^2) and yaw rate (in degrees/second).
    Acceleration { accel: Vector3<f32>, yaw_rate: f32 },

    /// Pitch and roll (in degrees), vertical acceleration (in m/s^2) and yaw rate (in degrees/second).
    Attitude {
        pitch: f32,
        roll: f32,
        accel_z: f32,
        yaw_rate: f32,
    },
}

impl Default for Setpoint {
    fn default() -> Self {
        Setpoint::Attitude {
            pitch: 0.,
            roll: 0.,
            accel_z: 0.,
            yaw_rate: 0.,
        }
    }
}

impl Setpoint {
    /// A level, zero-acceleration setpoint for `mode`.
    pub fn neutral(mode: ControlMode) -> Self {
        match mode {
            ControlMode::Acceleration => Setpoint::Acceleration {
                accel: Vector3::zeros(),
                yaw_rate: 0.,
            },
            ControlMode::Attitude => Setpoint::default(),
        }
    }

    pub fn mode(&self) -> ControlMode {
        match self {
            Setpoint::Acceleration { .. } => ControlMode::Acceleration,
            Setpoint::Attitude { .. } => ControlMode::Attitude,
        }
    }

    pub fn yaw_rate(&self) -> f32 {
        match *self {
            Setpoint::Acceleration { yaw_rate, .. } | Setpoint::Attitude { yaw_rate, .. } => {
                yaw_rate
            }
        }
    }

    /// The four stick channels: `[x | pitch, y | roll, yaw rate, z]`.
    pub fn channels(&self) -> [f32; 4] {
        match *self {
            Setpoint::Acceleration { accel, yaw_rate } => [accel.x, accel.y, yaw_rate, accel.z],
            Setpoint::Attitude {
                pitch,
                roll,
                accel_z,
                yaw_rate,
            } => [pitch, roll, yaw_rate, accel_z],
        }
    }

    /// The range of each of the [`channels`](Self::channels).
    pub fn ranges(&self, limits: &CommandLimits) -> [Range; 4] {
        match self {
            Setpoint::Acceleration { .. } => [limits.acc, limits.acc, limits.yaw_rate, limits.acc],
            Setpoint::Attitude { .. } => [limits.pitch, limits.roll, limits.yaw_rate, limits.acc],
        }
    }

    /// Which channels sit exactly on their minimum or maximum.
    #[allow(clippy::float_cmp)]
    pub fn extremes(&self, limits: &CommandLimits) -> [Option<Extreme>; 4] {
        let channels = self.channels();
        let ranges = self.ranges(limits);

        let mut extremes = [None; 4];
        for (extreme, (value, range)) in extremes.iter_mut().zip(channels.iter().zip(ranges)) {
            *extreme = if *value == range.min {
                Some(Extreme::Min)
            } else if *value == range.max {
                Some(Extreme::Max)
            } else {
                None
            };
        }
        extremes
    }
}

/// A stick at one end of its range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Extreme {
    Min,
    Max,
}

/// A request encoded as a sentinel pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    Arm,
    CalibrateEsc,
    EnterTuning,
    ExitTuning,
    Disarm,
}

impl Intent {
    pub const ALL: [Intent; 5] = [
        Intent::Arm,
        Intent::CalibrateEsc,
        Intent::EnterTuning,
        Intent::ExitTuning,
        Intent::Disarm,
    ];

    /// The extremes of `[x | pitch, y | roll, yaw rate, z]` that encode this intent.
    pub const fn pattern(self) -> [Extreme; 4] {
        use Extreme::{Max, Min};

        match self {
            Intent::Arm => [Min, Min, Max, Min],
            Intent::CalibrateEsc => [Max, Max, Max, Max],
            Intent::EnterTuning => [Min, Min, Min, Min],
            Intent::ExitTuning => [Min, Max, Max, Min],
            Intent::Disarm => [Min, Max, Min, Min],
        }
    }

    /// Find the intent encoded by `setpoint`, if any.
    pub fn recognize(setpoint: &Setpoint, limits: &CommandLimits) -> Option<Intent> {
        let extremes = setpoint.extremes(limits);
        Intent::ALL.into_iter().find(|intent| {
            intent
                .pattern()
                .iter()
                .zip(extremes.iter())
                .all(|(expected, actual)| Some(*expected) == *actual)
        })
    }
}

/// A PID gain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gain {
    Kp,
    Ki,
    Kd,
}

/// A manual one-step gain change requested while tuning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GainNudge {
    pub gain: Gain,
    pub increase: bool,
}

impl GainNudge {
    /// The nudge selected by the first stick at an extreme:
    /// x or pitch for `kp`, y or roll for `kd`, yaw rate for `ki`.
    pub fn from_extremes(extremes: &[Option<Extreme>; 4]) -> Option<Self> {
        const GAINS: [Gain; 3] = [Gain::Kp, Gain::Kd, Gain::Ki];

        GAINS
            .iter()
            .zip(extremes.iter())
            .find_map(|(gain, extreme)| {
                extreme.map(|extreme| GainNudge {
                    gain: *gain,
                    increase: extreme == Extreme::Max,
                })
            })
    }
}

/// What the flight core should do with a received command.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Action {
    Arm,
    CalibrateEsc,
    EnterTuning,
    ExitTuning,
    Disarm,
    /// Use the command as the new controller setpoint.
    Forward(Setpoint),
    Tune(GainNudge),
    Ignore,
}

/// Classify a command given the current flight state.
///
/// Intents are only recognized in the state they leave:
/// arm and ESC calibration while disarmed, entering tuning while disarmed,
/// exiting tuning while tuning and disarm while armed.
/// Otherwise an armed vehicle forwards the command verbatim and a tuning vehicle
/// nudges a gain unless the command is itself a sentinel pattern.
pub fn classify(setpoint: &Setpoint, state: FlightState, limits: &CommandLimits) -> Action {
    let intent = Intent::recognize(setpoint, limits);

    match (state, intent) {
        (FlightState::Disarmed, Some(Intent::Arm)) => Action::Arm,
        (FlightState::Disarmed, Some(Intent::CalibrateEsc)) => Action::CalibrateEsc,
        (FlightState::Disarmed, Some(Intent::EnterTuning)) => Action::EnterTuning,
        (FlightState::Tuning, Some(Intent::ExitTuning)) => Action::ExitTuning,
        (FlightState::Armed, Some(Intent::Disarm)) => Action::Disarm,
        (FlightState::Armed, _) => Action::Forward(*setpoint),
        (FlightState::Tuning, None) => GainNudge::from_extremes(&setpoint.extremes(limits))
            .map(Action::Tune)
            .unwrap_or(Action::Ignore),
        (FlightState::Tuning, Some(_)) | (FlightState::Disarmed, _) => Action::Ignore,
    }
}
