//! Attitude and attitude-rate estimation from raw inertial samples.
//!
//! The flight core only depends on the [`StateEstimator`] contract,
//! a pure function from the previous filter state and a new sample to the next
//! filter state and an [`AttitudeEstimate`].
//! [`ComplementaryFilter`] is the default implementation.

use crate::{
    config::EstimatorConfig,
    filter::{alpha, LowPassFilter},
};
use nalgebra::Vector3;
#[allow(unused_imports)]
use num_traits::Float;

/// Yaw, pitch and roll (in degrees, or degrees/second for rates).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Attitude {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl Attitude {
    pub const fn new(yaw: f32, pitch: f32, roll: f32) -> Self {
        Self { yaw, pitch, roll }
    }
}

/// One read of the gyroscope and accelerometer in the body frame.
///
/// `gyro` is in degrees/second with `x` about the roll axis, `y` about the pitch axis
/// and `z` about the yaw axis. `acc` is in m/s^2.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorSample {
    pub gyro: Vector3<f32>,
    pub acc: Vector3<f32>,
}

impl SensorSample {
    pub fn new(gyro: Vector3<f32>, acc: Vector3<f32>) -> Self {
        Self { gyro, acc }
    }
}

/// The current orientation and angular rate, always produced together.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AttitudeEstimate {
    pub attitude: Attitude,
    pub rate: Attitude,
}

/// Fuses inertial samples into an attitude estimate.
pub trait StateEstimator {
    /// Internal filter state carried between samples.
    type State: Clone;

    /// The filter state before the first sample.
    fn initial_state(&self) -> Self::State;

    /// Fuse a new sample with the previous state.
    ///
    /// This must be deterministic and free of side effects.
    fn estimate(&self, state: &Self::State, sample: &SensorSample)
        -> (Self::State, AttitudeEstimate);
}

/// Filter state of a [`ComplementaryFilter`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterState {
    pub attitude: Attitude,
    /// Gyro bias (in degrees/second).
    pub bias: Vector3<f32>,
    /// Low-pass filtered accelerometer.
    pub acc: LowPassFilter<Vector3<f32>>,
}

/// Complementary filter blending integrated gyro rates with the accelerometer's gravity vector.
///
/// Pitch and roll gyro bias is learned from the disagreement between the two,
/// yaw is integrated from the bias-corrected gyro only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ComplementaryFilter {
    /// Time-step between samples (in seconds).
    dt: f32,
    gyro_weight: f32,
    bias_gain: f32,
    acc_alpha: f32,
    yaw_bias: f32,
}

impl ComplementaryFilter {
    /// Create a new filter sampled every `dt` seconds.
    pub fn new(config: EstimatorConfig, dt: f32) -> Self {
        Self {
            dt,
            gyro_weight: config.gyro_weight.clamp(0., 1.),
            bias_gain: config.bias_gain,
            acc_alpha: alpha(dt, config.acc_cutoff_hz),
            yaw_bias: config.yaw_bias,
        }
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }
}

impl StateEstimator for ComplementaryFilter {
    type State = FilterState;

    fn initial_state(&self) -> FilterState {
        FilterState {
            attitude: Attitude::default(),
            bias: Vector3::new(0., 0., self.yaw_bias),
            acc: LowPassFilter::default(),
        }
    }

    fn estimate(&self, state: &FilterState, sample: &SensorSample) -> (FilterState, AttitudeEstimate) {
        let mut next = *state;
        let acc = next.acc.apply(sample.acc, self.acc_alpha);
        let (tilt_pitch, tilt_roll) = tilt(&acc);

        let gyro = sample.gyro - state.bias;
        let rate = Attitude::new(gyro.z, gyro.y, gyro.x);

        if !state.acc.is_initialised() {
            // Start level with gravity and facing yaw 0
            next.attitude = Attitude::new(0., tilt_pitch, tilt_roll);
            return (next, AttitudeEstimate { attitude: next.attitude, rate });
        }

        let predicted_pitch = state.attitude.pitch + rate.pitch * self.dt;
        let predicted_roll = state.attitude.roll + rate.roll * self.dt;
        let yaw = state.attitude.yaw + rate.yaw * self.dt;
        // Hold the heading through a corrupted gyro sample
        let yaw = if yaw.is_finite() {
            wrap_180(yaw)
        } else {
            state.attitude.yaw
        };

        let pitch_error = tilt_pitch - predicted_pitch;
        let roll_error = tilt_roll - predicted_roll;

        let acc_weight = 1. - self.gyro_weight;
        next.attitude = Attitude::new(
            yaw,
            predicted_pitch + acc_weight * pitch_error,
            predicted_roll + acc_weight * roll_error,
        );

        // Lagging gravity means the gyro under-reads
        next.bias.x -= self.bias_gain * roll_error;
        next.bias.y -= self.bias_gain * pitch_error;

        (
            next,
            AttitudeEstimate {
                attitude: next.attitude,
                rate,
            },
        )
    }
}

/// Pitch and roll (in degrees) of the body given the measured gravity vector.
fn tilt(acc: &Vector3<f32>) -> (f32, f32) {
    let roll = acc.y.atan2(acc.z);
    let pitch = (-acc.x).atan2((acc.y * acc.y + acc.z * acc.z).sqrt());
    (pitch.to_degrees(), roll.to_degrees())
}

/// Wrap a finite angle in degrees to (-180, 180].
fn wrap_180(angle: f32) -> f32 {
    let angle = angle % 360.;
    if angle > 180. {
        angle - 360.
    } else if angle <= -180. {
        angle + 360.
    } else {
        angle
    }
}
