use core::ops::{Add, Mul, Sub};

/// Smoothing factor of a first order low-pass filter sampled every `dt` seconds.
///
/// A non-positive cutoff or time-step disables filtering (alpha of 1).
pub fn alpha(dt: f32, cutoff_freq: f32) -> f32 {
    if dt <= 0. || cutoff_freq <= 0. {
        return 1.;
    }
    let rc = 1. / (2. * core::f32::consts::PI * cutoff_freq);
    dt / (dt + rc)
}

/// First order low-pass filter over scalars or vectors.
///
/// The first sample initialises the output directly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LowPassFilter<T> {
    output: T,
    is_initialised: bool,
}

impl<T: Default> Default for LowPassFilter<T> {
    fn default() -> Self {
        Self {
            output: T::default(),
            is_initialised: false,
        }
    }
}

impl<T> LowPassFilter<T>
where
    T: Copy + Add<Output = T> + Sub<Output = T> + Mul<f32, Output = T>,
{
    /// Apply a new sample with smoothing factor `alpha` (see [`alpha`]) and return the output.
    pub fn apply(&mut self, sample: T, alpha: f32) -> T {
        self.output = if self.is_initialised {
            self.output + (sample - self.output) * alpha
        } else {
            self.is_initialised = true;
            sample
        };
        self.output
    }

    pub fn output(&self) -> T {
        self.output
    }

    pub fn is_initialised(&self) -> bool {
        self.is_initialised
    }

    pub fn reset(&mut self, value: T) {
        self.is_initialised = true;
        self.output = value;
    }
}
