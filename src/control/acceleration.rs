use nalgebra::{Rotation2, Vector2};
#[allow(unused_imports)]
use num_traits::Float;

/// Converts a horizontal map-frame acceleration into the pitch and roll
/// that tilt the thrust vector to produce it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AccelerationController {
    pub gravity: f32,
}

impl AccelerationController {
    pub fn new(gravity: f32) -> Self {
        Self { gravity }
    }

    /// Calculate the pitch and roll (in degrees) for the map-frame `accel_cmd` (in m/s^2)
    /// at the current `yaw` (in degrees).
    ///
    /// Accelerating forward needs the nose down, so pitch is negative.
    pub fn attitude(&self, accel_cmd: Vector2<f32>, yaw: f32) -> (f32, f32) {
        // 1. Rotate the command from the map frame into the heading frame
        let heading = Rotation2::new(-yaw.to_radians()) * accel_cmd;

        // 2. Tilt the thrust vector so its horizontal part produces the acceleration
        let pitch = -(heading.x / self.gravity).atan();
        let roll = (heading.y / self.gravity).atan();

        (pitch.to_degrees(), roll.to_degrees())
    }
}
