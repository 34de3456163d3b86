use super::{constrain_float, Esc, MotorOutput, MotorThrust};

/// Motor duty that keeps the vehicle hovering.
pub const HOVER_DUTY: f32 = 400.;

pub const MOTOR_MIN_DUTY: f32 = 0.;
pub const MOTOR_MAX_DUTY: f32 = 1000.;

/// Quad-copter in the X configuration.
///
/// Motors are ordered front-right, rear-left, front-left, rear-right.
/// Front-right and rear-left spin counter-clockwise.
pub struct QuadMotors<E> {
    motors: [E; 4],
    hover_duty: f32,
    is_started: bool,
    duties: [f32; 4],
}

impl<E: Esc> QuadMotors<E> {
    pub fn new(motors: [E; 4]) -> Self {
        Self {
            motors,
            hover_duty: HOVER_DUTY,
            is_started: false,
            duties: [MOTOR_MIN_DUTY; 4],
        }
    }

    /// Builder method to set the hover duty and return `self`
    pub fn with_hover_duty(mut self, duty: f32) -> Self {
        self.hover_duty = duty;
        self
    }

    pub fn is_started(&self) -> bool {
        self.is_started
    }

    /// Last duty sent to each motor, in `[MOTOR_MIN_DUTY, MOTOR_MAX_DUTY]`.
    pub fn duties(&self) -> [f32; 4] {
        self.duties
    }

    pub fn motors_mut(&mut self) -> &mut [E; 4] {
        &mut self.motors
    }

    fn output_duties(&mut self, duties: [f32; 4]) {
        for ((motor, slot), duty) in self.motors.iter_mut().zip(&mut self.duties).zip(duties) {
            let duty = constrain_float(duty, MOTOR_MIN_DUTY, MOTOR_MAX_DUTY);
            *slot = duty;
            motor.output((duty - MOTOR_MIN_DUTY) / (MOTOR_MAX_DUTY - MOTOR_MIN_DUTY));
        }
    }
}

impl<E: Esc> MotorOutput for QuadMotors<E> {
    fn start(&mut self) {
        for motor in &mut self.motors {
            motor.arm();
        }
        self.is_started = true;
    }

    fn stop(&mut self) {
        self.is_started = false;
        self.output_duties([MOTOR_MIN_DUTY; 4]);
    }

    fn output(&mut self, thrust: MotorThrust) {
        if !self.is_started {
            return;
        }

        let base = self.hover_duty + thrust.height;
        let MotorThrust {
            pitch, roll, yaw, ..
        } = thrust;

        // Pitching up speeds up the front, rolling right speeds up the left
        // and yawing right speeds up the counter-clockwise pair.
        self.output_duties([
            base + pitch - roll + yaw,
            base - pitch + roll + yaw,
            base + pitch + roll - yaw,
            base - pitch - roll - yaw,
        ]);
    }
}
