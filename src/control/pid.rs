use crate::config::PidGains;

/// The terms of the last PID update, for logging.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Info {
    pub target: f32,
    pub actual: f32,
    pub error: f32,
    pub p: f32,
    pub i: f32,
    pub d: f32,
}

/// PID controller run at a fixed period.
///
/// The time-step is derived from the configured period rather than measured,
/// so the controller must be updated exactly once per period.
#[derive(Clone, Debug, PartialEq)]
pub struct Pid {
    kp: f32,
    ki: f32,
    kd: f32,
    period_ms: u32,
    // Timestep in seconds
    dt: f32,
    // Integral of the error over time
    integrator: f32,
    error: f32,
    // Set until the first update after a reset, which has no derivative
    reset_filter: bool,
    info: Info,
}

impl Pid {
    pub fn new(gains: PidGains, period_ms: u32) -> Self {
        Self {
            kp: gains.kp,
            ki: gains.ki,
            kd: gains.kd,
            period_ms,
            dt: period_ms as f32 / 1000.,
            integrator: 0.,
            error: 0.,
            reset_filter: true,
            info: Info::default(),
        }
    }

    pub fn kp(&self) -> f32 {
        self.kp
    }

    pub fn ki(&self) -> f32 {
        self.ki
    }

    pub fn kd(&self) -> f32 {
        self.kd
    }

    pub fn set_kp(&mut self, kp: f32) {
        self.kp = kp;
    }

    pub fn set_ki(&mut self, ki: f32) {
        self.ki = ki;
    }

    pub fn set_kd(&mut self, kd: f32) {
        self.kd = kd;
    }

    pub fn gains(&self) -> PidGains {
        PidGains::new(self.kp, self.ki, self.kd)
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.kp = gains.kp;
        self.ki = gains.ki;
        self.kd = gains.kd;
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    /// Set the period this controller is updated at (in milliseconds).
    pub fn set_period_ms(&mut self, period_ms: u32) {
        self.period_ms = period_ms;
        self.dt = period_ms as f32 / 1000.;
    }

    /// The accumulated integral of the error (in error units * seconds).
    pub fn integrator(&self) -> f32 {
        self.integrator
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    /// Clear the integral and derivative history.
    pub fn reset(&mut self) {
        self.integrator = 0.;
        self.error = 0.;
        self.reset_filter = true;
        self.info = Info::default();
    }

    /// Update the controller with the target and measured values and calculate the output.
    pub fn update(&mut self, target: f32, measurement: f32) -> f32 {
        // don't process inf or NaN
        if !target.is_finite() || !measurement.is_finite() {
            return 0.;
        }

        let error = target - measurement;

        let derivative = if self.reset_filter || self.dt <= 0. {
            self.reset_filter = false;
            0.
        } else {
            (error - self.error) / self.dt
        };
        self.error = error;

        if self.dt > 0. {
            self.integrator += error * self.dt;
        }

        let p_out = self.kp * error;
        let i_out = self.ki * self.integrator;
        let d_out = self.kd * derivative;

        self.info = Info {
            target,
            actual: measurement,
            error,
            p: p_out,
            i: i_out,
            d: d_out,
        };

        p_out + i_out + d_out
    }
}
