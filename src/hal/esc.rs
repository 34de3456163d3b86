use embedded_hal::{blocking::delay::DelayMs, PwmPin};
use num_traits::{Num, NumCast, ToPrimitive};

use super::constrain_float;

/// Hold time of each calibration step (in milliseconds).
const CALIBRATION_HOLD_MS: u16 = 2000;

/// Electronic speed controller
pub trait Esc {
    /// Arm this ESC.
    fn arm(&mut self);

    /// Output a throttle in [0, 1].
    fn output(&mut self, output: f32);
}

impl<T: Esc + ?Sized> Esc for &mut T {
    fn arm(&mut self) {
        (**self).arm()
    }

    fn output(&mut self, output: f32) {
        (**self).output(output)
    }
}

/// An ESC driven by an RC-style PWM signal.
pub struct RcEsc<P: PwmPin> {
    arm: P::Duty,
    min: P::Duty,
    max: P::Duty,
    pin: P,
}

impl<P> RcEsc<P>
where
    P: PwmPin,
    P::Duty: Num + Copy,
{
    pub fn new(arm: P::Duty, min: P::Duty, max: P::Duty, pin: P) -> Self {
        Self { arm, min, max, pin }
    }

    pub fn builder() -> Builder<P::Duty>
    where
        P::Duty: Default,
    {
        Builder::default()
    }

    pub fn pin(&self) -> &P {
        &self.pin
    }

    /// Teach the ESC its throttle range by holding the maximum then the minimum duty,
    /// then arm it.
    ///
    /// This blocks for four seconds and must only run with the propellers removed.
    pub fn calibrate<D>(&mut self, delay: &mut D)
    where
        D: DelayMs<u16>,
    {
        self.pin.set_duty(self.max);
        delay.delay_ms(CALIBRATION_HOLD_MS);

        self.pin.set_duty(self.min);
        delay.delay_ms(CALIBRATION_HOLD_MS);

        self.pin.set_duty(self.arm);
    }
}

impl<P> Esc for RcEsc<P>
where
    P: PwmPin,
    P::Duty: Num + NumCast + ToPrimitive + Copy,
{
    fn arm(&mut self) {
        self.pin.set_duty(self.arm)
    }

    fn output(&mut self, output: f32) {
        let (min, max) = match (self.min.to_f32(), self.max.to_f32()) {
            (Some(min), Some(max)) => (min, max),
            _ => return,
        };

        let duty = min + constrain_float(output, 0., 1.) * (max - min);
        if let Some(duty) = <P::Duty as NumCast>::from(duty) {
            self.pin.set_duty(duty);
        }
    }
}

/// Builder for an [`RcEsc`], defaulting the maximum duty to the pin's maximum.
pub struct Builder<T> {
    arm: T,
    min: T,
    max: Option<T>,
}

impl<T: Default> Default for Builder<T> {
    fn default() -> Self {
        Self {
            arm: T::default(),
            min: T::default(),
            max: None,
        }
    }
}

impl<T> Builder<T> {
    pub fn arm(mut self, arm: T) -> Self {
        self.arm = arm;
        self
    }

    pub fn min(mut self, min: T) -> Self {
        self.min = min;
        self
    }

    pub fn max(mut self, max: T) -> Self {
        self.max = Some(max);
        self
    }

    pub fn build<P>(self, pin: P) -> RcEsc<P>
    where
        P: PwmPin<Duty = T>,
    {
        RcEsc {
            arm: self.arm,
            min: self.min,
            max: self.max.unwrap_or_else(|| pin.get_max_duty()),
            pin,
        }
    }
}
