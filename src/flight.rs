//! The main loop of the flight core.

use crate::{
    command::{classify, Action, Setpoint},
    config::{Axis, FlightConfig},
    control::{CascadedController, Stage},
    error::{ConfigError, Error},
    estimator::{AttitudeEstimate, ComplementaryFilter, SensorSample, StateEstimator},
    hal::{CommandSource, MotorOutput, SensorSource, StatusIndicator},
    scheduler::{TaskId, TickScheduler},
};
use embedded_hal::blocking::delay::DelayMs;

/// Delay before retrying device initialization (in milliseconds).
const INIT_RETRY_DELAY_MS: u16 = 1000;

/// Number of blinks acknowledging start-up and gain changes.
const ACK_BLINKS: u8 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlightState {
    Disarmed,
    Armed,
    Tuning,
}

/// Board peripherals driven by the flight core.
pub struct Board<S, C, M, I, D> {
    pub sensors: S,
    pub commands: C,
    pub motors: M,
    pub indicator: I,
    pub delay: D,
}

/// Flight state machine owning the estimator, controller and board peripherals.
///
/// Everything here is only touched by the main loop.
/// The [`TickScheduler`] it polls is the one piece shared with the timer interrupt.
pub struct FlightController<'a, S, C, M, I, D, E = ComplementaryFilter>
where
    E: StateEstimator,
{
    config: FlightConfig,
    scheduler: &'a TickScheduler,
    board: Board<S, C, M, I, D>,
    estimator: E,
    filter_state: E::State,
    sample: Option<SensorSample>,
    estimate: AttitudeEstimate,
    controller: CascadedController,
    state: FlightState,
    sensor_failures: u32,
}

impl<'a, S, C, M, I, D> FlightController<'a, S, C, M, I, D>
where
    S: SensorSource,
    C: CommandSource,
    M: MotorOutput,
    I: StatusIndicator,
    D: DelayMs<u16>,
{
    /// Create a new flight controller using the default complementary filter.
    pub fn new(
        config: FlightConfig,
        scheduler: &'a TickScheduler,
        board: Board<S, C, M, I, D>,
    ) -> Result<Self, Error> {
        let dt = config.periods.estimate_state.0 as f32 / 1000.;
        let estimator = ComplementaryFilter::new(config.estimator, dt);
        Self::with_estimator(config, scheduler, board, estimator)
    }
}

impl<'a, S, C, M, I, D, E> FlightController<'a, S, C, M, I, D, E>
where
    S: SensorSource,
    C: CommandSource,
    M: MotorOutput,
    I: StatusIndicator,
    D: DelayMs<u16>,
    E: StateEstimator,
{
    /// Create a new flight controller with a custom state estimator.
    ///
    /// `scheduler` must have been built from the same periods as `config`.
    pub fn with_estimator(
        config: FlightConfig,
        scheduler: &'a TickScheduler,
        board: Board<S, C, M, I, D>,
        estimator: E,
    ) -> Result<Self, Error> {
        config.validate()?;
        if !scheduler.matches(&config) {
            return Err(ConfigError::SchedulerMismatch.into());
        }

        let controller = CascadedController::new(&config, config.periods.run_controller.0);
        let filter_state = estimator.initial_state();

        Ok(Self {
            config,
            scheduler,
            board,
            estimator,
            filter_state,
            sample: None,
            estimate: AttitudeEstimate::default(),
            controller,
            state: FlightState::Disarmed,
            sensor_failures: 0,
        })
    }

    /// Initialize the devices and start the scheduler.
    ///
    /// `init` is retried once after a one second delay.
    /// If it fails again the status indicator is turned off and [`Error::Init`] is returned;
    /// the main loop must not be entered.
    pub fn startup<F, X>(&mut self, mut init: F) -> Result<(), Error>
    where
        F: FnMut() -> Result<(), X>,
        X: core::fmt::Debug,
    {
        if let Err(error) = init() {
            log::error!("Failed to init device: {:?}, trying again", error);
            self.board.delay.delay_ms(INIT_RETRY_DELAY_MS);

            if let Err(error) = init() {
                log::error!("Failed to init device: {:?}, aborting", error);
                self.board.indicator.set_on(false);
                return Err(Error::Init);
            }
        }

        self.controller
            .set_period_ms(self.config.periods.run_controller.0);

        log::info!("Flight controller started");
        self.scheduler.start();
        self.board.indicator.blink(ACK_BLINKS);

        Ok(())
    }

    /// Run the main loop forever.
    pub fn run(&mut self) -> ! {
        loop {
            self.poll();
        }
    }

    /// Run every task that became ready since the last poll.
    ///
    /// Tasks run in the order: read sensors, listen for a command, estimate the state
    /// and run the controller.
    pub fn poll(&mut self) {
        if self.scheduler.take_ready(TaskId::ReadSensor) {
            self.read_sensors();
        }
        if self.scheduler.take_ready(TaskId::ListenCommand) {
            self.listen_command();
        }
        if self.scheduler.take_ready(TaskId::EstimateState) {
            self.estimate_state();
        }
        if self.scheduler.take_ready(TaskId::RunController) && self.state == FlightState::Armed {
            self.run_controller();
        }
    }

    fn read_sensors(&mut self) {
        match self.board.sensors.read() {
            Ok(sample) => {
                self.sample = Some(sample);
                self.sensor_failures = 0;
            }
            Err(error) => {
                self.sensor_failures = self.sensor_failures.saturating_add(1);
                log::warn!(
                    "Sensor read failed ({} in a row): {:?}, reusing the last sample",
                    self.sensor_failures,
                    error
                );
            }
        }
    }

    fn listen_command(&mut self) {
        match self.board.commands.command() {
            Ok(setpoint) => self.handle_command(setpoint),
            Err(error) => log::error!("Failed to receive command: {:?}, skipping", error),
        }
    }

    fn estimate_state(&mut self) {
        let sample = match &self.sample {
            Some(sample) => sample,
            None => return,
        };

        let (filter_state, estimate) = self.estimator.estimate(&self.filter_state, sample);
        self.filter_state = filter_state;
        self.estimate = estimate;
        self.controller.set_estimate(estimate);

        log::debug!(
            "Estimated attitude: {:?}, rate: {:?}",
            estimate.attitude,
            estimate.rate
        );
    }

    fn run_controller(&mut self) {
        let thrust = self.controller.run();
        for axis in [Axis::Pitch, Axis::Roll, Axis::Yaw] {
            if let Some(pid) = self.controller.pid(Stage::Rate, axis) {
                log::debug!("{:?} rate PID: {:?}", axis, pid.info());
            }
        }
        log::debug!("Thrust: {:?}", thrust);
        self.board.motors.output(thrust);
    }

    /// Apply a received command to the flight state.
    pub fn handle_command(&mut self, setpoint: Setpoint) {
        if setpoint.mode() != self.config.mode {
            log::warn!(
                "Ignoring {:?} command in {:?} mode",
                setpoint.mode(),
                self.config.mode
            );
            return;
        }
        log::debug!("Command: {:?}", setpoint);

        match classify(&setpoint, self.state, &self.config.limits) {
            Action::Arm => self.arm(),
            Action::CalibrateEsc => {
                log::info!("ESC calibration requested");
                self.arm();
            }
            Action::EnterTuning => {
                self.state = FlightState::Tuning;
                log::info!("Tuning PID");
                self.board.indicator.set_on(true);
            }
            Action::ExitTuning => {
                self.state = FlightState::Disarmed;
                log::info!("Exit tuning PID");
                self.board.indicator.set_on(false);
            }
            Action::Disarm => self.disarm(),
            Action::Forward(setpoint) => {
                self.controller.set_setpoint(setpoint);
            }
            Action::Tune(nudge) => {
                let axis = self.config.tuning_axis;
                let gains = self.controller.tune(axis, nudge, self.config.tuning_step);
                log::info!("Tuned {:?} rate {:?}: {:?}", axis, nudge.gain, gains);
                self.board.indicator.blink(ACK_BLINKS);
            }
            Action::Ignore => {}
        }
    }

    fn arm(&mut self) {
        self.controller.reset();
        self.controller.set_setpoint(Setpoint::neutral(self.config.mode));
        self.state = FlightState::Armed;
        self.board.motors.start();
        log::info!("Armed");
        self.board.indicator.set_on(true);
    }

    /// Stop the motors and return to [`FlightState::Disarmed`].
    ///
    /// This does nothing if already disarmed.
    pub fn disarm(&mut self) {
        match self.state {
            FlightState::Disarmed => return,
            FlightState::Armed => self.board.motors.stop(),
            FlightState::Tuning => {}
        }
        self.state = FlightState::Disarmed;
        log::info!("Disarmed");
        self.board.indicator.set_on(false);
    }

    pub fn state(&self) -> FlightState {
        self.state
    }

    pub fn config(&self) -> &FlightConfig {
        &self.config
    }

    pub fn estimate(&self) -> &AttitudeEstimate {
        &self.estimate
    }

    /// The last successfully read sensor sample.
    pub fn last_sample(&self) -> Option<&SensorSample> {
        self.sample.as_ref()
    }

    /// Number of consecutive failed sensor reads.
    pub fn sensor_failures(&self) -> u32 {
        self.sensor_failures
    }

    /// The cascaded controller.
    ///
    /// Gains can only be changed through tuning commands while [`FlightState::Tuning`].
    pub fn controller(&self) -> &CascadedController {
        &self.controller
    }

    pub fn board(&self) -> &Board<S, C, M, I, D> {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut Board<S, C, M, I, D> {
        &mut self.board
    }
}
