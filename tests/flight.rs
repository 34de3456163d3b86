use approx::assert_relative_eq;
use embedded_flight_controller::{
    command::{Extreme, Intent},
    config::{Axis, Gains, PidGains, GRAVITY},
    control::Stage,
    estimator::SensorSample,
    hal::{CommandSource, MotorOutput, MotorThrust, SensorSource, StatusIndicator},
    Board, ConfigError, ControlMode, Error, FlightConfig, FlightController, FlightState, Setpoint,
    TickScheduler,
};
use embedded_hal::blocking::delay::DelayMs;
use nalgebra::Vector3;
use std::collections::VecDeque;

/// Ticks between two command reads with the default config.
const LISTEN_TICKS: u32 = 500;

struct MockSensors {
    sample: SensorSample,
    fail: bool,
}

impl SensorSource for MockSensors {
    type Error = &'static str;

    fn read(&mut self) -> Result<SensorSample, Self::Error> {
        if self.fail {
            Err("i2c timeout")
        } else {
            Ok(self.sample)
        }
    }
}

#[derive(Default)]
struct MockCommands {
    queue: VecDeque<Result<Setpoint, &'static str>>,
}

impl CommandSource for MockCommands {
    type Error = &'static str;

    fn command(&mut self) -> Result<Setpoint, Self::Error> {
        self.queue.pop_front().unwrap_or(Err("no frame"))
    }
}

#[derive(Default)]
struct MockMotors {
    running: bool,
    starts: u32,
    stops: u32,
    outputs: Vec<MotorThrust>,
    outputs_while_stopped: u32,
}

impl MotorOutput for MockMotors {
    fn start(&mut self) {
        self.running = true;
        self.starts += 1;
    }

    fn stop(&mut self) {
        self.running = false;
        self.stops += 1;
    }

    fn output(&mut self, thrust: MotorThrust) {
        if !self.running {
            self.outputs_while_stopped += 1;
        }
        self.outputs.push(thrust);
    }
}

#[derive(Default)]
struct MockIndicator {
    on: bool,
    blinks: Vec<u8>,
}

impl StatusIndicator for MockIndicator {
    fn set_on(&mut self, on: bool) {
        self.on = on;
    }

    fn blink(&mut self, times: u8) {
        self.blinks.push(times);
    }
}

#[derive(Default)]
struct MockDelay {
    total_ms: u32,
}

impl DelayMs<u16> for MockDelay {
    fn delay_ms(&mut self, ms: u16) {
        self.total_ms += u32::from(ms);
    }
}

type TestController<'a> =
    FlightController<'a, MockSensors, MockCommands, MockMotors, MockIndicator, MockDelay>;

fn board() -> Board<MockSensors, MockCommands, MockMotors, MockIndicator, MockDelay> {
    Board {
        sensors: MockSensors {
            sample: SensorSample::new(Vector3::zeros(), Vector3::new(0., 0., GRAVITY)),
            fail: false,
        },
        commands: MockCommands::default(),
        motors: MockMotors::default(),
        indicator: MockIndicator::default(),
        delay: MockDelay::default(),
    }
}

fn started(config: FlightConfig, scheduler: &TickScheduler) -> TestController<'_> {
    let mut flight = FlightController::new(config, scheduler, board()).unwrap();
    flight.startup(|| Ok::<(), ()>(())).unwrap();
    flight
}

fn advance(flight: &mut TestController<'_>, scheduler: &TickScheduler, ticks: u32) {
    for _ in 0..ticks {
        scheduler.on_tick();
        flight.poll();
    }
}

/// Queue `setpoint` and run until it has been read.
fn rate_gains(flight: &TestController<'_>, axis: Axis) -> PidGains {
    flight.controller().pid(Stage::Rate, axis).unwrap().gains()
}

fn send(flight: &mut TestController<'_>, scheduler: &TickScheduler, setpoint: Setpoint) {
    flight.board_mut().commands.queue.push_back(Ok(setpoint));
    advance(flight, scheduler, LISTEN_TICKS);
}

fn pattern(intent: Intent) -> Setpoint {
    let pick = |extreme, min, max| match extreme {
        Extreme::Min => min,
        Extreme::Max => max,
    };
    let [pitch, roll, yaw_rate, accel_z] = intent.pattern();
    Setpoint::Attitude {
        pitch: pick(pitch, -20., 20.),
        roll: pick(roll, -20., 20.),
        yaw_rate: pick(yaw_rate, -90., 90.),
        accel_z: pick(accel_z, -1., 1.),
    }
}

fn pitch(pitch: f32) -> Setpoint {
    Setpoint::Attitude {
        pitch,
        roll: 0.,
        accel_z: 0.,
        yaw_rate: 0.,
    }
}

fn config() -> FlightConfig {
    FlightConfig::default().with_gains(Gains {
        attitude_pitch: PidGains::new(2., 0., 0.),
        attitude_roll: PidGains::new(2., 0., 0.),
        ..Gains::default()
    })
}

#[test]
fn arm_then_pitch_command() {
    let config = config();
    let scheduler = TickScheduler::from_config(&config).unwrap();
    let mut flight = started(config, &scheduler);

    send(&mut flight, &scheduler, pattern(Intent::Arm));
    assert_eq!(flight.state(), FlightState::Armed);
    assert_eq!(flight.board().motors.starts, 1);
    assert!(flight.board().indicator.on);
    // The controller ran once in the same pass as the arm command
    assert_eq!(flight.board().motors.outputs, vec![MotorThrust::default()]);

    send(&mut flight, &scheduler, Setpoint::Attitude {
        pitch: 5.,
        roll: 0.,
        accel_z: 0.2,
        yaw_rate: 0.,
    });
    let outputs = &flight.board().motors.outputs;
    assert_eq!(outputs.len(), 11);
    assert!(outputs[..10].iter().all(|thrust| *thrust == MotorThrust::default()));

    let thrust = outputs[10];
    assert_relative_eq!(flight.controller().rate_setpoint().pitch, 10., epsilon = 1e-5);
    assert_relative_eq!(thrust.pitch, 3.5, epsilon = 1e-5);
    assert_eq!(thrust.roll, 0.);
    assert_relative_eq!(thrust.height, 80., epsilon = 1e-3);
    assert_eq!(flight.board().motors.starts, 1);
}

#[test]
fn startup_blinks_and_starts_scheduler() {
    let config = config();
    let scheduler = TickScheduler::from_config(&config).unwrap();
    let flight = started(config, &scheduler);

    assert!(scheduler.is_started());
    assert_eq!(flight.board().indicator.blinks, vec![4]);
    assert_eq!(flight.board().delay.total_ms, 0);
    assert_eq!(flight.state(), FlightState::Disarmed);
}

#[test]
fn startup_retries_once() {
    let config = config();
    let scheduler = TickScheduler::from_config(&config).unwrap();
    let mut flight = FlightController::new(config, &scheduler, board()).unwrap();

    let mut attempts = 0;
    let result = flight.startup(|| {
        attempts += 1;
        if attempts == 1 {
            Err("imu not responding")
        } else {
            Ok(())
        }
    });

    assert_eq!(result, Ok(()));
    assert_eq!(attempts, 2);
    assert_eq!(flight.board().delay.total_ms, 1000);
    assert!(scheduler.is_started());
}

#[test]
fn startup_fails_after_second_attempt() {
    let config = config();
    let scheduler = TickScheduler::from_config(&config).unwrap();
    let mut flight = FlightController::new(config, &scheduler, board()).unwrap();
    flight.board_mut().indicator.on = true;

    let mut attempts = 0;
    let result = flight.startup(|| {
        attempts += 1;
        Err::<(), _>("imu not responding")
    });

    assert_eq!(result, Err(Error::Init));
    assert_eq!(attempts, 2);
    assert!(!flight.board().indicator.on);
    assert!(flight.board().indicator.blinks.is_empty());
    assert!(!scheduler.is_started());
}

#[test]
fn rejects_mismatched_scheduler() {
    let scheduler = TickScheduler::new(5000, [20, 20, 500, 25]);
    let result = FlightController::new(config(), &scheduler, board());
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::SchedulerMismatch))
    ));
}

#[test]
fn disarm_is_idempotent() {
    let config = config();
    let scheduler = TickScheduler::from_config(&config).unwrap();
    let mut flight = started(config, &scheduler);

    send(&mut flight, &scheduler, pattern(Intent::Arm));
    send(&mut flight, &scheduler, pattern(Intent::Disarm));
    assert_eq!(flight.state(), FlightState::Disarmed);
    assert_eq!(flight.board().motors.stops, 1);
    assert!(!flight.board().indicator.on);

    let outputs = flight.board().motors.outputs.len();
    send(&mut flight, &scheduler, pattern(Intent::Disarm));
    flight.disarm();
    assert_eq!(flight.state(), FlightState::Disarmed);
    assert_eq!(flight.board().motors.stops, 1);
    assert!(!flight.board().motors.running);
    assert_eq!(flight.board().motors.outputs.len(), outputs);
    assert_eq!(flight.board().motors.outputs_while_stopped, 0);
}

#[test]
fn command_failure_keeps_state() {
    let config = config();
    let scheduler = TickScheduler::from_config(&config).unwrap();
    let mut flight = started(config, &scheduler);

    send(&mut flight, &scheduler, pattern(Intent::Arm));
    send(&mut flight, &scheduler, pitch(5.));
    let setpoint = *flight.controller().setpoint();

    flight.board_mut().commands.queue.push_back(Err("crc mismatch"));
    advance(&mut flight, &scheduler, LISTEN_TICKS);
    assert_eq!(flight.state(), FlightState::Armed);
    assert_eq!(flight.controller().setpoint(), &setpoint);
    assert_eq!(flight.board().motors.outputs.len(), 21);
}

#[test]
fn calibrate_pattern_arms() {
    let config = config();
    let scheduler = TickScheduler::from_config(&config).unwrap();
    let mut flight = started(config, &scheduler);

    send(&mut flight, &scheduler, pattern(Intent::CalibrateEsc));
    assert_eq!(flight.state(), FlightState::Armed);
    assert_eq!(flight.board().motors.starts, 1);
}

#[test]
fn ignores_commands_of_the_other_mode() {
    let config = config();
    let scheduler = TickScheduler::from_config(&config).unwrap();
    let mut flight = started(config, &scheduler);
    assert_eq!(flight.config().mode, ControlMode::Attitude);

    // The arm pattern in acceleration shape
    let arm = Setpoint::Acceleration {
        accel: Vector3::new(-1., -1., -1.),
        yaw_rate: 90.,
    };
    send(&mut flight, &scheduler, arm);
    assert_eq!(flight.state(), FlightState::Disarmed);
    assert_eq!(flight.board().motors.starts, 0);
}

#[test]
fn tuning_nudges_the_rate_pid() {
    let config = config();
    let scheduler = TickScheduler::from_config(&config).unwrap();
    let mut flight = started(config, &scheduler);

    send(&mut flight, &scheduler, pattern(Intent::EnterTuning));
    assert_eq!(flight.state(), FlightState::Tuning);
    assert!(flight.board().indicator.on);

    send(&mut flight, &scheduler, pitch(20.));
    send(&mut flight, &scheduler, Setpoint::Attitude {
        pitch: 0.,
        roll: 0.,
        accel_z: 0.,
        yaw_rate: 90.,
    });
    let gains = flight
        .controller()
        .pid(Stage::Rate, Axis::Pitch)
        .map(|pid| pid.gains())
        .unwrap();
    assert_relative_eq!(gains.kp, 0.45, epsilon = 1e-6);
    assert_relative_eq!(gains.ki, 0.1, epsilon = 1e-6);
    assert_eq!(gains.kd, 0.);
    assert_eq!(flight.board().indicator.blinks, vec![4, 4, 4]);

    // Arming is not possible while tuning
    send(&mut flight, &scheduler, pattern(Intent::Arm));
    assert_eq!(flight.state(), FlightState::Tuning);

    send(&mut flight, &scheduler, pattern(Intent::ExitTuning));
    assert_eq!(flight.state(), FlightState::Disarmed);
    assert!(!flight.board().indicator.on);
    assert!(flight.board().motors.outputs.is_empty());
}

#[test]
fn tuning_axis_and_step_select_the_pid() {
    let config = config().with_tuning_axis(Axis::Roll).with_tuning_step(0.05);
    let scheduler = TickScheduler::from_config(&config).unwrap();
    let mut flight = started(config, &scheduler);

    send(&mut flight, &scheduler, pattern(Intent::EnterTuning));
    send(&mut flight, &scheduler, pitch(20.));

    assert_relative_eq!(rate_gains(&flight, Axis::Roll).kp, 0.40, epsilon = 1e-6);
    assert_eq!(rate_gains(&flight, Axis::Pitch), PidGains::new(0.35, 0., 0.));
    assert_eq!(rate_gains(&flight, Axis::Yaw), PidGains::new(0.05, 0., 0.));
}

#[test]
fn gains_only_change_while_tuning() {
    let config = config();
    let scheduler = TickScheduler::from_config(&config).unwrap();
    let mut flight = started(config, &scheduler);

    send(&mut flight, &scheduler, pattern(Intent::Arm));
    send(&mut flight, &scheduler, pitch(20.));
    send(&mut flight, &scheduler, pitch(-20.));

    assert_eq!(flight.state(), FlightState::Armed);
    assert_eq!(flight.controller().setpoint(), &pitch(-20.));
    let defaults = Gains::default();
    assert_eq!(rate_gains(&flight, Axis::Pitch), defaults.rate_pitch);
    assert_eq!(rate_gains(&flight, Axis::Roll), defaults.rate_roll);
    assert_eq!(rate_gains(&flight, Axis::Yaw), defaults.rate_yaw);
    assert_eq!(flight.board().indicator.blinks, vec![4]);
}

#[test]
fn sensor_failure_reuses_last_sample() {
    let config = config();
    let scheduler = TickScheduler::from_config(&config).unwrap();
    let mut flight = started(config, &scheduler);

    advance(&mut flight, &scheduler, 20);
    let sample = *flight.last_sample().unwrap();

    flight.board_mut().sensors.fail = true;
    advance(&mut flight, &scheduler, 60);
    assert_eq!(flight.sensor_failures(), 3);
    assert_eq!(flight.last_sample(), Some(&sample));
    assert_relative_eq!(flight.estimate().attitude.pitch, 0., epsilon = 1e-5);

    flight.board_mut().sensors.fail = false;
    advance(&mut flight, &scheduler, 20);
    assert_eq!(flight.sensor_failures(), 0);
}

struct XorShift(u32);

impl XorShift {
    fn next(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        x
    }

    fn unit(&mut self) -> f32 {
        (self.next() % 2001) as f32 / 1000. - 1.
    }
}

#[test]
fn motors_only_run_while_armed() {
    let config = config();
    let scheduler = TickScheduler::from_config(&config).unwrap();
    let mut flight = started(config, &scheduler);
    let mut rng = XorShift(0x2545_f491);

    // Controller ticks per listen window
    let per_window = LISTEN_TICKS / 50;

    for _ in 0..400 {
        let command = match rng.next() % 8 {
            0 => Ok(pattern(Intent::Arm)),
            1 => Ok(pattern(Intent::Disarm)),
            2 => Ok(pattern(Intent::EnterTuning)),
            3 => Ok(pattern(Intent::ExitTuning)),
            4 => Ok(pattern(Intent::CalibrateEsc)),
            5 => Err("dropped frame"),
            _ => Ok(Setpoint::Attitude {
                pitch: 19. * rng.unit(),
                roll: 19. * rng.unit(),
                accel_z: 0.9 * rng.unit(),
                yaw_rate: 89. * rng.unit(),
            }),
        };

        let before = flight.state();
        let outputs = flight.board().motors.outputs.len() as u32;
        flight.board_mut().commands.queue.push_back(command);
        advance(&mut flight, &scheduler, LISTEN_TICKS);
        let after = flight.state();

        // The command is handled on the last tick of the window, before the controller runs
        let mut expected = 0;
        if before == FlightState::Armed {
            expected += per_window - 1;
        }
        if after == FlightState::Armed {
            expected += 1;
        }
        assert_eq!(
            flight.board().motors.outputs.len() as u32 - outputs,
            expected
        );
        assert_eq!(flight.board().motors.running, after == FlightState::Armed);
    }
    assert_eq!(flight.board().motors.outputs_while_stopped, 0);
}
