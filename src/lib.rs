//! # embedded-flight-controller
//! A `#![no_std]` flight core for multi-rotor vehicles
//!
//! # Generic components
//! [`scheduler`] contains the tick scheduler that raises task flags from a timer interrupt.
//!
//! [`hal`] contains the hardware abstraction layer
//! (see [`QuadMotors`] for an X-quad motor stage over [`RcEsc`] speed controllers).
//!
//! [`config`] contains the flight configuration and airframe defaults.
//!
//! # Flight components
//! [`FlightController`] is the main loop state machine, arming and tuning from pilot commands.
//!
//! [`command`] decodes sentinel stick patterns into arm, disarm and tuning requests.
//!
//! [`control`] contains the cascaded attitude controller.
//!
//! [`estimator`] contains the state estimator contract
//! (see [`ComplementaryFilter`] for the default implementation).

#![cfg_attr(not(test), no_std)]

pub mod command;
pub use command::Setpoint;

pub mod config;
pub use config::{ControlMode, FlightConfig};

pub mod control;
pub use control::CascadedController;

pub mod error;
pub use error::{ConfigError, Error};

pub mod estimator;
pub use estimator::{ComplementaryFilter, StateEstimator};

pub mod filter;

pub mod flight;
pub use flight::{Board, FlightController, FlightState};

pub mod hal;
pub use hal::{MotorThrust, QuadMotors, RcEsc};

pub mod scheduler;
pub use scheduler::TickScheduler;
