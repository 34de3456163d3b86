use thiserror::Error;

/// An invalid [`FlightConfig`](crate::config::FlightConfig).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("tick rate must be non-zero")]
    ZeroTickRate,

    #[error("task period must be non-zero")]
    ZeroPeriod,

    #[error("period of {0}ms is not a whole number of ticks")]
    FractionalPeriod(u32),

    #[error("period does not fit in the tick counter")]
    Overflow,

    #[error("horizon of {horizon} ticks is not a multiple of a {period} tick period")]
    HorizonNotMultiple { horizon: u32, period: u32 },

    #[error("minimum thrust is above maximum thrust")]
    ThrustRange,

    #[error("scheduler periods or horizon differ from the config")]
    SchedulerMismatch,
}

/// A fatal flight core error.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("device initialization failed twice")]
    Init,

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
