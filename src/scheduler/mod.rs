//! Fixed-rate cooperative scheduler driven by a single hardware timer.
//!
//! [`TickScheduler::on_tick`] runs in the timer interrupt and only raises
//! per-task ready flags. The main loop polls them with
//! [`TickScheduler::take_ready`] and runs the work itself, so a slow main loop
//! runs a task at most once for every period it observed (missed periods are dropped).
//!
//! ```
//! use embedded_flight_controller::scheduler::{TaskId, TickScheduler};
//!
//! static SCHEDULER: TickScheduler = TickScheduler::new(5000, [20, 20, 500, 50]);
//!
//! SCHEDULER.start();
//! for _ in 0..20 {
//!     SCHEDULER.on_tick();
//! }
//! assert!(SCHEDULER.take_ready(TaskId::ReadSensor));
//! assert!(!SCHEDULER.take_ready(TaskId::RunController));
//! ```

use crate::{config::FlightConfig, error::ConfigError};
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

mod task;
pub use task::{TaskId, TaskSchedule};

/// Tick counter and the schedules of the four main loop tasks.
///
/// Every field is an atomic written only by the tick interrupt (except the ready flags,
/// which the main loop clears) so a `static` scheduler can be shared without locks.
#[derive(Debug)]
pub struct TickScheduler {
    /// Ticks since start, wrapping back to 0 at `horizon`.
    count: AtomicU32,
    horizon: u32,
    started: AtomicBool,
    tasks: [TaskSchedule; 4],
}

impl TickScheduler {
    /// Create a new scheduler wrapping every `horizon` ticks.
    /// `periods` are in ticks and ordered like [`TaskId::ALL`].
    ///
    /// The horizon should be a multiple of every period
    /// (see [`FlightConfig::validate`]) to keep the cadence across a wraparound.
    pub const fn new(horizon: u32, periods: [u32; 4]) -> Self {
        Self {
            count: AtomicU32::new(0),
            horizon,
            started: AtomicBool::new(false),
            tasks: [
                TaskSchedule::new(periods[0]),
                TaskSchedule::new(periods[1]),
                TaskSchedule::new(periods[2]),
                TaskSchedule::new(periods[3]),
            ],
        }
    }

    /// Create a new scheduler from a validated config.
    pub fn from_config(config: &FlightConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self::new(config.horizon, Self::periods_of(config)?))
    }

    /// The task periods (in ticks) of `config`, ordered like [`TaskId::ALL`].
    pub fn periods_of(config: &FlightConfig) -> Result<[u32; 4], ConfigError> {
        Ok([
            config.ticks(config.periods.read_sensor)?,
            config.ticks(config.periods.estimate_state)?,
            config.ticks(config.periods.listen_command)?,
            config.ticks(config.periods.run_controller)?,
        ])
    }

    /// Returns `true` if this scheduler runs the horizon and periods of `config`.
    pub fn matches(&self, config: &FlightConfig) -> bool {
        match Self::periods_of(config) {
            Ok(periods) => {
                self.horizon == config.horizon
                    && TaskId::ALL
                        .iter()
                        .all(|id| self.task(*id).period() == periods[id.index()])
            }
            Err(_) => false,
        }
    }

    /// Start counting ticks. Ticks before this are ignored.
    pub fn start(&self) {
        self.started.store(true, Ordering::Release);
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Advance the tick counter, raising the ready flag of every task that is due.
    ///
    /// Call this once from the timer interrupt.
    /// It is bounded-time, allocation free and never blocks.
    pub fn on_tick(&self) {
        if !self.started.load(Ordering::Acquire) {
            return;
        }

        let count = self.count.load(Ordering::Relaxed).wrapping_add(1);
        self.count.store(count, Ordering::Relaxed);

        for task in &self.tasks {
            task.fire_if_due(count);
        }

        if count >= self.horizon {
            // Realign every task to tick 0 so the wrap adds no drift
            self.count.store(0, Ordering::Relaxed);
            for task in &self.tasks {
                task.rewind();
            }
        }
    }

    /// Take the ready flag of a task, returning `true` if it should run now.
    pub fn take_ready(&self, id: TaskId) -> bool {
        self.task(id).take_ready()
    }

    pub fn is_ready(&self, id: TaskId) -> bool {
        self.task(id).is_ready()
    }

    pub fn task(&self, id: TaskId) -> &TaskSchedule {
        &self.tasks[id.index()]
    }

    /// The current tick count, in `0..horizon`.
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn horizon(&self) -> u32 {
        self.horizon
    }
}
