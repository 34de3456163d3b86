use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// One of the periodic tasks of the main loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskId {
    ReadSensor,
    EstimateState,
    ListenCommand,
    RunController,
}

impl TaskId {
    /// Every task, in the order of the scheduler's period table.
    pub const ALL: [TaskId; 4] = [
        TaskId::ReadSensor,
        TaskId::EstimateState,
        TaskId::ListenCommand,
        TaskId::RunController,
    ];

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

/// Firing state of a task run every `period` ticks.
///
/// `next_fire` is only written by the tick interrupt.
/// `ready` is set by the tick interrupt and cleared by the main loop.
#[derive(Debug)]
pub struct TaskSchedule {
    /// The period of this task (in ticks).
    period: u32,

    /// The tick count at which this task is next due.
    next_fire: AtomicU32,

    /// Set once per elapsed period until the main loop takes it.
    ready: AtomicBool,
}

impl TaskSchedule {
    /// Create a new schedule due `period` ticks after the counter starts.
    pub const fn new(period: u32) -> Self {
        Self {
            period,
            next_fire: AtomicU32::new(period),
            ready: AtomicBool::new(false),
        }
    }

    /// The period of this task (in ticks).
    pub fn period(&self) -> u32 {
        self.period
    }

    /// The tick count at which this task is next due.
    pub fn next_fire(&self) -> u32 {
        self.next_fire.load(Ordering::Relaxed)
    }

    /// Returns `true` if this task is due and has not been taken yet.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Take the ready flag, returning `true` if the task should run now.
    pub fn take_ready(&self) -> bool {
        self.ready.swap(false, Ordering::AcqRel)
    }

    /// Mark the task as ready if `count` reached its next firing tick.
    /// Returns `true` if the task fired.
    pub(crate) fn fire_if_due(&self, count: u32) -> bool {
        let next_fire = self.next_fire.load(Ordering::Relaxed);
        if count < next_fire {
            return false;
        }

        self.next_fire
            .store(next_fire.wrapping_add(self.period), Ordering::Relaxed);
        self.ready.store(true, Ordering::Release);
        true
    }

    /// Re-align this task to tick 0 after the counter wrapped.
    pub(crate) fn rewind(&self) {
        self.next_fire.store(self.period, Ordering::Relaxed);
    }
}
