//! Cooperative scheduler.
//!
//! Tasks are visited in registration order on every pass. A task runs when
//! its next-due time has arrived and is then rescheduled `period` after the
//! moment its step finished. Nothing is preempted: one step runs at a time,
//! on the calling thread.
//!
//! # Failure handling
//!
//! | Step result | Effect |
//! |-------------|--------|
//! | `Ok(Flow::Continue)` | rescheduled |
//! | `Ok(Flow::Shutdown)` | scheduler returns immediately, no further passes |
//! | recoverable `Err` | logged at warn, counted, rescheduled |
//! | fatal `Err` (unknown command) | scheduler returns `SchedulerError::Fatal` |

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hub_common::device::DeviceError;
use hub_common::frame::FrameError;
use hub_common::telemetry::CodecError;
use hub_shared_memory::ShmError;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::dispatch::DispatchError;
use crate::node::NodeResources;
use crate::slots::SlotError;

/// What the scheduler should do after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep running.
    Continue,
    /// Stop now; the hub is shutting down.
    Shutdown,
}

/// Why the scheduler returned normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// A task requested shutdown.
    Shutdown,
    /// The running flag was cleared (signal).
    Interrupted,
    /// `run_until` reached its deadline.
    Deadline,
}

/// Failure of a single task step.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Device capability call failed.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Malformed command frame.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Telemetry encode/decode failure.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Command dispatch failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Stream channel I/O.
    #[error("Stream I/O error: {0}")]
    Io(#[from] io::Error),

    /// Shared slot access.
    #[error(transparent)]
    Shm(#[from] ShmError),

    /// Typed slot read.
    #[error(transparent)]
    Slot(#[from] SlotError),

    /// Hub peripheral failed.
    #[error("Hub service failed: {0}")]
    Hub(String),
}

impl TaskError {
    /// Returns true if the scheduler must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Dispatch(e) if e.is_fatal())
    }
}

/// Scheduler failure.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A task step returned a fatal error.
    #[error("Task '{task}' failed fatally: {source}")]
    Fatal {
        /// Failing task
        task: &'static str,
        /// Underlying error
        source: TaskError,
    },
}

/// A perpetual unit of cooperative work.
pub trait Task: Send {
    /// Name for logs and statistics.
    fn name(&self) -> &'static str;

    /// Minimum delay between the end of one step and the start of the next.
    /// Zero means every pass.
    fn period(&self) -> Duration;

    /// Do one iteration of work.
    fn step(&mut self, resources: &mut NodeResources) -> Result<Flow, TaskError>;
}

/// Per-task counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStats {
    /// Task name
    pub name: &'static str,
    /// Completed steps, including failed ones
    pub runs: u64,
    /// Steps that returned a recoverable error
    pub failures: u64,
}

/// Scheduler counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Passes over the task list
    pub passes: u64,
    /// One entry per task, in registration order
    pub tasks: Vec<TaskStats>,
}

impl SchedulerStats {
    /// Counters for the task called `name`.
    pub fn task(&self, name: &str) -> Option<&TaskStats> {
        self.tasks.iter().find(|t| t.name == name)
    }
}

/// Scheduler tuning.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    /// Minimum sleep between passes
    pub idle_sleep: Duration,
    /// Log statistics every N passes (0 disables)
    pub stats_interval_passes: u64,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            idle_sleep: Duration::from_millis(1),
            stats_interval_passes: 10_000,
        }
    }
}

struct ScheduledTask {
    task: Box<dyn Task>,
    period: Duration,
    next_due: Duration,
}

/// Runs tasks cooperatively against a clock.
pub struct Scheduler {
    tasks: Vec<ScheduledTask>,
    resources: NodeResources,
    clock: Arc<dyn Clock>,
    running: Arc<AtomicBool>,
    options: SchedulerOptions,
    stats: SchedulerStats,
}

impl Scheduler {
    /// Scheduler owning `resources`.
    pub fn new(resources: NodeResources, clock: Arc<dyn Clock>, options: SchedulerOptions) -> Self {
        Self {
            tasks: Vec::new(),
            resources,
            clock,
            running: Arc::new(AtomicBool::new(true)),
            options,
            stats: SchedulerStats::default(),
        }
    }

    /// Append a task. It becomes due immediately.
    pub fn add_task(&mut self, task: Box<dyn Task>) {
        let period = task.period();
        info!("Task '{}' registered (period {} ms)", task.name(), period.as_millis());
        self.stats.tasks.push(TaskStats {
            name: task.name(),
            ..TaskStats::default()
        });
        self.tasks.push(ScheduledTask {
            task,
            period,
            next_due: self.clock.now(),
        });
    }

    /// Visit every task once, running those that are due.
    ///
    /// # Errors
    /// `SchedulerError::Fatal` if a step failed fatally.
    pub fn run_pass(&mut self) -> Result<Flow, SchedulerError> {
        self.stats.passes += 1;
        for (index, scheduled) in self.tasks.iter_mut().enumerate() {
            if self.clock.now() < scheduled.next_due {
                continue;
            }
            let name = scheduled.task.name();
            let result = scheduled.task.step(&mut self.resources);
            scheduled.next_due = self.clock.now() + scheduled.period;

            let stats = &mut self.stats.tasks[index];
            stats.runs += 1;
            match result {
                Ok(Flow::Continue) => {}
                Ok(Flow::Shutdown) => {
                    info!("Task '{}' requested shutdown", name);
                    return Ok(Flow::Shutdown);
                }
                Err(e) if e.is_fatal() => {
                    error!("Task '{}': {}", name, e);
                    return Err(SchedulerError::Fatal { task: name, source: e });
                }
                Err(e) => {
                    stats.failures += 1;
                    warn!("Task '{}' skipped iteration: {}", name, e);
                }
            }
        }

        let interval = self.options.stats_interval_passes;
        if interval > 0 && self.stats.passes % interval == 0 {
            self.log_stats();
        }
        Ok(Flow::Continue)
    }

    /// Run passes until shutdown, interruption, or `deadline` on the
    /// scheduler clock.
    pub fn run_until(&mut self, deadline: Duration) -> Result<ExitReason, SchedulerError> {
        self.run_while(|now| now < deadline)
    }

    /// Run passes until shutdown or interruption.
    pub fn run(&mut self) -> Result<ExitReason, SchedulerError> {
        info!("Scheduler started with {} task(s)", self.tasks.len());
        let reason = self.run_while(|_| true)?;
        self.log_stats();
        Ok(reason)
    }

    fn run_while(&mut self, mut keep_going: impl FnMut(Duration) -> bool) -> Result<ExitReason, SchedulerError> {
        loop {
            if !self.running.load(Ordering::SeqCst) {
                info!("Scheduler interrupted");
                return Ok(ExitReason::Interrupted);
            }
            if !keep_going(self.clock.now()) {
                return Ok(ExitReason::Deadline);
            }
            if self.run_pass()? == Flow::Shutdown {
                return Ok(ExitReason::Shutdown);
            }
            self.idle();
        }
    }

    /// Sleep until the earliest task is due, but at least `idle_sleep`.
    fn idle(&self) {
        let now = self.clock.now();
        let wait = self
            .tasks
            .iter()
            .map(|t| t.next_due.saturating_sub(now))
            .min()
            .unwrap_or(self.options.idle_sleep);
        let wait = wait.max(self.options.idle_sleep);
        if !wait.is_zero() {
            self.clock.sleep(wait);
        }
    }

    fn log_stats(&self) {
        debug!("Scheduler: {} passes", self.stats.passes);
        for task in &self.stats.tasks {
            debug!("  {}: {} runs, {} failures", task.name, task.runs, task.failures);
        }
    }

    /// Counters so far.
    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Shared resources.
    pub fn resources(&self) -> &NodeResources {
        &self.resources
    }

    /// Shared resources, mutably.
    pub fn resources_mut(&mut self) -> &mut NodeResources {
        &mut self.resources
    }

    /// Flag that stops the scheduler between passes when cleared.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::resources;
    use hub_common::port::Port;

    struct Counter {
        name: &'static str,
        period: Duration,
        outcome: fn(u64) -> Result<Flow, TaskError>,
        calls: u64,
    }

    impl Task for Counter {
        fn name(&self) -> &'static str {
            self.name
        }
        fn period(&self) -> Duration {
            self.period
        }
        fn step(&mut self, _: &mut NodeResources) -> Result<Flow, TaskError> {
            self.calls += 1;
            (self.outcome)(self.calls)
        }
    }

    fn counter(name: &'static str, period_ms: u64, outcome: fn(u64) -> Result<Flow, TaskError>) -> Box<Counter> {
        Box::new(Counter {
            name,
            period: Duration::from_millis(period_ms),
            outcome,
            calls: 0,
        })
    }

    fn ok(_: u64) -> Result<Flow, TaskError> {
        Ok(Flow::Continue)
    }

    fn scheduler(clock: Arc<ManualClock>) -> Scheduler {
        Scheduler::new(resources(), clock, SchedulerOptions::default())
    }

    #[test]
    fn hundred_ms_task_runs_ten_times_per_second() {
        let clock = Arc::new(ManualClock::new());
        let mut sched = scheduler(clock);
        sched.add_task(counter("periodic", 100, ok));
        sched.add_task(counter("every_pass", 0, ok));

        let reason = sched.run_until(Duration::from_millis(1000)).unwrap();
        assert_eq!(reason, ExitReason::Deadline);

        let runs = sched.stats().task("periodic").map(|t| t.runs).unwrap_or(0);
        assert!((9..=11).contains(&runs), "ran {runs} times");
        let every = sched.stats().task("every_pass").map(|t| t.runs).unwrap_or(0);
        assert!(every > runs);
    }

    #[test]
    fn shutdown_stops_remaining_tasks_and_passes() {
        fn stop_on_third(n: u64) -> Result<Flow, TaskError> {
            Ok(if n == 3 { Flow::Shutdown } else { Flow::Continue })
        }
        let clock = Arc::new(ManualClock::new());
        let mut sched = scheduler(clock);
        sched.add_task(counter("stopper", 0, stop_on_third));
        sched.add_task(counter("after", 0, ok));

        assert_eq!(sched.run().unwrap(), ExitReason::Shutdown);
        assert_eq!(sched.stats().passes, 3);
        assert_eq!(sched.stats().task("after").map(|t| t.runs), Some(2));
    }

    #[test]
    fn recoverable_error_is_counted_and_retried() {
        fn fail_first(n: u64) -> Result<Flow, TaskError> {
            if n == 1 {
                Err(DeviceError::failed(Port::A, "glitch").into())
            } else {
                Ok(Flow::Continue)
            }
        }
        let clock = Arc::new(ManualClock::new());
        let mut sched = scheduler(clock);
        sched.add_task(counter("flaky", 100, fail_first));

        sched.run_until(Duration::from_millis(350)).unwrap();
        let stats = sched.stats().task("flaky").cloned().unwrap_or_default();
        assert_eq!(stats.runs, 4);
        assert_eq!(stats.failures, 1);
    }

    #[test]
    fn unknown_command_is_fatal() {
        fn unknown(_: u64) -> Result<Flow, TaskError> {
            Err(DispatchError::UnknownCommand {
                channel: crate::dispatch::ChannelKind::Slot,
                opcode: 0x99,
            }
            .into())
        }
        let clock = Arc::new(ManualClock::new());
        let mut sched = scheduler(clock);
        sched.add_task(counter("poller", 100, unknown));

        let err = sched.run_until(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, SchedulerError::Fatal { task: "poller", .. }));
        assert_eq!(sched.stats().passes, 1);
    }

    #[test]
    fn cleared_running_flag_interrupts() {
        let clock = Arc::new(ManualClock::new());
        let mut sched = scheduler(clock);
        sched.add_task(counter("idle", 0, ok));
        sched.running_flag().store(false, Ordering::SeqCst);
        assert_eq!(sched.run().unwrap(), ExitReason::Interrupted);
        assert_eq!(sched.stats().passes, 0);
    }
}
