// dropbot-core/src/tasks/scheduler.rs
//
// Runs a task once right away, then once per period until stopped. A run
// never overlaps the previous one; a tick that arrives mid-run is skipped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Error;

#[async_trait]
pub trait ScheduledTask: Send + 'static {
    /// One run. Failures are the task's own business; the schedule keeps going.
    async fn run(&mut self);
}

#[derive(Default)]
struct ScheduleState {
    in_progress: AtomicBool,
    next_fire: Mutex<Option<Instant>>,
}

/// Clears the in-progress flag when the run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

async fn run_guarded<T: ScheduledTask>(state: &ScheduleState, task: &mut T) -> bool {
    let Some(_guard) = RunGuard::acquire(&state.in_progress) else {
        warn!("Previous run still in progress; skipping this tick");
        return false;
    };
    task.run().await;
    true
}

pub struct Scheduler {
    state: Arc<ScheduleState>,
    shutdown: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            state: Arc::new(ScheduleState::default()),
            shutdown: CancellationToken::new(),
            worker: None,
        }
    }

    /// Runs `task` immediately, then every `period` on a background worker.
    ///
    /// A scheduler starts at most once; once stopped it stays stopped.
    pub async fn start<T: ScheduledTask>(&mut self, period: Duration, mut task: T) -> Result<(), Error> {
        if period.is_zero() {
            return Err(Error::Scheduler("period must be greater than zero".into()));
        }
        if self.worker.is_some() || self.shutdown.is_cancelled() {
            return Err(Error::Scheduler("scheduler was already started".into()));
        }

        info!("Scheduler starting; period {:?}", period);
        run_guarded(&self.state, &mut task).await;

        let first = Instant::now() + period;
        *self.state.next_fire.lock() = Some(first);

        let state = self.state.clone();
        let shutdown = self.shutdown.clone();
        self.worker = Some(tokio::spawn(async move {
            let mut ticker = interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    fired_at = ticker.tick() => {
                        debug!("Scheduler tick");
                        run_guarded(&state, &mut task).await;

                        let on_time = fired_at + period;
                        let now = Instant::now();
                        *state.next_fire.lock() = Some(if now > on_time { now + period } else { on_time });
                    }
                }
            }

            *state.next_fire.lock() = None;
            debug!("Scheduler worker exited");
        }));
        Ok(())
    }

    /// Stops the timer. A run already underway finishes first. Safe to call
    /// any number of times.
    pub async fn stop(&mut self) {
        self.shutdown.cancel();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                warn!("Scheduler worker ended abnormally: {e}");
            }
            info!("Scheduler stopped");
        }
        *self.state.next_fire.lock() = None;
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some() && !self.shutdown.is_cancelled()
    }

    pub fn is_run_in_progress(&self) -> bool {
        self.state.in_progress.load(Ordering::Acquire)
    }

    /// When the next tick is due, if the scheduler is running.
    pub fn next_fire(&self) -> Option<Instant> {
        *self.state.next_fire.lock()
    }
}
