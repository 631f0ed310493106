use std::mem;
use std::sync::Arc;
use std::time::Duration;

use librato_common::UnixMillis;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::Clock;
use crate::pipeline::{FlushPipeline, Setup};

#[derive(Debug, Default)]
enum SchedulerState {
    /// Not yet started.
    #[default]
    Idle,
    /// A periodic flush task is active.
    Running {
        token: CancellationToken,
        handle: JoinHandle<()>,
    },
    /// Stopped by the user. Can be restarted.
    Ending,
}

/// Drives periodic flushes aligned to multiples of the flush period.
///
/// The first flush happens at the next multiple of the period after start. A tick that fires
/// late results in a single flush, after which the schedule resumes at the next boundary that
/// lies strictly after the time observed at the start of the tick.
#[derive(Debug, Default)]
pub(crate) struct Scheduler {
    state: Mutex<SchedulerState>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts periodic flushes, replacing a previously started schedule.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, pipeline: Arc<FlushPipeline>, clock: Arc<dyn Clock>, setup: Setup) {
        let mut state = self.state.lock();
        if let SchedulerState::Running { ref token, .. } = *state {
            librato_log::debug!("restarting flush schedule");
            token.cancel();
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(run(pipeline, clock, setup, token.clone()));
        *state = SchedulerState::Running { token, handle };
    }

    /// Stops periodic flushes.
    ///
    /// Returns the handle of the flush task if it was running. Awaiting the handle waits for an
    /// in-progress flush to complete.
    pub fn stop(&self) -> Option<JoinHandle<()>> {
        match mem::replace(&mut *self.state.lock(), SchedulerState::Ending) {
            SchedulerState::Running { token, handle } => {
                token.cancel();
                Some(handle)
            }
            SchedulerState::Idle | SchedulerState::Ending => None,
        }
    }

    /// Returns `true` if periodic flushes are active.
    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock(), SchedulerState::Running { .. })
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let SchedulerState::Running { ref token, .. } = *self.state.get_mut() {
            token.cancel();
        }
    }
}

/// Returns the first boundary after `target` that is strictly later than `now`.
fn next_target(target: UnixMillis, now: UnixMillis, period: Duration) -> UnixMillis {
    if target > now {
        return target;
    }

    let period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX).max(1);
    let missed = (now.as_millis() - target.as_millis()) / period_ms + 1;
    UnixMillis::from_millis(target.as_millis().saturating_add(missed * period_ms))
}

async fn run(
    pipeline: Arc<FlushPipeline>,
    clock: Arc<dyn Clock>,
    setup: Setup,
    token: CancellationToken,
) {
    let period = setup.config.flush_period();
    let mut target = clock.now().next_multiple_of(period);
    librato_log::debug!("first flush scheduled at {target}");

    loop {
        let delay = target.saturating_duration_since(clock.now());

        tokio::select! {
            biased;

            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => (),
        }

        let before = clock.now();
        if before >= target {
            pipeline.flush(Some(&setup)).await;
        }

        if token.is_cancelled() {
            break;
        }

        if before.saturating_duration_since(target) >= period {
            librato_log::debug!(
                "flush was late by {}ms, skipping missed boundaries",
                before.saturating_duration_since(target).as_millis()
            );
        }
        target = next_target(target, before, period);
    }

    librato_log::debug!("flush schedule stopped");
}
