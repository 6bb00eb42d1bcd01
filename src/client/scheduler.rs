//! Repeating background tasks with synchronous cancellation

use crate::client::error::Result;
use std::sync::mpsc::{self, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

/// Smallest period a schedule will run at
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Handle to a running schedule.
///
/// Cancelling (or dropping) the handle stops the task and waits for its
/// thread to exit, so once it returns the action will not run again.
#[derive(Debug)]
pub struct ScheduleHandle {
    name: &'static str,
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

/// Runs `action` every `every` on a dedicated thread, first either right away
/// or after one period.
///
/// Ticks are laid on a fixed grid from the start time; if an action overruns,
/// the next one runs immediately instead of queueing the missed ticks.
pub fn schedule<F>(
    name: &'static str,
    every: Duration,
    fire_immediately: bool,
    mut action: F,
) -> Result<ScheduleHandle>
where
    F: FnMut() + Send + 'static,
{
    let every = every.max(MIN_PERIOD);
    let (stop_tx, stop_rx) = mpsc::channel::<()>();

    let thread = thread::Builder::new().name(name.into()).spawn(move || {
        let mut next = Instant::now();
        if !fire_immediately {
            next += every;
        }

        loop {
            let now = Instant::now();
            let stopped = if next > now {
                !matches!(stop_rx.recv_timeout(next - now), Err(RecvTimeoutError::Timeout))
            } else {
                !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty))
            };
            if stopped {
                break;
            }

            action();

            next += every;
            let now = Instant::now();
            if next < now {
                next = now;
            }
        }
        debug!(schedule = name, "Schedule stopped");
    })?;

    debug!(schedule = name, every_ms = every.as_millis() as u64, "Schedule started");
    Ok(ScheduleHandle {
        name,
        stop: Some(stop_tx),
        thread: Some(thread),
    })
}

impl ScheduleHandle {
    /// Stops the schedule and waits for an in-progress action to finish
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for ScheduleHandle {
    fn drop(&mut self) {
        // Dropping the sender wakes the thread with a disconnect.
        self.stop.take();
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                debug!(schedule = self.name, "Scheduled action panicked");
            }
        }
    }
}
