//! Time-display update strategies.
//!
//! While the host surface is visible the display follows the host's frame
//! callback ([`FrameScheduler`]); while hidden, frame callbacks stop and a
//! coarser background interval takes over ([`IntervalScheduler`]). Both sit
//! behind [`UpdateScheduler`] so the monitor only picks one by visibility.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::models::error::MixerError;

pub type UpdateFn = Arc<dyn Fn() + Send + Sync + 'static>;

pub trait UpdateScheduler: Send {
    /// Begin calling `update`. Replaces any previous callback.
    fn start(&mut self, update: UpdateFn) -> Result<(), MixerError>;

    /// Stop calling the callback. Returns once no further call can happen.
    fn cancel(&mut self);

    fn is_active(&self) -> bool;
}

/// Calls the update once per host frame, when the host reports one.
#[derive(Default)]
pub struct FrameScheduler {
    update: Option<UpdateFn>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The callback to run on the next host frame, if any.
    pub fn callback(&self) -> Option<UpdateFn> {
        self.update.clone()
    }

    /// Host frame callback. Returns whether an update ran.
    pub fn on_frame(&self) -> bool {
        match &self.update {
            Some(update) => {
                update();
                true
            }
            None => false,
        }
    }
}

impl UpdateScheduler for FrameScheduler {
    fn start(&mut self, update: UpdateFn) -> Result<(), MixerError> {
        self.update = Some(update);
        Ok(())
    }

    fn cancel(&mut self) {
        self.update = None;
    }

    fn is_active(&self) -> bool {
        self.update.is_some()
    }
}

/// Calls the update every `period` on a background thread.
pub struct IntervalScheduler {
    name: &'static str,
    period: Duration,
    ticker: Option<Ticker>,
}

impl IntervalScheduler {
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self {
            name,
            period,
            ticker: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Like `start`, but the loop ends on its own as soon as `tick` returns `false`.
    pub fn start_until<F>(&mut self, tick: F) -> Result<(), MixerError>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.cancel();
        self.ticker = Some(Ticker::spawn(self.name, self.period, tick)?);
        Ok(())
    }
}

impl UpdateScheduler for IntervalScheduler {
    fn start(&mut self, update: UpdateFn) -> Result<(), MixerError> {
        self.start_until(move || {
            update();
            true
        })
    }

    fn cancel(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.stop();
        }
    }

    fn is_active(&self) -> bool {
        self.ticker.as_ref().is_some_and(|t| t.is_running())
    }
}

impl Drop for IntervalScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Background thread ticking at a fixed period until stopped.
struct Ticker {
    name: &'static str,
    stop: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    fn spawn<F>(name: &'static str, period: Duration, mut tick: F) -> Result<Self, MixerError>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let signal = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                let (lock, cvar) = &*signal;
                loop {
                    let deadline = Instant::now() + period;
                    let mut stopped = lock.lock();
                    while !*stopped {
                        if cvar.wait_until(&mut stopped, deadline).timed_out() {
                            break;
                        }
                    }
                    if *stopped {
                        break;
                    }
                    drop(stopped);

                    if !tick() {
                        log::debug!("{} loop finished", name);
                        break;
                    }
                }
            })
            .map_err(|e| MixerError::Engine(format!("failed to spawn {} thread: {}", name, e)))?;

        Ok(Self {
            name,
            stop,
            handle: Some(handle),
        })
    }

    fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn stop(&mut self) {
        let (lock, cvar) = &*self.stop;
        *lock.lock() = true;
        cvar.notify_all();

        if let Some(handle) = self.handle.take() {
            // A tick may cancel its own scheduler; the loop exits after it returns.
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                log::error!("{} loop panicked", self.name);
            }
        }
    }
}
