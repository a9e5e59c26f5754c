use std::sync::Arc;

use parking_lot::Mutex;

use crate::events::HostVisibility;
use crate::models::config::MixerConfiguration;
use crate::models::error::MixerError;
use crate::models::state::EngineState;
use crate::session::scheduler::{FrameScheduler, IntervalScheduler, UpdateFn, UpdateScheduler};
use crate::session::transport::TransportClock;
use crate::traits::audio_engine::AudioEngine;
use crate::traits::keep_alive::KeepAliveStream;

/// Receives the position to display.
pub type TimeSink = Arc<dyn Fn(f64) + Send + Sync + 'static>;

type KeepAliveSlot = Arc<Mutex<Option<Box<dyn KeepAliveStream>>>>;

/// Keeps playback and the time display alive while the host surface is hidden.
///
/// Visible: the display follows host frames. Hidden while playing: the
/// display is polled on an interval and a recovery loop restarts whatever
/// the platform stopped (suspended engine, stalled transport, paused
/// keep-alive). Recovery failures are logged and retried on the next tick,
/// never reported. The loop ends by itself once the surface is visible again
/// or playback is paused.
pub struct BackgroundResilienceMonitor {
    engine: Arc<dyn AudioEngine>,
    clock: Arc<TransportClock>,
    visibility: HostVisibility,
    config: MixerConfiguration,
    sink: TimeSink,
    keep_alive: KeepAliveSlot,
    frames: FrameScheduler,
    poll: IntervalScheduler,
    recovery: IntervalScheduler,
}

impl BackgroundResilienceMonitor {
    pub fn new(
        engine: Arc<dyn AudioEngine>,
        clock: Arc<TransportClock>,
        visibility: HostVisibility,
        config: MixerConfiguration,
        sink: TimeSink,
    ) -> Self {
        let poll = IntervalScheduler::new("time-poll", config.hidden_poll_interval());
        let recovery = IntervalScheduler::new("playback-recovery", config.recovery_interval());
        Self {
            engine,
            clock,
            visibility,
            config,
            sink,
            keep_alive: Arc::new(Mutex::new(None)),
            frames: FrameScheduler::new(),
            poll,
            recovery,
        }
    }

    /// Playback just started: start the keep-alive (created on first use)
    /// and the display updates for the current visibility.
    pub fn playback_started(&mut self) -> Result<(), MixerError> {
        self.ensure_keep_alive();
        if let Some(stream) = self.keep_alive.lock().as_mut() {
            if let Err(e) = stream.play() {
                log::warn!("Keep-alive stream failed to start: {}", e);
            }
        }

        if self.visibility.is_hidden() {
            self.enter_hidden()
        } else {
            self.frames.start(self.display_update())
        }
    }

    pub fn playback_paused(&mut self) {
        self.cancel_all();
        if let Some(stream) = self.keep_alive.lock().as_mut() {
            stream.pause();
        }
    }

    pub fn playback_stopped(&mut self) {
        self.cancel_all();
        if let Some(stream) = self.keep_alive.lock().as_mut() {
            stream.pause();
            stream.rewind();
        }
    }

    pub fn on_visibility_changed(&mut self, hidden: bool) -> Result<(), MixerError> {
        if hidden {
            if self.clock.is_playing() {
                return self.enter_hidden();
            }
            Ok(())
        } else {
            self.leave_hidden()
        }
    }

    /// Host frame callback while visible.
    pub fn on_frame(&self) -> bool {
        self.frames.on_frame()
    }

    /// The per-frame update, for hosts that run it outside any lock.
    pub fn frame_callback(&self) -> Option<UpdateFn> {
        self.frames.callback()
    }

    /// Timers and frame subscriptions currently running.
    pub fn active_timers(&self) -> usize {
        [
            self.frames.is_active(),
            self.poll.is_active(),
            self.recovery.is_active(),
        ]
        .iter()
        .filter(|active| **active)
        .count()
    }

    pub fn is_recovering(&self) -> bool {
        self.recovery.is_active()
    }

    pub fn has_keep_alive(&self) -> bool {
        self.keep_alive.lock().is_some()
    }

    /// The keep-alive exists and is producing output.
    pub fn keep_alive_playing(&self) -> bool {
        self.keep_alive.lock().as_ref().is_some_and(|s| !s.is_paused())
    }

    /// Cancel every timer and tear the keep-alive stream down. Idempotent.
    pub fn shutdown(&mut self) {
        self.cancel_all();
        if let Some(mut stream) = self.keep_alive.lock().take() {
            stream.teardown();
            log::debug!("Keep-alive stream torn down");
        }
    }

    fn enter_hidden(&mut self) -> Result<(), MixerError> {
        self.frames.cancel();
        self.poll.start(self.display_update())?;

        let engine = Arc::clone(&self.engine);
        let clock = Arc::clone(&self.clock);
        let visibility = self.visibility.clone();
        let slot = Arc::clone(&self.keep_alive);
        self.recovery.start_until(move || {
            if !visibility.is_hidden() || !clock.is_playing() {
                return false;
            }
            if let Err(e) = recover_once(engine.as_ref(), &clock, &slot) {
                log::debug!("{}; retrying", e);
            }
            true
        })?;

        log::debug!(
            "Hidden: polling every {:?}, recovering every {:?}",
            self.poll.period(),
            self.recovery.period()
        );
        Ok(())
    }

    fn leave_hidden(&mut self) -> Result<(), MixerError> {
        self.poll.cancel();
        self.recovery.cancel();

        if self.clock.is_playing() {
            // The transport kept running in the background.
            (self.sink)(self.clock.position());
            self.frames.start(self.display_update())?;
        }
        Ok(())
    }

    fn cancel_all(&mut self) {
        self.frames.cancel();
        self.poll.cancel();
        self.recovery.cancel();
    }

    fn display_update(&self) -> UpdateFn {
        let clock = Arc::clone(&self.clock);
        let sink = Arc::clone(&self.sink);
        Arc::new(move || {
            if clock.is_playing() {
                sink(clock.position());
            }
        })
    }

    fn ensure_keep_alive(&mut self) {
        let mut slot = self.keep_alive.lock();
        if slot.is_some() {
            return;
        }

        let mut stream = match self
            .engine
            .create_keep_alive(self.config.keep_alive_frequency_hz, self.config.keep_alive_gain)
        {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("Background playback support unavailable: {}", e);
                return;
            }
        };

        // The platform paused the stream while the user still wants playback.
        let engine = Arc::clone(&self.engine);
        let clock = Arc::clone(&self.clock);
        let weak_slot = Arc::downgrade(&self.keep_alive);
        stream.set_pause_listener(Box::new(move || {
            if !clock.is_playing() {
                return;
            }
            if let Some(slot) = weak_slot.upgrade() {
                if let Err(e) = recover_once(engine.as_ref(), &clock, &slot) {
                    log::debug!("{}", e);
                }
            }
        }));

        *slot = Some(stream);
    }
}

impl Drop for BackgroundResilienceMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// One recovery attempt: resume a suspended engine, restart an interrupted
/// transport, replay a paused keep-alive. Returns whether anything was restarted.
fn recover_once(
    engine: &dyn AudioEngine,
    clock: &TransportClock,
    keep_alive: &Mutex<Option<Box<dyn KeepAliveStream>>>,
) -> Result<bool, MixerError> {
    let mut restarted = false;

    if engine.state() == EngineState::Suspended {
        engine
            .resume()
            .map_err(|e| MixerError::BackgroundRecovery(e.to_string()))?;
        log::debug!("Recovery: audio engine resumed");
        restarted = true;
    }

    if clock.resume_ticking() {
        engine.sync_transport(&clock.snapshot());
        log::debug!("Recovery: transport restarted at {:.3}s", clock.position());
        restarted = true;
    }

    // Another caller holds the stream; the next tick retries.
    if let Some(mut slot) = keep_alive.try_lock() {
        if let Some(stream) = slot.as_mut() {
            if stream.is_paused() {
                stream
                    .play()
                    .map_err(|e| MixerError::BackgroundRecovery(e.to_string()))?;
                log::debug!("Recovery: keep-alive restarted");
                restarted = true;
            }
        }
    }

    Ok(restarted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::headless::HeadlessEngine;
    use crate::test_support::wait_for;
    use crate::traits::time_source::ManualTimeSource;

    struct Fixture {
        time: Arc<ManualTimeSource>,
        engine: Arc<HeadlessEngine>,
        clock: Arc<TransportClock>,
        visibility: HostVisibility,
        shown: Arc<Mutex<Vec<f64>>>,
        monitor: BackgroundResilienceMonitor,
    }

    fn fixture() -> Fixture {
        let time = Arc::new(ManualTimeSource::new());
        let engine = Arc::new(HeadlessEngine::new(time.clone()));
        engine.resume().unwrap();
        let clock = Arc::new(TransportClock::new(time.clone()));
        clock.reset(120.0);
        clock.arm(true);
        let visibility = HostVisibility::new();
        let shown = Arc::new(Mutex::new(Vec::new()));
        let sink_target = Arc::clone(&shown);
        let config = MixerConfiguration {
            hidden_poll_interval_ms: 2,
            recovery_interval_ms: 2,
            ..Default::default()
        };
        let monitor = BackgroundResilienceMonitor::new(
            engine.clone(),
            clock.clone(),
            visibility.clone(),
            config,
            Arc::new(move |t| sink_target.lock().push(t)),
        );
        Fixture {
            time,
            engine,
            clock,
            visibility,
            shown,
            monitor,
        }
    }

    fn play(f: &mut Fixture) {
        f.clock.start();
        f.monitor.playback_started().unwrap();
    }

    fn hide(f: &mut Fixture) {
        f.visibility.set_hidden(true);
        f.monitor.on_visibility_changed(true).unwrap();
    }

    #[test]
    fn keep_alive_starts_lazily() {
        let mut f = fixture();
        assert!(!f.monitor.has_keep_alive());
        assert_eq!(f.engine.live_keep_alives(), 0);

        play(&mut f);
        f.monitor.playback_paused();
        play(&mut f);

        assert!(f.monitor.keep_alive_playing());
        assert_eq!(f.engine.live_keep_alives(), 1);
    }

    #[test]
    fn visible_playback_follows_frames() {
        let mut f = fixture();
        play(&mut f);
        f.time.advance_secs(1.25);

        assert!(f.monitor.on_frame());
        assert_eq!(f.shown.lock().last().copied(), Some(1.25));
        assert_eq!(f.monitor.active_timers(), 1);
        assert!(!f.monitor.is_recovering());
    }

    #[test]
    fn hiding_switches_to_interval_polling() {
        let mut f = fixture();
        play(&mut f);
        hide(&mut f);

        assert!(!f.monitor.on_frame());
        assert!(f.monitor.is_recovering());
        let shown = Arc::clone(&f.shown);
        assert!(wait_for(|| shown.lock().len() >= 2));
        assert_eq!(f.monitor.active_timers(), 2);
    }

    #[test]
    fn hiding_while_paused_starts_nothing() {
        let mut f = fixture();
        hide(&mut f);
        assert_eq!(f.monitor.active_timers(), 0);
    }

    #[test]
    fn recovery_restarts_engine_and_transport() {
        let mut f = fixture();
        play(&mut f);
        hide(&mut f);

        f.engine.suspend();
        f.clock.interrupt();

        let (engine, clock) = (Arc::clone(&f.engine), Arc::clone(&f.clock));
        assert!(wait_for(|| engine.state() == EngineState::Running && clock.is_ticking()));
        assert!(f.engine.last_transport().playing);
    }

    #[test]
    fn refused_resume_is_retried_silently() {
        let mut f = fixture();
        play(&mut f);
        hide(&mut f);

        f.engine.set_resume_refused(true);
        f.engine.suspend();
        let engine = Arc::clone(&f.engine);
        let calls_before = engine.resume_calls();
        assert!(wait_for(|| engine.resume_calls() >= calls_before + 3));
        assert!(f.monitor.is_recovering());

        f.engine.set_resume_refused(false);
        assert!(wait_for(|| engine.state() == EngineState::Running));
    }

    #[test]
    fn recovery_loop_ends_when_paused() {
        let mut f = fixture();
        play(&mut f);
        hide(&mut f);
        assert!(f.monitor.is_recovering());

        // Paused directly on the clock, so only the loop itself can notice.
        f.clock.pause();

        let monitor = &f.monitor;
        assert!(wait_for(|| !monitor.is_recovering()));
    }

    #[test]
    fn showing_resyncs_to_advanced_position() {
        let mut f = fixture();
        play(&mut f);
        hide(&mut f);

        f.time.advance_secs(42.0);
        f.visibility.set_hidden(false);
        f.monitor.on_visibility_changed(false).unwrap();

        assert_eq!(f.shown.lock().last().copied(), Some(42.0));
        assert!(!f.monitor.is_recovering());
        assert_eq!(f.monitor.active_timers(), 1);
        assert!(f.monitor.on_frame());
    }

    #[test]
    fn stalled_keep_alive_recovers_immediately() {
        let mut f = fixture();
        play(&mut f);

        f.engine.stall_keep_alive();

        assert!(f.monitor.keep_alive_playing());
    }

    #[test]
    fn stalled_keep_alive_after_pause_stays_paused() {
        let mut f = fixture();
        play(&mut f);
        f.clock.pause();
        f.monitor.playback_paused();

        f.engine.stall_keep_alive();

        assert!(!f.monitor.keep_alive_playing());
    }

    #[test]
    fn recover_once_reports_refusal() {
        let f = fixture();
        f.engine.suspend();
        f.engine.set_resume_refused(true);
        let slot: Mutex<Option<Box<dyn KeepAliveStream>>> = Mutex::new(None);

        let result = recover_once(f.engine.as_ref(), &f.clock, &slot);

        assert!(matches!(result, Err(MixerError::BackgroundRecovery(_))));
    }

    #[test]
    fn recover_once_restarts_everything() {
        let f = fixture();
        f.clock.start();
        f.clock.interrupt();
        f.engine.suspend();
        let mut stream = f.engine.create_keep_alive(1.0, 0.001).unwrap();
        stream.pause();
        let slot = Mutex::new(Some(stream));

        assert!(recover_once(f.engine.as_ref(), &f.clock, &slot).unwrap());
        assert_eq!(f.engine.state(), EngineState::Running);
        assert!(f.clock.is_ticking());
        assert!(slot.lock().as_ref().is_some_and(|s| !s.is_paused()));
        assert!(!recover_once(f.engine.as_ref(), &f.clock, &slot).unwrap());
    }

    #[test]
    fn shutdown_is_idempotent_and_complete() {
        let mut f = fixture();
        play(&mut f);
        hide(&mut f);

        f.monitor.shutdown();
        f.monitor.shutdown();

        assert_eq!(f.monitor.active_timers(), 0);
        assert!(!f.monitor.has_keep_alive());
        assert_eq!(f.engine.live_keep_alives(), 0);
    }
}
