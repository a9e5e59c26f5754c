use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::state::TransportState;
use crate::traits::time_source::TimeSource;

struct ClockInner {
    /// Position at `anchor_at`.
    anchor_pos: f64,
    anchor_at: Duration,
    duration: f64,
    /// User intent: playback requested and not paused since.
    playing: bool,
    /// The clock is actually advancing. Differs from `playing` only while the
    /// platform has interrupted audio processing.
    ticking: bool,
    /// At least one track is loaded.
    armed: bool,
}

impl ClockInner {
    fn position_at(&self, now: Duration) -> f64 {
        if !self.ticking {
            return self.anchor_pos;
        }
        let elapsed = now.saturating_sub(self.anchor_at).as_secs_f64();
        (self.anchor_pos + elapsed).min(self.duration)
    }

    /// Fold elapsed time into the anchor.
    fn freeze(&mut self, now: Duration) {
        self.anchor_pos = self.position_at(now);
        self.anchor_at = now;
        self.ticking = false;
    }

    fn run(&mut self, now: Duration) {
        self.anchor_at = now;
        self.ticking = true;
    }
}

/// Single authoritative playback position for every track.
///
/// The position advances in wall-clock time from an anchor while ticking and
/// is always clamped to `[0, duration]`. Every transition happens under one
/// lock, so readers never see a half-applied update.
pub struct TransportClock {
    time: Arc<dyn TimeSource>,
    inner: Mutex<ClockInner>,
}

impl TransportClock {
    pub fn new(time: Arc<dyn TimeSource>) -> Self {
        Self {
            time,
            inner: Mutex::new(ClockInner {
                anchor_pos: 0.0,
                anchor_at: Duration::ZERO,
                duration: 0.0,
                playing: false,
                ticking: false,
                armed: false,
            }),
        }
    }

    /// Start advancing. Silently does nothing (returns `false`) until a track
    /// is loaded.
    pub fn start(&self) -> bool {
        let now = self.time.now();
        let mut inner = self.inner.lock();
        if !inner.armed {
            log::debug!("Transport start ignored: no track loaded");
            return false;
        }
        if !inner.ticking {
            inner.run(now);
        }
        inner.playing = true;
        true
    }

    pub fn pause(&self) {
        let now = self.time.now();
        let mut inner = self.inner.lock();
        inner.freeze(now);
        inner.playing = false;
    }

    /// Pause and rewind to 0.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        inner.anchor_pos = 0.0;
        inner.ticking = false;
        inner.playing = false;
    }

    /// Jump to `secs`, clamped to `[0, duration]`. Returns the applied position.
    ///
    /// While playing, pause/set/resume happen as a single step.
    pub fn seek(&self, secs: f64) -> f64 {
        let now = self.time.now();
        let mut inner = self.inner.lock();
        let target = if secs.is_nan() { 0.0 } else { secs.clamp(0.0, inner.duration) };

        let was_ticking = inner.ticking;
        if was_ticking {
            inner.freeze(now);
        }
        inner.anchor_pos = target;
        if was_ticking {
            inner.run(now);
        }
        target
    }

    pub fn position(&self) -> f64 {
        let now = self.time.now();
        self.inner.lock().position_at(now)
    }

    pub fn duration(&self) -> f64 {
        self.inner.lock().duration
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().playing
    }

    pub fn is_ticking(&self) -> bool {
        self.inner.lock().ticking
    }

    pub fn is_armed(&self) -> bool {
        self.inner.lock().armed
    }

    /// The platform stopped audio processing: freeze the position but keep
    /// the playing intent so recovery can restart it.
    pub fn interrupt(&self) {
        let now = self.time.now();
        let mut inner = self.inner.lock();
        if inner.ticking {
            inner.freeze(now);
            log::debug!("Transport interrupted at {:.3}s", inner.anchor_pos);
        }
    }

    /// Restart a clock that was interrupted while playing. Returns whether it
    /// had to be restarted.
    pub fn resume_ticking(&self) -> bool {
        let now = self.time.now();
        let mut inner = self.inner.lock();
        if inner.playing && inner.armed && !inner.ticking {
            inner.run(now);
            return true;
        }
        false
    }

    /// Back to `{0, duration, stopped}` for a new song. Disarms the clock.
    pub fn reset(&self, duration_secs: f64) {
        let mut inner = self.inner.lock();
        inner.anchor_pos = 0.0;
        inner.duration = if duration_secs.is_finite() { duration_secs.max(0.0) } else { 0.0 };
        inner.playing = false;
        inner.ticking = false;
        inner.armed = false;
    }

    /// Mark whether any track is loaded. Disarming also stops playback.
    pub fn arm(&self, armed: bool) {
        let now = self.time.now();
        let mut inner = self.inner.lock();
        inner.armed = armed;
        if !armed {
            inner.freeze(now);
            inner.playing = false;
        }
    }

    pub fn snapshot(&self) -> TransportState {
        let now = self.time.now();
        let inner = self.inner.lock();
        TransportState {
            position_secs: inner.position_at(now),
            duration_secs: inner.duration,
            playing: inner.playing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::time_source::ManualTimeSource;
    use approx::assert_abs_diff_eq;

    fn armed_clock(duration: f64) -> (Arc<ManualTimeSource>, TransportClock) {
        let time = Arc::new(ManualTimeSource::new());
        let clock = TransportClock::new(time.clone());
        clock.reset(duration);
        clock.arm(true);
        (time, clock)
    }

    #[test]
    fn start_without_tracks_is_silent_noop() {
        let time = Arc::new(ManualTimeSource::new());
        let clock = TransportClock::new(time.clone());
        clock.reset(30.0);

        assert!(!clock.start());
        time.advance_secs(2.0);

        assert!(!clock.is_playing());
        assert_eq!(clock.position(), 0.0);
    }

    #[test]
    fn advances_in_wall_clock_time() {
        let (time, clock) = armed_clock(30.0);
        assert!(clock.start());

        time.advance_secs(1.5);
        assert_abs_diff_eq!(clock.position(), 1.5, epsilon = 1e-9);

        clock.pause();
        time.advance_secs(5.0);
        assert_abs_diff_eq!(clock.position(), 1.5, epsilon = 1e-9);
        assert!(!clock.is_playing());
    }

    #[test]
    fn position_never_exceeds_duration() {
        let (time, clock) = armed_clock(3.0);
        clock.start();
        time.advance_secs(10.0);
        assert_eq!(clock.position(), 3.0);
    }

    #[test]
    fn seek_then_read_yields_target() {
        let (time, clock) = armed_clock(20.0);
        for t in [0.0, 0.25, 7.5, 19.99, 20.0] {
            clock.seek(t);
            assert_abs_diff_eq!(clock.position(), t, epsilon = 1e-9);
        }

        clock.start();
        time.advance_secs(1.0);
        clock.seek(4.0);
        assert_abs_diff_eq!(clock.position(), 4.0, epsilon = 1e-9);
        assert!(clock.is_playing());
        assert!(clock.is_ticking());

        time.advance_secs(0.5);
        assert_abs_diff_eq!(clock.position(), 4.5, epsilon = 1e-9);
    }

    #[test]
    fn seek_clamps() {
        let (_time, clock) = armed_clock(12.0);
        assert_eq!(clock.seek(-5.0), 0.0);
        assert_eq!(clock.position(), 0.0);
        assert_eq!(clock.seek(22.0), 12.0);
        assert_eq!(clock.position(), 12.0);
        assert_eq!(clock.seek(f64::NAN), 0.0);
    }

    #[test]
    fn stop_rewinds() {
        let (time, clock) = armed_clock(12.0);
        clock.start();
        time.advance_secs(3.0);

        clock.stop();

        assert_eq!(clock.snapshot(), TransportState::stopped(12.0));
    }

    #[test]
    fn interrupt_keeps_intent_and_resume_restarts() {
        let (time, clock) = armed_clock(60.0);
        clock.start();
        time.advance_secs(2.0);

        clock.interrupt();
        time.advance_secs(3.0);
        assert!(clock.is_playing());
        assert!(!clock.is_ticking());
        assert_abs_diff_eq!(clock.position(), 2.0, epsilon = 1e-9);

        assert!(clock.resume_ticking());
        assert!(!clock.resume_ticking());
        time.advance_secs(1.0);
        assert_abs_diff_eq!(clock.position(), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn resume_ticking_respects_pause() {
        let (_time, clock) = armed_clock(60.0);
        clock.start();
        clock.pause();
        assert!(!clock.resume_ticking());
    }

    #[test]
    fn disarm_stops_playback() {
        let (_time, clock) = armed_clock(60.0);
        clock.start();
        clock.arm(false);
        assert!(!clock.is_playing());
        assert!(!clock.start());
    }
}
