use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::events::{Disposer, HostVisibility};
use crate::models::config::MixerConfiguration;
use crate::models::error::MixerError;
use crate::models::state::PlayerSnapshot;
use crate::models::stems::StemSet;
use crate::models::track::TrackName;
use crate::session::mixer::TrackMixer;
use crate::session::resilience::BackgroundResilienceMonitor;
use crate::session::transport::TransportClock;
use crate::traits::audio_engine::AudioEngine;
use crate::traits::media_session::{
    MediaAction, MediaActionHandler, MediaMetadata, MediaPlaybackState, MediaSessionHandle,
};
use crate::traits::playback_control::PlaybackControl;
use crate::traits::player_delegate::PlayerDelegate;
use crate::traits::stem_store::StemStore;
use crate::traits::time_source::{SystemTimeSource, TimeSource};

/// Where `load_tracks` gets its stems from.
pub enum StemSource {
    Direct(StemSet),
    /// Fetched by song/job id from a storage collaborator.
    Stored {
        store: Arc<dyn StemStore>,
        song_id: String,
    },
}

#[derive(Default)]
struct PlayerStatus {
    is_loading: bool,
    /// Displayed position, updated by the active scheduler.
    current_time: f64,
    error: Option<String>,
}

type DelegateSlot = Arc<Mutex<Option<Arc<dyn PlayerDelegate>>>>;

struct PlayerShared {
    me: Weak<PlayerShared>,
    engine: Arc<dyn AudioEngine>,
    clock: Arc<TransportClock>,
    visibility: HostVisibility,
    mixer: Mutex<TrackMixer>,
    monitor: Mutex<BackgroundResilienceMonitor>,
    status: Arc<Mutex<PlayerStatus>>,
    delegate: DelegateSlot,
    media: Mutex<Option<Arc<dyn MediaSessionHandle>>>,
    /// Visibility listener and media session handlers of the loaded song.
    bindings: Mutex<Disposer>,
}

/// Playback facade: transport, mixer and background resilience of one song.
///
/// Cheap to clone; clones share the same player. Everything allocated for a
/// song is released by [`StemPlayer::cleanup`], which also runs before every
/// load and when the last handle is dropped.
///
/// ```text
/// host UI ──► StemPlayer ──► TransportClock
///                       ├──► TrackMixer ──► AudioEngine
///                       └──► BackgroundResilienceMonitor ──► keep-alive, timers
/// ```
#[derive(Clone)]
pub struct StemPlayer {
    shared: Arc<PlayerShared>,
}

impl StemPlayer {
    pub fn new(
        engine: Arc<dyn AudioEngine>,
        visibility: HostVisibility,
        config: MixerConfiguration,
    ) -> Result<Self, MixerError> {
        Self::with_time_source(engine, visibility, config, Arc::new(SystemTimeSource::new()))
    }

    /// Fails with [`MixerError::Configuration`] if `config` does not validate.
    pub fn with_time_source(
        engine: Arc<dyn AudioEngine>,
        visibility: HostVisibility,
        config: MixerConfiguration,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self, MixerError> {
        config.validate().map_err(MixerError::Configuration)?;

        let clock = Arc::new(TransportClock::new(time));
        let status = Arc::new(Mutex::new(PlayerStatus::default()));
        let delegate: DelegateSlot = Arc::new(Mutex::new(None));

        let sink_status = Arc::clone(&status);
        let sink_delegate = Arc::clone(&delegate);
        let sink = Arc::new(move |secs: f64| {
            sink_status.lock().current_time = secs;
            let delegate = sink_delegate.lock().clone();
            if let Some(d) = delegate {
                d.on_time_updated(secs);
            }
        });

        let monitor = BackgroundResilienceMonitor::new(
            Arc::clone(&engine),
            Arc::clone(&clock),
            visibility.clone(),
            config.clone(),
            sink,
        );
        let mixer = TrackMixer::new(Arc::clone(&engine), config);

        let shared = Arc::new_cyclic(|me| PlayerShared {
            me: me.clone(),
            engine,
            clock,
            visibility,
            mixer: Mutex::new(mixer),
            monitor: Mutex::new(monitor),
            status,
            delegate,
            media: Mutex::new(None),
            bindings: Mutex::new(Disposer::new()),
        });

        if !shared.engine.is_supported() {
            shared.status.lock().error = Some(unsupported().to_string());
        }
        Ok(Self { shared })
    }

    pub fn set_delegate(&self, delegate: Arc<dyn PlayerDelegate>) {
        *self.shared.delegate.lock() = Some(delegate);
    }

    /// Attach the platform media session. Takes effect from the next load.
    pub fn set_media_session(&self, session: Arc<dyn MediaSessionHandle>) {
        *self.shared.media.lock() = Some(session);
    }

    /// Load a song, replacing whatever was loaded.
    ///
    /// Succeeds when at least one track loads; failed tracks carry their own
    /// error in the snapshot.
    pub fn load_tracks(&self, source: StemSource) -> Result<(), MixerError> {
        let shared = &self.shared;
        if !shared.engine.is_supported() {
            let error = unsupported();
            shared.fail(&error);
            return Err(error);
        }

        shared.cleanup();
        {
            let mut status = shared.status.lock();
            status.is_loading = true;
            status.error = None;
        }
        shared.notify_state();

        let result = shared.load_inner(source);
        shared.status.lock().is_loading = false;

        match result {
            Ok(()) => {
                shared.notify_state();
                Ok(())
            }
            Err(e) => {
                shared.fail(&e);
                Err(e)
            }
        }
    }

    /// Start playback. Does nothing until a track is loaded.
    pub fn play(&self) -> Result<(), MixerError> {
        self.shared.play()
    }

    pub fn pause(&self) {
        self.shared.pause();
    }

    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Seek the transport, clamped to `[0, duration]`.
    pub fn seek(&self, secs: f64) {
        let shared = &self.shared;
        let applied = shared.clock.seek(secs);
        shared.sync_engine();
        shared.publish_time(applied);
    }

    pub fn set_volume(&self, track: TrackName, volume: f64) {
        self.shared.mixer.lock().set_volume(track, volume);
        self.shared.notify_state();
    }

    pub fn set_pitch_shift(&self, semitones: f64) {
        self.shared.mixer.lock().set_pitch_shift(semitones);
        self.shared.notify_state();
    }

    pub fn set_master_volume(&self, volume: f64) {
        self.shared.mixer.lock().set_master_volume(volume);
        self.shared.notify_state();
    }

    /// Host frame callback; updates the displayed time while visible.
    pub fn on_frame(&self) -> bool {
        let callback = self.shared.monitor.lock().frame_callback();
        match callback {
            Some(update) => {
                update();
                true
            }
            None => false,
        }
    }

    /// The platform interrupted audio processing. The transport freezes but
    /// keeps its playing intent so recovery can restart it.
    pub fn on_engine_interrupted(&self) {
        log::info!("Audio engine interrupted");
        self.shared.clock.interrupt();
    }

    /// Release every node, timer, listener and the keep-alive. Idempotent.
    pub fn cleanup(&self) {
        self.shared.cleanup();
        self.shared.notify_state();
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.shared.snapshot()
    }

    pub fn is_ready(&self) -> bool {
        self.shared.mixer.lock().is_ready()
    }

    pub fn is_playing(&self) -> bool {
        self.shared.clock.is_playing()
    }

    /// Position shown to the user.
    pub fn current_time(&self) -> f64 {
        self.shared.status.lock().current_time
    }

    pub fn duration(&self) -> f64 {
        self.shared.clock.duration()
    }

    /// Timers and frame subscriptions currently running.
    pub fn active_timers(&self) -> usize {
        self.shared.monitor.lock().active_timers()
    }

    pub fn transport(&self) -> &TransportClock {
        &self.shared.clock
    }
}

impl PlaybackControl for StemPlayer {
    fn play(&self) -> Result<(), MixerError> {
        StemPlayer::play(self)
    }

    fn pause(&self) {
        StemPlayer::pause(self)
    }

    fn seek(&self, secs: f64) {
        StemPlayer::seek(self, secs)
    }

    fn is_playing(&self) -> bool {
        self.shared.clock.is_playing()
    }

    fn position(&self) -> f64 {
        self.shared.clock.position()
    }
}

fn unsupported() -> MixerError {
    MixerError::UnsupportedPlatform("audio engine is not available on this platform".into())
}

impl PlayerShared {
    fn play(&self) -> Result<(), MixerError> {
        if !self.mixer.lock().is_ready() {
            log::debug!("Play ignored: no track loaded");
            return Ok(());
        }

        if let Err(e) = self.engine.resume() {
            let error = MixerError::PlaybackStart(e.to_string());
            self.fail(&error);
            return Err(error);
        }

        self.clock.start();
        self.sync_engine();
        if let Err(e) = self.monitor.lock().playback_started() {
            log::warn!("Display updates unavailable: {}", e);
        }
        self.advertise(MediaPlaybackState::Playing);
        log::info!("Playback started at {:.3}s", self.clock.position());
        self.notify_state();
        Ok(())
    }

    fn pause(&self) {
        self.clock.pause();
        self.sync_engine();
        self.monitor.lock().playback_paused();
        self.status.lock().current_time = self.clock.position();
        self.advertise(MediaPlaybackState::Paused);
        log::info!("Playback paused at {:.3}s", self.clock.position());
        self.notify_state();
    }

    fn stop(&self) {
        self.clock.stop();
        self.sync_engine();
        self.monitor.lock().playback_stopped();
        self.status.lock().current_time = 0.0;
        self.advertise(MediaPlaybackState::None);
        self.notify_state();
    }

    fn load_inner(&self, source: StemSource) -> Result<(), MixerError> {
        self.engine.resume()?;

        let stems = match source {
            StemSource::Direct(stems) => stems,
            StemSource::Stored { store, song_id } => store
                .load_song(&song_id)?
                .ok_or_else(|| MixerError::Storage("song not found".into()))?,
        };

        self.clock.reset(stems.duration_secs);
        self.bind_visibility();

        self.mixer.lock().load_tracks(&stems)?;
        self.clock.arm(true);
        self.sync_engine();
        self.bind_media_session(&stems);
        log::info!(
            "Song {} ready ({:.1}s)",
            stems.song_id.as_deref().unwrap_or("<direct>"),
            stems.duration_secs
        );
        Ok(())
    }

    fn bind_visibility(&self) {
        let weak = self.me.clone();
        let mut bindings = self.bindings.lock();
        self.visibility.subscribe_scoped(&mut bindings, move |hidden| {
            if let Some(shared) = weak.upgrade() {
                let result = shared.monitor.lock().on_visibility_changed(hidden);
                if let Err(e) = result {
                    log::warn!("Display scheduling failed: {}", e);
                }
            }
        });
    }

    /// Publish now-playing metadata and route the platform's remote
    /// transport controls to this player until the next cleanup.
    fn bind_media_session(&self, stems: &StemSet) {
        let Some(media) = self.media.lock().clone() else {
            return;
        };

        let title = stems
            .title
            .clone()
            .or_else(|| stems.song_id.clone())
            .unwrap_or_else(|| "Stem Mixer".into());
        media.set_metadata(Some(MediaMetadata {
            title,
            artist: "Stem Mixer".into(),
            album: "Local Library".into(),
        }));

        for action in MediaAction::ALL {
            let weak = self.me.clone();
            let handler: MediaActionHandler = Arc::new(move || {
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                match action {
                    MediaAction::Play => {
                        if let Err(e) = shared.play() {
                            log::debug!("Remote play refused: {}", e);
                        }
                    }
                    MediaAction::Pause => shared.pause(),
                    MediaAction::Stop => shared.stop(),
                }
            });
            media.set_action_handler(action, Some(handler));
        }

        self.bindings.lock().push(move || {
            for action in MediaAction::ALL {
                media.set_action_handler(action, None);
            }
            media.set_metadata(None);
            media.set_playback_state(MediaPlaybackState::None);
        });
    }

    fn advertise(&self, state: MediaPlaybackState) {
        let media = self.media.lock().clone();
        if let Some(media) = media {
            media.set_playback_state(state);
        }
    }

    fn cleanup(&self) {
        let bindings = std::mem::take(&mut *self.bindings.lock());
        drop(bindings);

        self.monitor.lock().shutdown();
        self.clock.stop();
        self.clock.arm(false);
        self.mixer.lock().release_all();
        self.sync_engine();
        self.status.lock().current_time = 0.0;
        log::debug!("Player cleaned up");
    }

    fn sync_engine(&self) {
        self.engine.sync_transport(&self.clock.snapshot());
    }

    fn publish_time(&self, secs: f64) {
        self.status.lock().current_time = secs;
        let delegate = self.delegate.lock().clone();
        if let Some(d) = delegate {
            d.on_time_updated(secs);
        }
    }

    fn fail(&self, error: &MixerError) {
        if error.is_fatal() {
            self.status.lock().error = Some(error.to_string());
        }
        log::error!("{}", error);
        let delegate = self.delegate.lock().clone();
        if let Some(d) = delegate {
            d.on_error(error);
        }
        self.notify_state();
    }

    fn notify_state(&self) {
        let delegate = self.delegate.lock().clone();
        if let Some(d) = delegate {
            d.on_state_changed(&self.snapshot());
        }
    }

    fn snapshot(&self) -> PlayerSnapshot {
        let (tracks, is_ready, master_volume, pitch_shift) = {
            let mixer = self.mixer.lock();
            (
                mixer.track_states(),
                mixer.is_ready(),
                mixer.master_volume(),
                mixer.pitch_shift(),
            )
        };
        let status = self.status.lock();
        PlayerSnapshot {
            is_loading: status.is_loading,
            is_playing: self.clock.is_playing(),
            current_time: status.current_time,
            duration: self.clock.duration(),
            tracks,
            is_ready,
            error: status.error.clone(),
            master_volume,
            pitch_shift,
        }
    }
}

impl Drop for PlayerShared {
    fn drop(&mut self) {
        self.cleanup();
    }
}
