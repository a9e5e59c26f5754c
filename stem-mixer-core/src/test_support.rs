//! Fakes shared by the unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::events::ListenerId;
use crate::models::error::MixerError;
use crate::models::state::PlayerSnapshot;
use crate::models::stems::StemSet;
use crate::models::track::TrackName;
use crate::traits::media_session::{
    MediaAction, MediaActionHandler, MediaMetadata, MediaPlaybackState, MediaSessionHandle,
};
use crate::traits::player_delegate::PlayerDelegate;
use crate::traits::video_surface::{VideoEvent, VideoListener, VideoSurface};

/// Poll `condition` for up to two seconds.
pub fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Stems of `frames` frames for `tracks`, declared as a 60 s song at 44.1 kHz.
pub fn stem_set(tracks: &[TrackName], frames: usize) -> StemSet {
    let mut set = StemSet::new(44100, 60.0);
    set.song_id = Some("test-song".into());
    for track in tracks {
        let mut pcm = Vec::with_capacity(frames * 4);
        for i in 0..frames {
            let v = ((i % 64) as i16 - 32) * 256;
            pcm.extend_from_slice(&v.to_le_bytes());
            pcm.extend_from_slice(&(-v).to_le_bytes());
        }
        set.stems.insert(*track, pcm);
    }
    set
}

#[derive(Default)]
struct VideoState {
    time: f64,
    paused: bool,
    seeking: bool,
    muted: bool,
    set_time_calls: usize,
    next_id: u64,
    listeners: Vec<(ListenerId, VideoEvent, VideoListener)>,
}

/// Scripted video surface. The `user_*` methods mimic gestures on the element.
pub struct FakeVideo {
    state: Mutex<VideoState>,
}

impl FakeVideo {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(VideoState {
                paused: true,
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    pub fn user_play(&self) {
        self.state.lock().paused = false;
        self.emit(VideoEvent::Play);
    }

    pub fn user_pause(&self) {
        self.state.lock().paused = true;
        self.emit(VideoEvent::Pause);
    }

    /// The platform paused the element on its own.
    pub fn platform_pause(&self) {
        self.user_pause();
    }

    pub fn begin_seek(&self) {
        self.state.lock().seeking = true;
        self.emit(VideoEvent::SeekBegin);
    }

    pub fn end_seek(&self, time: f64) {
        {
            let mut state = self.state.lock();
            state.seeking = false;
            state.time = time;
        }
        self.emit(VideoEvent::SeekEnd);
    }

    /// Playback advanced to `time`.
    pub fn tick(&self, time: f64) {
        self.state.lock().time = time;
        self.emit(VideoEvent::TimeTick);
    }

    pub fn set_seeking(&self, seeking: bool) {
        self.state.lock().seeking = seeking;
    }

    pub fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    /// Times the position was set from outside.
    pub fn set_time_calls(&self) -> usize {
        self.state.lock().set_time_calls
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    fn emit(&self, event: VideoEvent) {
        let listeners: Vec<VideoListener> = self
            .state
            .lock()
            .listeners
            .iter()
            .filter(|(_, e, _)| *e == event)
            .map(|(_, _, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}

impl VideoSurface for FakeVideo {
    fn current_time(&self) -> f64 {
        self.state.lock().time
    }

    fn set_current_time(&self, secs: f64) {
        let mut state = self.state.lock();
        state.time = secs;
        state.set_time_calls += 1;
    }

    fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    fn is_seeking(&self) -> bool {
        self.state.lock().seeking
    }

    fn set_muted(&self, muted: bool) {
        self.state.lock().muted = muted;
    }

    fn play(&self) -> Result<(), String> {
        self.user_play();
        Ok(())
    }

    fn add_listener(&self, event: VideoEvent, listener: VideoListener) -> ListenerId {
        let mut state = self.state.lock();
        let id = ListenerId(state.next_id);
        state.next_id += 1;
        state.listeners.push((id, event, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.state.lock().listeners.retain(|(lid, _, _)| *lid != id);
    }
}

/// Delegate that records every notification.
#[derive(Default)]
pub struct RecordingDelegate {
    pub snapshots: Mutex<Vec<PlayerSnapshot>>,
    pub times: Mutex<Vec<f64>>,
    pub errors: Mutex<Vec<MixerError>>,
}

impl RecordingDelegate {
    pub fn last_snapshot(&self) -> Option<PlayerSnapshot> {
        self.snapshots.lock().last().cloned()
    }

    pub fn last_time(&self) -> Option<f64> {
        self.times.lock().last().copied()
    }
}

impl PlayerDelegate for RecordingDelegate {
    fn on_state_changed(&self, snapshot: &PlayerSnapshot) {
        self.snapshots.lock().push(snapshot.clone());
    }

    fn on_time_updated(&self, current_time: f64) {
        self.times.lock().push(current_time);
    }

    fn on_error(&self, error: &MixerError) {
        self.errors.lock().push(error.clone());
    }
}

/// Media session that records what the player publishes. `trigger` mimics a
/// remote control press.
#[derive(Default)]
pub struct FakeMediaSession {
    metadata: Mutex<Option<MediaMetadata>>,
    handlers: Mutex<HashMap<MediaAction, MediaActionHandler>>,
    state: Mutex<MediaPlaybackState>,
}

impl FakeMediaSession {
    /// Returns whether a handler was installed for `action`.
    pub fn trigger(&self, action: MediaAction) -> bool {
        let handler = self.handlers.lock().get(&action).cloned();
        match handler {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn metadata(&self) -> Option<MediaMetadata> {
        self.metadata.lock().clone()
    }

    pub fn state(&self) -> MediaPlaybackState {
        *self.state.lock()
    }
}

impl MediaSessionHandle for FakeMediaSession {
    fn set_metadata(&self, metadata: Option<MediaMetadata>) {
        *self.metadata.lock() = metadata;
    }

    fn set_action_handler(&self, action: MediaAction, handler: Option<MediaActionHandler>) {
        let mut handlers = self.handlers.lock();
        match handler {
            Some(handler) => {
                handlers.insert(action, handler);
            }
            None => {
                handlers.remove(&action);
            }
        }
    }

    fn set_playback_state(&self, state: MediaPlaybackState) {
        *self.state.lock() = state;
    }
}
