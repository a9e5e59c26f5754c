use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::events::{Disposer, HostVisibility};
use crate::models::config::MixerConfiguration;
use crate::models::state::SyncSession;
use crate::traits::playback_control::PlaybackControl;
use crate::traits::video_surface::{VideoEvent, VideoSurface};

struct BridgeState {
    session: SyncSession,
    video: Option<Arc<dyn VideoSurface>>,
    video_bindings: Disposer,
    visibility_binding: Disposer,
}

struct BridgeShared {
    control: Arc<dyn PlaybackControl>,
    visibility: HostVisibility,
    drift_threshold: f64,
    state: Mutex<BridgeState>,
}

/// Keeps an external video surface aligned with the transport.
///
/// Authority is split: the video's own gestures (play, pause, seek) drive
/// transport state, while the transport drives time. On a time tick that
/// shows more than `drift_threshold_secs` of divergence, the video is moved
/// to the transport position, never the other way round.
///
/// Listeners are only attached while sync is enabled.
pub struct VideoSyncBridge {
    shared: Arc<BridgeShared>,
}

impl VideoSyncBridge {
    pub fn new(control: Arc<dyn PlaybackControl>, visibility: HostVisibility, config: &MixerConfiguration) -> Self {
        Self {
            shared: Arc::new(BridgeShared {
                control,
                visibility,
                drift_threshold: config.drift_threshold_secs,
                state: Mutex::new(BridgeState {
                    session: SyncSession::default(),
                    video: None,
                    video_bindings: Disposer::new(),
                    visibility_binding: Disposer::new(),
                }),
            }),
        }
    }

    /// Replace the observed surface (or clear it with `None`). Listeners move
    /// from the old surface to the new one.
    pub fn set_video(&self, video: Option<Arc<dyn VideoSurface>>) {
        let old_bindings = {
            let mut state = self.shared.state.lock();
            state.video = video;
            std::mem::take(&mut state.video_bindings)
        };
        drop(old_bindings);

        if self.is_sync_enabled() {
            self.bind_video();
        }
    }

    pub fn enable_sync(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.session.sync_enabled {
                return;
            }
            state.session.sync_enabled = true;
        }
        self.bind_video();

        let mut binding = Disposer::new();
        let weak = Arc::downgrade(&self.shared);
        self.shared.visibility.subscribe_scoped(&mut binding, move |hidden| {
            if let Some(shared) = weak.upgrade() {
                shared.on_visibility_changed(hidden);
            }
        });
        self.shared.state.lock().visibility_binding = binding;
        log::debug!("Video sync enabled");
    }

    pub fn disable_sync(&self) {
        let (video_bindings, visibility_binding) = {
            let mut state = self.shared.state.lock();
            state.session = SyncSession::default();
            (
                std::mem::take(&mut state.video_bindings),
                std::mem::take(&mut state.visibility_binding),
            )
        };
        drop(video_bindings);
        drop(visibility_binding);
        log::debug!("Video sync disabled");
    }

    /// Detach every listener and forget the surface.
    pub fn teardown(&self) {
        self.disable_sync();
        self.shared.state.lock().video = None;
    }

    pub fn session(&self) -> SyncSession {
        self.shared.state.lock().session
    }

    pub fn is_sync_enabled(&self) -> bool {
        self.shared.state.lock().session.sync_enabled
    }

    fn bind_video(&self) {
        let Some(video) = self.shared.state.lock().video.clone() else {
            return;
        };

        let mut bindings = Disposer::new();
        for event in VideoEvent::ALL {
            let weak: Weak<BridgeShared> = Arc::downgrade(&self.shared);
            let id = video.add_listener(
                event,
                Arc::new(move |event: VideoEvent| {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_video_event(event);
                    }
                }),
            );
            let surface = Arc::clone(&video);
            bindings.push(move || surface.remove_listener(id));
        }

        let previous = std::mem::replace(&mut self.shared.state.lock().video_bindings, bindings);
        drop(previous);
    }
}

impl Drop for VideoSyncBridge {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl BridgeShared {
    fn on_video_event(&self, event: VideoEvent) {
        let (session, video) = {
            let state = self.state.lock();
            (state.session, state.video.clone())
        };
        if !session.sync_enabled {
            return;
        }
        let Some(video) = video else {
            return;
        };

        match event {
            VideoEvent::Play => {
                if self.visibility.is_hidden() {
                    video.set_current_time(self.control.position());
                    video.set_muted(true);
                }
                if !self.control.is_playing() {
                    if let Err(e) = self.control.play() {
                        log::warn!("Video play could not start the transport: {}", e);
                    }
                }
            }
            VideoEvent::Pause => {
                if self.visibility.is_hidden() || session.is_user_seeking {
                    return;
                }
                if self.control.is_playing() {
                    self.control.pause();
                }
            }
            VideoEvent::SeekBegin => {
                self.state.lock().session.is_user_seeking = true;
            }
            VideoEvent::SeekEnd => {
                if session.is_user_seeking {
                    self.control.seek(video.current_time());
                }
                self.state.lock().session.is_user_seeking = false;
            }
            VideoEvent::TimeTick => {
                if session.is_user_seeking
                    || self.visibility.is_hidden()
                    || !self.control.is_playing()
                    || video.is_seeking()
                {
                    return;
                }
                let transport = self.control.position();
                let drift = (video.current_time() - transport).abs();
                if drift > self.drift_threshold {
                    log::debug!("Video drifted {:.3}s; moving it to {:.3}s", drift, transport);
                    video.set_current_time(transport);
                }
            }
        }
    }

    fn on_visibility_changed(&self, hidden: bool) {
        if hidden {
            return;
        }
        let video = {
            let state = self.state.lock();
            if !state.session.sync_enabled {
                return;
            }
            state.video.clone()
        };
        let Some(video) = video else {
            return;
        };

        if self.control.is_playing() && video.is_paused() {
            video.set_current_time(self.control.position());
            video.set_muted(true);
            if let Err(e) = video.play() {
                log::warn!("Could not resume video playback: {}", e);
            }
        }
    }
}
