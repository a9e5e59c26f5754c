//! # stem-mixer-core
//!
//! Platform-agnostic playback and render core for songs separated into four
//! stems (drums, bass, other, vocals).
//!
//! Provides a transport clock, a per-track gain/pitch mixer, video
//! synchronization, background playback resilience, and an offline renderer
//! producing WAV or MP3 mixdowns. Platform audio backends implement the
//! `AudioEngine` trait and plug into the `StemPlayer` facade.
//!
//! ## Architecture
//!
//! ```text
//! stem-mixer-core (this crate)
//! ├── traits/       ← AudioEngine, KeepAliveStream, MediaSessionHandle, VideoSurface, PlayerDelegate, StemStore, BlockEncoder
//! ├── models/       ← MixerError, MixerConfiguration, TrackName, PlayerSnapshot, RenderRequest, etc.
//! ├── engine/       ← HeadlessEngine (reference engine without audio output)
//! ├── processing/   ← OfflineRenderer, PCM conversion, WAV header, gain ramps, LAME encoder
//! ├── session/      ← TransportClock, TrackMixer, VideoSyncBridge, BackgroundResilienceMonitor, StemPlayer
//! └── storage/      ← WavFileWriter, render metadata, DirectoryStemStore
//! ```

pub mod engine;
pub mod events;
pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod test_support;

// Re-export key types at crate root for convenience.
pub use engine::headless::HeadlessEngine;
pub use events::{Disposer, HostVisibility, ListenerId};
pub use models::config::MixerConfiguration;
pub use models::error::MixerError;
pub use models::render::{RenderFormat, RenderMetadata, RenderOutput, RenderRequest, RenderTrack};
pub use models::state::{EngineState, PlayerSnapshot, SyncSession, TransportState};
pub use models::stems::{StemSet, StereoBuffer};
pub use models::track::{TrackName, TrackState};
pub use processing::offline::OfflineRenderer;
pub use session::mixer::TrackMixer;
pub use session::player::{StemPlayer, StemSource};
pub use session::resilience::BackgroundResilienceMonitor;
pub use session::transport::TransportClock;
pub use session::video_sync::VideoSyncBridge;
pub use storage::stem_store::DirectoryStemStore;
pub use storage::wav_writer::WavFileWriter;
pub use traits::audio_engine::{AudioEngine, NodeId};
pub use traits::block_encoder::BlockEncoder;
pub use traits::keep_alive::KeepAliveStream;
pub use traits::media_session::{MediaAction, MediaMetadata, MediaPlaybackState, MediaSessionHandle};
pub use traits::playback_control::PlaybackControl;
pub use traits::player_delegate::PlayerDelegate;
pub use traits::stem_store::StemStore;
pub use traits::time_source::{ManualTimeSource, SystemTimeSource, TimeSource};
pub use traits::video_surface::{VideoEvent, VideoSurface};
