pub mod audio_engine;
pub mod block_encoder;
pub mod keep_alive;
pub mod media_session;
pub mod playback_control;
pub mod player_delegate;
pub mod stem_store;
pub mod time_source;
pub mod video_surface;
