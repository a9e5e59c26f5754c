pub mod mixer;
pub mod player;
pub mod resilience;
pub mod scheduler;
pub mod transport;
pub mod video_sync;
