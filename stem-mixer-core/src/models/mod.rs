pub mod config;
pub mod error;
pub mod render;
pub mod state;
pub mod stems;
pub mod track;
