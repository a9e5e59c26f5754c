pub mod metadata;
pub mod stem_store;
pub mod wav_writer;
