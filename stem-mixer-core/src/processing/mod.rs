pub mod gain_ramp;
pub mod lame;
pub mod offline;
pub mod pcm;
pub mod wav_format;
