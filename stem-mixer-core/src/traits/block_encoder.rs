use crate::models::error::MixerError;

/// Block-oriented lossy encoder used by the offline renderer.
///
/// Blocks are encoded in order; the concatenation of every returned chunk
/// followed by the `flush` chunk is the final stream.
pub trait BlockEncoder {
    /// Frames per block the encoder expects (1152 for MPEG-1 Layer III).
    fn block_frames(&self) -> usize;

    /// Encode one block of de-interleaved 16-bit samples. May return an empty chunk.
    fn encode_block(&mut self, left: &[i16], right: &[i16]) -> Result<Vec<u8>, MixerError>;

    /// Emit whatever the encoder still buffers.
    fn flush(&mut self) -> Result<Vec<u8>, MixerError>;
}
