//! Audio primitives: the in-memory PCM buffer and the codec seam.
//!
//! Decoding goes through `rodio`; encoding and best-effort repair are
//! delegated to an external `ffmpeg` transcoder.

mod buffer;
mod codec;

pub use buffer::AudioBuffer;
pub use codec::{AudioCodec, AudioError, FfmpegCodec};

#[cfg(test)]
mod tests;
