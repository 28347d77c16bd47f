//! Sample-format bookkeeping: bit depth -> ALSA format and frame geometry.

use crate::error::ConfigError;
use alsa::pcm::Format;

pub const CHANNELS: u32 = 2;

/// One of the three bit depths the CLI accepts, mapped to the ALSA format
/// that carries it and the per-sample container size used for both the I/O
/// layer and the ring buffer's frame_bytes.
///
/// 24-bit uses ALSA's 32-bit-container `S24_LE` (24 significant bits, not
/// the tightly packed 3-byte `S24_3LE`) so that it can be read/written with
/// the same `io_i32` path as 32-bit — the packed container has no matching
/// native integer width to type the ALSA `IO<S>` handle with. The ring
/// buffer's `frame_bytes` therefore tracks the *container* size, not a
/// literal `bits/8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleFormat {
    pub bits: u32,
    pub alsa_format: Format,
    pub container_bytes: usize,
}

impl SampleFormat {
    pub fn from_bits(bits: u32) -> Result<Self, ConfigError> {
        let (alsa_format, container_bytes) = match bits {
            16 => (Format::s16(), 2),
            24 => (Format::S24LE, 4),
            32 => (Format::s32(), 4),
            other => return Err(ConfigError::UnsupportedBitDepth(other)),
        };
        Ok(SampleFormat {
            bits,
            alsa_format,
            container_bytes,
        })
    }

    pub fn frame_bytes(&self) -> usize {
        self.container_bytes * CHANNELS as usize
    }

    /// Whether this format is read/written through the `i32`-typed ALSA I/O
    /// path (24- and 32-bit) rather than `i16` (16-bit).
    pub fn uses_wide_io(&self) -> bool {
        self.container_bytes == 4
    }
}
