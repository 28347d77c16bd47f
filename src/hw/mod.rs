//! Hardware abstraction: opens capture/playback PCM streams, negotiates
//! matching parameters, and exposes the blocking read/write/avail/recover
//! contract the I/O engine drives.

pub mod device;
pub mod format;

#[cfg(any(test, feature = "testing"))]
pub mod fake;

pub use device::{open_capture, open_playback, AlsaCapture, AlsaPlayback};
pub use format::SampleFormat;

#[cfg(any(test, feature = "testing"))]
pub use fake::FakeDevice;

/// Negotiated parameters shared by both streams; startup fails if capture
/// and playback disagree on any of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    pub rate_hz: u32,
    pub period_frames: usize,
    pub period_time_us: u64,
    pub hw_periods: usize,
    pub frame_bytes: usize,
}

impl StreamParams {
    pub fn period_bytes(&self) -> usize {
        self.period_frames * self.frame_bytes
    }
}

/// Blocking capture source: reads exactly one period per call, or reports
/// how far short it fell.
pub trait CaptureDevice: Send {
    fn read_period(&mut self, dst: &mut [u8], frames: usize) -> Result<usize, crate::error::HwError>;
}

/// Blocking playback sink with a queryable kernel-ring fill level.
pub trait PlaybackDevice: Send {
    fn write_frames(&mut self, src: &[u8], frames: usize) -> Result<usize, crate::error::HwError>;
    fn avail_playback_frames(&self) -> Result<usize, crate::error::HwError>;
    fn recover(&mut self) -> Result<(), crate::error::HwError>;
}
