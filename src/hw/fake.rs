//! In-memory stand-in for the ALSA devices, used to drive the I/O engine's
//! control loop deterministically in tests (ring arithmetic, state
//! selection, underrun handling) without touching real hardware.

use super::{CaptureDevice, PlaybackDevice};
use crate::error::HwError;

/// A fake capture/playback pair. Capture always succeeds and fills each
/// period with an incrementing byte pattern (frame-distinguishable in
/// assertions); playback tracks a simulated kernel-ring fill level that
/// tests advance explicitly to model real-time drain.
pub struct FakeDevice {
    pub frame_bytes: usize,
    pub hw_periods: usize,
    pub period_frames: usize,
    /// Frames currently queued in the simulated kernel playback ring.
    queued_frames: usize,
    capture_tick: u8,
    pub reads: usize,
    pub writes: usize,
    pub force_next_read_short: Option<usize>,
    pub force_next_write_underrun: bool,
    pub recoveries: usize,
}

impl FakeDevice {
    pub fn new(frame_bytes: usize, period_frames: usize, hw_periods: usize) -> Self {
        FakeDevice {
            frame_bytes,
            hw_periods,
            period_frames,
            queued_frames: 0,
            capture_tick: 0,
            reads: 0,
            writes: 0,
            force_next_read_short: None,
            force_next_write_underrun: false,
            recoveries: 0,
        }
    }

    /// Simulate the hardware draining `frames` from the kernel ring, as a
    /// real playback device would between engine iterations.
    pub fn drain(&mut self, frames: usize) {
        self.queued_frames = self.queued_frames.saturating_sub(frames);
    }

    pub fn queued_frames(&self) -> usize {
        self.queued_frames
    }
}

impl CaptureDevice for FakeDevice {
    fn read_period(&mut self, dst: &mut [u8], frames: usize) -> Result<usize, HwError> {
        self.reads += 1;
        self.capture_tick = self.capture_tick.wrapping_add(1);
        let got = self.force_next_read_short.take().unwrap_or(frames);
        for b in dst[..got * self.frame_bytes].iter_mut() {
            *b = self.capture_tick;
        }
        if got < frames {
            return Err(HwError::ShortTransfer {
                direction: "read",
                requested: frames,
                actual: got,
            });
        }
        Ok(got)
    }
}

impl PlaybackDevice for FakeDevice {
    fn write_frames(&mut self, _src: &[u8], frames: usize) -> Result<usize, HwError> {
        self.writes += 1;
        if self.force_next_write_underrun {
            self.force_next_write_underrun = false;
            return Err(HwError::Underrun);
        }
        self.queued_frames += frames;
        Ok(frames)
    }

    fn avail_playback_frames(&self) -> Result<usize, HwError> {
        let hw_capacity = self.hw_periods * self.period_frames;
        Ok(hw_capacity.saturating_sub(self.queued_frames))
    }

    fn recover(&mut self) -> Result<(), HwError> {
        self.recoveries += 1;
        Ok(())
    }
}
