//! ALSA-backed implementations of [`crate::hw::CaptureDevice`] and
//! [`crate::hw::PlaybackDevice`].
//!
//! Grounded on the hw_params/sw_params negotiation in
//! `maolan-maolan`'s `configure_pcm` and the blocking `readi`/`writei` +
//! `State::XRun` recovery pattern shown in the `supercurio-asrc-rs-research`
//! ALSA loopback and period-timing examples.

use super::format::SampleFormat;
use super::StreamParams;
use crate::error::{ConfigError, HwError};
use alsa::pcm::{Access, HwParams, State, PCM};
use alsa::{Direction, ValueOr};
use tracing::{debug, warn};

const CHANNELS: u32 = super::format::CHANNELS;

fn negotiate(
    pcm: &PCM,
    direction: Direction,
    device: &str,
    format: SampleFormat,
    rate_hz: u32,
    period_frames_hint: usize,
    hw_periods_hint: u32,
) -> Result<StreamParams, ConfigError> {
    let label = match direction {
        Direction::Capture => "capture",
        Direction::Playback => "playback",
    };

    let hwp = HwParams::any(pcm).map_err(|e| ConfigError::Negotiation {
        direction: label,
        device: device.to_string(),
        source: e,
    })?;
    let map_neg = |e: alsa::Error| ConfigError::Negotiation {
        direction: label,
        device: device.to_string(),
        source: e,
    };

    hwp.set_access(Access::RWInterleaved).map_err(map_neg)?;
    hwp.set_format(format.alsa_format).map_err(map_neg)?;
    hwp.set_channels(CHANNELS).map_err(map_neg)?;
    hwp.set_rate(rate_hz, ValueOr::Nearest).map_err(map_neg)?;
    hwp.set_period_size_near(period_frames_hint as i64, ValueOr::Nearest)
        .map_err(map_neg)?;
    hwp.set_periods(hw_periods_hint, ValueOr::Nearest)
        .map_err(map_neg)?;
    pcm.hw_params(&hwp).map_err(map_neg)?;

    let cur = pcm.hw_params_current().map_err(map_neg)?;
    let actual_rate = cur.get_rate().map_err(map_neg)?;
    let period_frames = cur.get_period_size().map_err(map_neg)? as usize;
    let hw_periods = cur.get_periods().map_err(map_neg)? as usize;
    let period_time_us = (period_frames as u64 * 1_000_000) / actual_rate as u64;

    let swp = pcm.sw_params_current().map_err(map_neg)?;
    swp.set_start_threshold(period_frames as i64).map_err(map_neg)?;
    swp.set_avail_min(period_frames as i64).map_err(map_neg)?;
    pcm.sw_params(&swp).map_err(map_neg)?;
    pcm.prepare().map_err(map_neg)?;

    debug!(
        direction = label,
        device, actual_rate, period_frames, hw_periods, "negotiated hardware parameters"
    );

    Ok(StreamParams {
        rate_hz: actual_rate,
        period_frames,
        period_time_us,
        hw_periods,
        frame_bytes: format.frame_bytes(),
    })
}

/// Packs `count` little-endian samples from `src` (container-sized) into
/// interleaved i16/i32 scratch, or unpacks the other way; keeps the byte
/// ring format-agnostic while ALSA's typed `IO<S>` does the actual transfer.
mod pack {
    pub fn bytes_to_i16(bytes: &[u8], out: &mut [i16]) {
        for (chunk, sample) in bytes.chunks_exact(2).zip(out.iter_mut()) {
            *sample = i16::from_le_bytes([chunk[0], chunk[1]]);
        }
    }

    pub fn i16_to_bytes(samples: &[i16], out: &mut [u8]) {
        for (sample, chunk) in samples.iter().zip(out.chunks_exact_mut(2)) {
            chunk.copy_from_slice(&sample.to_le_bytes());
        }
    }

    pub fn bytes_to_i32(bytes: &[u8], out: &mut [i32]) {
        for (chunk, sample) in bytes.chunks_exact(4).zip(out.iter_mut()) {
            *sample = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
    }

    pub fn i32_to_bytes(samples: &[i32], out: &mut [u8]) {
        for (sample, chunk) in samples.iter().zip(out.chunks_exact_mut(4)) {
            chunk.copy_from_slice(&sample.to_le_bytes());
        }
    }
}

enum Scratch {
    Narrow(Vec<i16>),
    Wide(Vec<i32>),
}

impl Scratch {
    fn new(format: SampleFormat, frames_capacity: usize) -> Self {
        let n = frames_capacity * CHANNELS as usize;
        if format.uses_wide_io() {
            Scratch::Wide(vec![0i32; n])
        } else {
            Scratch::Narrow(vec![0i16; n])
        }
    }
}

pub struct AlsaCapture {
    pcm: PCM,
    device: String,
    format: SampleFormat,
    scratch: Scratch,
}

pub struct AlsaPlayback {
    pcm: PCM,
    device: String,
    format: SampleFormat,
    scratch: Scratch,
    hw_periods: usize,
    period_frames: usize,
}

pub fn open_capture(
    device: &str,
    format: SampleFormat,
    rate_hz: u32,
    period_frames_hint: usize,
    hw_periods_hint: u32,
) -> Result<(AlsaCapture, StreamParams), ConfigError> {
    let pcm = PCM::new(device, Direction::Capture, false).map_err(|e| ConfigError::DeviceOpen {
        direction: "capture",
        device: device.to_string(),
        source: e,
    })?;
    let params = negotiate(
        &pcm,
        Direction::Capture,
        device,
        format,
        rate_hz,
        period_frames_hint,
        hw_periods_hint,
    )?;
    let scratch = Scratch::new(format, params.period_frames);
    Ok((
        AlsaCapture {
            pcm,
            device: device.to_string(),
            format,
            scratch,
        },
        params,
    ))
}

pub fn open_playback(
    device: &str,
    format: SampleFormat,
    rate_hz: u32,
    period_frames_hint: usize,
    hw_periods_hint: u32,
) -> Result<(AlsaPlayback, StreamParams), ConfigError> {
    let pcm = PCM::new(device, Direction::Playback, false).map_err(|e| ConfigError::DeviceOpen {
        direction: "playback",
        device: device.to_string(),
        source: e,
    })?;
    let params = negotiate(
        &pcm,
        Direction::Playback,
        device,
        format,
        rate_hz,
        period_frames_hint,
        hw_periods_hint,
    )?;
    let scratch = Scratch::new(format, params.period_frames);
    Ok((
        AlsaPlayback {
            pcm,
            device: device.to_string(),
            format,
            scratch,
            hw_periods: params.hw_periods,
            period_frames: params.period_frames,
        },
        params,
    ))
}

impl super::CaptureDevice for AlsaCapture {
    fn read_period(&mut self, dst: &mut [u8], frames: usize) -> Result<usize, HwError> {
        let channels = CHANNELS as usize;
        let got = match &mut self.scratch {
            Scratch::Narrow(buf) => {
                let io = self.pcm.io_i16().map_err(|e| fatal("read", &self.device, e))?;
                let n = read_with_recovery(&self.pcm, || io.readi(&mut buf[..frames * channels]))?;
                pack::i16_to_bytes(&buf[..n * channels], &mut dst[..n * self.format.frame_bytes()]);
                n
            }
            Scratch::Wide(buf) => {
                let io = self.pcm.io_i32().map_err(|e| fatal("read", &self.device, e))?;
                let n = read_with_recovery(&self.pcm, || io.readi(&mut buf[..frames * channels]))?;
                pack::i32_to_bytes(&buf[..n * channels], &mut dst[..n * self.format.frame_bytes()]);
                n
            }
        };
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

impl super::PlaybackDevice for AlsaPlayback {
    fn write_frames(&mut self, src: &[u8], frames: usize) -> Result<usize, HwError> {
        let channels = CHANNELS as usize;
        let frame_bytes = self.format.frame_bytes();
        let written = match &mut self.scratch {
            Scratch::Narrow(buf) => {
                pack::bytes_to_i16(&src[..frames * frame_bytes], &mut buf[..frames * channels]);
                let io = self
                    .pcm
                    .io_i16()
                    .map_err(|e| fatal("write", &self.device, e))?;
                write_with_recovery(&self.pcm, || io.writei(&buf[..frames * channels]))?
            }
            Scratch::Wide(buf) => {
                pack::bytes_to_i32(&src[..frames * frame_bytes], &mut buf[..frames * channels]);
                let io = self
                    .pcm
                    .io_i32()
                    .map_err(|e| fatal("write", &self.device, e))?;
                write_with_recovery(&self.pcm, || io.writei(&buf[..frames * channels]))?
            }
        };
        match written {
            Some(n) if n < frames => Err(HwError::ShortTransfer {
                direction: "write",
                requested: frames,
                actual: n,
            }),
            Some(n) => Ok(n),
            None => Err(HwError::Underrun),
        }
    }

    fn avail_playback_frames(&self) -> Result<usize, HwError> {
        match self.pcm.avail_update() {
            Ok(n) => Ok(n.max(0) as usize),
            Err(e) => Err(fatal("avail", &self.device, e)),
        }
    }

    fn recover(&mut self) -> Result<(), HwError> {
        self.pcm
            .prepare()
            .map_err(|e| fatal("recover", &self.device, e))
    }
}

impl AlsaPlayback {
    pub fn hw_periods(&self) -> usize {
        self.hw_periods
    }

    pub fn period_frames(&self) -> usize {
        self.period_frames
    }
}

fn fatal(direction: &'static str, device: &str, source: alsa::Error) -> HwError {
    warn!(direction, device, %source, "unrecoverable ALSA error");
    HwError::Fatal { direction, source }
}

fn read_with_recovery(
    pcm: &PCM,
    op: impl FnOnce() -> Result<usize, alsa::Error>,
) -> Result<usize, HwError> {
    match op() {
        Ok(n) => Ok(n),
        Err(e) => {
            if pcm.state() == State::XRun {
                warn!("capture underrun, recovering");
                let _ = pcm.prepare();
                return Err(HwError::Underrun);
            }
            Err(fatal("read", "capture", e))
        }
    }
}

fn write_with_recovery(
    pcm: &PCM,
    op: impl FnOnce() -> Result<usize, alsa::Error>,
) -> Result<Option<usize>, HwError> {
    match op() {
        Ok(n) => Ok(Some(n)),
        Err(e) => {
            if pcm.state() == State::XRun {
                Ok(None)
            } else {
                Err(fatal("write", "playback", e))
            }
        }
    }
}
