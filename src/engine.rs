//! The I/O engine: the capture-driven control loop plus the mutex-guarded
//! shared state the control surface reads and writes.

use crate::delta;
use crate::error::HwError;
use crate::hw::{CaptureDevice, PlaybackDevice};
use crate::rate::{self, PlaybackState};
use crate::resampler::Resampler;
use crate::ring::RingBuffer;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, trace, warn};

/// Target number of periods to keep queued in the HW playback ring; widens
/// how aggressively PURGE states can run without underrunning. Must stay
/// strictly below `hw_periods` or the refill loop's target queue depth is
/// structurally unreachable — the only remaining exit is draining the ring
/// fully every iteration, which erases the difference between BUFFER,
/// PLAY, and PURGE states.
pub const PREFETCH_TARGET_PERIODS: usize = 8;

/// Emit a throttled diagnostic line roughly once a second.
fn diagnostic_interval(period_time_us: u64) -> u64 {
    (1_000_000 / period_time_us.max(1)).max(1)
}

struct Inner {
    cap: usize,
    play: usize,
    n: usize,
    target_delta_p: i64,
    actual_delta_p: i64,
    time_off_ms: i64,
    state: PlaybackState,
    stop: bool,
    period_time_us: u64,
    min_delay_ms: i64,
    max_delay_ms: i64,
}

/// A point-in-time copy of the fields the control surface needs; taking
/// this snapshot is the only way the control thread observes engine state.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot {
    pub cap: usize,
    pub play: usize,
    pub n: usize,
    pub target_delta_p: i64,
    pub actual_delta_p: i64,
    pub time_off_ms: i64,
    pub state: PlaybackState,
}

/// The mutex-protected subset of engine state: ring indices, `target_delta_p`,
/// and `state`. Ring buffer *bytes* are not in here — they are owned
/// exclusively by the engine thread (see `ring.rs`).
pub struct SharedState {
    inner: Mutex<Inner>,
}

impl SharedState {
    pub fn new(
        n: usize,
        period_time_us: u64,
        min_delay_ms: i64,
        max_delay_ms: i64,
        initial_target_delta_p: i64,
    ) -> Arc<Self> {
        Arc::new(SharedState {
            inner: Mutex::new(Inner {
                cap: 0,
                play: 0,
                n,
                target_delta_p: initial_target_delta_p,
                actual_delta_p: 0,
                time_off_ms: 0,
                state: PlaybackState::Buffer1_8,
                stop: false,
                period_time_us,
                min_delay_ms,
                max_delay_ms,
            }),
        })
    }

    /// `set_delay(ms)`: out-of-range values leave `target_delta_p`
    /// unchanged rather than clamping, since a silent clamp would mask a
    /// user/client error.
    pub fn set_delay_ms(&self, ms: i64) -> bool {
        let mut g = self.inner.lock().unwrap();
        if ms < g.min_delay_ms || ms > g.max_delay_ms {
            return false;
        }
        g.target_delta_p = (ms * 1000) / g.period_time_us as i64;
        true
    }

    pub fn get_delay_setting_ms(&self) -> i64 {
        let g = self.inner.lock().unwrap();
        g.target_delta_p * g.period_time_us as i64 / 1000
    }

    pub fn get_current_delay_ms(&self) -> i64 {
        let g = self.inner.lock().unwrap();
        g.actual_delta_p * g.period_time_us as i64 / 1000
    }

    pub fn get_buffer_percent(&self) -> i64 {
        let g = self.inner.lock().unwrap();
        buffer_percent(g.actual_delta_p, g.target_delta_p)
    }

    pub fn request_stop(&self) {
        self.inner.lock().unwrap().stop = true;
    }

    pub fn should_stop(&self) -> bool {
        self.inner.lock().unwrap().stop
    }

    pub fn snapshot(&self) -> Snapshot {
        let g = self.inner.lock().unwrap();
        Snapshot {
            cap: g.cap,
            play: g.play,
            n: g.n,
            target_delta_p: g.target_delta_p,
            actual_delta_p: g.actual_delta_p,
            time_off_ms: g.time_off_ms,
            state: g.state,
        }
    }

    fn publish_from_engine(
        &self,
        cap: usize,
        play: usize,
        actual_delta_p: i64,
        time_off_ms: i64,
        state: PlaybackState,
    ) {
        let mut g = self.inner.lock().unwrap();
        g.cap = cap;
        g.play = play;
        g.actual_delta_p = actual_delta_p;
        g.time_off_ms = time_off_ms;
        g.state = state;
    }

    fn target_delta_p(&self) -> i64 {
        self.inner.lock().unwrap().target_delta_p
    }
}

/// `round(actual_delta_p * 100 / target_delta_p)`, clamped to `[0, 200]`,
/// with `[99, 101]` snapping to 100.
pub fn buffer_percent(actual_delta_p: i64, target_delta_p: i64) -> i64 {
    if target_delta_p <= 0 {
        return 100;
    }
    let raw = ((actual_delta_p as f64 * 100.0) / target_delta_p as f64).round() as i64;
    let raw = raw.clamp(0, 200);
    if (99..=101).contains(&raw) {
        100
    } else {
        raw
    }
}

pub struct IoEngine<C, P> {
    capture: C,
    playback: P,
    ring: RingBuffer,
    resampler: Resampler,
    shared: Arc<SharedState>,
    period_frames: usize,
    frame_bytes: usize,
    hw_periods: usize,
    iterations: u64,
    diagnostic_every: u64,
}

impl<C: CaptureDevice, P: PlaybackDevice> IoEngine<C, P> {
    pub fn new(
        capture: C,
        playback: P,
        ring: RingBuffer,
        resampler: Resampler,
        shared: Arc<SharedState>,
        period_frames: usize,
        frame_bytes: usize,
        hw_periods: usize,
        period_time_us: u64,
    ) -> Self {
        IoEngine {
            capture,
            playback,
            ring,
            resampler,
            shared,
            period_frames,
            frame_bytes,
            hw_periods,
            iterations: 0,
            diagnostic_every: diagnostic_interval(period_time_us),
        }
    }

    /// Runs until `STOP` is requested or an unrecoverable HW error occurs.
    pub fn run(&mut self) {
        loop {
            if self.shared.should_stop() {
                debug!("engine received STOP, exiting loop");
                return;
            }
            if let Err(fatal) = self.iterate() {
                error!(%fatal, "unrecoverable hardware error, transitioning to STOP");
                self.shared.request_stop();
                return;
            }
        }
    }

    fn avail_for_queued(&self) -> Result<usize, HwError> {
        self.playback.avail_playback_frames()
    }

    fn queued_periods(&self) -> Result<usize, HwError> {
        let avail = self.avail_for_queued()?;
        Ok(delta::periods_in_hw_playback_ring(
            self.hw_periods,
            avail,
            self.period_frames,
        ))
    }

    /// One engine iteration: compute delta/time-off, blocking capture
    /// read, refill the HW playback ring toward the target queue depth,
    /// publish a snapshot for observability.
    fn iterate(&mut self) -> Result<(), HwError> {
        self.iterations += 1;

        // 1. compute actual_delta_p / time_off_ms from last-known indices.
        let queued = self.queued_periods()?;
        let mem_periods = self.ring.periods_in_mem_ring();
        let actual_delta_p = delta::actual_delta_p(mem_periods, queued) as i64;
        let target_delta_p = self.shared.target_delta_p();
        let period_time_us = self.period_time_us();
        let time_off_ms = delta::time_off_ms(target_delta_p, actual_delta_p, period_time_us);

        // 2-3. capture one period.
        let cap_result = {
            let dst = self.ring.cap_slot_mut();
            self.capture.read_period(dst, self.period_frames)
        };
        match cap_result {
            Ok(_) => self.ring.advance_cap(),
            Err(HwError::ShortTransfer { .. }) | Err(HwError::Underrun) => {
                warn!("short/underrun capture read, skipping advance this iteration");
                self.publish(actual_delta_p, time_off_ms, rate::select(time_off_ms));
                return Ok(());
            }
            Err(fatal) => return Err(fatal),
        }

        // 4. refill loop.
        let mut state = rate::select(time_off_ms);
        let mut queued = self.queued_periods()?;
        while queued < PREFETCH_TARGET_PERIODS {
            if self.ring.is_empty_for_playback() {
                break;
            }
            state = rate::select(time_off_ms);
            let source = self.ring.play_slot();
            match self.resampler.resample(source, self.period_frames, state) {
                None => {
                    warn!("resampler scratch capacity exceeded, skipping this write");
                    break;
                }
                Some(out) => {
                    let out_frames = out.len() / self.frame_bytes;
                    match self.playback.write_frames(out, out_frames) {
                        Ok(_) => {
                            self.ring.advance_play();
                        }
                        Err(HwError::Underrun) => {
                            self.playback.recover()?;
                            self.ring.advance_play();
                        }
                        Err(HwError::ShortTransfer { .. }) => {
                            warn!("short playback write, not advancing play");
                            break;
                        }
                        Err(fatal) => return Err(fatal),
                    }
                }
            }
            queued = self.queued_periods()?;
        }

        // 5. publish for observability / control surface.
        self.publish(actual_delta_p, time_off_ms, state);
        if self.iterations % self.diagnostic_every == 0 {
            trace!(
                cap = self.ring.cap(),
                play = self.ring.play(),
                actual_delta_p,
                time_off_ms,
                ?state,
                "engine tick"
            );
        }
        Ok(())
    }

    fn period_time_us(&self) -> u64 {
        // immutable for the process lifetime; cheap to fetch from shared
        // state rather than duplicating storage.
        self.shared.inner.lock().unwrap().period_time_us
    }

    fn publish(&self, actual_delta_p: i64, time_off_ms: i64, state: PlaybackState) {
        self.shared.publish_from_engine(
            self.ring.cap(),
            self.ring.play(),
            actual_delta_p,
            time_off_ms,
            state,
        );
    }
}
