//! End-to-end scenarios against `FakeDevice`, covering convergence,
//! delay-step, and underrun-recovery behavior without touching real
//! hardware.
//!
//! `FakeDevice` itself never blocks, so capture is wrapped in `PacedCapture`
//! to restore the one piece of real-time behavior these scenarios actually
//! depend on: capture pacing drives the whole loop. Without it the engine
//! thread would race to convergence inside a few hundred microseconds,
//! making any wall-clock assertion about intermediate states unreliable.

use passthru_delay::engine::{IoEngine, SharedState};
use passthru_delay::error::HwError;
use passthru_delay::hw::{CaptureDevice, FakeDevice};
use passthru_delay::rate::PlaybackState;
use passthru_delay::resampler::Resampler;
use passthru_delay::ring::RingBuffer;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const FRAME_BYTES: usize = 4; // stereo 16-bit
const PERIOD_FRAMES: usize = 256;
// Must exceed IoEngine::PREFETCH_TARGET_PERIODS (8), or the refill loop's
// target is unreachable and it drains the ring fully every iteration.
const HW_PERIODS: usize = 16;
const RATE_HZ: u64 = 48_000;
const PERIOD_TIME_US: u64 = (PERIOD_FRAMES as u64) * 1_000_000 / RATE_HZ;
const N: usize = 512;

struct PacedCapture {
    inner: FakeDevice,
    period: Duration,
}

impl CaptureDevice for PacedCapture {
    fn read_period(&mut self, dst: &mut [u8], frames: usize) -> Result<usize, HwError> {
        thread::sleep(self.period);
        self.inner.read_period(dst, frames)
    }
}

fn spawn_engine(shared: Arc<SharedState>, playback: FakeDevice) -> thread::JoinHandle<()> {
    let capture = PacedCapture {
        inner: FakeDevice::new(FRAME_BYTES, PERIOD_FRAMES, HW_PERIODS),
        period: Duration::from_micros(PERIOD_TIME_US),
    };
    let ring = RingBuffer::new(N, PERIOD_FRAMES * FRAME_BYTES);
    let resampler = Resampler::new(FRAME_BYTES, PERIOD_FRAMES);
    let mut engine = IoEngine::new(
        capture,
        playback,
        ring,
        resampler,
        shared,
        PERIOD_FRAMES,
        FRAME_BYTES,
        HW_PERIODS,
        PERIOD_TIME_US,
    );
    thread::spawn(move || engine.run())
}

fn default_playback() -> FakeDevice {
    FakeDevice::new(FRAME_BYTES, PERIOD_FRAMES, HW_PERIODS)
}

fn wait_until<F: Fn() -> bool>(timeout: Duration, pred: F) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if pred() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn steady_state_converges_to_play() {
    // target_delay=2500ms -> target_delta_p ~= 469.
    let target_delta_p = (2500i64 * 1000) / PERIOD_TIME_US as i64;
    assert_eq!(target_delta_p, 469);

    let shared = SharedState::new(N, PERIOD_TIME_US, 50, 20_000, target_delta_p);
    let handle = spawn_engine(shared.clone(), default_playback());

    let reached_play = wait_until(Duration::from_secs(8), || shared.snapshot().state == PlaybackState::Play);
    assert!(reached_play, "engine never reached PLAY: {:?}", shared.snapshot());

    shared.request_stop();
    handle.join().unwrap();
}

#[test]
fn cold_start_begins_in_a_buffer_state_with_zero_indices() {
    // cap=play=0 initially; state begins in a BUFFER sub-state. Capture is
    // paced at ~5.33ms/period, so a 1ms check lands before the engine
    // thread completes even its first iteration.
    let shared = SharedState::new(N, PERIOD_TIME_US, 50, 20_000, 469);
    let handle = spawn_engine(shared.clone(), default_playback());

    thread::sleep(Duration::from_millis(1));
    let early = shared.snapshot();
    assert_eq!(early.cap, 0);
    assert_eq!(early.play, 0);
    assert_ne!(early.state, PlaybackState::Play);

    shared.request_stop();
    handle.join().unwrap();
}

#[test]
fn delay_increase_step_walks_down_through_buffer_states() {
    let shared = SharedState::new(N, PERIOD_TIME_US, 50, 20_000, 469);
    let handle = spawn_engine(shared.clone(), default_playback());

    assert!(wait_until(Duration::from_secs(8), || shared.snapshot().state == PlaybackState::Play));

    // Double the target delay.
    assert!(shared.set_delay_ms(shared.get_delay_setting_ms() * 2));
    let saw_buffer_state = wait_until(Duration::from_secs(3), || {
        matches!(
            shared.snapshot().state,
            PlaybackState::Buffer1_8
                | PlaybackState::Buffer2_8
                | PlaybackState::Buffer4_8
                | PlaybackState::Buffer6_8
                | PlaybackState::Buffer7_8
        )
    });
    assert!(saw_buffer_state, "expected a transient BUFFER state after doubling target delay");

    assert!(wait_until(Duration::from_secs(8), || shared.snapshot().state == PlaybackState::Play));

    shared.request_stop();
    handle.join().unwrap();
}

#[test]
fn delay_decrease_step_walks_up_through_purge_states() {
    let shared = SharedState::new(N, PERIOD_TIME_US, 50, 20_000, 469);
    let handle = spawn_engine(shared.clone(), default_playback());

    assert!(wait_until(Duration::from_secs(8), || shared.snapshot().state == PlaybackState::Play));

    // Halve the target delay.
    assert!(shared.set_delay_ms(shared.get_delay_setting_ms() / 2));
    let saw_purge_state = wait_until(Duration::from_secs(3), || {
        matches!(
            shared.snapshot().state,
            PlaybackState::Purge10_8 | PlaybackState::Purge12_8 | PlaybackState::Purge16_8 | PlaybackState::Purge32_8
        )
    });
    assert!(saw_purge_state, "expected a transient PURGE state after halving target delay");

    assert!(wait_until(Duration::from_secs(8), || shared.snapshot().state == PlaybackState::Play));

    shared.request_stop();
    handle.join().unwrap();
}

#[test]
fn underrun_recovers_without_crashing_the_engine() {
    let shared = SharedState::new(N, PERIOD_TIME_US, 50, 20_000, 10);
    let mut playback = default_playback();
    playback.force_next_write_underrun = true;
    let handle = spawn_engine(shared.clone(), playback);

    // Engine must keep advancing (not panic, not wedge) past the forced
    // underrun.
    assert!(wait_until(Duration::from_secs(3), || shared.snapshot().cap > 2));

    shared.request_stop();
    handle.join().unwrap();
}

#[test]
fn selector_sweep_matches_documented_hysteresis() {
    // Sweep against the crate's public rate-selection API.
    use passthru_delay::rate::select;
    let inputs = [-6000, -2000, -1000, -100, 0, 100, 500, 2000, 4000, 7000];
    let expected = [
        PlaybackState::Purge32_8,
        PlaybackState::Purge16_8,
        PlaybackState::Purge12_8,
        PlaybackState::Purge10_8,
        PlaybackState::Play,
        PlaybackState::Buffer7_8,
        PlaybackState::Buffer7_8,
        PlaybackState::Buffer4_8,
        PlaybackState::Buffer2_8,
        PlaybackState::Buffer1_8,
    ];
    for (t, want) in inputs.iter().zip(expected.iter()) {
        assert_eq!(select(*t), *want, "time_off_ms={t}");
    }
}
