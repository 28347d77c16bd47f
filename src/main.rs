//! `passthru-delay`: startup wiring, thread/task spawn, and the single
//! shutdown path for both signals and control-bus stop.

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use passthru_delay::cli::Args;
use passthru_delay::control::ControlSurface;
use passthru_delay::engine::{IoEngine, SharedState};
use passthru_delay::error::ConfigError;
use passthru_delay::hw::{open_capture, open_playback, SampleFormat};
use passthru_delay::resampler::Resampler;
use passthru_delay::ring::RingBuffer;

/// Period-size hint passed to ALSA negotiation; both streams converge on
/// whatever the driver actually grants, so this is a starting point, not a
/// guarantee.
const PERIOD_FRAMES_HINT: usize = 256;
// Must exceed engine::PREFETCH_TARGET_PERIODS or the refill loop's target
// queue depth is structurally unreachable.
const HW_PERIODS_HINT: u32 = 16;

/// How many HW periods of floor to leave under the target delay, so the
/// selector never has to ask for a delay shorter than the kernel ring can
/// hold without continuous underrun.
const MIN_DELAY_HW_PERIODS: i64 = 4;

fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "passthru_delay=debug"
    } else {
        "passthru_delay=info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive.into()))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    info!("starting passthru-delay");

    let format = SampleFormat::from_bits(args.bits)?;

    let (capture, cap_params) =
        open_capture(&args.capture, format, args.rate, PERIOD_FRAMES_HINT, HW_PERIODS_HINT)?;
    let (playback, play_params) =
        open_playback(&args.playback, format, args.rate, PERIOD_FRAMES_HINT, HW_PERIODS_HINT)?;

    if cap_params != play_params {
        return Err(ConfigError::ParameterMismatch {
            cap_rate: cap_params.rate_hz,
            play_rate: play_params.rate_hz,
            cap_period: cap_params.period_frames,
            play_period: play_params.period_frames,
        }
        .into());
    }
    let params = play_params;
    info!(
        rate_hz = params.rate_hz,
        period_frames = params.period_frames,
        period_time_us = params.period_time_us,
        hw_periods = params.hw_periods,
        "capture and playback parameters agree"
    );

    let memory_bytes = args.memory * 1024 * 1024;
    let period_bytes = params.period_bytes();
    let n = (memory_bytes / period_bytes).max(params.hw_periods + 1);

    let min_delay_ms = (params.period_time_us as i64 * MIN_DELAY_HW_PERIODS) / 1000;
    let max_delay_ms = ((n - 1) as i64 * params.period_time_us as i64) / 1000;
    if min_delay_ms >= max_delay_ms {
        return Err(ConfigError::RingAllocation {
            requested_mb: args.memory,
        }
        .into());
    }

    let shared = SharedState::new(n, params.period_time_us, min_delay_ms, max_delay_ms, 0);
    let startup_delay_ms = args.delay_ms.unwrap_or(min_delay_ms);
    if !shared.set_delay_ms(startup_delay_ms) {
        warn!(
            startup_delay_ms,
            min_delay_ms, max_delay_ms, "startup delay out of range, falling back to min_delay_ms"
        );
        shared.set_delay_ms(min_delay_ms);
    }
    info!(
        n,
        min_delay_ms,
        max_delay_ms,
        delay_ms = shared.get_delay_setting_ms(),
        "ring buffer and delay bounds configured"
    );

    let ring = RingBuffer::new(n, period_bytes);
    let resampler = Resampler::new(params.frame_bytes, params.period_frames);
    let mut engine = IoEngine::new(
        capture,
        playback,
        ring,
        resampler,
        shared.clone(),
        params.period_frames,
        params.frame_bytes,
        params.hw_periods,
        params.period_time_us,
    );

    // Blocking ALSA I/O must never run on a tokio worker thread — the
    // blocking capture read is the system's clock.
    let engine_handle = tokio::task::spawn_blocking(move || engine.run());

    let control = ControlSurface::new(shared.clone());
    let control_handle = tokio::spawn(control.run(args.control_socket.clone(), args.status_socket.clone()));

    let shared_for_signal = shared.clone();
    let signal_handle = tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received");
        shared_for_signal.request_stop();
    });

    while !shared.should_stop() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    control_handle.abort();
    signal_handle.abort();
    if let Err(e) = engine_handle.await {
        warn!(error = %e, "engine task join error during shutdown");
    }

    info!("passthru-delay shutting down");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
