//! Command-line surface. All tunables are evaluated once at startup;
//! there is no persisted configuration layer.

use clap::Parser;
use std::path::PathBuf;

fn parse_bits(s: &str) -> Result<u32, String> {
    match s.parse::<u32>() {
        Ok(16) => Ok(16),
        Ok(24) => Ok(24),
        Ok(32) => Ok(32),
        Ok(other) => Err(format!("unsupported bit depth {other} (expected 16, 24, or 32)")),
        Err(_) => Err(format!("'{s}' is not an integer")),
    }
}

#[derive(Parser, Debug)]
#[command(name = "passthru-delay")]
#[command(about = "Variable-delay audio passthrough engine")]
#[command(version)]
pub struct Args {
    /// Sample format bit depth: 16, 24, or 32.
    #[arg(long, value_parser = parse_bits, default_value = "16")]
    pub bits: u32,

    /// ALSA capture device name.
    #[arg(long, default_value = "default")]
    pub capture: String,

    /// ALSA playback device name.
    #[arg(long, default_value = "default")]
    pub playback: String,

    /// Sample rate in Hz.
    #[arg(long, default_value_t = 48_000)]
    pub rate: u32,

    /// Memory ring size, in megabytes.
    #[arg(long, default_value_t = 32)]
    pub memory: usize,

    /// Raise log verbosity to debug.
    #[arg(short, long)]
    pub verbose: bool,

    /// Initial target delay in ms. Defaults to `min_delay_ms` if omitted.
    #[arg(long)]
    pub delay_ms: Option<i64>,

    /// Unix-socket path for the `cmd` control-bus endpoint.
    #[arg(long, default_value = "/tmp/passthru-delay.cmd.sock")]
    pub control_socket: PathBuf,

    /// Unix-socket path for the `status` control-bus endpoint.
    #[arg(long, default_value = "/tmp/passthru-delay.status.sock")]
    pub status_socket: PathBuf,
}
