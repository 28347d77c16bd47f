//! Error taxonomy for the passthrough engine.
//!
//! Mirrors the distinction the design calls for: configuration errors are
//! fatal at startup, hardware errors are classified into recoverable and
//! unrecoverable cases, and control-bus protocol errors are never fatal.

use thiserror::Error;

/// Errors that can occur while opening and negotiating the capture/playback
/// devices at startup. All variants here are fatal: the process logs and
/// exits nonzero.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to open {direction} device '{device}': {source}")]
    DeviceOpen {
        direction: &'static str,
        device: String,
        #[source]
        source: alsa::Error,
    },

    #[error("failed to negotiate hardware parameters on {direction} device '{device}': {source}")]
    Negotiation {
        direction: &'static str,
        device: String,
        #[source]
        source: alsa::Error,
    },

    #[error(
        "capture and playback parameters disagree: rate {cap_rate} vs {play_rate}, \
         period_frames {cap_period} vs {play_period}"
    )]
    ParameterMismatch {
        cap_rate: u32,
        play_rate: u32,
        cap_period: usize,
        play_period: usize,
    },

    #[error("unsupported bit depth {0} (expected 16, 24, or 32)")]
    UnsupportedBitDepth(u32),

    #[error("failed to allocate {requested_mb} MB ring buffer")]
    RingAllocation { requested_mb: usize },

    #[error("failed to bind control-bus socket at {path}: {source}")]
    ControlBusBind {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced by the hardware abstraction during steady-state
/// operation. `Underrun` and `ShortTransfer` are recoverable; the rest
/// transition the engine to `STOP`.
#[derive(Debug, Error)]
pub enum HwError {
    #[error("playback underrun")]
    Underrun,

    #[error("short {direction} transfer: requested {requested}, got {actual}")]
    ShortTransfer {
        direction: &'static str,
        requested: usize,
        actual: usize,
    },

    #[error("unrecoverable {direction} error: {source}")]
    Fatal {
        direction: &'static str,
        #[source]
        source: alsa::Error,
    },
}

impl HwError {
    /// Whether the engine should absorb this and continue, or transition to `STOP`.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, HwError::Underrun | HwError::ShortTransfer { .. })
    }
}

/// Errors from parsing or handling control-bus frames. All non-fatal: the
/// engine logs and ignores.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("malformed frame: {0:?}")]
    MalformedFrame(Vec<u8>),

    #[error("frame exceeds 16 bytes: {0} bytes")]
    FrameTooLong(usize),

    #[error("unknown key '{0}'")]
    UnknownKey(char),

    #[error("set-delay value {ms} ms out of range [{min_ms}, {max_ms}]")]
    DelayOutOfRange { ms: i64, min_ms: i64, max_ms: i64 },
}

/// Aggregate error for call sites (chiefly `main`) that need one `Result` type.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("hardware error: {0}")]
    Hw(#[from] HwError),

    #[error("control bus error: {0}")]
    Control(#[from] ControlError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
