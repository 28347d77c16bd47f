//! # passthru-delay
//!
//! A variable-delay audio passthrough engine: continuously captures PCM
//! audio, holds it in a large ring buffer, and plays it back with a
//! user-controllable delay, smoothly converging the actual delay toward the
//! target by time-stretching/compressing playback a period at a time rather
//! than dropping to silence or jumping.
//!
//! **Architecture:** a capture-driven I/O engine (`engine`) built from four
//! pure leaf components — the ring buffer (`ring`), the delta tracker
//! (`delta`), the rate selector (`rate`), and the per-period resampler
//! (`resampler`) — on top of a hardware abstraction (`hw`) over ALSA, with a
//! Unix-socket control surface (`control`) for runtime delay adjustment.

pub mod cli;
pub mod control;
pub mod delta;
pub mod engine;
pub mod error;
pub mod hw;
pub mod rate;
pub mod resampler;
pub mod ring;

pub use engine::{IoEngine, SharedState};
pub use error::{EngineError, Result};
