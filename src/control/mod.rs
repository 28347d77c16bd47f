//! Control surface: query/set target delay, read current delay and buffer
//! fill, over a local Unix-socket transport.

pub mod protocol;
pub mod surface;

pub use protocol::{Frame, Key};
pub use surface::ControlSurface;
