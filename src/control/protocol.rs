//! Wire framing for the control bus: one ASCII frame per message, form
//! `"K:V"`, `K` one of `D|B|C`, `V` an optional decimal integer, max 16
//! bytes.

use crate::error::ControlError;

/// Maximum encoded frame length, not counting the newline the transport
/// layer (`control::surface`) uses to delimit frames on the wire.
pub const MAX_FRAME_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// `D` — target delay, ms.
    Delay,
    /// `B` — buffer fill percent.
    Buffer,
    /// `C` — current actual delay, ms.
    Current,
}

impl Key {
    fn as_char(self) -> char {
        match self {
            Key::Delay => 'D',
            Key::Buffer => 'B',
            Key::Current => 'C',
        }
    }

    fn from_char(c: char) -> Result<Key, ControlError> {
        match c {
            'D' => Ok(Key::Delay),
            'B' => Ok(Key::Buffer),
            'C' => Ok(Key::Current),
            other => Err(ControlError::UnknownKey(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub key: Key,
    pub value: Option<i64>,
}

impl Frame {
    pub fn query(key: Key) -> Frame {
        Frame { key, value: None }
    }

    pub fn with_value(key: Key, value: i64) -> Frame {
        Frame { key, value: Some(value) }
    }

    pub fn encode(&self) -> String {
        match self.value {
            Some(v) => format!("{}:{v}", self.key.as_char()),
            None => format!("{}:", self.key.as_char()),
        }
    }

    /// Parses a single frame body (no trailing newline). Rejects anything
    /// over [`MAX_FRAME_LEN`] bytes, anything not matching `K:V`, and
    /// unknown keys.
    pub fn parse(s: &str) -> Result<Frame, ControlError> {
        if s.len() > MAX_FRAME_LEN {
            return Err(ControlError::FrameTooLong(s.len()));
        }
        let mut parts = s.splitn(2, ':');
        let k = parts.next().filter(|k| k.len() == 1);
        let v = parts.next();
        let (k, v) = match (k, v) {
            (Some(k), Some(v)) => (k, v),
            _ => return Err(ControlError::MalformedFrame(s.as_bytes().to_vec())),
        };
        let key = Key::from_char(k.chars().next().unwrap())?;
        let value = if v.is_empty() {
            None
        } else {
            Some(
                v.parse::<i64>()
                    .map_err(|_| ControlError::MalformedFrame(s.as_bytes().to_vec()))?,
            )
        };
        Ok(Frame { key, value })
    }
}
