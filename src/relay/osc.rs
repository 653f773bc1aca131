//! OSC 1.0 message encoding
//!
//! Only what the control endpoint needs: a single message (no bundles) with
//! int32, float32 and string arguments.
//!
//! ```text
//! +----------------+-----------------+------------------+
//! | address\0 pad4 | ,<tags>\0 pad4  | arguments        |
//! +----------------+-----------------+------------------+
//! ```
//!
//! Integers and floats are big-endian. Strings are NUL-terminated and padded
//! with NULs to a multiple of four bytes.

use bytes::{BufMut, Bytes, BytesMut};

/// OSC argument
#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    Int(i32),
    Float(f32),
    Str(String),
}

impl OscArg {
    fn tag(&self) -> u8 {
        match self {
            OscArg::Int(_) => b'i',
            OscArg::Float(_) => b'f',
            OscArg::Str(_) => b's',
        }
    }
}

impl From<&str> for OscArg {
    fn from(s: &str) -> Self {
        OscArg::Str(s.to_string())
    }
}

impl From<i32> for OscArg {
    fn from(i: i32) -> Self {
        OscArg::Int(i)
    }
}

impl From<f32> for OscArg {
    fn from(f: f32) -> Self {
        OscArg::Float(f)
    }
}

/// An addressed OSC message
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    /// Message with no arguments
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument
    pub fn arg(mut self, arg: impl Into<OscArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Encode as a single OSC packet
    pub fn encode(&self) -> Bytes {
        let mut encoder = OscEncoder::new();
        encoder.encode(self);
        encoder.finish()
    }
}

/// OSC packet encoder
pub struct OscEncoder {
    buf: BytesMut,
}

impl OscEncoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(64),
        }
    }

    /// Get the encoded bytes and reset encoder
    pub fn finish(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Encode one message
    pub fn encode(&mut self, msg: &OscMessage) {
        self.write_str(msg.address.as_bytes());

        let mut tags = Vec::with_capacity(msg.args.len() + 1);
        tags.push(b',');
        tags.extend(msg.args.iter().map(OscArg::tag));
        self.write_str(&tags);

        for arg in &msg.args {
            match arg {
                OscArg::Int(i) => self.buf.put_i32(*i),
                OscArg::Float(f) => self.buf.put_f32(*f),
                OscArg::Str(s) => self.write_str(s.as_bytes()),
            }
        }
    }

    /// NUL-terminated, padded to four bytes
    fn write_str(&mut self, s: &[u8]) {
        self.buf.put_slice(s);
        let pad = 4 - (s.len() % 4);
        self.buf.put_bytes(0, pad);
    }
}

impl Default for OscEncoder {
    fn default() -> Self {
        Self::new()
    }
}
