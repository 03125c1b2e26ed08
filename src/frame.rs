//! Conversion between operator-typed hex text and raw frames.

use std::fmt;

use crate::error::{Result, SessionError};

/// A non-empty byte sequence sent to or received from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Vec<u8>);

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; an empty frame cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_display_hex(&self.0))
    }
}

/// Parses whitespace-separated hex tokens into a frame.
///
/// Every token must be a base-16 integer in `0..=255`; an optional `0x`
/// prefix is accepted. Parsing is all-or-nothing.
pub fn encode(text: &str) -> Result<Frame> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(SessionError::HexParse);
    }

    let bytes = tokens
        .into_iter()
        .map(parse_byte)
        .collect::<Result<Vec<u8>>>()?;

    Ok(Frame(bytes))
}

fn parse_byte(token: &str) -> Result<u8> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);

    u32::from_str_radix(digits, 16)
        .ok()
        .and_then(|value| u8::try_from(value).ok())
        .ok_or_else(|| SessionError::InvalidByte {
            token: token.to_string(),
        })
}

/// Renders bytes as two-digit uppercase hex separated by single spaces.
pub fn to_display_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{:02X}", b));
    }
    out
}
