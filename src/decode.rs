//! Decoding of the engineering value carried in a complete reply.

use crate::constants::{
    FRACTION_DENOMINATOR, FRACTION_OFFSET, INTEGER_OFFSET, TARGET_LEN, VALUE_PRECISION,
};
use crate::session::ReceiveBuffer;

/// Returns the engineering value, or `None` unless exactly `TARGET_LEN`
/// bytes were received.
pub fn decode(buffer: &ReceiveBuffer) -> Option<f32> {
    decode_bytes(buffer.bytes())
}

/// Applies the reply's fixed-point convention to raw bytes.
///
/// `value = be16(bytes[3..5]) + be16(bytes[5..7]) / 65535`
pub fn decode_bytes(bytes: &[u8]) -> Option<f32> {
    if bytes.len() != TARGET_LEN {
        return None;
    }

    let integer = u16::from_be_bytes([bytes[INTEGER_OFFSET], bytes[INTEGER_OFFSET + 1]]);
    let fraction = u16::from_be_bytes([bytes[FRACTION_OFFSET], bytes[FRACTION_OFFSET + 1]]);

    let mut value = integer as f32;
    value += fraction as f32 / FRACTION_DENOMINATOR;
    Some(value)
}

/// Formats a value for display.
pub fn format_value(value: f32) -> String {
    format!("{:.*}", VALUE_PRECISION, value)
}
