//! Protocol constants for the fixed-length reply format.
//!
//! The device answers every request with a single 9-byte frame:
//!
//! ```text
//! +----+----+----+--------+--------+--------+--------+----+----+
//! | 0  | 1  | 2  | int_hi | int_lo | frc_hi | frc_lo | 7  | 8  |
//! +----+----+----+--------+--------+--------+--------+----+----+
//!   header / status          value                    trailer
//! ```

use std::ops::RangeInclusive;

/// Number of bytes the receive loop waits for.
pub const TARGET_LEN: usize = 9;

/// Capacity of the receive buffer. Only `TARGET_LEN` bytes are ever used.
pub const RECEIVE_CAPACITY: usize = 2048;

/// Offset of the big-endian integer part of the engineering value.
pub const INTEGER_OFFSET: usize = 3;

/// Offset of the big-endian fractional numerator of the engineering value.
pub const FRACTION_OFFSET: usize = 5;

/// Denominator applied to the fractional numerator. 65535, not 65536.
pub const FRACTION_DENOMINATOR: f32 = 65535.0;

/// Accepted read timeout, in milliseconds.
pub const TIMEOUT_RANGE_MS: RangeInclusive<i64> = 50..=1000;

/// Extension appended to the operator-supplied log file name.
pub const LOG_EXTENSION: &str = "txt";

/// Decimal places used when displaying the engineering value.
pub const VALUE_PRECISION: usize = 3;
