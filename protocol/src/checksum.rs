//! # 7-3-1 Reference Numbers
//!
//! Estonian payment references carry a trailing check digit so a mistyped
//! reference is caught at the bank rather than at reconciliation time.
//!
//! ```text
//!   number:    1 0 0 0 5 2
//!   reversed:  2 5 0 0 0 1
//!   weights:   7 3 1 7 3 1
//!   products: 14 15 0 0 0 1   sum = 30
//!   check:    (10 - 30 % 10) % 10 = 0   →   1000520
//! ```
//!
//! Walking the number least-significant digit first is the same as
//! reversing it, so no string round trip is needed.

const WEIGHTS: [u64; 3] = [7, 3, 1];

/// Check digit for `number` under the 7-3-1 scheme.
pub fn check_digit(number: u64) -> u8 {
    let mut remaining = number;
    let mut sum = 0u64;
    let mut position = 0usize;

    loop {
        sum += (remaining % 10) * WEIGHTS[position % WEIGHTS.len()];
        remaining /= 10;
        position += 1;
        if remaining == 0 {
            break;
        }
    }

    ((10 - sum % 10) % 10) as u8
}

/// Appends the check digit to `number`.
///
/// Returns `None` if the result does not fit in a `u64`, which no realistic
/// transaction stamp comes near.
pub fn reference_number(number: u64) -> Option<u64> {
    number
        .checked_mul(10)?
        .checked_add(u64::from(check_digit(number)))
}

/// True if the last digit of `reference` is the 7-3-1 check digit of the
/// digits before it.
pub fn is_valid_reference(reference: u64) -> bool {
    if reference < 10 {
        return false;
    }
    u64::from(check_digit(reference / 10)) == reference % 10
}
