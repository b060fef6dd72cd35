//! Human-readable order numbers.
//!
//! Format: `ORD-` + 9 base36 digits of a millisecond timestamp + `-` + 4
//! random base36 digits, all uppercase, e.g. `ORD-LXK2M0A9Q-7F3Z`.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use rand::Rng;

const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const TIMESTAMP_WIDTH: usize = 9;
const SUFFIX_WIDTH: usize = 4;

/// Last timestamp handed out, so two calls in the same millisecond still get
/// distinct timestamp segments.
static LAST_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Generate a new order number.
///
/// Numbers generated by one process have strictly increasing timestamp
/// segments; the random suffix keeps separate processes apart. The database
/// unique constraint is the final guard.
#[must_use]
pub fn generate_order_number() -> String {
    let millis = next_millis(Utc::now().timestamp_millis());
    let mut rng = rand::rng();
    let suffix: String = (0..SUFFIX_WIDTH)
        .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
        .collect();
    format!("ORD-{}-{suffix}", to_base36(millis, TIMESTAMP_WIDTH))
}

fn next_millis(now: i64) -> i64 {
    let mut last = LAST_MILLIS.load(Ordering::Relaxed);
    loop {
        let candidate = if now > last { now } else { last + 1 };
        match LAST_MILLIS.compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Relaxed)
        {
            Ok(_) => return candidate,
            Err(actual) => last = actual,
        }
    }
}

/// Base36-encode `value`, left-padded with zeros to at least `width` digits.
fn to_base36(value: i64, width: usize) -> String {
    let mut n = value.unsigned_abs();
    let mut digits = Vec::with_capacity(width);
    while n > 0 {
        #[allow(clippy::cast_possible_truncation)] // n % 36 < 36
        digits.push(ALPHABET[(n % 36) as usize]);
        n /= 36;
    }
    while digits.len() < width {
        digits.push(b'0');
    }
    digits.reverse();
    digits.into_iter().map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use regex::Regex;

    use super::*;

    #[test]
    fn test_format() {
        #[allow(clippy::unwrap_used)]
        let pattern = Regex::new(r"^ORD-[0-9A-Z]{9}-[0-9A-Z]{4}$").unwrap();
        for _ in 0..100 {
            let number = generate_order_number();
            assert!(pattern.is_match(&number), "bad order number {number}");
        }
    }

    #[test]
    fn test_numbers_are_distinct() {
        let numbers: HashSet<String> = (0..1_000).map(|_| generate_order_number()).collect();
        assert_eq!(numbers.len(), 1_000);
    }

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0, 4), "0000");
        assert_eq!(to_base36(35, 1), "Z");
        assert_eq!(to_base36(36, 3), "010");
        assert_eq!(to_base36(1_700_000_000_000, 9), "0LOYW3V28");
    }

    #[test]
    fn test_next_millis_never_repeats() {
        let a = next_millis(10);
        let b = next_millis(10);
        assert!(b > a);
    }
}
