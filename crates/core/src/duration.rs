// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human-readable duration parsing for workload and env configuration.

use std::time::Duration;

/// Accepted unit suffixes and their length in milliseconds. A bare
/// number means seconds.
const UNITS: &[(&[&str], u64)] = &[
    (&["ms", "msec", "millis", "milliseconds"], 1),
    (&["", "s", "sec", "secs", "seconds"], 1_000),
    (&["m", "min", "mins", "minutes"], 60 * 1_000),
    (&["h", "hr", "hours"], 60 * 60 * 1_000),
    (&["d", "days"], 24 * 60 * 60 * 1_000),
];

/// Parse a duration string like "250ms", "30s", "5m", "1h".
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let text = input.trim();
    let digits: String = text.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(format!("duration must start with a number: {input:?}"));
    }
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("duration value out of range: {input:?}"))?;

    let unit = text[digits.len()..].trim();
    for (names, unit_ms) in UNITS {
        if names.contains(&unit) {
            return Ok(Duration::from_millis(value.saturating_mul(*unit_ms)));
        }
    }
    Err(format!("unknown duration unit {unit:?} in {input:?}"))
}

#[cfg(test)]
#[path = "duration_tests.rs"]
mod tests;
