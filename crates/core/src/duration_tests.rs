// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    millis = { "250ms", 0, 250_000_000 },
    bare_seconds = { "30", 30, 0 },
    seconds = { "45s", 45, 0 },
    minutes = { "5m", 300, 0 },
    hours = { "2h", 7200, 0 },
    days = { "1d", 86400, 0 },
    padded = { "  10s ", 10, 0 },
)]
fn parses(input: &str, secs: u64, nanos: u32) {
    assert_eq!(parse_duration(input).unwrap(), Duration::new(secs, nanos));
}

#[parameterized(
    empty = { "" },
    no_number = { "ms" },
    bad_suffix = { "10y" },
    negative = { "-5s" },
)]
fn rejects(input: &str) {
    assert!(parse_duration(input).is_err());
}
