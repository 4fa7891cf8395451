// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    manual = { "manual", SpawnPolicy::Manual },
    auto = { "auto", SpawnPolicy::Auto },
)]
fn parse_known_policies(input: &str, expected: SpawnPolicy) {
    assert_eq!(input.parse::<SpawnPolicy>().unwrap(), expected);
}

#[parameterized(
    bogus = { "bogus" },
    empty = { "" },
    case_sensitive = { "Auto" },
)]
fn parse_rejects_unknown(input: &str) {
    let err = input.parse::<SpawnPolicy>().unwrap_err();
    assert_eq!(err.to_string(), format!("unknown spawn-policy: {input}"));
}

#[test]
fn mode_display() {
    assert_eq!(PoolMode::Active.to_string(), "active");
    assert_eq!(PoolMode::Paused.to_string(), "paused");
}
