// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool mode and spawn policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Whether the pool admits new work.
///
/// A paused pool still reconciles and reaps existing children; it only
/// refuses new admissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolMode {
    Active,
    Paused,
}

impl fmt::Display for PoolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PoolMode::Active => "active",
            PoolMode::Paused => "paused",
        };
        f.write_str(s)
    }
}

/// How agents come into being.
///
/// Under `Manual` the poller never starts and tasks never drive spawning;
/// only explicit RPC creates agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpawnPolicy {
    Manual,
    Auto,
}

impl fmt::Display for SpawnPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SpawnPolicy::Manual => "manual",
            SpawnPolicy::Auto => "auto",
        };
        f.write_str(s)
    }
}

/// Error for an unrecognized spawn-policy string. Fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown spawn-policy: {0}")]
pub struct UnknownSpawnPolicy(pub String);

impl FromStr for SpawnPolicy {
    type Err = UnknownSpawnPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(SpawnPolicy::Manual),
            "auto" => Ok(SpawnPolicy::Auto),
            other => Err(UnknownSpawnPolicy(other.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "mode_tests.rs"]
mod tests;
