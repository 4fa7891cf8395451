// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trusted-host policy for `--attach` URLs.
//!
//! A child is pointed back at a server URL on its command line; that URL
//! must be loopback http or https to a trusted host. The trust set can be
//! widened through `AETHERFLOW_TRUSTED_HOSTS` (comma-separated patterns,
//! `*` allowed only as the leftmost label).

use std::net::IpAddr;
use thiserror::Error;

/// Environment variable carrying extra trusted host patterns.
pub const TRUSTED_HOSTS_ENV: &str = "AETHERFLOW_TRUSTED_HOSTS";

/// Hosts trusted for https attach targets out of the box.
const DEFAULT_TRUSTED: &[&str] = &["aetherflow.dev", "*.aetherflow.dev"];

/// Rejections from attach-URL validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostPolicyError {
    #[error("malformed attach url: {0}")]
    Malformed(String),

    #[error("unsupported scheme {scheme:?} in attach url")]
    Scheme { scheme: String },

    #[error("http attach target must be loopback with a port, got {0:?}")]
    NotLoopback(String),

    #[error("ip literals are not trusted attach hosts: {0}")]
    IpLiteral(String),

    #[error("untrusted attach host: {0}")]
    Untrusted(String),
}

/// Validate an attach URL against the trusted-host policy.
///
/// `extra_allow` comes from [`TRUSTED_HOSTS_ENV`], already split on commas.
pub fn validate_attach_url(url: &str, extra_allow: &[String]) -> Result<(), HostPolicyError> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| HostPolicyError::Malformed(url.to_string()))?;

    let authority = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    if authority.is_empty() || authority.contains('@') {
        return Err(HostPolicyError::Malformed(url.to_string()));
    }

    let (host, port) = split_host_port(authority)
        .ok_or_else(|| HostPolicyError::Malformed(url.to_string()))?;

    match scheme {
        "http" => {
            let loopback = matches!(host, "localhost" | "127.0.0.1" | "::1");
            let has_port = port.is_some_and(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
            if loopback && has_port {
                Ok(())
            } else {
                Err(HostPolicyError::NotLoopback(authority.to_string()))
            }
        }
        "https" => {
            if host.parse::<IpAddr>().is_ok() {
                return Err(HostPolicyError::IpLiteral(host.to_string()));
            }
            let trusted = DEFAULT_TRUSTED
                .iter()
                .copied()
                .chain(extra_allow.iter().map(String::as_str))
                .any(|pattern| host_matches(pattern, host));
            if trusted {
                Ok(())
            } else {
                Err(HostPolicyError::Untrusted(host.to_string()))
            }
        }
        other => Err(HostPolicyError::Scheme {
            scheme: other.to_string(),
        }),
    }
}

/// Read extra trusted host patterns from the environment.
pub fn allowlist_from_env() -> Vec<String> {
    std::env::var(TRUSTED_HOSTS_ENV)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Split `host[:port]`, handling the bracketed IPv6 form.
fn split_host_port(authority: &str) -> Option<(&str, Option<&str>)> {
    if let Some(rest) = authority.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        match after.strip_prefix(':') {
            Some(port) => Some((host, Some(port))),
            None if after.is_empty() => Some((host, None)),
            None => None,
        }
    } else {
        match authority.rsplit_once(':') {
            Some((host, port)) => Some((host, Some(port))),
            None => Some((authority, None)),
        }
    }
}

/// Case-insensitive host match; `*` is allowed only as the leftmost label
/// and matches exactly one or more leading labels' worth of a single label
/// position (`*.example.com` matches `api.example.com`, not `example.com`).
fn host_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let host = host.to_ascii_lowercase();

    if let Some(suffix) = pattern.strip_prefix("*.") {
        // Wildcard must cover at least one label
        host.strip_suffix(suffix)
            .and_then(|head| head.strip_suffix('.'))
            .is_some_and(|label| !label.is_empty() && !label.contains('*'))
    } else {
        !pattern.contains('*') && pattern == host
    }
}

#[cfg(test)]
#[path = "hosts_tests.rs"]
mod tests;
