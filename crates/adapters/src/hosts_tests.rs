// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn allow(patterns: &[&str]) -> Vec<String> {
    patterns.iter().map(|s| s.to_string()).collect()
}

#[parameterized(
    localhost = { "http://localhost:8800" },
    loopback_v4 = { "http://127.0.0.1:9000" },
    loopback_v6 = { "http://[::1]:8800" },
    with_path = { "http://localhost:8800/attach" },
)]
fn local_http_with_port_is_accepted(url: &str) {
    assert_eq!(validate_attach_url(url, &[]), Ok(()));
}

#[parameterized(
    no_port = { "http://localhost" },
    remote_http = { "http://example.com:80" },
    lan_ip = { "http://192.168.1.5:8800" },
)]
fn non_loopback_or_portless_http_is_rejected(url: &str) {
    assert!(matches!(
        validate_attach_url(url, &[]),
        Err(HostPolicyError::NotLoopback(_))
    ));
}

#[test]
fn default_trusted_https_hosts() {
    assert_eq!(validate_attach_url("https://aetherflow.dev", &[]), Ok(()));
    assert_eq!(
        validate_attach_url("https://api.aetherflow.dev/v1", &[]),
        Ok(())
    );
}

#[test]
fn unknown_https_host_is_untrusted() {
    assert!(matches!(
        validate_attach_url("https://evil.example.com", &[]),
        Err(HostPolicyError::Untrusted(_))
    ));
}

#[test]
fn allowlist_extends_trust() {
    let extra = allow(&["internal.corp", "*.staging.corp"]);
    assert_eq!(validate_attach_url("https://internal.corp", &extra), Ok(()));
    assert_eq!(
        validate_attach_url("https://a.staging.corp:8443", &extra),
        Ok(())
    );
    // Wildcard requires at least one label
    assert!(validate_attach_url("https://staging.corp", &extra).is_err());
}

#[test]
fn wildcard_only_matches_leftmost_label_patterns() {
    // A pattern with * in a non-leftmost position never matches
    let extra = allow(&["api.*.corp"]);
    assert!(validate_attach_url("https://api.x.corp", &extra).is_err());
}

#[parameterized(
    v4 = { "https://10.0.0.1" },
    v6 = { "https://[2001:db8::1]:443" },
)]
fn https_ip_literals_are_rejected(url: &str) {
    assert!(matches!(
        validate_attach_url(url, &[]),
        Err(HostPolicyError::IpLiteral(_))
    ));
}

#[parameterized(
    ftp = { "ftp://aetherflow.dev" },
    ws = { "ws://localhost:8800" },
)]
fn other_schemes_are_rejected(url: &str) {
    assert!(matches!(
        validate_attach_url(url, &[]),
        Err(HostPolicyError::Scheme { .. })
    ));
}

#[parameterized(
    no_scheme = { "localhost:8800" },
    empty_authority = { "https://" },
    userinfo = { "https://user@aetherflow.dev" },
)]
fn malformed_urls_are_rejected(url: &str) {
    assert!(matches!(
        validate_attach_url(url, &[]),
        Err(HostPolicyError::Malformed(_))
    ));
}

#[test]
#[serial_test::serial]
fn allowlist_from_env_splits_and_trims() {
    std::env::set_var(TRUSTED_HOSTS_ENV, "a.corp, *.b.corp ,,");
    let list = allowlist_from_env();
    std::env::remove_var(TRUSTED_HOSTS_ENV);
    assert_eq!(list, allow(&["a.corp", "*.b.corp"]));
}

#[test]
#[serial_test::serial]
fn allowlist_from_env_defaults_empty() {
    std::env::remove_var(TRUSTED_HOSTS_ENV);
    assert!(allowlist_from_env().is_empty());
}
