//! Centralized validation functions for NoTrack.
//!
//! This module provides unified validation for:
//! - Check intervals (`4d`, `5730m`)
//! - Block target addresses
//! - Source names used to derive file names

use anyhow::{bail, Result};
use std::net::IpAddr;
use std::time::Duration;

/// Check interval validation (e.g., "4d", "30m", "96h").
///
/// Returns `true` if the interval is valid.
/// Requires ASCII-only input to prevent Unicode-related edge cases.
///
/// Valid suffixes: `s` (seconds), `m` (minutes), `h` (hours), `d` (days)
///
/// # Examples
/// ```
/// use notrack::validation::is_valid_interval;
/// assert!(is_valid_interval("4d"));
/// assert!(is_valid_interval("5730m"));
/// assert!(!is_valid_interval("4x"));
/// assert!(!is_valid_interval(""));
/// ```
pub fn is_valid_interval(interval: &str) -> bool {
    parse_interval(interval).is_some()
}

/// Parse a check interval into a [`Duration`].
pub fn parse_interval(interval: &str) -> Option<Duration> {
    if !interval.is_ascii() || interval.len() < 2 {
        return None;
    }

    let (num_part, suffix) = interval.split_at(interval.len() - 1);
    let value: u64 = num_part.parse().ok()?;
    let multiplier = match suffix {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86400,
        _ => return None,
    };
    Some(Duration::from_secs(value.checked_mul(multiplier)?))
}

/// Validate a literal block target address.
///
/// # Examples
/// ```
/// use notrack::validation::validate_ip;
/// assert!(validate_ip("192.168.1.2").is_ok());
/// assert!(validate_ip("fe80::1").is_ok());
/// assert!(validate_ip("IPv5").is_err());
/// ```
pub fn validate_ip(ip_str: &str) -> Result<IpAddr> {
    ip_str
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid IP address: {}", ip_str))
}

/// Validate a source name. Names become file names, so only
/// `[A-Za-z0-9_-]` is accepted.
pub fn validate_source_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("Source name cannot be empty");
    }
    if name.len() > 64 {
        bail!("Source name too long (max 64 characters): {}", name);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        bail!(
            "Invalid source name '{}': only letters, digits, '_' and '-' are allowed",
            name
        );
    }
    Ok(())
}
