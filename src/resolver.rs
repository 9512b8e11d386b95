//! Downstream resolver (dnsmasq) probing and reload.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::cmd_abstraction::{args_to_strings, CommandExecutor};

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Dnsmasq version (\d+)\.(\d{1,2})").expect("valid regex")
});

/// Per-name delegation (`server=/name/#`) appeared in dnsmasq 2.75.
const DELEGATION_MIN: (u32, u32) = (2, 75);

/// Result of probing the installed resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// dnsmasq is not installed
    Missing,
    /// Installed but the version could not be read
    Unknown,
    /// Too old for per-name delegation
    NoDelegation { major: u32, minor: u32 },
    /// Per-name delegation supported
    Delegation { major: u32, minor: u32 },
}

impl Capability {
    pub fn supports_delegation(&self) -> bool {
        matches!(self, Capability::Delegation { .. })
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Missing => f.write_str("not installed"),
            Capability::Unknown => f.write_str("version unknown"),
            Capability::NoDelegation { major, minor } | Capability::Delegation { major, minor } => {
                write!(f, "{}.{}", major, minor)
            }
        }
    }
}

/// Classify `dnsmasq --version` output.
pub fn parse_version(output: &str) -> Capability {
    let Some(caps) = VERSION_RE.captures(output.trim_start()) else {
        return Capability::Unknown;
    };
    let (Ok(major), Ok(minor)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) else {
        return Capability::Unknown;
    };
    if (major, minor) >= DELEGATION_MIN {
        Capability::Delegation { major, minor }
    } else {
        Capability::NoDelegation { major, minor }
    }
}

/// Probe the installed dnsmasq.
pub fn probe(executor: &dyn CommandExecutor) -> Capability {
    match executor.execute("dnsmasq", &args_to_strings(&["--version"])) {
        Ok(output) => parse_version(&output.stdout),
        Err(_) => Capability::Missing,
    }
}

/// Whether `dig` can be run.
pub fn dig_available(executor: &dyn CommandExecutor) -> bool {
    executor.execute("dig", &args_to_strings(&["-v"])).is_ok()
}

/// Ask the service manager to restart dnsmasq. Failures are reported, not retried.
pub fn reload(executor: &dyn CommandExecutor) -> bool {
    info!("Restarting Dnsmasq");
    match executor.execute("service", &args_to_strings(&["dnsmasq", "restart"])) {
        Ok(output) if output.success => true,
        Ok(output) => {
            warn!("Dnsmasq restart failed: {}", output.stderr.trim());
            false
        }
        Err(e) => {
            warn!("Unable to restart Dnsmasq: {}", e);
            false
        }
    }
}
