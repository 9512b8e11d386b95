//! Host checks and lookups done before a run.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::cmd_abstraction::{args_to_strings, CommandExecutor};
use crate::config::Config;
use crate::error::NotrackError;
use crate::validation::validate_ip;

/// Check if running as root (effective UID == 0)
pub fn check_root() -> Result<()> {
    // SAFETY: geteuid() has no preconditions and never fails.
    let euid = unsafe { libc::geteuid() };

    if euid != 0 {
        return Err(NotrackError::Permission(
            "NoTrack must be run as root, please run with sudo".to_string(),
        )
        .into());
    }
    Ok(())
}

/// Create the working directory if it does not exist yet.
pub fn ensure_work_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    info!("Creating folder {}", dir.display());
    fs::create_dir_all(dir)
        .map_err(|_| NotrackError::WorkingDirectory(dir.display().to_string()))?;
    Ok(())
}

/// Address family read from a network device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    fn keyword(self) -> &'static str {
        match self {
            Family::V4 => "inet",
            Family::V6 => "inet6",
        }
    }
}

/// First UP device listed by `ip -o link show`, loopback excluded.
pub fn parse_first_up_device(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let name = fields.nth(1)?.trim_end_matches(':');
        let name = name.split('@').next().unwrap_or(name);
        let flags = fields.next().unwrap_or("");
        let up = flags
            .trim_matches(|c: char| c == '<' || c == '>')
            .split(',')
            .any(|f| f == "UP");
        (up && name != "lo").then(|| name.to_string())
    })
}

/// First address of `family` in `ip addr list <dev>` output, without prefix length.
pub fn parse_first_address(output: &str, family: Family) -> Option<String> {
    output.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        if fields.next()? != family.keyword() {
            return None;
        }
        let cidr = fields.next()?;
        Some(cidr.split('/').next().unwrap_or(cidr).to_string())
    })
}

/// Address every blocked name resolves to.
///
/// `IPv4` and `IPv6` read the first address of the configured (or first UP)
/// network device; any other value is used verbatim as a literal address.
pub fn block_address(config: &Config, executor: &dyn CommandExecutor) -> Result<String> {
    let family = match config.ip_version.as_str() {
        "IPv4" => Family::V4,
        "IPv6" => Family::V6,
        literal => {
            let ip = validate_ip(literal).map_err(|e| NotrackError::Config(e.to_string()))?;
            info!("Custom IP Address used");
            return Ok(ip.to_string());
        }
    };

    let device = match &config.net_dev {
        Some(dev) => dev.clone(),
        None => {
            let output = executor
                .execute("ip", &args_to_strings(&["-o", "link", "show"]))
                .context("Unable to list network devices")?;
            parse_first_up_device(&output.stdout)
                .context("No network device is UP, set net_dev or a literal ip_version")?
        }
    };
    debug!("Reading address of {}", device);

    let output = executor
        .execute("ip", &args_to_strings(&["addr", "list", device.as_str()]))
        .with_context(|| format!("Unable to read addresses of {}", device))?;
    let address = parse_first_address(&output.stdout, family).with_context(|| {
        format!("No {} address found on {}", family.keyword(), device)
    })?;
    info!("System IP Address: {}", address);
    Ok(address)
}
