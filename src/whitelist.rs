//! Whitelist reinstatement.
//!
//! A blocked TLD masks every name below it, including sites the user has
//! whitelisted. This pass restores those sites with resolver directives of
//! their own. With dnsmasq 2.75 or later each site is delegated back to the
//! normal upstream (`server=/site/#`); otherwise the site is resolved once
//! through `dig` and pinned with static `host-record` / `txt-record` lines.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::cmd_abstraction::{args_to_strings, CommandExecutor};
use crate::domain;
use crate::resolver::Capability;

static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:A|AAAA)\s+([a-f0-9.:]+)$").expect("valid regex"));

static TXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"TXT\s+(.+)$").expect("valid regex"));

/// How whitelisted sites under blocked TLDs are restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Delegation,
    StaticAnswer,
    Unavailable,
}

impl Strategy {
    pub fn choose(capability: Capability, dig_available: bool) -> Self {
        if capability.supports_delegation() {
            Strategy::Delegation
        } else if dig_available {
            Strategy::StaticAnswer
        } else {
            Strategy::Unavailable
        }
    }
}

/// Outcome of the reinstatement pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reinstatement {
    pub strategy: Strategy,
    /// Whitelisted sites found under a blocked TLD
    pub sites: Vec<String>,
    /// Sites that received at least one directive
    pub restored: Vec<String>,
    pub directives: Vec<String>,
}

impl Reinstatement {
    /// Masked sites left blocked.
    pub fn unrestored(&self) -> usize {
        self.sites.len() - self.restored.len()
    }
}

/// Whitelisted sites whose TLD suffix is blocked, sorted.
pub fn masked_sites(whitelist: &HashSet<String>, blocked_tlds: &BTreeSet<String>) -> Vec<String> {
    let sites: BTreeSet<&String> = whitelist
        .iter()
        .filter(|site| domain::tld_of(site).is_some_and(|tld| blocked_tlds.contains(tld)))
        .collect();
    sites.into_iter().cloned().collect()
}

/// Directives mirroring the answer section printed by `dig +noall +answer`.
pub fn parse_dig_answer(site: &str, output: &str) -> Vec<String> {
    let mut directives = Vec::new();
    for line in output.lines().map(str::trim_end) {
        if let Some(caps) = ADDRESS_RE.captures(line) {
            directives.push(format!("host-record={},{}", site, &caps[1]));
        }
        if let Some(caps) = TXT_RE.captures(line) {
            directives.push(format!("txt-record={},{}", site, &caps[1]));
        }
    }
    directives
}

/// Build reinstatement directives for every masked whitelisted site.
pub fn reinstate(
    executor: &dyn CommandExecutor,
    strategy: Strategy,
    whitelist: &HashSet<String>,
    blocked_tlds: &BTreeSet<String>,
    upstream: &str,
) -> Reinstatement {
    let sites = masked_sites(whitelist, blocked_tlds);
    let mut directives = Vec::new();
    let mut restored = Vec::new();

    match strategy {
        Strategy::Delegation => {
            info!("White listing from blocked top level domains with Dnsmasq");
            directives.extend(sites.iter().map(|site| format!("server=/{}/#", site)));
            restored.clone_from(&sites);
        }
        Strategy::StaticAnswer => {
            info!("White listing using resolved addresses from dig");
            let server = format!("@{}", upstream);
            for site in &sites {
                let args = args_to_strings(&[
                    site.as_str(),
                    server.as_str(),
                    "ANY",
                    "+noall",
                    "+answer",
                ]);
                let answer = match executor.execute("dig", &args) {
                    Ok(output) => parse_dig_answer(site, &output.stdout),
                    Err(e) => {
                        warn!("dig failed for {}: {}", site, e);
                        continue;
                    }
                };
                if answer.is_empty() {
                    warn!("dig returned no usable records for {}", site);
                    continue;
                }
                directives.extend(answer);
                restored.push(site.clone());
            }
        }
        Strategy::Unavailable => {
            if !sites.is_empty() {
                warn!("Unable to white list from blocked top level domains");
            }
        }
    }

    Reinstatement {
        strategy,
        sites,
        restored,
        directives,
    }
}

/// Write the reinstatement directive file, or remove it when there is nothing to write.
pub fn write_directives(path: &Path, directives: &[String]) -> Result<()> {
    if directives.is_empty() {
        if path.exists() {
            info!("No sites to white list from blocked TLDs, deleting {}", path.display());
            fs::remove_file(path)
                .with_context(|| format!("Failed to delete {}", path.display()))?;
        }
        return Ok(());
    }

    let mut content = directives.join("\n");
    content.push('\n');
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}
