//! Final sort and merge pass.
//!
//! Runs once over the registry after every source has been ingested. The
//! active domains are sorted and each domain with exactly one subdomain
//! label is dropped when its parent is present too, since the resolver
//! already blocks every name below a blocked domain. Deeper nesting is left
//! as is.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::config::Paths;
use crate::domain;
use crate::registry::SiteRegistry;

/// Surviving domains of the merge pass, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeResult {
    pub domains: Vec<String>,
    /// Subdomains dropped because their parent is blocked
    pub duplicates: u64,
}

/// Sort `domains` and drop one-level subdomains of present parents.
pub fn merge_domains<'a, I>(domains: I) -> MergeResult
where
    I: IntoIterator<Item = &'a str>,
{
    let sorted: BTreeSet<&str> = domains.into_iter().collect();
    let mut result = MergeResult::default();

    for &site in &sorted {
        match domain::subdomain_parent(site) {
            Some(parent) if sorted.contains(parent.as_str()) => result.duplicates += 1,
            _ => result.domains.push(site.to_string()),
        }
    }

    result
}

/// Merge the active entries of the registry.
pub fn merge(registry: &SiteRegistry) -> MergeResult {
    merge_domains(registry.active_domains())
}

/// Render the resolver directive file.
pub fn render_directives(
    domains: &[String],
    block_address: &str,
    paths: &Paths,
    updated: DateTime<Local>,
) -> String {
    let mut out = String::with_capacity(domains.len() * 32 + 256);
    out.push_str(&format!(
        "#Tracker Block list last updated {}\n",
        updated.format("%a %e %b %Y %H:%M:%S %Z")
    ));
    out.push_str(&format!(
        "#Don't make any changes to this file, use {} and {} instead\n",
        paths.blacklist.display(),
        paths.whitelist.display()
    ));
    for site in domains {
        out.push_str(&format!("address=/{}/{}\n", site, block_address));
    }
    out
}

/// Write the rendered directive file.
pub fn write_directives(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Count directive lines (non-comment, non-empty) in every `.list` file of `dir`.
pub fn count_directives(dir: &Path) -> Result<usize> {
    let mut total = 0;
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("list") {
            continue;
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        total += content
            .lines()
            .filter(|l| !l.trim().is_empty() && !l.starts_with('#'))
            .count();
    }
    Ok(total)
}
