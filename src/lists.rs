//! User override lists.
//!
//! Four line-oriented files steer a run: the user blacklist (processed as a
//! plain block list), the user whitelist, and the domain-level white and
//! black lists that adjust which TLDs are blocked. `#` starts a comment and
//! only the first token of a line is used.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::domain;

const BLACKLIST_TEMPLATE: &str = "\
#Use this file to create your own custom block list
#Run notrack update after you make any changes to this file
#doubleclick.net
#googletagmanager.com
#googletagservices.com
";

const WHITELIST_TEMPLATE: &str = "\
#Use this file to remove sites from block list
#Run notrack update after you make any changes to this file
#doubleclick.net
#google-analytics.com
";

/// Parse override file content into a lookup set.
pub fn parse_domain_set(content: &str) -> HashSet<String> {
    content
        .lines()
        .filter_map(|line| {
            let body = line.split('#').next().unwrap_or("");
            let token = body.split_whitespace().next()?;
            let entry = domain::normalize(token);
            (!entry.is_empty()).then_some(entry)
        })
        .collect()
}

/// Load an override file. A missing file is an empty set.
pub fn load_domain_set(path: &Path) -> Result<HashSet<String>> {
    if !path.exists() {
        return Ok(HashSet::new());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(parse_domain_set(&content))
}

/// Load a domain-level override file with every entry in `.suffix` form.
pub fn load_suffix_set(path: &Path) -> Result<HashSet<String>> {
    Ok(load_domain_set(path)?
        .iter()
        .map(|entry| domain::as_suffix(entry))
        .collect())
}

/// Write the commented example blacklist if none exists yet.
pub fn ensure_blacklist(path: &Path) -> Result<bool> {
    write_if_missing(path, BLACKLIST_TEMPLATE, "blacklist")
}

/// Write the commented example whitelist if none exists yet.
pub fn ensure_whitelist(path: &Path) -> Result<bool> {
    write_if_missing(path, WHITELIST_TEMPLATE, "whitelist")
}

/// Create an empty file if none exists yet.
pub fn ensure_exists(path: &Path) -> Result<bool> {
    write_if_missing(path, "", "file")
}

fn write_if_missing(path: &Path, content: &str, what: &str) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    info!("Creating {}: {}", what, path.display());
    fs::write(path, content).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(true)
}
