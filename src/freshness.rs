//! File age checks.
//!
//! A run is skipped when the directive file is younger than the check
//! interval and none of the inputs that shape it changed since it was
//! written. The same modification-time helpers decide whether a cached feed
//! must be fetched again and whether the TLD fragment can be reused.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::config::Paths;

/// Modification time of a file, `None` when it does not exist.
pub fn file_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Whether `path` is missing or older than `max_age`.
pub fn is_stale(path: &Path, max_age: Duration, now: SystemTime) -> bool {
    match file_time(path) {
        Some(modified) => modified + max_age < now,
        None => true,
    }
}

/// Whether `path` was modified after `reference`. A missing `path` is never newer.
pub fn is_newer(path: &Path, reference: Option<SystemTime>) -> bool {
    match (file_time(path), reference) {
        (Some(modified), Some(reference)) => modified > reference,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Why a run has to regenerate the directive file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateReason {
    Forced,
    BlockListOutOfDate,
    WhitelistModified,
    BlacklistModified,
    ConfigModified,
    DomainWhitelistModified,
    DomainBlacklistModified,
    TldTableModified,
}

impl fmt::Display for UpdateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UpdateReason::Forced => "Forced update",
            UpdateReason::BlockListOutOfDate => "Block list out of date",
            UpdateReason::WhitelistModified => "White list recently modified",
            UpdateReason::BlacklistModified => "Black list recently modified",
            UpdateReason::ConfigModified => "Config recently modified",
            UpdateReason::DomainWhitelistModified => "Domain white list recently modified",
            UpdateReason::DomainBlacklistModified => "Domain black list recently modified",
            UpdateReason::TldTableModified => "Domain master list recently modified",
        };
        f.write_str(text)
    }
}

/// First reason found for running, or `None` when the directive file is current.
pub fn update_required(
    paths: &Paths,
    config_path: &Path,
    interval: Duration,
    force: bool,
    now: SystemTime,
) -> Option<UpdateReason> {
    if force {
        return Some(UpdateReason::Forced);
    }

    if is_stale(&paths.block_list, interval, now) {
        return Some(UpdateReason::BlockListOutOfDate);
    }

    let list_time = file_time(&paths.block_list);
    let inputs: [(&Path, UpdateReason); 6] = [
        (&paths.whitelist, UpdateReason::WhitelistModified),
        (&paths.blacklist, UpdateReason::BlacklistModified),
        (config_path, UpdateReason::ConfigModified),
        (&paths.domain_whitelist, UpdateReason::DomainWhitelistModified),
        (&paths.domain_blacklist, UpdateReason::DomainBlacklistModified),
        (&paths.tld_table, UpdateReason::TldTableModified),
    ];

    inputs
        .into_iter()
        .find(|(path, _)| is_newer(path, list_time))
        .map(|(_, reason)| reason)
}
