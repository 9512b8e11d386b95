//! Persisted summary of the last run.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::utils::{format_count_with_separator, format_duration_ago, truncate};

/// Summary written after every completed run.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RunState {
    pub last_update: Option<DateTime<Utc>>,
    pub block_address: String,
    /// Per-source accepted counts, in processing order
    pub sources: Vec<SourceStats>,
    /// Enabled feeds that produced nothing (download failed, empty, unsupported)
    pub skipped: Vec<String>,
    pub tld_blocked: usize,
    /// Entries rejected while sources were ingested
    pub ingestion_duplicates: u64,
    /// Subdomains dropped by the merge pass
    pub merge_duplicates: u64,
    /// `address=` lines written
    pub directives: usize,
    /// Whitelisted sites restored from blocked TLDs
    pub reinstated: usize,
    /// Whitelisted sites left blocked because no directive could be built
    pub unrestored: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceStats {
    pub name: String,
    pub accepted: usize,
}

impl RunState {
    /// Load state from `path`; a missing file yields an empty state.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Save state atomically (tempfile + rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let parent = path.parent().unwrap_or(Path::new("/var/lib/notrack"));
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;

        let content = serde_json::to_string_pretty(self)?;
        let mut temp_file = NamedTempFile::new_in(parent)
            .context("Failed to create temporary file for state")?;
        temp_file.write_all(content.as_bytes())?;
        temp_file
            .persist(path)
            .with_context(|| format!("Failed to persist {}", path.display()))?;
        Ok(())
    }

    pub fn record_source(&mut self, name: &str, accepted: usize) {
        self.sources.push(SourceStats {
            name: name.to_string(),
            accepted,
        });
    }

    pub fn total_accepted(&self) -> usize {
        self.sources.iter().map(|s| s.accepted).sum()
    }

    pub fn total_duplicates(&self) -> u64 {
        self.ingestion_duplicates + self.merge_duplicates
    }
}

/// Render the summary table shown by `notrack stats`.
pub fn render(state: &RunState, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let rule = "══════════════════════════════════════════════════";

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, " NOTRACK BLOCKLIST STATISTICS");
    let _ = writeln!(out, "{}", rule);

    match state.last_update {
        Some(last) => {
            let local: DateTime<Local> = last.into();
            let _ = writeln!(
                out,
                " Last update: {} ({})",
                local.format("%Y-%m-%d %H:%M:%S"),
                format_duration_ago(last, now)
            );
        }
        None => {
            let _ = writeln!(out, " Last update: never");
            let _ = writeln!(out, "{}", rule);
            return out;
        }
    }
    let _ = writeln!(out, " Block address: {}", state.block_address);
    let _ = writeln!(out);

    if !state.sources.is_empty() {
        let _ = writeln!(out, " SOURCE               ENTRIES");
        let _ = writeln!(out, " ──────────────────── ────────────");
        for source in &state.sources {
            let _ = writeln!(
                out,
                " {:<20} {:>12}",
                truncate(&source.name, 20),
                format_count_with_separator(source.accepted)
            );
        }
        let _ = writeln!(out, " ──────────────────── ────────────");
        let _ = writeln!(
            out,
            " {:<20} {:>12}",
            "TOTAL",
            format_count_with_separator(state.total_accepted())
        );
        let _ = writeln!(out);
    }

    let _ = writeln!(out, " Blocked TLDs: {}", state.tld_blocked);
    let _ = writeln!(
        out,
        " Duplicates removed: {} ({} ingestion, {} merge)",
        format_count_with_separator(state.total_duplicates() as usize),
        state.ingestion_duplicates,
        state.merge_duplicates
    );
    let _ = writeln!(
        out,
        " Sites blocked: {}",
        format_count_with_separator(state.directives)
    );
    if state.reinstated > 0 {
        let _ = writeln!(out, " Whitelisted under blocked TLDs: {}", state.reinstated);
    }
    if state.unrestored > 0 {
        let _ = writeln!(out, " Whitelisted but still blocked: {}", state.unrestored);
    }
    if !state.skipped.is_empty() {
        let _ = writeln!(out, " Skipped: {}", state.skipped.join(", "));
    }
    let _ = writeln!(out, "{}", rule);
    out
}
