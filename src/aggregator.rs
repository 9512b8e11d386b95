//! Source aggregation.
//!
//! The [`Aggregator`] owns the site registry for the whole ingestion phase.
//! Sources are fed to it one at a time in configured order; every accepted
//! entry lands in a per-source CSV fragment and in the combined CSV.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::{Paths, TLD_SOURCE};
use crate::parser::{self, ListFormat};
use crate::registry::{SiteRecord, SiteRegistry};
use crate::tld::{self, TldRun};

/// Prefix shared by user supplied list sources.
pub const CUSTOM_PREFIX: &str = "custom_";

/// Result of feeding one source through the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceReport {
    pub source: String,
    /// Entries newly registered (active or disabled)
    pub accepted: usize,
    /// Version announced by a NoTrack feed
    pub latest_version: Option<String>,
}

/// Drives every source through one [`SiteRegistry`] and writes the CSV output.
pub struct Aggregator<'a> {
    paths: &'a Paths,
    registry: SiteRegistry,
    combined: BufWriter<File>,
}

impl<'a> Aggregator<'a> {
    /// Start a run: the combined CSV is created or emptied.
    pub fn begin(paths: &'a Paths, registry: SiteRegistry) -> Result<Self> {
        let file = File::create(&paths.blocking_csv)
            .with_context(|| format!("Failed to create {}", paths.blocking_csv.display()))?;
        Ok(Self {
            paths,
            registry,
            combined: BufWriter::new(file),
        })
    }

    pub fn registry(&self) -> &SiteRegistry {
        &self.registry
    }

    /// Run the TLD pass and append its fragment to the combined CSV.
    pub fn process_tld(&mut self, enabled: bool, force: bool) -> Result<TldRun> {
        let run = tld::process(&mut self.registry, self.paths, enabled, force)?;
        let fragment = self.paths.fragment(TLD_SOURCE);
        if run != TldRun::Disabled && fragment.exists() {
            let content = fs::read_to_string(&fragment)
                .with_context(|| format!("Failed to read {}", fragment.display()))?;
            self.combined.write_all(content.as_bytes())?;
        }
        Ok(run)
    }

    /// Parse `content` as `format` and register every candidate under `source`.
    pub fn process_source(
        &mut self,
        source: &str,
        format: ListFormat,
        content: &str,
    ) -> Result<SourceReport> {
        info!("Processing list {}", source);
        let start = self.registry.len();

        let mut feed = parser::parse(format, content, source);
        for candidate in feed.by_ref() {
            self.registry
                .register(&candidate.domain, &candidate.comment, &candidate.source);
        }
        let latest_version = feed.latest_version().map(str::to_string);

        let rows: Vec<String> = self.registry.records()[start..]
            .iter()
            .map(SiteRecord::to_csv_row)
            .collect();

        let fragment = self.paths.fragment(source);
        if rows.is_empty() {
            info!("No domains extracted from {}", source);
            remove_file_if_exists(&fragment)?;
        } else {
            let mut body = rows.join("\n");
            body.push('\n');
            fs::write(&fragment, &body)
                .with_context(|| format!("Failed to write {}", fragment.display()))?;
            self.combined.write_all(body.as_bytes())?;
            debug!("{}: {} entries written to {}", source, rows.len(), fragment.display());
        }

        Ok(SourceReport {
            source: source.to_string(),
            accepted: rows.len(),
            latest_version,
        })
    }

    /// Finish the ingestion phase and hand the registry to the merge pass.
    pub fn finish(mut self) -> Result<SiteRegistry> {
        self.combined
            .flush()
            .with_context(|| format!("Failed to write {}", self.paths.blocking_csv.display()))?;
        Ok(self.registry)
    }
}

/// Remove the fragment and cached download of a source that is not processed.
pub fn remove_source_output(paths: &Paths, source: &str) -> Result<()> {
    remove_file_if_exists(&paths.fragment(source))?;
    remove_file_if_exists(&paths.cached_feed(source))
}

/// Remove output of custom sources that are no longer configured.
///
/// Returns the names of the sources that were cleaned up.
pub fn remove_stale_custom(paths: &Paths, configured: &HashSet<String>) -> Result<Vec<String>> {
    let entries = match fs::read_dir(&paths.work_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Unable to scan {}: {}", paths.work_dir.display(), e);
            return Ok(Vec::new());
        }
    };

    let mut removed = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let Some(source) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if source.starts_with(CUSTOM_PREFIX) && !configured.contains(source) {
            remove_source_output(paths, source)?;
            removed.push(source.to_string());
        }
    }
    removed.sort();
    Ok(removed)
}

fn remove_file_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        info!("Deleting file {}", path.display());
        fs::remove_file(path).with_context(|| format!("Failed to delete {}", path.display()))?;
    }
    Ok(())
}
