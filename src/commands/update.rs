//! Update command implementation.

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use tracing::{info, warn};

use crate::aggregator::{self, Aggregator, SourceReport};
use crate::cmd_abstraction::{CommandExecutor, RealCommandExecutor};
use crate::config::{Config, Paths, BLACKLIST_SOURCE, TLD_SOURCE};
use crate::fetcher::{self, FeedRequest, FetchResult, Fetcher};
use crate::freshness::update_required;
use crate::lists;
use crate::lock::LockGuard;
use crate::merge;
use crate::parser::{self, ListFormat};
use crate::registry::SiteRegistry;
use crate::resolver;
use crate::stats::RunState;
use crate::system;
use crate::utils::format_count_with_separator;
use crate::whitelist::{self, Reinstatement, Strategy};

/// Run the update command
pub async fn run(force: bool, config_path: &Path) -> Result<()> {
    system::check_root()?;

    let config = Config::load(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    let _lock = LockGuard::acquire(&config.paths.lock_file)?;
    let executor = RealCommandExecutor::new();

    match execute(&config, config_path, &executor, force).await? {
        Some(state) => {
            print_summary(&state);
            resolver::reload(&executor);
        }
        None => println!("No update required"),
    }
    Ok(())
}

/// Rebuild the directive files.
///
/// Returns `None` when nothing changed since the last run and `force` is
/// not set. Root and lock handling are left to the caller.
pub async fn execute(
    config: &Config,
    config_path: &Path,
    executor: &dyn CommandExecutor,
    force: bool,
) -> Result<Option<RunState>> {
    let paths = &config.paths;

    system::ensure_work_dir(&paths.work_dir)?;
    let block_address = system::block_address(config, executor)?;

    lists::ensure_whitelist(&paths.whitelist)?;
    let whitelist = lists::load_domain_set(&paths.whitelist)?;
    lists::ensure_blacklist(&paths.blacklist)?;
    lists::ensure_exists(&paths.domain_whitelist)?;
    lists::ensure_exists(&paths.domain_blacklist)?;

    match update_required(paths, config_path, config.check_interval(), force, SystemTime::now()) {
        Some(reason) => info!("{}", reason),
        None => return Ok(None),
    }

    fs::create_dir_all(paths.directive_dir())
        .with_context(|| format!("Failed to create {}", paths.directive_dir().display()))?;

    let mut state = RunState {
        block_address: block_address.clone(),
        ..Default::default()
    };

    let mut aggregator = Aggregator::begin(paths, SiteRegistry::new(whitelist))?;

    let tld_run = aggregator.process_tld(config.tld, force)?;
    state.tld_blocked = tld_run.blocked();
    if tld_run.blocked() > 0 {
        state.record_source(TLD_SOURCE, tld_run.blocked());
    }

    let reinstatement = reinstate_whitelist(config, executor, aggregator.registry())?;
    state.reinstated = reinstatement.restored.len();
    state.unrestored = reinstatement.unrestored();

    let blacklist = fs::read_to_string(&paths.blacklist)
        .with_context(|| format!("Failed to read {}", paths.blacklist.display()))?;
    let report = aggregator.process_source(BLACKLIST_SOURCE, ListFormat::Plain, &blacklist)?;
    state.record_source(&report.source, report.accepted);

    for source in config.blocklists.iter().filter(|b| !b.enabled) {
        aggregator::remove_source_output(paths, &source.name)?;
    }

    let custom = custom_requests(&config.custom);
    let mut requests: Vec<FeedRequest> = config
        .enabled_blocklists()
        .map(|source| FeedRequest {
            source: source.name.clone(),
            location: source.url.clone(),
        })
        .collect();
    let feed_count = requests.len();
    requests.extend(custom.iter().cloned());

    let fetcher = Fetcher::new(&paths.cache_dir, config.check_interval(), force)?;
    let fetched = fetcher.fetch_all(&requests).await;
    let (feeds, customs) = fetched.split_at(feed_count);

    for (source, result) in config.enabled_blocklists().zip(feeds) {
        let format = source.list_format()?;
        let Some(content) = cached_content(paths, result)? else {
            state.skipped.push(source.name.clone());
            continue;
        };
        let report = aggregator.process_source(&source.name, format, &content)?;
        note_latest_version(config, config_path, &report);
        state.record_source(&report.source, report.accepted);
    }

    for result in customs {
        let Some(content) = cached_content(paths, result)? else {
            state.skipped.push(result.source.clone());
            continue;
        };
        let format = parser::sniff_custom_format(&content);
        let report = aggregator.process_source(&result.source, format, &content)?;
        state.record_source(&report.source, report.accepted);
    }

    let configured: HashSet<String> = custom.into_iter().map(|r| r.source).collect();
    for removed in aggregator::remove_stale_custom(paths, &configured)? {
        info!("Removed output of unconfigured list {}", removed);
    }

    let registry = aggregator.finish()?;
    state.ingestion_duplicates = registry.duplicates();

    info!("Sorting and merging the block list");
    let merged = merge::merge(&registry);
    state.merge_duplicates = merged.duplicates;
    state.directives = merged.domains.len();

    let content = merge::render_directives(&merged.domains, &block_address, paths, Local::now());
    merge::write_directives(&paths.block_list, &content)?;

    state.last_update = Some(Utc::now());
    if let Err(e) = state.save(&paths.state_file) {
        warn!("Unable to save run state: {:#}", e);
    }

    Ok(Some(state))
}

/// Requests for the user supplied lists. The first list wins a name clash.
fn custom_requests(locations: &[String]) -> Vec<FeedRequest> {
    let mut seen = HashSet::new();
    let mut requests = Vec::new();
    for location in locations.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        let source = fetcher::custom_source_name(location);
        if !seen.insert(source.clone()) {
            warn!("Custom list {} shares the name {} with another list, skipping", location, source);
            continue;
        }
        requests.push(FeedRequest {
            source,
            location: location.to_string(),
        });
    }
    requests
}

/// Content of a fetched feed, or `None` (with its stale fragment removed)
/// when nothing usable is cached.
fn cached_content(paths: &Paths, result: &FetchResult) -> Result<Option<String>> {
    match fetcher::read_cached(&result.path) {
        Some(content) => Ok(Some(content)),
        None => {
            warn!("File not downloaded for {}", result.source);
            let fragment = paths.fragment(&result.source);
            if fragment.exists() {
                fs::remove_file(&fragment)
                    .with_context(|| format!("Failed to delete {}", fragment.display()))?;
            }
            Ok(None)
        }
    }
}

/// Log a newer NoTrack release and remember it in the config file.
fn note_latest_version(config: &Config, config_path: &Path, report: &SourceReport) {
    let Some(latest) = report.latest_version.as_deref() else {
        return;
    };
    if latest == config.latest_version {
        return;
    }
    info!("New version of NoTrack available v{}", latest);

    let mut updated = config.clone();
    updated.latest_version = latest.to_string();
    if let Err(e) = updated.save(config_path) {
        warn!("Unable to save latest version to {}: {:#}", config_path.display(), e);
    }
}

/// Write (or remove) the reinstatement directives for whitelisted sites under blocked TLDs.
fn reinstate_whitelist(
    config: &Config,
    executor: &dyn CommandExecutor,
    registry: &SiteRegistry,
) -> Result<Reinstatement> {
    let masked = whitelist::masked_sites(registry.whitelist(), registry.blocked_tlds());
    let strategy = if masked.is_empty() {
        Strategy::Unavailable
    } else {
        let capability = resolver::probe(executor);
        let dig = !capability.supports_delegation() && resolver::dig_available(executor);
        Strategy::choose(capability, dig)
    };

    let result = whitelist::reinstate(
        executor,
        strategy,
        registry.whitelist(),
        registry.blocked_tlds(),
        &config.upstream_dns,
    );
    whitelist::write_directives(&config.paths.whitelist_list, &result.directives)?;
    Ok(result)
}

fn print_summary(state: &RunState) {
    println!();
    for source in &state.sources {
        println!(
            "[OK] {}: {} entries",
            source.name,
            format_count_with_separator(source.accepted)
        );
    }
    for name in &state.skipped {
        println!("[!!] {}: nothing downloaded", name);
    }
    println!(
        "[OK] {} duplicates removed",
        format_count_with_separator(state.total_duplicates() as usize)
    );
    if state.reinstated > 0 {
        println!(
            "[OK] {} whitelisted sites restored from blocked TLDs",
            state.reinstated
        );
    }
    if state.unrestored > 0 {
        println!(
            "[!!] {} whitelisted sites under blocked TLDs could not be restored",
            state.unrestored
        );
    }
    println!(
        "[OK] {} sites blocked, resolving to {}",
        format_count_with_separator(state.directives),
        state.block_address
    );
}
