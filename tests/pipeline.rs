//! End-to-end tests of the block list pipeline through the library API.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use notrack::aggregator::Aggregator;
use notrack::cmd_abstraction::{CommandExecutor, CommandOutput};
use notrack::commands::update;
use notrack::config::{BlocklistSource, Config, Paths};
use notrack::merge;
use notrack::parser::ListFormat;
use notrack::registry::{SiteRegistry, Status};
use notrack::stats::RunState;
use notrack::whitelist::{self, Strategy};

/// Answers like a host with dnsmasq 2.80 and nothing else installed.
struct StubExecutor;

impl CommandExecutor for StubExecutor {
    fn execute(&self, cmd: &str, _args: &[String]) -> anyhow::Result<CommandOutput> {
        match cmd {
            "dnsmasq" => Ok(CommandOutput {
                stdout: "Dnsmasq version 2.80  Copyright (c) 2000-2018 Simon Kelley\n".to_string(),
                success: true,
                code: Some(0),
                ..Default::default()
            }),
            "service" => Ok(CommandOutput {
                success: true,
                code: Some(0),
                ..Default::default()
            }),
            other => anyhow::bail!("{} is not installed", other),
        }
    }
}

/// Answers like a host with dnsmasq 2.72 (no `server=/site/#`) and no `dig`.
struct LegacyExecutor;

impl CommandExecutor for LegacyExecutor {
    fn execute(&self, cmd: &str, _args: &[String]) -> anyhow::Result<CommandOutput> {
        match cmd {
            "dnsmasq" => Ok(CommandOutput {
                stdout: "Dnsmasq version 2.72  Copyright (c) 2000-2014 Simon Kelley\n".to_string(),
                success: true,
                code: Some(0),
                ..Default::default()
            }),
            other => anyhow::bail!("{} is not installed", other),
        }
    }
}

fn setup() -> (TempDir, Paths) {
    let dir = TempDir::new().unwrap();
    let paths = Paths::under(dir.path());
    fs::create_dir_all(&paths.work_dir).unwrap();
    fs::create_dir_all(paths.tld_table.parent().unwrap()).unwrap();
    (dir, paths)
}

fn whitelist(entries: &[&str]) -> HashSet<String> {
    entries.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_subdomains_and_www_collapse_into_parent() {
    let (_dir, paths) = setup();
    let mut aggregator = Aggregator::begin(&paths, SiteRegistry::default()).unwrap();
    aggregator
        .process_source(
            "custom_mylist",
            ListFormat::Custom,
            "ads.tracker.com\nwww.tracker.com\ntracker.com\n",
        )
        .unwrap();
    let registry = aggregator.finish().unwrap();
    let merged = merge::merge(&registry);

    assert_eq!(merged.domains, vec!["tracker.com"]);
    assert_eq!(registry.duplicates() + merged.duplicates, 2);
    assert_eq!(registry.get("tracker.com").unwrap().status, Status::Active);
}

#[test]
fn test_adblock_filter_line() {
    let (_dir, paths) = setup();
    let mut aggregator = Aggregator::begin(&paths, SiteRegistry::default()).unwrap();
    aggregator
        .process_source("easylist", ListFormat::EasyList, "||doubleclick.net^$third-party\n")
        .unwrap();
    let registry = aggregator.finish().unwrap();

    let record = registry.get("doubleclick.net").unwrap();
    assert_eq!(record.comment, "");
    assert_eq!(record.source, "easylist");
}

#[test]
fn test_hosts_line_keeps_comment() {
    let (_dir, paths) = setup();
    let mut aggregator = Aggregator::begin(&paths, SiteRegistry::default()).unwrap();
    aggregator
        .process_source("someonewhocares", ListFormat::Unix, "0.0.0.0 bad.example.org #spyware\n")
        .unwrap();
    let registry = aggregator.finish().unwrap();

    assert_eq!(registry.get("bad.example.org").unwrap().comment, "spyware");
}

#[test]
fn test_whitelisted_site_under_blocked_tld_is_reinstated() {
    let (_dir, paths) = setup();
    fs::write(&paths.tld_table, "ru,Russia,1\n").unwrap();

    let registry = SiteRegistry::new(whitelist(&["goodsite.ru"]));
    let mut aggregator = Aggregator::begin(&paths, registry).unwrap();
    aggregator.process_tld(true, false).unwrap();

    let registry = aggregator.registry();
    assert!(registry.blocked_tlds().contains(".ru"));
    assert_eq!(registry.get(".ru").unwrap().status, Status::Active);

    let result = whitelist::reinstate(
        &StubExecutor,
        Strategy::Delegation,
        registry.whitelist(),
        registry.blocked_tlds(),
        "8.8.8.8",
    );
    assert_eq!(result.directives, vec!["server=/goodsite.ru/#"]);
}

fn pipeline_config(root: &Path, custom_list: &Path) -> Config {
    let mut config = Config {
        ip_version: "192.168.1.2".to_string(),
        custom: vec![custom_list.to_string_lossy().to_string()],
        paths: Paths::under(root),
        ..Default::default()
    };
    for source in &mut config.blocklists {
        source.enabled = false;
    }
    config
}

#[tokio::test]
async fn test_full_run_writes_directives() {
    let (dir, paths) = setup();
    fs::write(&paths.tld_table, "tld,name,risk\nru,Russia,1\ncom,Commercial,0\n").unwrap();
    fs::write(&paths.whitelist, "goodsite.ru\nfriendly.com #allowed\n").unwrap();
    fs::write(&paths.blacklist, "evil.com #mine\n").unwrap();

    let custom_list = dir.path().join("mylist.txt");
    fs::write(
        &custom_list,
        "ads.tracker.com\nwww.tracker.com\ntracker.com\nfriendly.com\nspam.ru\n",
    )
    .unwrap();

    let config = pipeline_config(dir.path(), &custom_list);
    let config_path = dir.path().join("config.yaml");

    let state = update::execute(&config, &config_path, &StubExecutor, false)
        .await
        .unwrap()
        .expect("first run always updates");

    let list = fs::read_to_string(&paths.block_list).unwrap();
    let lines: Vec<&str> = list.lines().collect();
    assert!(lines[0].starts_with("#Tracker Block list last updated "));
    assert!(lines[1].starts_with("#Don't make any changes to this file"));
    assert_eq!(
        &lines[2..],
        [
            "address=/.ru/192.168.1.2",
            "address=/evil.com/192.168.1.2",
            "address=/tracker.com/192.168.1.2",
        ]
    );

    assert_eq!(
        fs::read_to_string(&paths.whitelist_list).unwrap(),
        "server=/goodsite.ru/#\n"
    );

    assert_eq!(state.directives, 3);
    assert_eq!(state.tld_blocked, 1);
    assert_eq!(state.reinstated, 1);
    // www.tracker.com duplicate and spam.ru under .ru, then ads.tracker.com at merge
    assert_eq!(state.ingestion_duplicates, 2);
    assert_eq!(state.merge_duplicates, 1);
    assert!(paths.fragment("custom_mylist").exists());
    assert!(paths.cached_feed("custom_mylist").exists());

    let saved = RunState::load(&paths.state_file).unwrap();
    assert_eq!(saved.directives, 3);

    let combined = fs::read_to_string(&paths.blocking_csv).unwrap();
    assert!(combined.contains("friendly.com,custom_mylist,Disabled,"));
}

#[tokio::test]
async fn test_second_run_is_skipped_unless_forced() {
    let (dir, paths) = setup();
    fs::write(&paths.tld_table, "ru,Russia,1\n").unwrap();
    let custom_list = dir.path().join("mylist.txt");
    fs::write(&custom_list, "tracker.com\n").unwrap();

    let config = pipeline_config(dir.path(), &custom_list);
    let config_path = dir.path().join("config.yaml");

    let first = update::execute(&config, &config_path, &StubExecutor, false)
        .await
        .unwrap();
    assert!(first.is_some());
    assert!(!paths.whitelist_list.exists());

    let second = update::execute(&config, &config_path, &StubExecutor, false)
        .await
        .unwrap();
    assert!(second.is_none());

    let forced = update::execute(&config, &config_path, &StubExecutor, true)
        .await
        .unwrap();
    assert!(forced.is_some());
}

#[tokio::test]
async fn test_removed_custom_list_output_is_cleaned() {
    let (dir, paths) = setup();
    let custom_list = dir.path().join("mylist.txt");
    fs::write(&custom_list, "tracker.com\n").unwrap();
    fs::write(paths.fragment("custom_oldlist"), "old.com,custom_oldlist,Active,\n").unwrap();

    let config = pipeline_config(dir.path(), &custom_list);
    update::execute(&config, &dir.path().join("config.yaml"), &StubExecutor, true)
        .await
        .unwrap();

    assert!(!paths.fragment("custom_oldlist").exists());
    assert!(paths.fragment("custom_mylist").exists());
}

#[tokio::test]
async fn test_whitelist_not_counted_as_restored_without_resolver_support() {
    let (dir, paths) = setup();
    fs::write(&paths.tld_table, "ru,Russia,1\n").unwrap();
    fs::write(&paths.whitelist, "goodsite.ru\n").unwrap();
    fs::create_dir_all(paths.directive_dir()).unwrap();
    fs::write(&paths.whitelist_list, "server=/oldsite.ru/#\n").unwrap();
    let custom_list = dir.path().join("mylist.txt");
    fs::write(&custom_list, "tracker.com\n").unwrap();

    let config = pipeline_config(dir.path(), &custom_list);
    let state = update::execute(&config, &dir.path().join("config.yaml"), &LegacyExecutor, true)
        .await
        .unwrap()
        .unwrap();

    assert!(!paths.whitelist_list.exists());
    assert_eq!(state.reinstated, 0);
    assert_eq!(state.unrestored, 1);
    assert_eq!(RunState::load(&paths.state_file).unwrap().unrestored, 1);
}

#[tokio::test]
async fn test_unfetchable_sources_are_skipped_and_cleaned() {
    let (dir, paths) = setup();
    let missing_list = dir.path().join("missing.txt");

    let mut config = pipeline_config(dir.path(), &missing_list);
    config.blocklists.push(BlocklistSource {
        name: "mirror".to_string(),
        url: "ftp://ftp.example.org/hosts.txt".to_string(),
        format: "unix".to_string(),
        enabled: true,
    });
    fs::write(paths.fragment("mirror"), "old.com,mirror,Active,\n").unwrap();
    fs::write(paths.fragment("custom_missing"), "old.net,custom_missing,Active,\n").unwrap();
    fs::write(&paths.blacklist, "evil.com\n").unwrap();

    let state = update::execute(&config, &dir.path().join("config.yaml"), &StubExecutor, true)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(state.skipped, vec!["mirror", "custom_missing"]);
    assert!(!paths.fragment("mirror").exists());
    assert!(!paths.fragment("custom_missing").exists());

    let list = fs::read_to_string(&paths.block_list).unwrap();
    assert!(list.contains("address=/evil.com/192.168.1.2"));
    assert!(!list.contains("old.com"));
    assert!(!list.contains("old.net"));
}
