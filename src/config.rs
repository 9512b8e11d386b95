//! Configuration management for NoTrack.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::NotrackError;
use crate::parser::ListFormat;
use crate::validation::{parse_interval, validate_ip, validate_source_name};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/notrack/config.yaml";

/// Source name of the user blacklist.
pub const BLACKLIST_SOURCE: &str = "custom";

/// Source name of the TLD risk table.
pub const TLD_SOURCE: &str = "tld";

/// Four days minus thirty minutes.
const DEFAULT_CHECK_INTERVAL: &str = "5730m";

/// `(name, url, format, enabled)` of the built-in feeds, in processing order.
const DEFAULT_BLOCKLISTS: &[(&str, &str, &str, bool)] = &[
    (
        "notrack",
        "https://raw.githubusercontent.com/quidsup/notrack/master/trackers.txt",
        "notrack",
        true,
    ),
    (
        "qmalware",
        "https://raw.githubusercontent.com/quidsup/notrack/master/malicious-sites.txt",
        "plain",
        true,
    ),
    (
        "hexxium",
        "https://hexxiumcreations.github.io/threat-list/hexxiumthreatlist.txt",
        "easylist",
        true,
    ),
    (
        "disconnectmalvertising",
        "https://s3.amazonaws.com/lists.disconnect.me/simple_malvertising.txt",
        "plain",
        false,
    ),
    (
        "easylist",
        "https://easylist-downloads.adblockplus.org/easylist_noelemhide.txt",
        "easylist",
        false,
    ),
    (
        "easyprivacy",
        "https://easylist-downloads.adblockplus.org/easyprivacy.txt",
        "easylist",
        false,
    ),
    (
        "fbannoyance",
        "https://easylist-downloads.adblockplus.org/fanboy-annoyance.txt",
        "easylist",
        false,
    ),
    (
        "fbenhanced",
        "https://www.fanboy.co.nz/enhancedstats.txt",
        "easylist",
        false,
    ),
    (
        "fbsocial",
        "https://secure.fanboy.co.nz/fanboy-social.txt",
        "easylist",
        false,
    ),
    (
        "hphosts",
        "http://hosts-file.net/ad_servers.txt",
        "unix",
        false,
    ),
    (
        "malwaredomainlist",
        "http://www.malwaredomainlist.com/hostslist/hosts.txt",
        "unix",
        false,
    ),
    (
        "malwaredomains",
        "http://mirror1.malwaredomains.com/files/justdomains",
        "plain",
        false,
    ),
    (
        "pglyoyo",
        "http://pgl.yoyo.org/adservers/serverlist.php?hostformat=;mimetype=plaintext",
        "plain",
        false,
    ),
    (
        "someonewhocares",
        "http://someonewhocares.org/hosts/hosts",
        "unix",
        false,
    ),
    (
        "spam404",
        "https://raw.githubusercontent.com/Dawsey21/Lists/master/adblock-list.txt",
        "easylist",
        false,
    ),
    (
        "swissransom",
        "https://ransomwaretracker.abuse.ch/downloads/RW_DOMBL.txt",
        "plain",
        false,
    ),
    (
        "swisszeus",
        "https://zeustracker.abuse.ch/blocklist.php?download=domainblocklist",
        "plain",
        false,
    ),
    (
        "winhelp2002",
        "http://winhelp2002.mvps.org/hosts.txt",
        "unix",
        false,
    ),
    (
        "areasy",
        "https://easylist-downloads.adblockplus.org/Liste_AR.txt",
        "easylist",
        false,
    ),
    (
        "chneasy",
        "https://easylist-downloads.adblockplus.org/easylistchina.txt",
        "easylist",
        false,
    ),
    (
        "deueasy",
        "https://easylist-downloads.adblockplus.org/easylistgermany.txt",
        "easylist",
        false,
    ),
    (
        "dnkeasy",
        "https://adblock.dk/block.csv",
        "easylist",
        false,
    ),
    (
        "ruseasy",
        "https://easylist-downloads.adblockplus.org/ruadlist+easylist.txt",
        "easylist",
        false,
    ),
    (
        "fblatin",
        "https://www.fanboy.co.nz/fanboy-espanol.txt",
        "easylist",
        false,
    ),
];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `IPv4`, `IPv6`, or a literal block target address
    pub ip_version: String,

    /// Network device to read the block address from (first UP device if unset)
    pub net_dev: Option<String>,

    /// Latest release announced by the NoTrack feed
    pub latest_version: String,

    /// Minimum age before a feed is downloaded again
    pub check_interval: String,

    /// Block high-risk top level domains
    pub tld: bool,

    /// Third-party feeds, processed in this order
    pub blocklists: Vec<BlocklistSource>,

    /// User supplied list URLs or local paths
    pub custom: Vec<String>,

    /// Resolver queried when whitelisted sites need static answers
    pub upstream_dns: String,

    pub paths: Paths,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ip_version: "IPv4".to_string(),
            net_dev: None,
            latest_version: env!("CARGO_PKG_VERSION").to_string(),
            check_interval: DEFAULT_CHECK_INTERVAL.to_string(),
            tld: true,
            blocklists: default_blocklists(),
            custom: Vec::new(),
            upstream_dns: "8.8.8.8".to_string(),
            paths: Paths::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file. A missing file yields defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            NotrackError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if parse_interval(&self.check_interval).is_none() {
            return Err(NotrackError::Config(format!(
                "Invalid check_interval '{}'. Use format like '4d', '96h', '5730m'",
                self.check_interval
            ))
            .into());
        }

        if !matches!(self.ip_version.as_str(), "IPv4" | "IPv6")
            && validate_ip(&self.ip_version).is_err()
        {
            return Err(NotrackError::Config(format!(
                "Invalid ip_version '{}'. Use IPv4, IPv6 or an IP address",
                self.ip_version
            ))
            .into());
        }

        if validate_ip(&self.upstream_dns).is_err() {
            return Err(NotrackError::Config(format!(
                "Invalid upstream_dns '{}'",
                self.upstream_dns
            ))
            .into());
        }

        let mut names = HashSet::new();
        for blocklist in &self.blocklists {
            validate_source_name(&blocklist.name)
                .map_err(|e| NotrackError::Config(e.to_string()))?;

            if blocklist.name == BLACKLIST_SOURCE
                || blocklist.name == TLD_SOURCE
                || blocklist.name.starts_with("custom_")
                || self.paths.fragment(&blocklist.name) == self.paths.blocking_csv
            {
                return Err(NotrackError::Config(format!(
                    "Blocklist name '{}' is reserved",
                    blocklist.name
                ))
                .into());
            }

            if !names.insert(blocklist.name.as_str()) {
                return Err(NotrackError::Config(format!(
                    "Duplicate blocklist name '{}'",
                    blocklist.name
                ))
                .into());
            }

            if blocklist.list_format()? == ListFormat::TldList {
                return Err(NotrackError::Config(format!(
                    "Blocklist '{}' cannot use the tldlist format, use the tld setting",
                    blocklist.name
                ))
                .into());
            }
        }

        Ok(())
    }

    /// Save configuration to YAML file atomically
    ///
    /// Uses tempfile + rename pattern to prevent corruption on crash.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let path = path.as_ref();
        let content = serde_yaml::to_string(self).with_context(|| "Failed to serialize config")?;

        let parent_dir = path.parent().unwrap_or(Path::new("/etc/notrack"));
        let mut temp_file = NamedTempFile::new_in(parent_dir)
            .context("Failed to create temporary file for config")?;

        temp_file.write_all(content.as_bytes())?;
        temp_file.as_file().sync_all()?;

        temp_file
            .persist(path)
            .with_context(|| format!("Failed to persist config file: {:?}", path))?;

        Ok(())
    }

    /// Parsed check interval.
    pub fn check_interval(&self) -> Duration {
        parse_interval(&self.check_interval)
            .or_else(|| parse_interval(DEFAULT_CHECK_INTERVAL))
            .unwrap_or_default()
    }

    pub fn enabled_blocklists(&self) -> impl Iterator<Item = &BlocklistSource> {
        self.blocklists.iter().filter(|b| b.enabled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlocklistSource {
    pub name: String,
    pub url: String,
    pub format: String,
    #[serde(default)]
    pub enabled: bool,
}

impl BlocklistSource {
    /// Parser tag for this feed; an unknown tag is fatal.
    pub fn list_format(&self) -> Result<ListFormat> {
        self.format.parse().map_err(|_| {
            NotrackError::UnknownMethod {
                source_name: self.name.clone(),
                method: self.format.clone(),
            }
            .into()
        })
    }
}

/// Every input and output location used by a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Paths {
    /// Working directory; per-source CSV fragments are written here
    pub work_dir: PathBuf,
    pub blacklist: PathBuf,
    pub whitelist: PathBuf,
    pub domain_blacklist: PathBuf,
    pub domain_whitelist: PathBuf,
    pub domain_quick_list: PathBuf,
    /// Risk-scored TLD table (`tld,name,risk`)
    pub tld_table: PathBuf,
    /// Combined CSV of every registered entry
    pub blocking_csv: PathBuf,
    /// Resolver directive file
    pub block_list: PathBuf,
    /// Reinstatement directive file
    pub whitelist_list: PathBuf,
    /// Downloaded and copied feeds
    pub cache_dir: PathBuf,
    pub state_file: PathBuf,
    pub lock_file: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            work_dir: "/etc/notrack".into(),
            blacklist: "/etc/notrack/blacklist.txt".into(),
            whitelist: "/etc/notrack/whitelist.txt".into(),
            domain_blacklist: "/etc/notrack/domain-blacklist.txt".into(),
            domain_whitelist: "/etc/notrack/domain-whitelist.txt".into(),
            domain_quick_list: "/etc/notrack/domain-quick.list".into(),
            tld_table: "/var/www/html/admin/include/tld.csv".into(),
            blocking_csv: "/etc/notrack/blocking.csv".into(),
            block_list: "/etc/dnsmasq.d/notrack.list".into(),
            whitelist_list: "/etc/dnsmasq.d/whitelist.list".into(),
            cache_dir: "/var/cache/notrack".into(),
            state_file: "/var/lib/notrack/state.json".into(),
            lock_file: "/var/run/notrack.lock".into(),
        }
    }
}

impl Paths {
    /// Default layout relocated below `root`.
    pub fn under(root: &Path) -> Self {
        let rebase = |p: PathBuf| root.join(p.strip_prefix("/").unwrap_or(&p));
        let d = Self::default();
        Self {
            work_dir: rebase(d.work_dir),
            blacklist: rebase(d.blacklist),
            whitelist: rebase(d.whitelist),
            domain_blacklist: rebase(d.domain_blacklist),
            domain_whitelist: rebase(d.domain_whitelist),
            domain_quick_list: rebase(d.domain_quick_list),
            tld_table: rebase(d.tld_table),
            blocking_csv: rebase(d.blocking_csv),
            block_list: rebase(d.block_list),
            whitelist_list: rebase(d.whitelist_list),
            cache_dir: rebase(d.cache_dir),
            state_file: rebase(d.state_file),
            lock_file: rebase(d.lock_file),
        }
    }

    /// Per-source CSV fragment.
    pub fn fragment(&self, source: &str) -> PathBuf {
        self.work_dir.join(format!("{}.csv", source))
    }

    /// Cached download or copy of a feed.
    pub fn cached_feed(&self, source: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.txt", source))
    }

    /// Directory holding the resolver directive files.
    pub fn directive_dir(&self) -> &Path {
        self.block_list.parent().unwrap_or(Path::new("/etc/dnsmasq.d"))
    }
}

fn default_blocklists() -> Vec<BlocklistSource> {
    DEFAULT_BLOCKLISTS
        .iter()
        .map(|(name, url, format, enabled)| BlocklistSource {
            name: name.to_string(),
            url: url.to_string(),
            format: format.to_string(),
            enabled: *enabled,
        })
        .collect()
}
