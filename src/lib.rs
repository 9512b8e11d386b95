//! # NoTrack - Tracker and Malware Block Lists for dnsmasq
//!
//! Aggregates third-party block lists, a risk-scored top level domain table
//! and the user's own lists into a single deduplicated dnsmasq directive
//! file that resolves every tracking or malicious domain to a local address.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        NoTrack                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CLI (clap)                                                 │
//! │    └── Commands: update, test, count, stats, version        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Config (serde_yaml)                                        │
//! │    └── Feeds, custom lists, block address, file layout      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Fetcher (reqwest + rustls)                                 │
//! │    └── Cached downloads and local list copies               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Parser → SiteRegistry                                      │
//! │    ├── plain, notrack, unix, easylist, custom, tldlist      │
//! │    └── TLD / parent / exact duplicate rejection             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Merge → address=/domain/ip directives                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Resolver (dnsmasq, dig via CommandExecutor)                │
//! │    └── Whitelist reinstatement under blocked TLDs, reload   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use notrack::aggregator::Aggregator;
//! use notrack::config::Config;
//! use notrack::merge;
//! use notrack::parser::ListFormat;
//! use notrack::registry::SiteRegistry;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load("/etc/notrack/config.yaml")?;
//!     let paths = &config.paths;
//!
//!     let mut aggregator = Aggregator::begin(paths, SiteRegistry::default())?;
//!     aggregator.process_tld(config.tld, false)?;
//!     aggregator.process_source("mylist", ListFormat::Plain, "tracker.com\n")?;
//!     let registry = aggregator.finish()?;
//!
//!     let merged = merge::merge(&registry);
//!     println!("{} sites, {} duplicates", merged.domains.len(), merged.duplicates);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`aggregator`] - Drives sources through the registry, writes CSV output
//! - [`cli`] - Command-line interface definitions
//! - [`cmd_abstraction`] - External process abstraction (mockable)
//! - [`commands`] - CLI command implementations
//! - [`config`] - Configuration parsing and validation
//! - [`domain`] - Domain name normalization and splitting
//! - [`error`] - Fatal error kinds and exit statuses
//! - [`fetcher`] - Feed downloads and cache
//! - [`freshness`] - File age checks
//! - [`lists`] - User white and black lists
//! - [`lock`] - File locking for concurrent execution prevention
//! - [`merge`] - Final sort and merge pass, directive rendering
//! - [`parser`] - Block list format parsers
//! - [`registry`] - Site registry and deduplication rules
//! - [`resolver`] - dnsmasq probing and reload
//! - [`stats`] - Run state persistence
//! - [`system`] - Root check, working directory, block address
//! - [`tld`] - TLD risk processor
//! - [`utils`] - Formatting helpers
//! - [`validation`] - Input validation
//! - [`whitelist`] - Whitelist reinstatement

pub mod aggregator;
pub mod cli;
pub mod cmd_abstraction;
pub mod commands;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod freshness;
pub mod lists;
pub mod lock;
pub mod merge;
pub mod parser;
pub mod registry;
pub mod resolver;
pub mod stats;
pub mod system;
pub mod tld;
pub mod utils;
pub mod validation;
pub mod whitelist;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use error::NotrackError;
