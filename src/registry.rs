//! Site registry: the ingestion-time deduplication authority.
//!
//! Every candidate from every source passes through [`SiteRegistry::register`].
//! The first source to register a domain owns it for the rest of the run;
//! later candidates are rejected when their TLD is blocked, when the domain
//! one level up is already registered, or when the exact name is already
//! registered. Surviving entries are recorded as `Active`, or `Disabled` when
//! the user whitelist names the domain or its parent.
//!
//! Records keep insertion order so the aggregator can cut per-source
//! fragments out of a single vector.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::domain;

/// Whether a registered entry ends up in the directive file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Active,
    Disabled,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "Active",
            Status::Disabled => "Disabled",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(Status::Active),
            "Disabled" => Ok(Status::Disabled),
            other => Err(format!("Unknown status '{}'", other)),
        }
    }
}

/// Why a candidate was not registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The TLD suffix is blocked as a whole.
    DuplicateTld,
    /// The domain one level up is already registered.
    DuplicateParent,
    /// The exact domain is already registered.
    DuplicateExact,
}

/// Result of one registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Added(Status),
    Rejected(Rejection),
    /// Not a dotted domain; dropped without counting as a duplicate.
    Ignored,
}

impl Outcome {
    pub fn is_added(&self) -> bool {
        matches!(self, Outcome::Added(_))
    }
}

/// One registered entry, also one row of the accumulated CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRecord {
    pub domain: String,
    pub source: String,
    pub status: Status,
    pub comment: String,
}

impl SiteRecord {
    /// Encode as a `domain,source,status,comment` CSV row.
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{}",
            csv_field(&self.domain),
            csv_field(&self.source),
            self.status,
            csv_field(&self.comment)
        )
    }

    /// Decode a row written by [`SiteRecord::to_csv_row`].
    pub fn from_csv_row(line: &str) -> Option<Self> {
        let mut fields = split_csv_row(line).into_iter();
        let domain = fields.next().filter(|d| !d.is_empty())?;
        let source = fields.next()?;
        let status = fields.next()?.parse().ok()?;
        let comment = fields.next().unwrap_or_default();
        Some(Self {
            domain,
            source,
            status,
            comment,
        })
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn split_csv_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Owned per-run dedup state shared by every source.
#[derive(Debug, Default)]
pub struct SiteRegistry {
    records: Vec<SiteRecord>,
    index: HashMap<String, usize>,
    whitelist: HashSet<String>,
    blocked_tlds: BTreeSet<String>,
    duplicates: u64,
}

impl SiteRegistry {
    pub fn new(whitelist: HashSet<String>) -> Self {
        Self {
            whitelist,
            ..Self::default()
        }
    }

    /// Register one candidate, applying the rejection rules in order.
    pub fn register(&mut self, domain: &str, comment: &str, source: &str) -> Outcome {
        let normalized = domain::normalize(domain);
        let site = domain::strip_www(&normalized);
        let Some(parts) = domain::split(site) else {
            return Outcome::Ignored;
        };

        if self.blocked_tlds.contains(&parts.tld_suffix()) {
            return self.reject(Rejection::DuplicateTld);
        }

        let parent = parts.parent();
        if parent != site && self.index.contains_key(&parent) {
            return self.reject(Rejection::DuplicateParent);
        }

        if self.index.contains_key(site) {
            return self.reject(Rejection::DuplicateExact);
        }

        let status = if self.whitelist.contains(site) || self.whitelist.contains(&parent) {
            Status::Disabled
        } else {
            Status::Active
        };
        let site = site.to_string();
        self.insert(site, source, status, comment);
        Outcome::Added(status)
    }

    /// Register a blocked TLD suffix such as `.ru` as an active entry.
    ///
    /// Suffixes have no dotted label pair, so they skip the site rules and
    /// only collide with an identical suffix.
    pub fn register_suffix(&mut self, tld: &str, comment: &str, source: &str) -> Outcome {
        let suffix = domain::as_suffix(tld);
        if self.index.contains_key(&suffix) {
            return self.reject(Rejection::DuplicateExact);
        }
        self.insert(suffix, source, Status::Active, comment);
        Outcome::Added(Status::Active)
    }

    /// Re-insert a record read back from a cached fragment.
    pub fn restore(&mut self, record: SiteRecord) -> bool {
        if self.index.contains_key(&record.domain) {
            return false;
        }
        self.index.insert(record.domain.clone(), self.records.len());
        self.records.push(record);
        true
    }

    /// Add a suffix to the blocked-TLD set.
    pub fn block_tld(&mut self, tld: &str) {
        self.blocked_tlds.insert(domain::as_suffix(tld));
    }

    pub fn is_tld_blocked(&self, suffix: &str) -> bool {
        self.blocked_tlds.contains(suffix)
    }

    pub fn blocked_tlds(&self) -> &BTreeSet<String> {
        &self.blocked_tlds
    }

    pub fn whitelist(&self) -> &HashSet<String> {
        &self.whitelist
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.index.contains_key(domain)
    }

    pub fn get(&self, domain: &str) -> Option<&SiteRecord> {
        self.index.get(domain).map(|&i| &self.records[i])
    }

    /// All records in registration order.
    pub fn records(&self) -> &[SiteRecord] {
        &self.records
    }

    /// Domains that will be blocked, in registration order.
    pub fn active_domains(&self) -> impl Iterator<Item = &str> {
        self.records
            .iter()
            .filter(|r| r.status == Status::Active)
            .map(|r| r.domain.as_str())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    pub fn reset_duplicates(&mut self) {
        self.duplicates = 0;
    }

    fn reject(&mut self, reason: Rejection) -> Outcome {
        self.duplicates += 1;
        Outcome::Rejected(reason)
    }

    fn insert(&mut self, domain: String, source: &str, status: Status, comment: &str) {
        self.index.insert(domain.clone(), self.records.len());
        self.records.push(SiteRecord {
            domain,
            source: source.to_string(),
            status,
            comment: comment.to_string(),
        });
    }
}
