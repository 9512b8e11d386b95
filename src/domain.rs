//! Domain string normalization.
//!
//! Domains are handled as lowercase dot-separated label sequences. The
//! helpers here split a domain into `(label, mid, tld)` where `mid` is one of
//! the compound second-level suffixes `org.`, `co.` or `com.` (so
//! `foo.co.uk` keeps `co.uk` together), and derive the "one level up" parent
//! used by both deduplication passes.

use regex::Regex;
use std::sync::LazyLock;

/// `label.(org.|co.|com.)?tld` at the end of a name.
static SITE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z0-9\-]+)\.(org\.|co\.|com\.)?([A-Za-z0-9\-]+)$").expect("valid regex")
});

/// Exactly one subdomain label above `label.(mid)tld`.
static SUBDOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9\-]+\.([A-Za-z0-9\-]+)\.(org\.|co\.|com\.)?([A-Za-z0-9\-]+)$")
        .expect("valid regex")
});

/// Final label with its leading dot.
static TLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.[A-Za-z0-9\-]+$").expect("valid regex"));

/// Prefix dropped from every candidate before registration.
const WWW_PREFIX: &str = "www.";

/// A domain split at its registrable boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteParts<'a> {
    pub label: &'a str,
    pub mid: Option<&'a str>,
    pub tld: &'a str,
}

impl SiteParts<'_> {
    /// `label.` + `mid` + `tld`: the domain one level up, collapsing any
    /// deeper subdomain.
    pub fn parent(&self) -> String {
        format!("{}.{}{}", self.label, self.mid.unwrap_or(""), self.tld)
    }

    /// TLD suffix with leading dot, as stored in the blocked-TLD set.
    pub fn tld_suffix(&self) -> String {
        format!(".{}", self.tld)
    }
}

/// Trim and lowercase a raw domain token.
pub fn normalize(raw: &str) -> String {
    raw.trim().trim_matches('.').to_ascii_lowercase()
}

/// Remove a single leading `www.` label.
pub fn strip_www(domain: &str) -> &str {
    domain.strip_prefix(WWW_PREFIX).unwrap_or(domain)
}

/// Split a domain into `(label, mid, tld)`.
///
/// Returns `None` when the name does not end in a dotted label pair.
pub fn split(domain: &str) -> Option<SiteParts<'_>> {
    let caps = SITE_RE.captures(domain)?;
    Some(SiteParts {
        label: caps.get(1)?.as_str(),
        mid: caps.get(2).map(|m| m.as_str()),
        tld: caps.get(3)?.as_str(),
    })
}

/// Parent of a domain that has exactly one subdomain label.
///
/// `ads.tracker.com` gives `tracker.com`, `a.foo.co.uk` gives `foo.co.uk`.
/// Deeper nesting such as `a.b.tracker.com` is not detected.
pub fn subdomain_parent(domain: &str) -> Option<String> {
    let caps = SUBDOMAIN_RE.captures(domain)?;
    Some(format!(
        "{}.{}{}",
        caps.get(1)?.as_str(),
        caps.get(2).map_or("", |m| m.as_str()),
        caps.get(3)?.as_str()
    ))
}

/// Last label of a name with its leading dot (`goodsite.ru` gives `.ru`).
pub fn tld_of(domain: &str) -> Option<&str> {
    TLD_RE.find(domain).map(|m| m.as_str())
}

/// Normalize a TLD table or override entry to its `.suffix` form.
pub fn as_suffix(tld: &str) -> String {
    let tld = normalize(tld);
    if tld.starts_with('.') {
        tld
    } else {
        format!(".{}", tld)
    }
}
