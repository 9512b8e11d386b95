//! Block list format parsers.
//!
//! Every supported list is line oriented. [`Feed`] walks the raw text once
//! and yields at most one [`Candidate`] per line; lines that do not match the
//! declared format are dropped without error.
//!
//! | Tag        | Line shape                                        |
//! |------------|---------------------------------------------------|
//! | `plain`    | `sub.domain.tld [#comment]`                       |
//! | `notrack`  | as `plain`, plus a `#LatestVersion X.Y.Z` line    |
//! | `unix`     | `127.0.0.1\|0.0.0.0  sub.domain.tld [#comment]`   |
//! | `easylist` | `\|\|domain^$third-party`                         |
//! | `custom`   | any line ending in a dotted name                  |
//! | `tldlist`  | `tld,name,risk`                                   |

use regex::Regex;
use std::fmt;
use std::str::{FromStr, Lines};
use std::sync::LazyLock;

use crate::domain;

static PLAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9\-]+\.[A-Za-z0-9\.\-]+)").expect("valid regex")
});

static UNIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:127\.0\.0\.1|0\.0\.0\.0)\s+([A-Za-z0-9\-]+\.[A-Za-z0-9\.\-]+)")
        .expect("valid regex")
});

static EASYLIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\|\|(?:\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})?([A-Za-z0-9\.\-]+)(?:\^|/|$)(?:\$third-party|\$popup|\$popup,third-party)?$",
    )
    .expect("valid regex")
});

static CUSTOM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z0-9\-]*\.)?([A-Za-z0-9\-]*\.)?[A-Za-z0-9\-]*\.[A-Za-z0-9\-]*$")
        .expect("valid regex")
});

static LATEST_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#LatestVersion\s([0-9\.]+)$").expect("valid regex"));

/// First-line marker of an Adblock Plus filter list.
const ADBLOCK_HEADER: &str = "[Adblock Plus";

/// Declared format of a block list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListFormat {
    Plain,
    NoTrack,
    Unix,
    EasyList,
    Custom,
    TldList,
}

impl ListFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListFormat::Plain => "plain",
            ListFormat::NoTrack => "notrack",
            ListFormat::Unix => "unix",
            ListFormat::EasyList => "easylist",
            ListFormat::Custom => "custom",
            ListFormat::TldList => "tldlist",
        }
    }
}

impl fmt::Display for ListFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(ListFormat::Plain),
            "notrack" => Ok(ListFormat::NoTrack),
            "unix" => Ok(ListFormat::Unix),
            "easylist" => Ok(ListFormat::EasyList),
            "custom" => Ok(ListFormat::Custom),
            "tldlist" => Ok(ListFormat::TldList),
            _ => Err(format!(
                "Unknown list format '{}'. Valid formats: plain, notrack, unix, easylist, custom, tldlist",
                s
            )),
        }
    }
}

/// One normalized entry extracted from a list line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub domain: String,
    pub comment: String,
    pub source: String,
}

/// One row of the risk-scored TLD table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TldRow {
    /// Suffix with leading dot, e.g. `.ru`
    pub tld: String,
    pub name: String,
    pub risk: u8,
}

impl TldRow {
    pub fn is_high_risk(&self) -> bool {
        self.risk == 1
    }
}

/// Lazy, single-pass parser over the text of one list.
///
/// A NoTrack list can announce the latest released version; that value is
/// captured while iterating and is available from [`Feed::latest_version`]
/// once the feed has been consumed.
pub struct Feed<'a> {
    lines: Lines<'a>,
    format: ListFormat,
    source: String,
    latest_version: Option<String>,
}

impl<'a> Feed<'a> {
    pub fn new(format: ListFormat, content: &'a str, source: &str) -> Self {
        Self {
            lines: content.lines(),
            format,
            source: source.to_string(),
            latest_version: None,
        }
    }

    pub fn format(&self) -> ListFormat {
        self.format
    }

    /// Version announced by a `#LatestVersion` line, if one has been seen.
    pub fn latest_version(&self) -> Option<&str> {
        self.latest_version.as_deref()
    }

    fn parse_line(&mut self, raw: &str) -> Option<(String, String)> {
        let line = raw.trim_end_matches(['\r', '\n']).trim_end();
        match self.format {
            ListFormat::Plain => parse_plain(line),
            ListFormat::NoTrack => {
                if let Some(caps) = LATEST_VERSION_RE.captures(line) {
                    self.latest_version = Some(caps[1].to_string());
                    return None;
                }
                parse_plain(line)
            }
            ListFormat::Unix => parse_unix(line),
            ListFormat::EasyList => parse_easylist(line),
            ListFormat::Custom => parse_custom(line),
            ListFormat::TldList => parse_tld_row(line).map(|row| (row.tld, row.name)),
        }
    }
}

impl Iterator for Feed<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        loop {
            let line = self.lines.next()?;
            if let Some((domain, comment)) = self.parse_line(line) {
                return Some(Candidate {
                    domain,
                    comment,
                    source: self.source.clone(),
                });
            }
        }
    }
}

/// Select the parser for `format` over `content`.
pub fn parse<'a>(format: ListFormat, content: &'a str, source: &str) -> Feed<'a> {
    Feed::new(format, content, source)
}

/// Pick the parser for a user supplied list from its first line.
pub fn sniff_custom_format(content: &str) -> ListFormat {
    match content.lines().next() {
        Some(first) if first.starts_with(ADBLOCK_HEADER) => ListFormat::EasyList,
        _ => ListFormat::Custom,
    }
}

/// Parse the risk-scored TLD table (`tld,name,risk`).
pub fn parse_tld_table(content: &str) -> impl Iterator<Item = TldRow> + '_ {
    content
        .lines()
        .filter_map(|line| parse_tld_row(line.trim_end_matches('\r')))
}

/// Split off an in-line `#` comment, returning the trimmed body and comment.
fn split_comment(line: &str) -> (&str, Option<&str>) {
    match line.split_once('#') {
        Some((body, comment)) => (body.trim_end(), Some(comment.trim())),
        None => (line.trim_end(), None),
    }
}

/// Comment for a matched line: the `#` text, else whatever follows the name.
fn trailing_comment(body: &str, match_end: usize, hash_comment: Option<&str>) -> String {
    match hash_comment {
        Some(comment) => comment.to_string(),
        None => body[match_end..].trim().to_string(),
    }
}

fn parse_plain(line: &str) -> Option<(String, String)> {
    let (body, hash_comment) = split_comment(line);
    let m = PLAIN_RE.captures(body)?.get(1)?;
    Some((
        domain::normalize(m.as_str()),
        trailing_comment(body, m.end(), hash_comment),
    ))
}

fn parse_unix(line: &str) -> Option<(String, String)> {
    let (body, hash_comment) = split_comment(line);
    let m = UNIX_RE.captures(body)?.get(1)?;
    Some((
        domain::normalize(m.as_str()),
        trailing_comment(body, m.end(), hash_comment),
    ))
}

fn parse_easylist(line: &str) -> Option<(String, String)> {
    let (body, _) = split_comment(line);
    let caps = EASYLIST_RE.captures(body)?;
    Some((domain::normalize(caps.get(1)?.as_str()), String::new()))
}

fn parse_custom(line: &str) -> Option<(String, String)> {
    let (body, hash_comment) = split_comment(line);
    if body.is_empty() {
        return None;
    }
    let m = CUSTOM_RE.find(body)?;
    let preceding = body[..m.start()].trim();
    let comment = if preceding.is_empty() {
        hash_comment.unwrap_or_default()
    } else {
        preceding
    };
    Some((domain::normalize(m.as_str()), comment.to_string()))
}

fn parse_tld_row(line: &str) -> Option<TldRow> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let mut fields = line.split(',');
    let tld = fields.next()?.trim();
    let name = fields.next()?.trim();
    let risk = fields.next()?.trim().parse::<u8>().ok()?;
    if tld.is_empty() {
        return None;
    }
    Some(TldRow {
        tld: domain::as_suffix(tld),
        name: name.to_string(),
        risk,
    })
}
