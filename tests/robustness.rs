//! Robustness tests for edge cases and error conditions.
//!
//! Malformed lists, odd encodings and broken state files must be skipped or
//! reported, never panic.

use std::fs;
use tempfile::TempDir;

use notrack::config::Config;
use notrack::error::exit_code_for;
use notrack::merge;
use notrack::parser::{self, ListFormat};
use notrack::registry::SiteRegistry;
use notrack::stats::RunState;

const ALL_FORMATS: [ListFormat; 5] = [
    ListFormat::Plain,
    ListFormat::NoTrack,
    ListFormat::Unix,
    ListFormat::EasyList,
    ListFormat::Custom,
];

/// Every parser tolerates garbage lines
#[test]
fn test_garbage_lines() {
    let garbage = "\0\0\0\n\u{feff}\n||\n127.0.0.1\n0.0.0.0    \n#\n....\n\r\n$third-party\n<html><body>404</body></html>\n";
    for format in ALL_FORMATS {
        let mut registry = SiteRegistry::default();
        for candidate in parser::parse(format, garbage, "garbage") {
            registry.register(&candidate.domain, &candidate.comment, &candidate.source);
        }
        for record in registry.records() {
            assert!(record.domain.contains('.'), "{:?}: {}", format, record.domain);
        }
    }
}

/// Unicode and IDN text does not panic the registry
#[test]
fn test_unicode_handling() {
    let mut registry = SiteRegistry::default();
    for name in ["münchen.de", "пример.рф", "例え.テスト", "xn--mnchen-3ya.de", "😀.com"] {
        let _ = registry.register(name, "", "unicode");
    }
    assert!(registry.contains("xn--mnchen-3ya.de"));
}

#[test]
fn test_empty_and_whitespace() {
    let mut registry = SiteRegistry::default();
    for name in ["", " ", "\t", ".", "..", "com", "www."] {
        let outcome = registry.register(name, "", "empty");
        assert!(!outcome.is_added(), "{:?} was added", name);
    }
    assert!(registry.is_empty());
}

#[test]
fn test_crlf_line_endings() {
    let content = "tracker.com\r\nevil.net #bad\r\n";
    let domains: Vec<String> = parser::parse(ListFormat::Plain, content, "crlf")
        .map(|c| c.domain)
        .collect();
    assert_eq!(domains, vec!["tracker.com", "evil.net"]);
}

/// Large feeds go through the registry and merge in one pass
#[test]
fn test_large_input_handling() {
    let mut content = String::new();
    for i in 0..50_000 {
        content.push_str(&format!("site{}.example{}.com\n", i, i % 100));
    }
    let mut registry = SiteRegistry::default();
    for candidate in parser::parse(ListFormat::Plain, &content, "large") {
        registry.register(&candidate.domain, &candidate.comment, &candidate.source);
    }
    assert_eq!(registry.len(), 50_000);

    let merged = merge::merge(&registry);
    assert_eq!(merged.domains.len(), 50_000);
    assert_eq!(merged.duplicates, 0);
}

#[test]
fn test_yaml_malformed_input() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    for bad in ["tld: [unclosed", "blocklists: 12", "tld: [1, 2]", "custom: {a: 1}"] {
        fs::write(&path, bad).unwrap();
        let err = Config::load(&path).unwrap_err();
        assert_eq!(exit_code_for(&err), 3, "{:?}", bad);
    }
}

#[test]
fn test_json_malformed_state() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    for bad in ["", "{", "{\"directives\": -1}"] {
        fs::write(&path, bad).unwrap();
        assert!(RunState::load(&path).is_err(), "{:?}", bad);
    }
}

#[test]
fn test_missing_directory_handling() {
    let result = merge::count_directives(std::path::Path::new("/nonexistent/notrack/dnsmasq.d"));
    assert!(result.is_err());
}
