//! TLD risk processor.
//!
//! Reads the risk-scored TLD table once per run and decides which suffixes
//! are blocked outright:
//!
//! * risk 1 blocks the suffix unless the domain whitelist names it
//! * any other risk blocks it only when the domain blacklist names it
//!
//! Each blocked suffix is registered as an entry of its own and added to the
//! registry's blocked-TLD set. The result is also written as a quick lookup
//! file, one suffix per line, for the reporting side.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::{Paths, TLD_SOURCE};
use crate::freshness::{file_time, is_newer};
use crate::lists;
use crate::parser::{self, TldRow};
use crate::registry::{SiteRecord, SiteRegistry};

/// What the TLD pass did this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TldRun {
    /// Feature turned off; previous output removed.
    Disabled,
    /// Cached fragment reused, this many suffixes blocked.
    Reused(usize),
    /// Table processed, this many suffixes blocked.
    Generated(usize),
}

impl TldRun {
    pub fn blocked(&self) -> usize {
        match self {
            TldRun::Disabled => 0,
            TldRun::Reused(n) | TldRun::Generated(n) => *n,
        }
    }
}

/// Whether a table row ends up blocked, given the domain override sets.
pub fn is_blocked(
    row: &TldRow,
    domain_whitelist: &HashSet<String>,
    domain_blacklist: &HashSet<String>,
) -> bool {
    if row.is_high_risk() {
        !domain_whitelist.contains(&row.tld)
    } else {
        domain_blacklist.contains(&row.tld)
    }
}

/// Run the TLD pass against `registry`.
///
/// The fragment at `paths.fragment("tld")` is reused when it is newer than
/// the table and both domain override files, unless `force` is set. Reuse
/// rebuilds the blocked set from the fragment itself.
pub fn process(
    registry: &mut SiteRegistry,
    paths: &Paths,
    enabled: bool,
    force: bool,
) -> Result<TldRun> {
    let fragment = paths.fragment(TLD_SOURCE);

    if !enabled {
        info!("Top level domain blocking disabled");
        remove_if_exists(&fragment)?;
        remove_if_exists(&paths.domain_quick_list)?;
        return Ok(TldRun::Disabled);
    }

    if !force && fragment_is_current(paths, &fragment) {
        match restore_from_fragment(registry, &fragment) {
            Ok(count) if count > 0 => {
                info!("Top level domain list is in date, reusing {} entries", count);
                write_quick_list(registry, &paths.domain_quick_list)?;
                return Ok(TldRun::Reused(count));
            }
            Ok(_) => warn!("Cached TLD list {} is empty, regenerating", fragment.display()),
            Err(e) => warn!("Unable to reuse cached TLD list: {:#}", e),
        }
    }

    info!("Processing top level domain list");
    let domain_whitelist = lists::load_suffix_set(&paths.domain_whitelist)?;
    let domain_blacklist = lists::load_suffix_set(&paths.domain_blacklist)?;

    let table = match fs::read_to_string(&paths.tld_table) {
        Ok(content) => content,
        Err(e) => {
            warn!("TLD table {} unavailable: {}", paths.tld_table.display(), e);
            String::new()
        }
    };

    let start = registry.len();
    let mut blocked = 0;
    for row in parser::parse_tld_table(&table) {
        if !is_blocked(&row, &domain_whitelist, &domain_blacklist) {
            continue;
        }
        registry.block_tld(&row.tld);
        registry.register_suffix(&row.tld, &row.name, TLD_SOURCE);
        blocked += 1;
    }
    debug!("{} TLD rows blocked", blocked);

    let rows: Vec<String> = registry.records()[start..]
        .iter()
        .map(SiteRecord::to_csv_row)
        .collect();
    if rows.is_empty() {
        remove_if_exists(&fragment)?;
    } else {
        write_lines(&fragment, &rows)?;
    }
    write_quick_list(registry, &paths.domain_quick_list)?;

    Ok(TldRun::Generated(registry.blocked_tlds().len()))
}

fn fragment_is_current(paths: &Paths, fragment: &Path) -> bool {
    let Some(written) = file_time(fragment) else {
        return false;
    };
    let reference = Some(written);
    !is_newer(&paths.tld_table, reference)
        && !is_newer(&paths.domain_whitelist, reference)
        && !is_newer(&paths.domain_blacklist, reference)
}

/// Re-register every row of a previously written fragment.
fn restore_from_fragment(registry: &mut SiteRegistry, fragment: &Path) -> Result<usize> {
    let content = fs::read_to_string(fragment)
        .with_context(|| format!("Failed to read {}", fragment.display()))?;
    let mut count = 0;
    for record in content.lines().filter_map(SiteRecord::from_csv_row) {
        registry.block_tld(&record.domain);
        if registry.restore(record) {
            count += 1;
        }
    }
    Ok(count)
}

fn write_quick_list(registry: &SiteRegistry, path: &Path) -> Result<()> {
    let lines: Vec<String> = registry.blocked_tlds().iter().cloned().collect();
    write_lines(path, &lines)
}

fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut content = lines.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

fn remove_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        info!("Deleting file {}", path.display());
        fs::remove_file(path).with_context(|| format!("Failed to delete {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Outcome, Rejection, Status};
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    const TABLE: &str = "tld,name,risk\nru,Russia,1\ncn,China,1\ncom,Commercial,0\nxyz,Generic,2\n";

    fn setup(table: &str) -> (TempDir, Paths) {
        let dir = TempDir::new().unwrap();
        let paths = Paths::under(dir.path());
        fs::create_dir_all(&paths.work_dir).unwrap();
        fs::create_dir_all(paths.tld_table.parent().unwrap()).unwrap();
        fs::write(&paths.tld_table, table).unwrap();
        (dir, paths)
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    fn set(entries: &[&str]) -> HashSet<String> {
        entries.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_is_blocked_rules() {
        let high = TldRow {
            tld: ".ru".into(),
            name: "Russia".into(),
            risk: 1,
        };
        let low = TldRow {
            tld: ".com".into(),
            name: "Commercial".into(),
            risk: 0,
        };
        let empty = HashSet::new();
        assert!(is_blocked(&high, &empty, &empty));
        assert!(!is_blocked(&high, &set(&[".ru"]), &empty));
        assert!(!is_blocked(&low, &empty, &empty));
        assert!(is_blocked(&low, &empty, &set(&[".com"])));
    }

    #[test]
    fn test_generate_blocks_high_risk() {
        let (_dir, paths) = setup(TABLE);
        let mut reg = SiteRegistry::default();
        let run = process(&mut reg, &paths, true, false).unwrap();

        assert_eq!(run, TldRun::Generated(2));
        assert!(reg.is_tld_blocked(".ru"));
        assert!(reg.is_tld_blocked(".cn"));
        assert!(!reg.is_tld_blocked(".com"));
        assert_eq!(reg.get(".ru").unwrap().status, Status::Active);
        assert_eq!(reg.get(".ru").unwrap().comment, "Russia");

        let quick = fs::read_to_string(&paths.domain_quick_list).unwrap();
        assert_eq!(quick, ".cn\n.ru\n");
        let fragment = fs::read_to_string(paths.fragment("tld")).unwrap();
        assert_eq!(fragment.lines().count(), 2);
    }

    #[test]
    fn test_domain_overrides() {
        let (_dir, paths) = setup(TABLE);
        fs::write(&paths.domain_whitelist, "ru\n").unwrap();
        fs::write(&paths.domain_blacklist, ".com\n").unwrap();
        let mut reg = SiteRegistry::default();
        process(&mut reg, &paths, true, false).unwrap();

        assert!(!reg.is_tld_blocked(".ru"));
        assert!(reg.is_tld_blocked(".com"));
        assert_eq!(
            reg.register("tracker.com", "", "x"),
            Outcome::Rejected(Rejection::DuplicateTld)
        );
    }

    #[test]
    fn test_disabled_removes_output() {
        let (_dir, paths) = setup(TABLE);
        let mut reg = SiteRegistry::default();
        process(&mut reg, &paths, true, false).unwrap();
        assert!(paths.fragment("tld").exists());

        let mut reg = SiteRegistry::default();
        let run = process(&mut reg, &paths, false, false).unwrap();
        assert_eq!(run, TldRun::Disabled);
        assert!(!paths.fragment("tld").exists());
        assert!(!paths.domain_quick_list.exists());
        assert!(reg.blocked_tlds().is_empty());
    }

    #[test]
    fn test_fresh_fragment_is_reused() {
        let (_dir, paths) = setup(TABLE);
        let now = SystemTime::now();
        set_mtime(&paths.tld_table, now - Duration::from_secs(3600));

        let mut reg = SiteRegistry::default();
        process(&mut reg, &paths, true, false).unwrap();
        set_mtime(&paths.fragment("tld"), now);

        // A changed table without a newer mtime must not be read.
        fs::write(&paths.tld_table, "tld,name,risk\n").unwrap();
        set_mtime(&paths.tld_table, now - Duration::from_secs(3600));

        let mut reg = SiteRegistry::default();
        let run = process(&mut reg, &paths, true, false).unwrap();
        assert_eq!(run, TldRun::Reused(2));
        assert!(reg.is_tld_blocked(".ru"));
        assert!(reg.contains(".cn"));
    }

    #[test]
    fn test_force_ignores_cache() {
        let (_dir, paths) = setup(TABLE);
        let now = SystemTime::now();
        set_mtime(&paths.tld_table, now - Duration::from_secs(3600));
        let mut reg = SiteRegistry::default();
        process(&mut reg, &paths, true, false).unwrap();
        set_mtime(&paths.fragment("tld"), now);

        fs::write(&paths.tld_table, "ru,Russia,1\n").unwrap();
        set_mtime(&paths.tld_table, now - Duration::from_secs(3600));

        let mut reg = SiteRegistry::default();
        let run = process(&mut reg, &paths, true, true).unwrap();
        assert_eq!(run, TldRun::Generated(1));
        assert!(!reg.is_tld_blocked(".cn"));
    }

    #[test]
    fn test_missing_table_blocks_nothing() {
        let (_dir, paths) = setup("");
        fs::remove_file(&paths.tld_table).unwrap();
        let mut reg = SiteRegistry::default();
        let run = process(&mut reg, &paths, true, false).unwrap();
        assert_eq!(run, TldRun::Generated(0));
        assert!(!paths.fragment("tld").exists());
    }
}
