//! Count command implementation.

use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::merge::count_directives;
use crate::utils::format_count_with_separator;

/// Run the count command
pub fn run(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let dir = config.paths.directive_dir();
    let total = count_directives(dir)?;
    println!(
        "{} directives in {}",
        format_count_with_separator(total),
        dir.display()
    );
    Ok(())
}
