//! Stats command implementation.

use anyhow::Result;
use chrono::Utc;
use std::path::Path;

use crate::config::Config;
use crate::stats::{render, RunState};

/// Run the stats command
pub fn run(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let state = RunState::load(&config.paths.state_file)?;
    print!("{}", render(&state, Utc::now()));
    Ok(())
}
