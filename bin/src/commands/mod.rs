//! CLI command implementations.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use trawl_lib::prelude::*;

pub(crate) mod ingest;
pub(crate) mod ingest_all;
pub(crate) mod pairs;
pub(crate) mod query;

/// Loads the configuration file, or the defaults when none is given.
pub(crate) fn load_config(path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<TrawlConfig> {
    let config = match path {
        Some(path) => TrawlConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TrawlConfig::default(),
    };
    Ok(match data_dir {
        Some(dir) => config.with_data_dir(dir),
        None => config,
    })
}
