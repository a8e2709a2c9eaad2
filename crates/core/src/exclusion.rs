//! Loading of the exclusion table: block identifiers measured to be
//! unreliable (aliasing effects and similar) that must never reach the
//! dataset.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, warn};

use crate::config::ConfigError;

/// Set of excluded block identifiers. Loaded once per run, immutable after.
#[derive(Debug, Default, Clone)]
pub struct ExclusionSet {
    ids: HashSet<String>,
}

impl ExclusionSet {
    /// An empty set (nothing excluded).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, block_id: &str) -> bool {
        self.ids.contains(block_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<String> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self { ids: iter.into_iter().collect() }
    }
}

/// Load the exclusion table at `path`.
///
/// Format: one identifier per line, taken from the first comma-separated
/// field; blank lines and `#` comments are ignored.
///
/// A missing table degrades to an empty set with a warning (a fresh
/// benchmark checkout ships none). A table that exists but cannot be read
/// is a [`ConfigError`]: that is a misconfiguration, not an absent file.
pub fn load_exclusions(path: &Path) -> Result<ExclusionSet, ConfigError> {
    if !path.exists() {
        warn!("exclusion table {} not found; proceeding with no exclusions", path.display());
        return Ok(ExclusionSet::empty());
    }

    let file = File::open(path)
        .map_err(|source| ConfigError::ExclusionUnreadable { path: path.to_path_buf(), source })?;

    let mut ids = HashSet::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| ConfigError::ExclusionUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let id = line.split(',').next().unwrap_or(line).trim();
        if !id.is_empty() {
            ids.insert(id.to_string());
        }
    }

    debug!("loaded {} exclusions from {}", ids.len(), path.display());
    Ok(ExclusionSet { ids })
}
