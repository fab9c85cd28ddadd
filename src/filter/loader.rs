//! Filter file loading from disk.

use std::path::Path;

use thiserror::Error;

use crate::filter::RuleSet;

const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Error type for filter file loading.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("failed to read filter file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("filter file {path} is too large ({size} bytes)")]
    TooLarge { path: String, size: u64 },
}

/// Read a filter file, one rule per line.
pub fn load_rules(path: &Path) -> Result<RuleSet, FilterError> {
    let io_err = |source| FilterError::Io {
        path: path.display().to_string(),
        source,
    };

    let size = std::fs::metadata(path).map_err(io_err)?.len();
    if size > MAX_FILE_SIZE {
        return Err(FilterError::TooLarge {
            path: path.display().to_string(),
            size,
        });
    }

    // Lines are decoded one at a time; stray non-UTF-8 bytes only affect their own line.
    let bytes = std::fs::read(path).map_err(io_err)?;
    let lines: Vec<_> = bytes.split(|b| *b == b'\n').map(String::from_utf8_lossy).collect();
    let rules = RuleSet::from_lines(&lines);

    tracing::info!(
        path = %path.display(),
        rules = rules.len(),
        lines = lines.len(),
        "Filter rules loaded"
    );
    Ok(rules)
}
