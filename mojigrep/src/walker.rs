use glob::Pattern;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::{ScanError, ScanResult};

/// File-enumeration options.
///
/// `target` is a glob matched against file names. Exclusion lists are
/// `;`-separated globs: directory patterns are matched per path segment
/// (an excluded directory prunes its whole subtree), file patterns against
/// the leaf name. A list that is empty after trimming is absent.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    pub target: String,
    pub recurse: bool,
    pub exclude_dirs: Option<String>,
    pub exclude_files: Option<String>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        WalkOptions {
            target: "*".to_string(),
            recurse: true,
            exclude_dirs: None,
            exclude_files: None,
        }
    }
}

/// Splits a `;`-separated glob list; `None` when empty after trimming.
pub fn parse_glob_list(list: Option<&str>) -> ScanResult<Option<Vec<Pattern>>> {
    let Some(list) = list else { return Ok(None) };
    let mut patterns = Vec::new();
    for token in list.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = Pattern::new(token)
            .map_err(|e| ScanError::config_error(format!("bad glob '{token}': {e}")))?;
        patterns.push(pattern);
    }
    Ok(if patterns.is_empty() {
        None
    } else {
        Some(patterns)
    })
}

/// Enumerates the files to scan: a finite, ordered list of absolute paths.
/// Roots are visited in the given order; within a root, entries come in
/// sorted traversal order so the input list is reproducible.
pub fn collect_files(roots: &[PathBuf], options: &WalkOptions) -> ScanResult<Vec<PathBuf>> {
    let include = Pattern::new(&options.target)
        .map_err(|e| ScanError::config_error(format!("bad target glob '{}': {e}", options.target)))?;
    let exclude_dirs = parse_glob_list(options.exclude_dirs.as_deref())?;
    let exclude_files = parse_glob_list(options.exclude_files.as_deref())?;

    let mut files = Vec::new();
    for root in roots {
        let root = root
            .canonicalize()
            .map_err(|_| ScanError::missing_path(root))?;

        let mut builder = WalkBuilder::new(&root);
        builder
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b));
        if !options.recurse {
            builder.max_depth(Some(1));
        }
        if let Some(patterns) = exclude_dirs.clone() {
            builder.filter_entry(move |entry| {
                if entry.file_type().is_some_and(|t| t.is_dir()) {
                    let name = entry.file_name().to_string_lossy();
                    !patterns.iter().any(|p| p.matches(&name))
                } else {
                    true
                }
            });
        }

        for entry in builder.build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("walk error: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !include.matches(&name) {
                continue;
            }
            if let Some(patterns) = &exclude_files {
                if patterns.iter().any(|p| p.matches(&name)) {
                    continue;
                }
            }
            files.push(entry.into_path());
        }
    }

    debug!(count = files.len(), "collected files");
    Ok(files)
}
