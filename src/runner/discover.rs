//! Test file discovery from include/exclude glob patterns.

use std::collections::BTreeSet;
use std::path::Path;

use glob::{MatchOptions, Pattern};
use tracing::{debug, warn};

use super::RunnerError;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Files matching `pattern` that are not excluded by `exclude_pattern`.
///
/// Both patterns accept `**` and `{a,b}` alternatives. The exclude pattern
/// is checked against the file itself and every ancestor directory, so
/// `spec/system` excludes everything beneath that directory. The result is
/// sorted and free of duplicates.
pub fn discover_test_files(
    pattern: &str,
    exclude_pattern: Option<&str>,
) -> Result<Vec<String>, RunnerError> {
    let excludes = match exclude_pattern.filter(|p| !p.trim().is_empty()) {
        Some(exclude) => expand_braces(exclude)
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|err| RunnerError::InvalidPattern {
                    pattern: exclude.to_string(),
                    reason: err.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    let mut files = BTreeSet::new();
    for expanded in expand_braces(pattern) {
        let entries =
            glob::glob_with(&expanded, MATCH_OPTIONS).map_err(|err| RunnerError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: err.to_string(),
            })?;

        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(err) => {
                    warn!(error = %err, "Error walking test directory");
                    continue;
                }
            };

            if !path.is_file() || is_excluded(&path, &excludes) {
                continue;
            }
            files.insert(path.to_string_lossy().into_owned());
        }
    }

    debug!(pattern, ?exclude_pattern, count = files.len(), "Discovered test files");
    Ok(files.into_iter().collect())
}

fn is_excluded(path: &Path, excludes: &[Pattern]) -> bool {
    path.ancestors()
        .filter(|ancestor| !ancestor.as_os_str().is_empty())
        .any(|ancestor| {
            excludes
                .iter()
                .any(|exclude| exclude.matches_path_with(ancestor, MATCH_OPTIONS))
        })
}

/// Expand shell-style `{a,b}` alternatives, which `glob` does not support.
///
/// Groups may nest. An unbalanced `{` is left untouched.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };

    let mut depth = 0usize;
    let mut close = None;
    let mut commas = Vec::new();
    for (offset, c) in pattern[open..].char_indices() {
        let idx = open + offset;
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(idx);
                    break;
                }
            }
            ',' if depth == 1 => commas.push(idx),
            _ => {}
        }
    }

    let Some(close) = close else {
        return vec![pattern.to_string()];
    };

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    let mut start = open + 1;
    let mut expanded = Vec::new();
    for end in commas.into_iter().chain(std::iter::once(close)) {
        let alternative = &pattern[start..end];
        expanded.extend(expand_braces(&format!("{prefix}{alternative}{suffix}")));
        start = end + 1;
    }
    expanded
}
