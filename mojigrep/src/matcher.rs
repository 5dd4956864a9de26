use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;

use crate::errors::{ScanError, ScanResult};

static PATTERN_CACHE: Lazy<DashMap<PatternSpec, Arc<Regex>>> = Lazy::new(DashMap::new);

/// Cache key: the user pattern plus every flag that affects compilation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternSpec {
    pub pattern: String,
    pub use_regex: bool,
    pub ignore_case: bool,
    pub word: bool,
}

/// A compiled search pattern, cheap to clone across workers.
///
/// With `use_regex` off the pattern is escaped so every metacharacter is
/// literal. `word` wraps the pattern in `\b` anchors; the configuration
/// boundary keeps `use_regex` and `word` mutually exclusive, the compiler
/// itself accepts any combination.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    spec: PatternSpec,
    regex: Arc<Regex>,
}

impl PatternMatcher {
    pub fn compile(
        pattern: &str,
        use_regex: bool,
        ignore_case: bool,
        word: bool,
    ) -> ScanResult<Self> {
        let spec = PatternSpec {
            pattern: pattern.to_string(),
            use_regex,
            ignore_case,
            word,
        };
        if let Some(entry) = PATTERN_CACHE.get(&spec) {
            let regex = entry.clone();
            return Ok(PatternMatcher { spec, regex });
        }

        let body = if use_regex {
            pattern.to_string()
        } else {
            regex::escape(pattern)
        };
        let wrapped = if word {
            format!(r"\b{body}\b")
        } else {
            body
        };
        let regex = RegexBuilder::new(&wrapped)
            .case_insensitive(ignore_case)
            .build()
            .map_err(|e| ScanError::invalid_pattern(pattern, e))?;
        let regex = Arc::new(regex);
        PATTERN_CACHE.insert(spec.clone(), Arc::clone(&regex));
        Ok(PatternMatcher { spec, regex })
    }

    /// First match in the line as a half-open byte range.
    pub fn find(&self, line: &str) -> Option<(usize, usize)> {
        self.regex.find(line).map(|m| (m.start(), m.end()))
    }

    pub fn pattern(&self) -> &str {
        &self.spec.pattern
    }

    pub fn is_regex(&self) -> bool {
        self.spec.use_regex
    }
}
