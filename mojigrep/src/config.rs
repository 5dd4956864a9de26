use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::encoding::CodepageMode;
use crate::errors::{ScanError, ScanResult};
use crate::matcher::PatternMatcher;
use crate::signature::SignatureTable;

/// User-facing scan options.
///
/// Loadable from YAML configuration files and mergeable with CLI
/// arguments, CLI values taking precedence. Locations, in order of
/// precedence: a custom file passed explicitly, a local `.mojigrep.yaml`,
/// then the global `$CONFIG_DIR/mojigrep/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
    /// The search pattern (literal unless `use_regex`).
    #[serde(default)]
    pub pattern: String,

    /// Interpret the pattern as a regular expression.
    #[serde(default)]
    pub use_regex: bool,

    /// Case-insensitive matching.
    #[serde(default)]
    pub ignore_case: bool,

    /// Whole-word matching. Mutually exclusive with `use_regex` at the
    /// CLI boundary.
    #[serde(default)]
    pub word: bool,

    /// Skip files the signature table classifies as binary.
    #[serde(default)]
    pub text_only: bool,

    /// Encoding selection: absent or "auto" for per-file detection,
    /// otherwise a fixed encoding key name (e.g. "sjis", "utf8").
    #[serde(default)]
    pub codepage: Option<String>,

    /// Stop scanning each file after its first matching line.
    #[serde(default)]
    pub first_match_only: bool,

    /// Emit only the matched substring instead of the whole line.
    #[serde(default)]
    pub output_matched_part: bool,

    /// Worker count; defaults to the number of CPU cores.
    #[serde(default = "default_parallelism")]
    pub parallelism: NonZeroUsize,

    /// Suppress progress reporting.
    #[serde(default)]
    pub quiet: bool,

    /// Write the per-run debug log next to the result artifact.
    #[serde(default)]
    pub debug: bool,

    /// Optional JSON signature table replacing the built-in one.
    #[serde(default)]
    pub signatures_path: Option<PathBuf>,
}

fn default_parallelism() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            pattern: String::new(),
            use_regex: false,
            ignore_case: false,
            word: false,
            text_only: false,
            codepage: None,
            first_match_only: false,
            output_matched_part: false,
            parallelism: default_parallelism(),
            quiet: false,
            debug: false,
            signatures_path: None,
        }
    }
}

impl ScanOptions {
    /// Loads options from the default locations, lowest precedence first.
    pub fn load() -> ScanResult<Self> {
        Self::load_from(None)
    }

    pub fn load_from(config_path: Option<&Path>) -> ScanResult<Self> {
        let mut builder = ConfigBuilder::builder();

        let config_files = [
            dirs::config_dir().map(|p| p.join("mojigrep/config.yaml")),
            Some(PathBuf::from(".mojigrep.yaml")),
            config_path.map(PathBuf::from),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ScanError::config_error(e.to_string()))
    }

    /// Merges CLI arguments over these options; CLI values win.
    pub fn merge_with_cli(mut self, cli: ScanOptions) -> Self {
        if !cli.pattern.is_empty() {
            self.pattern = cli.pattern;
        }
        self.use_regex |= cli.use_regex;
        self.ignore_case |= cli.ignore_case;
        self.word |= cli.word;
        self.text_only |= cli.text_only;
        if cli.codepage.is_some() {
            self.codepage = cli.codepage;
        }
        self.first_match_only |= cli.first_match_only;
        self.output_matched_part |= cli.output_matched_part;
        if cli.parallelism != default_parallelism() {
            self.parallelism = cli.parallelism;
        }
        self.quiet |= cli.quiet;
        self.debug |= cli.debug;
        if cli.signatures_path.is_some() {
            self.signatures_path = cli.signatures_path;
        }
        self
    }

    /// Compiles the pattern, resolves the codepage, and loads the
    /// signature table, producing the immutable per-run configuration.
    pub fn into_config(self) -> ScanResult<ScanConfig> {
        if self.pattern.is_empty() {
            return Err(ScanError::config_error("search pattern must not be empty"));
        }
        let matcher =
            PatternMatcher::compile(&self.pattern, self.use_regex, self.ignore_case, self.word)?;
        let signatures = match &self.signatures_path {
            Some(path) => SignatureTable::from_json_file(path)?,
            None => SignatureTable::builtin(),
        };
        let codepage = match self.codepage.as_deref() {
            None => CodepageMode::Auto,
            Some(s) if s.eq_ignore_ascii_case("auto") => CodepageMode::Auto,
            Some(s) => CodepageMode::Fixed(
                s.parse()
                    .map_err(|e: String| ScanError::config_error(e))?,
            ),
        };
        Ok(ScanConfig {
            matcher,
            text_only: self.text_only,
            signatures: Arc::new(signatures),
            codepage,
            first_match_only: self.first_match_only,
            output_matched_part: self.output_matched_part,
            parallelism: self.parallelism,
            quiet: self.quiet,
            debug: self.debug,
            start_time: Instant::now(),
        })
    }
}

/// Immutable per-run configuration broadcast to every worker. Built once
/// at startup and shared read-only; workers never mutate it.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub matcher: PatternMatcher,
    pub text_only: bool,
    pub signatures: Arc<SignatureTable>,
    pub codepage: CodepageMode,
    pub first_match_only: bool,
    pub output_matched_part: bool,
    pub parallelism: NonZeroUsize,
    pub quiet: bool,
    pub debug: bool,
    /// Wall-clock origin for elapsed reporting.
    pub start_time: Instant,
}
