use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mojigrep::{
    config::ScanOptions,
    errors::ScanError,
    results::ReportHeader,
    run_scan,
    sink::{DebugSink, OutputSink},
    walker::{collect_files, WalkOptions},
};
use std::num::NonZeroUsize;
use std::path::PathBuf;

type Result<T> = std::result::Result<T, ScanError>;

#[derive(Parser)]
#[command(author, version, about = "Japanese-encoding-aware parallel grep", long_about = None)]
struct Cli {
    /// Pattern to search for
    pattern: String,

    /// Root directories to search
    #[arg(default_value = ".")]
    roots: Vec<PathBuf>,

    /// File name glob to search (e.g. "*.txt")
    #[arg(short = 't', long = "target", default_value = "*")]
    target: String,

    /// Recurse into subdirectories
    #[arg(short = 'r', long)]
    recurse: bool,

    /// Treat the pattern as a regular expression
    #[arg(short = 'e', long = "regex", conflicts_with = "word")]
    use_regex: bool,

    /// Case-insensitive matching
    #[arg(short = 'i', long = "ignore-case")]
    ignore_case: bool,

    /// Match whole words only
    #[arg(short = 'w', long)]
    word: bool,

    /// Skip files whose magic number marks them as binary
    #[arg(long = "text-only")]
    text_only: bool,

    /// Encoding: "auto" or a fixed key (ascii|utf8|utf8bom|utf16|utf16be|utf32le|utf32be|sjis|jis|euc)
    #[arg(short = 'c', long, default_value = "auto")]
    codepage: String,

    /// Stop after the first matching line of each file
    #[arg(short = '1', long = "first-match")]
    first_match_only: bool,

    /// Output only the matched part instead of the whole line
    #[arg(short = 'm', long = "matched-part")]
    output_matched_part: bool,

    /// Worker count (default: CPU cores)
    #[arg(short = 'j', long = "threads")]
    threads: Option<NonZeroUsize>,

    /// Result file path
    #[arg(short = 'o', long = "output", default_value = "grep_result.txt")]
    output: PathBuf,

    /// Directories to skip, ";"-separated globs matched per path segment
    #[arg(long = "exclude-dirs")]
    exclude_dirs: Option<String>,

    /// File names to skip, ";"-separated globs
    #[arg(long = "exclude-files")]
    exclude_files: Option<String>,

    /// JSON signature table replacing the built-in one
    #[arg(long = "signatures")]
    signatures: Option<PathBuf>,

    /// Suppress progress output
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Write a debug log next to the result file
    #[arg(short = 'd', long)]
    debug: bool,

    /// Path to a custom config file
    #[arg(long = "config")]
    config: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let file_options = ScanOptions::load_from(cli.config.as_deref())?;
    let cli_options = ScanOptions {
        pattern: cli.pattern.clone(),
        use_regex: cli.use_regex,
        ignore_case: cli.ignore_case,
        word: cli.word,
        text_only: cli.text_only,
        // "auto" is the clap default; only an explicit key overrides the
        // config file.
        codepage: if cli.codepage.eq_ignore_ascii_case("auto") {
            None
        } else {
            Some(cli.codepage.clone())
        },
        first_match_only: cli.first_match_only,
        output_matched_part: cli.output_matched_part,
        quiet: cli.quiet,
        debug: cli.debug,
        signatures_path: cli.signatures.clone(),
        ..Default::default()
    };
    let mut options = file_options.merge_with_cli(cli_options);
    if let Some(threads) = cli.threads {
        options.parallelism = threads;
    }
    let quiet = options.quiet;
    let config = options.into_config()?;

    let walk = WalkOptions {
        target: cli.target.clone(),
        recurse: cli.recurse,
        exclude_dirs: cli.exclude_dirs.clone(),
        exclude_files: cli.exclude_files.clone(),
    };
    let files = collect_files(&cli.roots, &walk)?;

    let header = build_header(&cli, &config);
    let sink = OutputSink::create(&cli.output)?;
    let mut debug_sink = if config.debug {
        Some(DebugSink::create(&cli.output.with_extension("log"))?)
    } else {
        None
    };
    if let Some(debug_sink) = &debug_sink {
        debug_sink.log(&format!("scanning {} files", files.len()))?;
    }

    let bar = if quiet {
        None
    } else {
        let bar = ProgressBar::new(files.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{bar:40} {percent}% ({pos}/{len}) {elapsed_precise}")
                .map_err(|e| ScanError::config_error(e.to_string()))?,
        );
        Some(bar)
    };
    let progress = bar.clone().map(|bar| {
        move |completed: usize, _total: usize, _elapsed: std::time::Duration| {
            bar.set_position(completed as u64);
        }
    });

    let summary = run_scan(
        &files,
        &config,
        &header,
        &sink,
        debug_sink.as_ref(),
        progress
            .as_ref()
            .map(|p| p as &(dyn Fn(usize, usize, std::time::Duration) + Sync)),
    )?;

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    let mut sink = sink;
    sink.close()?;
    if let Some(debug_sink) = &mut debug_sink {
        debug_sink.close()?;
    }

    if !quiet {
        println!("{}", summary.trailer());
        println!("Results written to {}", cli.output.display());
    }
    Ok(())
}

fn build_header(cli: &Cli, config: &mojigrep::ScanConfig) -> ReportHeader {
    let mut annotations = Vec::new();
    if cli.recurse {
        annotations.push("Recurse: on".to_string());
    }
    if config.text_only {
        annotations.push("Text only: on".to_string());
    }
    if cli.word {
        annotations.push("Word match: on".to_string());
    }
    annotations.push(format!(
        "Case: {}",
        if cli.ignore_case {
            "insensitive"
        } else {
            "sensitive"
        }
    ));
    if cli.use_regex {
        annotations.push(format!(
            "Regex: rust-regex (mojigrep {})",
            env!("CARGO_PKG_VERSION")
        ));
    }
    annotations.push(format!("Codepage: {}", cli.codepage));
    if config.output_matched_part {
        annotations.push("Output: matched part".to_string());
    }
    if config.first_match_only {
        annotations.push("First match only: on".to_string());
    }

    ReportHeader {
        pattern: cli.pattern.clone(),
        search_target: cli.target.clone(),
        roots: cli.roots.clone(),
        exclude_dirs: cli.exclude_dirs.clone(),
        exclude_files: cli.exclude_files.clone(),
        annotations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_regex_and_word_are_mutually_exclusive() {
        assert!(Cli::try_parse_from(["mojigrep", "-e", "-w", "pat", "."]).is_err());
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["mojigrep", "pat"]).unwrap();
        assert_eq!(cli.pattern, "pat");
        assert_eq!(cli.roots, vec![PathBuf::from(".")]);
        assert_eq!(cli.codepage, "auto");
        assert_eq!(cli.output, PathBuf::from("grep_result.txt"));
        assert!(!cli.recurse);
        assert!(!cli.debug);
    }

    #[test]
    fn test_header_annotations_reflect_flags() {
        let cli = Cli::try_parse_from([
            "mojigrep", "-r", "-1", "--text-only", "-c", "sjis", "TODO", "src",
        ])
        .unwrap();
        let config = mojigrep::config::ScanOptions {
            pattern: cli.pattern.clone(),
            text_only: cli.text_only,
            codepage: Some(cli.codepage.clone()),
            first_match_only: cli.first_match_only,
            ..Default::default()
        }
        .into_config()
        .unwrap();
        let header = build_header(&cli, &config);
        assert!(header.annotations.contains(&"Recurse: on".to_string()));
        assert!(header.annotations.contains(&"Text only: on".to_string()));
        assert!(header.annotations.contains(&"Codepage: sjis".to_string()));
        assert!(header
            .annotations
            .contains(&"First match only: on".to_string()));
        assert!(!header.annotations.iter().any(|a| a.starts_with("Regex:")));
    }
}
