use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// One matched line, formatted for editor-style navigation.
///
/// Line and column are 1-based; the column is counted in decoded
/// characters. The payload is the whole line, or just the matched
/// substring when the run asks for the matched part only.
#[derive(Debug, Clone)]
pub struct MatchRecord {
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
    pub encoding: &'static str,
    pub payload: String,
}

impl fmt::Display for MatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({},{})  [{}]: {}",
            self.path.display(),
            self.line,
            self.column,
            self.encoding,
            self.payload
        )
    }
}

/// Header block written at the top of the result artifact: the pattern,
/// target glob, roots, exclusions, and one annotation line per active flag.
#[derive(Debug, Clone, Default)]
pub struct ReportHeader {
    pub pattern: String,
    pub search_target: String,
    pub roots: Vec<PathBuf>,
    pub exclude_dirs: Option<String>,
    pub exclude_files: Option<String>,
    pub annotations: Vec<String>,
}

impl ReportHeader {
    pub fn render_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        lines.push(format!(
            "Search \"{}\" in {}",
            self.pattern, self.search_target
        ));
        for root in &self.roots {
            lines.push(format!("Root: {}", root.display()));
        }
        if let Some(dirs) = &self.exclude_dirs {
            lines.push(format!("Exclude dirs: {dirs}"));
        }
        if let Some(files) = &self.exclude_files {
            lines.push(format!("Exclude files: {files}"));
        }
        lines.extend(self.annotations.iter().cloned());
        lines
    }
}

/// Totals returned by the orchestrator once the run completes.
#[derive(Debug, Clone, Copy)]
pub struct ScanSummary {
    pub total_matches: usize,
    pub files_scanned: usize,
    pub elapsed: Duration,
}

impl ScanSummary {
    /// The result-file trailer line.
    pub fn trailer(&self) -> String {
        format!(
            "{} items matched. - Elapsed: {}",
            self.total_matches,
            format_elapsed(self.elapsed)
        )
    }
}

/// `HH:MM:SS`, hours unbounded.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
