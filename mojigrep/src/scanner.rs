use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::trace;

use crate::config::ScanConfig;
use crate::encoding::{self, detector, reader, CodepageMode};
use crate::errors::{ScanError, ScanResult};
use crate::results::MatchRecord;
use crate::sink::JobLog;

/// Scans one file against the immutable run configuration.
///
/// The per-file pipeline: existence check, optional binary filter,
/// encoding resolution, then a line-oriented match loop. Records are
/// written to the job's private output writer; anything unexpected goes to
/// the job log and ends this file's scan without failing the run.
pub struct FileScanner<'a> {
    config: &'a ScanConfig,
}

impl<'a> FileScanner<'a> {
    pub fn new(config: &'a ScanConfig) -> Self {
        FileScanner { config }
    }

    /// Returns the number of records written. Never fails: per-file errors
    /// are logged and yield zero further records.
    pub fn scan(&self, path: &Path, out: &mut dyn Write, log: &mut JobLog) -> usize {
        match self.scan_inner(path, out, log) {
            Ok(count) => count,
            Err(e) => {
                log.entry(&format!("{}: scan failed: {e}", path.display()));
                0
            }
        }
    }

    fn scan_inner(&self, path: &Path, out: &mut dyn Write, log: &mut JobLog) -> ScanResult<usize> {
        if !path.exists() {
            log.entry(&format!("{}: not found, skipped", path.display()));
            return Ok(0);
        }

        if self.config.text_only {
            match self.config.signatures.classify(path) {
                Ok(Some(name)) => {
                    log.entry(&format!("{}: binary ({name}), skipped", path.display()));
                    return Ok(0);
                }
                Ok(None) => {}
                // Unclassifiable files are treated as text.
                Err(e) => {
                    log.entry(&format!(
                        "{}: classification failed ({e}), treating as text",
                        path.display()
                    ));
                }
            }
        }

        let key = match self.config.codepage {
            CodepageMode::Auto => detector::detect(path)?,
            CodepageMode::Fixed(key) => key,
        };
        let encoding_name = encoding::info(key).display_name;
        trace!(path = %path.display(), encoding = encoding_name, "scanning");

        // The file can vanish between the existence check and the read.
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ScanError::file_not_found(path),
            _ => ScanError::IoError(e),
        })?;
        let text = reader::decode_bytes(&bytes, key);

        let mut count = 0;
        for (index, line) in reader::split_lines(&text).enumerate() {
            let Some((start, end)) = self.config.matcher.find(line) else {
                continue;
            };
            let column = line[..start].chars().count() + 1;
            let payload = if self.config.output_matched_part {
                line[start..end].to_string()
            } else {
                line.to_string()
            };
            let record = MatchRecord {
                path: path.to_path_buf(),
                line: index + 1,
                column,
                encoding: encoding_name,
                payload,
            };
            writeln!(out, "{record}")?;
            count += 1;
            if self.config.first_match_only {
                break;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanOptions;
    use tempfile::tempdir;

    fn test_config(pattern: &str) -> ScanConfig {
        ScanOptions {
            pattern: pattern.to_string(),
            ..Default::default()
        }
        .into_config()
        .unwrap()
    }

    fn scan_file(config: &ScanConfig, path: &Path) -> (Vec<String>, usize) {
        let dir = tempdir().unwrap();
        let mut log = JobLog::create(&dir.path().join("job.log"), None).unwrap();
        let mut out = Vec::new();
        let scanner = FileScanner::new(config);
        let count = scanner.scan(path, &mut out, &mut log);
        let lines = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        (lines, count)
    }

    fn write_file(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn test_plain_ascii_match() {
        let dir = tempdir().unwrap();
        let path = write_file(&dir, "a.txt", b"hello\nworld\n");
        let config = test_config("world");
        let (lines, count) = scan_file(&config, &path);
        assert_eq!(count, 1);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("(2,1)  [ASCII]: world"));
    }

    #[test]
    fn test_utf8_bom_column_counts_bom_character() {
        let dir = tempdir().unwrap();
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("あいうerror\n".as_bytes());
        let path = write_file(&dir, "b.txt", &bytes);
        let config = test_config("error");
        let (lines, count) = scan_file(&config, &path);
        assert_eq!(count, 1);
        // BOM + three kana precede the match: character column 5.
        assert!(lines[0].contains("(1,5)  [UTF-8]:"), "got {}", lines[0]);
    }

    #[test]
    fn test_missing_file_is_clean_skip() {
        let config = test_config("x");
        let (lines, count) = scan_file(&config, Path::new("/no/such/file.txt"));
        assert_eq!(count, 0);
        assert!(lines.is_empty());
    }

    #[test]
    fn test_text_only_skips_binary() {
        let dir = tempdir().unwrap();
        let path = write_file(&dir, "c.zip", b"PK\x03\x04PK PK PK\n");
        let mut options = ScanOptions {
            pattern: "PK".to_string(),
            text_only: true,
            ..Default::default()
        };
        let config = options.clone().into_config().unwrap();
        let (_, count) = scan_file(&config, &path);
        assert_eq!(count, 0);

        // Without text-only the same file produces records.
        options.text_only = false;
        let config = options.into_config().unwrap();
        let (_, count) = scan_file(&config, &path);
        assert!(count >= 1);
    }

    #[test]
    fn test_first_match_only_stops_at_first_line() {
        let dir = tempdir().unwrap();
        let path = write_file(&dir, "f.log", b"ERROR one\nok\nERROR two\nERROR three\n");
        let mut options = ScanOptions {
            pattern: "ERROR".to_string(),
            first_match_only: true,
            ..Default::default()
        };
        let config = options.clone().into_config().unwrap();
        let (lines, count) = scan_file(&config, &path);
        assert_eq!(count, 1);
        assert!(lines[0].contains("(1,1)"));

        options.first_match_only = false;
        let config = options.into_config().unwrap();
        let (_, count) = scan_file(&config, &path);
        assert_eq!(count, 3);
    }

    #[test]
    fn test_matched_part_payload() {
        let dir = tempdir().unwrap();
        let path = write_file(&dir, "g.txt", b"prefix NEEDLE suffix\n");
        let config = ScanOptions {
            pattern: "NEEDLE".to_string(),
            output_matched_part: true,
            ..Default::default()
        }
        .into_config()
        .unwrap();
        let (lines, _) = scan_file(&config, &path);
        assert!(lines[0].ends_with("]: NEEDLE"));
    }

    #[test]
    fn test_fixed_codepage_skips_detection() {
        let dir = tempdir().unwrap();
        // SJIS bytes that would auto-detect as SJIS anyway; force EUC and
        // confirm the display name follows the fixed key.
        let path = write_file(&dir, "h.txt", b"plain ascii with NEEDLE\n");
        let config = ScanOptions {
            pattern: "NEEDLE".to_string(),
            codepage: Some("euc".to_string()),
            ..Default::default()
        }
        .into_config()
        .unwrap();
        let (lines, _) = scan_file(&config, &path);
        assert!(lines[0].contains("[EUC]:"));
    }

    #[test]
    fn test_sjis_auto_detected_match() {
        let dir = tempdir().unwrap();
        // "エラー発生 ERROR" in Shift_JIS.
        let mut bytes = vec![
            0x83, 0x47, 0x83, 0x89, 0x81, 0x5B, 0x94, 0xAD, 0x90, 0xB6, 0x20,
        ];
        bytes.extend_from_slice(b"ERROR\n");
        let path = write_file(&dir, "i.txt", &bytes);
        let config = test_config("ERROR");
        let (lines, count) = scan_file(&config, &path);
        assert_eq!(count, 1);
        assert!(lines[0].contains("[SJIS]:"), "got {}", lines[0]);
        // Five kanji/kana and a space precede the match.
        assert!(lines[0].contains("(1,7)"), "got {}", lines[0]);
    }

    #[test]
    fn test_jis_auto_detected_match() {
        let dir = tempdir().unwrap();
        // ESC $ B, JIS body, ESC ( B, then the ASCII pattern.
        let path = write_file(&dir, "e.txt", b"\x1b$B$3$s$K$A$O\x1b(B TODO\n");
        let config = test_config("TODO");
        let (lines, count) = scan_file(&config, &path);
        assert_eq!(count, 1);
        assert!(lines[0].contains("[JIS]:"), "got {}", lines[0]);
    }
}
