//! Multi-stage character-encoding auto-detection.
//!
//! Stages, in order: empty file, BOM sniff, ASCII fast path, JIS escape
//! scan, then independent statistical scoring of SJIS, EUC-JP and UTF-8
//! evidence over a head/middle/tail sample of the file. Scores are
//! intentionally independent (the byte ranges overlap, so one file can
//! accumulate evidence in several categories); only a strict maximum wins,
//! anything else falls back to the registry default.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::trace;

use super::{default_key, EncodingKey};
use crate::errors::ScanResult;

/// Sample size read for the statistical stages.
pub const SAMPLE_BYTES: usize = 4 * 1024;

/// JIS escape sequences, longest first so overlapping prefixes resolve.
const JIS_ESCAPES: &[&[u8]] = &[
    &[0x1B, 0x26, 0x40, 0x1B, 0x24, 0x42], // ESC & @ ESC $ B
    &[0x1B, 0x24, 0x28, 0x44],             // ESC $ ( D
    &[0x1B, 0x24, 0x40],                   // ESC $ @
    &[0x1B, 0x24, 0x42],                   // ESC $ B
    &[0x1B, 0x28, 0x42],                   // ESC ( B
    &[0x1B, 0x28, 0x4A],                   // ESC ( J
    &[0x1B, 0x28, 0x49],                   // ESC ( I
];

/// Detects the encoding of `path` with the default sample size.
pub fn detect(path: &Path) -> ScanResult<EncodingKey> {
    detect_with_sample(path, SAMPLE_BYTES)
}

pub fn detect_with_sample(path: &Path, sample_bytes: usize) -> ScanResult<EncodingKey> {
    let mut file = File::open(path)?;
    let file_len = file.metadata()?.len() as usize;
    if file_len == 0 {
        return Ok(EncodingKey::Ascii);
    }

    let mut head = [0u8; 4];
    let head_read = read_up_to(&mut file, &mut head)?;
    if let Some(key) = sniff_bom(&head[..head_read]) {
        trace!(path = %path.display(), key = %key, "BOM detected");
        return Ok(key);
    }

    let sample = assemble_sample(&mut file, file_len, sample_bytes)?;
    Ok(detect_in_sample(&sample))
}

/// The buffer-level stages: ASCII, JIS escapes, statistical scoring.
pub fn detect_in_sample(sample: &[u8]) -> EncodingKey {
    if sample.iter().all(|&b| b < 0x80 && b != 0x1B) {
        return EncodingKey::Ascii;
    }
    if has_jis_escape(sample) {
        return EncodingKey::Jis;
    }

    let sjis = score_sjis(sample);
    let euc = score_euc(sample);
    let utf8 = score_utf8(sample);
    trace!(sjis, euc, utf8, "statistical scores");

    if sjis > euc && sjis > utf8 {
        EncodingKey::Sjis
    } else if euc > sjis && euc > utf8 {
        EncodingKey::Euc
    } else if utf8 > sjis && utf8 > euc {
        EncodingKey::Utf8n
    } else {
        default_key()
    }
}

/// BOM patterns in strict order; the UTF-32 LE mark shadows the UTF-16 LE
/// prefix, so the four-byte forms are tested first.
pub(crate) fn sniff_bom(head: &[u8]) -> Option<EncodingKey> {
    if head.starts_with(&[0xEF, 0xBB, 0xBF]) {
        Some(EncodingKey::Utf8Bom)
    } else if head.starts_with(&[0xFF, 0xFE, 0x00, 0x00]) {
        Some(EncodingKey::Utf32Le)
    } else if head.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) {
        Some(EncodingKey::Utf32Be)
    } else if head.starts_with(&[0xFF, 0xFE]) {
        Some(EncodingKey::Utf16Le)
    } else if head.starts_with(&[0xFE, 0xFF]) {
        Some(EncodingKey::Utf16Be)
    } else {
        None
    }
}

fn read_up_to(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn read_at(file: &mut File, pos: usize, len: usize) -> std::io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(pos as u64))?;
    let mut buf = vec![0u8; len];
    let filled = read_up_to(file, &mut buf)?;
    buf.truncate(filled);
    Ok(buf)
}

/// Assembles the statistical sample: up to `sample_bytes`, drawn in roughly
/// equal thirds from the head, middle and tail of the file. Small files are
/// read from the head only. The middle third joins only when the sample
/// exceeds 2 KiB, the tail third only when it exceeds 1 KiB.
fn assemble_sample(file: &mut File, file_len: usize, sample_bytes: usize) -> std::io::Result<Vec<u8>> {
    let sample = file_len.min(sample_bytes);
    if file_len <= sample_bytes {
        return read_at(file, 0, sample);
    }

    let take_middle = sample > 2 * 1024;
    let take_tail = sample > 1024;
    let third = sample / 3;
    let extra = usize::from(take_middle) + usize::from(take_tail);
    let head_len = sample - extra * third;

    let mut buf = read_at(file, 0, head_len)?;
    if take_middle {
        buf.extend(read_at(file, (file_len - third) / 2, third)?);
    }
    if take_tail {
        buf.extend(read_at(file, file_len - third, third)?);
    }
    Ok(buf)
}

fn has_jis_escape(buf: &[u8]) -> bool {
    buf.iter().enumerate().any(|(i, &b)| {
        b == 0x1B && JIS_ESCAPES.iter().any(|seq| buf[i..].starts_with(seq))
    })
}

/// SJIS evidence: lead `[81..9F] | [E0..FC]`, trail `[40..7E] | [80..FC]`.
fn score_sjis(buf: &[u8]) -> usize {
    let mut score = 0;
    let mut i = 0;
    while i + 1 < buf.len() {
        let lead = matches!(buf[i], 0x81..=0x9F | 0xE0..=0xFC);
        let trail = matches!(buf[i + 1], 0x40..=0x7E | 0x80..=0xFC);
        if lead && trail {
            score += 2;
            i += 2;
        } else {
            i += 1;
        }
    }
    score
}

/// EUC-JP evidence: `[A1..FE][A1..FE]`, half-width `8E [A1..DF]`, and the
/// three-byte `8F [A1..FE][A1..FE]` form.
fn score_euc(buf: &[u8]) -> usize {
    let in_a1_fe = |b: u8| matches!(b, 0xA1..=0xFE);
    let mut score = 0;
    let mut i = 0;
    while i < buf.len() {
        if buf[i] == 0x8F && i + 2 < buf.len() && in_a1_fe(buf[i + 1]) && in_a1_fe(buf[i + 2]) {
            score += 3;
            i += 3;
        } else if buf[i] == 0x8E && i + 1 < buf.len() && matches!(buf[i + 1], 0xA1..=0xDF) {
            score += 2;
            i += 2;
        } else if i + 1 < buf.len() && in_a1_fe(buf[i]) && in_a1_fe(buf[i + 1]) {
            score += 2;
            i += 2;
        } else {
            i += 1;
        }
    }
    score
}

/// UTF-8 evidence: two- and three-byte sequences with valid continuations.
fn score_utf8(buf: &[u8]) -> usize {
    let cont = |b: u8| matches!(b, 0x80..=0xBF);
    let mut score = 0;
    let mut i = 0;
    while i < buf.len() {
        if matches!(buf[i], 0xC0..=0xDF) && i + 1 < buf.len() && cont(buf[i + 1]) {
            score += 2;
            i += 2;
        } else if matches!(buf[i], 0xE0..=0xEF)
            && i + 2 < buf.len()
            && cont(buf[i + 1])
            && cont(buf[i + 2])
        {
            score += 3;
            i += 3;
        } else {
            i += 1;
        }
    }
    score
}
