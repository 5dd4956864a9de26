//! Byte-stream decoding and line splitting.
//!
//! Decoding is malformed-tolerant: invalid sequences become U+FFFD and
//! never abort iteration. Decoders do not strip byte-order marks; a BOM
//! survives as U+FEFF at the head of the first line, matching the
//! registry's BOM-emission flag, so column numbers count it.

use encoding_rs::{EUC_JP, ISO_2022_JP, SHIFT_JIS, UTF_16BE, UTF_16LE, UTF_8};

use super::EncodingKey;

/// Decodes a whole byte buffer into text for the given key.
pub fn decode_bytes(bytes: &[u8], key: EncodingKey) -> String {
    match key {
        EncodingKey::Ascii | EncodingKey::Utf8n | EncodingKey::Utf8Bom => {
            UTF_8.decode_without_bom_handling(bytes).0.into_owned()
        }
        EncodingKey::Sjis => SHIFT_JIS.decode_without_bom_handling(bytes).0.into_owned(),
        EncodingKey::Jis => ISO_2022_JP.decode_without_bom_handling(bytes).0.into_owned(),
        EncodingKey::Euc => EUC_JP.decode_without_bom_handling(bytes).0.into_owned(),
        EncodingKey::Utf16Le => UTF_16LE.decode_without_bom_handling(bytes).0.into_owned(),
        EncodingKey::Utf16Be => UTF_16BE.decode_without_bom_handling(bytes).0.into_owned(),
        EncodingKey::Utf32Le => decode_utf32(bytes, true),
        EncodingKey::Utf32Be => decode_utf32(bytes, false),
    }
}

/// UTF-32 is not covered by encoding_rs; decode code units directly.
fn decode_utf32(bytes: &[u8], little_endian: bool) -> String {
    let mut out = String::with_capacity(bytes.len() / 4);
    let mut chunks = bytes.chunks_exact(4);
    for chunk in &mut chunks {
        let unit = if little_endian {
            u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
        } else {
            u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
        };
        out.push(char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER));
    }
    if !chunks.remainder().is_empty() {
        out.push(char::REPLACEMENT_CHARACTER);
    }
    out
}

/// Iterator over lines delimited by CR, LF, or CRLF, terminator stripped.
/// Unlike `str::lines`, a lone CR also ends a line.
pub struct Lines<'a> {
    rest: Option<&'a str>,
}

pub fn split_lines(text: &str) -> Lines<'_> {
    Lines {
        rest: if text.is_empty() { None } else { Some(text) },
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let rest = self.rest?;
        match rest.find(['\r', '\n']) {
            None => {
                self.rest = None;
                Some(rest)
            }
            Some(i) => {
                let line = &rest[..i];
                let after = if rest[i..].starts_with("\r\n") {
                    &rest[i + 2..]
                } else {
                    &rest[i + 1..]
                };
                self.rest = if after.is_empty() { None } else { Some(after) };
                Some(line)
            }
        }
    }
}
