//! Magic-number signature table and the binary classifier built on it.
//!
//! A signature is an ordered byte pattern compared against the head of a
//! file at a fixed offset. Pattern positions may be wildcards, which match
//! any byte. Bytes past the end of a short file compare as zero, so a
//! signature whose concrete bytes land beyond EOF cannot match unless those
//! bytes are zero.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::trace;

use crate::errors::{ScanError, ScanResult};

/// Sentinel pattern element that matches any byte value.
pub const WILDCARD: u16 = 0x100;

/// Default signatures compiled into the library, `(name, hex, offset)`.
/// The hex grammar is the same as the JSON import format: space-separated
/// two-character tokens, `??` for a wildcard.
const BUILTIN_SIGNATURES: &[(&str, &str, usize)] = &[
    ("7Z", "37 7A BC AF 27 1C", 0),
    ("BMP", "42 4D", 0),
    ("CAB", "4D 53 43 46", 0),
    ("CLASS", "CA FE BA BE", 0),
    ("ELF", "7F 45 4C 46", 0),
    ("EXE", "4D 5A", 0),
    ("GIF", "47 49 46 38 ?? 61", 0),
    ("GZ", "1F 8B", 0),
    ("JPG", "FF D8 FF", 0),
    ("LZH", "2D 6C 68 ?? 2D", 2),
    ("OLE2", "D0 CF 11 E0 A1 B1 1A E1", 0),
    ("PDF", "25 50 44 46 2D", 0),
    ("PNG", "89 50 4E 47 0D 0A 1A 0A", 0),
    ("RAR", "52 61 72 21 1A 07", 0),
    ("SQLITE", "53 51 4C 69 74 65 20 66 6F 72 6D 61 74 20 33 00", 0),
    ("TAR", "75 73 74 61 72", 257),
    ("WASM", "00 61 73 6D", 0),
    ("ZIP", "50 4B 03 04", 0),
];

/// One entry of the signature table.
#[derive(Debug, Clone)]
pub struct Signature {
    pub name: String,
    /// Pattern elements: a byte value `0..=255` or [`WILDCARD`].
    pub pattern: Vec<u16>,
    /// File position where `pattern[0]` is compared.
    pub offset: usize,
}

impl Signature {
    /// Parses the `Hex` grammar: space-separated `00..FF` or `??` tokens.
    pub fn parse(name: &str, hex: &str, offset: usize) -> ScanResult<Self> {
        let mut pattern = Vec::new();
        for token in hex.split_whitespace() {
            if token == "??" {
                pattern.push(WILDCARD);
                continue;
            }
            if token.len() != 2 {
                return Err(ScanError::invalid_signature(
                    name,
                    format!("bad hex token '{token}'"),
                ));
            }
            match u8::from_str_radix(token, 16) {
                Ok(byte) => pattern.push(byte as u16),
                Err(_) => {
                    return Err(ScanError::invalid_signature(
                        name,
                        format!("bad hex token '{token}'"),
                    ))
                }
            }
        }
        if pattern.is_empty() {
            return Err(ScanError::invalid_signature(name, "empty pattern"));
        }
        Ok(Signature {
            name: name.to_string(),
            pattern,
            offset,
        })
    }

    /// Tests this signature against a file prefix. Bytes past `buf.len()`
    /// compare as zero; wildcards match anything, including virtual zeros.
    fn matches(&self, buf: &[u8]) -> bool {
        self.pattern.iter().enumerate().all(|(i, &p)| {
            if p == WILDCARD {
                return true;
            }
            u16::from(buf.get(self.offset + i).copied().unwrap_or(0)) == p
        })
    }
}

/// JSON import format: a mapping from signature name to this record.
#[derive(Debug, Deserialize)]
struct SignatureSpec {
    #[serde(rename = "Hex")]
    hex: String,
    #[serde(rename = "Offset", default)]
    offset: usize,
}

/// Immutable signature table, shared read-only across scan workers.
///
/// Keyed by name (names are unique); `max_prefix` is the number of bytes
/// the classifier needs from the head of a file and is recomputed on
/// construction.
#[derive(Debug, Clone)]
pub struct SignatureTable {
    signatures: BTreeMap<String, Signature>,
    max_prefix: usize,
}

impl SignatureTable {
    pub fn new(entries: Vec<Signature>) -> ScanResult<Self> {
        let mut signatures = BTreeMap::new();
        for sig in entries {
            let name = sig.name.clone();
            if signatures.insert(name.clone(), sig).is_some() {
                return Err(ScanError::invalid_signature(name, "duplicate name"));
            }
        }
        let max_prefix = signatures
            .values()
            .map(|s| s.offset + s.pattern.len())
            .max()
            .unwrap_or(0);
        Ok(SignatureTable {
            signatures,
            max_prefix,
        })
    }

    /// The table compiled into the library.
    pub fn builtin() -> Self {
        let entries = BUILTIN_SIGNATURES
            .iter()
            .map(|&(name, hex, offset)| {
                Signature::parse(name, hex, offset).expect("builtin signature table is well-formed")
            })
            .collect();
        Self::new(entries).expect("builtin signature names are unique")
    }

    /// Loads a table from the JSON import format: an object keyed by
    /// signature name with `{"Hex": "...", "Offset": n}` values.
    pub fn from_json_str(json: &str) -> ScanResult<Self> {
        let specs: BTreeMap<String, SignatureSpec> = serde_json::from_str(json)?;
        let mut entries = Vec::with_capacity(specs.len());
        for (name, spec) in specs {
            entries.push(Signature::parse(&name, &spec.hex, spec.offset)?);
        }
        Self::new(entries)
    }

    pub fn from_json_file(path: &Path) -> ScanResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Signature> {
        self.signatures.get(name)
    }

    /// Bytes of file prefix the classifier reads.
    pub fn max_prefix(&self) -> usize {
        self.max_prefix
    }

    /// Reads up to `max_prefix` bytes of `path` and returns the name of the
    /// first matching signature, or `None` for files matching nothing.
    /// Iteration order is name order; callers only rely on the boolean
    /// "is binary" outcome. I/O failures propagate as classification errors.
    pub fn classify(&self, path: &Path) -> ScanResult<Option<&str>> {
        let mut file = File::open(path)?;
        let mut buf = vec![0u8; self.max_prefix];
        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        let prefix = &buf[..filled];
        for sig in self.signatures.values() {
            if sig.matches(prefix) {
                trace!(path = %path.display(), signature = %sig.name, "classified as binary");
                return Ok(Some(sig.name.as_str()));
            }
        }
        Ok(None)
    }
}
