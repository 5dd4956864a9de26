//! Character-encoding keys, the encoding registry, and decoding.
//!
//! The registry is a process-wide read-only table: one record per
//! [`EncodingKey`] carrying the Windows code-page number, whether the
//! encoding carries a byte-order mark, the display name used in match
//! records, and the default flag. Exactly one key is flagged as the
//! default; it is the fallback when auto-detection is inconclusive.

pub mod detector;
pub mod reader;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed enumeration of the encodings the scanner understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncodingKey {
    Ascii,
    Utf8n,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
    Sjis,
    Jis,
    Euc,
}

/// Registry record for one encoding key.
#[derive(Debug, Clone, Copy)]
pub struct EncodingInfo {
    pub key: EncodingKey,
    pub code_page: u32,
    pub has_bom: bool,
    pub display_name: &'static str,
    pub default: bool,
}

const REGISTRY: [EncodingInfo; 10] = [
    EncodingInfo {
        key: EncodingKey::Ascii,
        code_page: 20127,
        has_bom: false,
        display_name: "ASCII",
        default: false,
    },
    EncodingInfo {
        key: EncodingKey::Utf8n,
        code_page: 65001,
        has_bom: false,
        display_name: "UTF-8N",
        default: false,
    },
    EncodingInfo {
        key: EncodingKey::Utf8Bom,
        code_page: 65001,
        has_bom: true,
        display_name: "UTF-8",
        default: false,
    },
    EncodingInfo {
        key: EncodingKey::Utf16Le,
        code_page: 1200,
        has_bom: true,
        display_name: "UTF-16",
        default: false,
    },
    EncodingInfo {
        key: EncodingKey::Utf16Be,
        code_page: 1201,
        has_bom: true,
        display_name: "UTF-16B",
        default: false,
    },
    EncodingInfo {
        key: EncodingKey::Utf32Le,
        code_page: 12000,
        has_bom: true,
        display_name: "UTF-32",
        default: false,
    },
    EncodingInfo {
        key: EncodingKey::Utf32Be,
        code_page: 12001,
        has_bom: true,
        display_name: "UTF-32B",
        default: false,
    },
    EncodingInfo {
        key: EncodingKey::Sjis,
        code_page: 932,
        has_bom: false,
        display_name: "SJIS",
        default: true,
    },
    EncodingInfo {
        key: EncodingKey::Jis,
        code_page: 50220,
        has_bom: false,
        display_name: "JIS",
        default: false,
    },
    EncodingInfo {
        key: EncodingKey::Euc,
        code_page: 51932,
        has_bom: false,
        display_name: "EUC",
        default: false,
    },
];

/// Registry lookup.
pub fn info(key: EncodingKey) -> &'static EncodingInfo {
    REGISTRY
        .iter()
        .find(|e| e.key == key)
        .expect("registry covers every key")
}

/// The default-flagged key, used when detection is inconclusive.
pub fn default_key() -> EncodingKey {
    REGISTRY
        .iter()
        .find(|e| e.default)
        .expect("registry has a default entry")
        .key
}

impl fmt::Display for EncodingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(info(*self).display_name)
    }
}

impl FromStr for EncodingKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ascii" => Ok(EncodingKey::Ascii),
            "utf8" | "utf8n" | "utf-8" => Ok(EncodingKey::Utf8n),
            "utf8bom" => Ok(EncodingKey::Utf8Bom),
            "utf16" | "utf16le" | "utf-16" => Ok(EncodingKey::Utf16Le),
            "utf16be" => Ok(EncodingKey::Utf16Be),
            "utf32" | "utf32le" | "utf-32" => Ok(EncodingKey::Utf32Le),
            "utf32be" => Ok(EncodingKey::Utf32Be),
            "sjis" | "shiftjis" | "shift_jis" => Ok(EncodingKey::Sjis),
            "jis" | "iso-2022-jp" => Ok(EncodingKey::Jis),
            "euc" | "eucjp" | "euc-jp" => Ok(EncodingKey::Euc),
            other => Err(format!("unknown encoding '{other}'")),
        }
    }
}

/// Per-run codepage selection: heuristic detection per file or one fixed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodepageMode {
    Auto,
    Fixed(EncodingKey),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactly_one_default() {
        assert_eq!(REGISTRY.iter().filter(|e| e.default).count(), 1);
        assert_eq!(default_key(), EncodingKey::Sjis);
    }

    #[test]
    fn test_registry_covers_all_keys() {
        for key in [
            EncodingKey::Ascii,
            EncodingKey::Utf8n,
            EncodingKey::Utf8Bom,
            EncodingKey::Utf16Le,
            EncodingKey::Utf16Be,
            EncodingKey::Utf32Le,
            EncodingKey::Utf32Be,
            EncodingKey::Sjis,
            EncodingKey::Jis,
            EncodingKey::Euc,
        ] {
            assert_eq!(info(key).key, key);
        }
    }

    #[test]
    fn test_display_names() {
        assert_eq!(EncodingKey::Utf8Bom.to_string(), "UTF-8");
        assert_eq!(EncodingKey::Sjis.to_string(), "SJIS");
        assert_eq!(EncodingKey::Jis.to_string(), "JIS");
    }

    #[test]
    fn test_parse_key() {
        assert_eq!("sjis".parse::<EncodingKey>().unwrap(), EncodingKey::Sjis);
        assert_eq!("UTF8".parse::<EncodingKey>().unwrap(), EncodingKey::Utf8n);
        assert!("latin1".parse::<EncodingKey>().is_err());
    }

    #[test]
    fn test_code_pages() {
        assert_eq!(info(EncodingKey::Sjis).code_page, 932);
        assert_eq!(info(EncodingKey::Utf8Bom).code_page, 65001);
        assert!(info(EncodingKey::Utf8Bom).has_bom);
        assert!(!info(EncodingKey::Utf8n).has_bom);
    }
}
