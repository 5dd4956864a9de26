//! Japanese-encoding-aware parallel text search.
//!
//! The scan pipeline per file: magic-number binary classification,
//! multi-stage encoding detection (BOM, JIS escapes, statistical
//! SJIS/EUC/UTF-8 scoring), tolerant decoding, then line-oriented regex
//! matching. An orchestrator fans files out over a bounded worker pool in
//! batches and merges per-job results back in input order.

pub mod config;
pub mod encoding;
pub mod engine;
pub mod errors;
pub mod matcher;
pub mod results;
pub mod scanner;
pub mod signature;
pub mod sink;
pub mod walker;

// Re-export commonly used types
pub use config::{ScanConfig, ScanOptions};
pub use encoding::{CodepageMode, EncodingKey};
pub use engine::run_scan;
pub use errors::{ScanError, ScanResult};
pub use matcher::PatternMatcher;
pub use results::{MatchRecord, ReportHeader, ScanSummary};
pub use signature::SignatureTable;
pub use sink::{DebugSink, OutputSink};
