//! Represents a stored blob as shown to clients of the gateway.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Content type reported when the store has none on record, or when the
/// metadata fetch for a blob failed.
pub const UNKNOWN_CONTENT_TYPE: &str = "Unknown";

/// Display size used when the byte count is not known.
pub const UNKNOWN_SIZE: &str = "—";

/// Display date used when the modification time is not known.
pub const UNKNOWN_DATE: &str = "Unknown";

/// Metadata returned by a `Head` call against the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHead {
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub last_modified: DateTime<Utc>,
}

/// A single entry of the listing returned by `GET /`.
///
/// `display_size` and `display_date` are derived from `size_bytes` and
/// `last_modified` in [`BlobRecord::new`]. Build records through `new`,
/// `from_head` or `unenriched` so the two views agree.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlobRecord {
    /// Object key, unique within the bucket.
    pub key: String,

    /// Size in bytes, `None` when metadata could not be fetched.
    pub size_bytes: Option<u64>,

    /// MIME type, or [`UNKNOWN_CONTENT_TYPE`].
    pub content_type: String,

    /// Last modification time as reported by the store.
    pub last_modified: Option<DateTime<Utc>>,

    /// Human-readable size (`"512 B"`, `"2.0 KB"`, `"3.4 MB"`).
    pub display_size: String,

    /// `M/D/YYYY` date of the last modification.
    pub display_date: String,
}

impl BlobRecord {
    pub fn new(
        key: String,
        size_bytes: Option<u64>,
        content_type: Option<String>,
        last_modified: Option<DateTime<Utc>>,
    ) -> Self {
        let display_size = size_bytes
            .map(display_size)
            .unwrap_or_else(|| UNKNOWN_SIZE.to_string());
        let display_date = last_modified
            .as_ref()
            .map(display_date)
            .unwrap_or_else(|| UNKNOWN_DATE.to_string());

        Self {
            key,
            size_bytes,
            content_type: content_type
                .filter(|ct| !ct.is_empty())
                .unwrap_or_else(|| UNKNOWN_CONTENT_TYPE.to_string()),
            last_modified,
            display_size,
            display_date,
        }
    }

    /// Record built from a successful `Head` call.
    pub fn from_head(key: String, head: ObjectHead) -> Self {
        Self::new(
            key,
            Some(head.size_bytes),
            head.content_type,
            Some(head.last_modified),
        )
    }

    /// Record for a key whose metadata could not be fetched.
    pub fn unenriched(key: String) -> Self {
        Self::new(key, None, None, None)
    }
}

/// Format a byte count: bytes below 1 KiB, then one-decimal KB, then MB.
pub fn display_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;

    if bytes < KIB {
        format!("{} B", bytes)
    } else if bytes < MIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    }
}

/// Format a timestamp the way the browser client shows dates (`M/D/YYYY`).
pub fn display_date(ts: &DateTime<Utc>) -> String {
    ts.format("%-m/%-d/%Y").to_string()
}
