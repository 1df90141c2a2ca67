//! Versioned store entries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full store contents keyed by record key. Also the `SYNC_DATA` payload and
/// the on-disk format.
pub type Snapshot = BTreeMap<String, Record>;

/// One stored entry.
///
/// `timestamp` is the only version marker; `server_id` records which node
/// performed the write and is never consulted when merging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub value: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    pub server_id: String,
}

impl Record {
    pub fn new(value: impl Into<String>, timestamp: DateTime<Utc>, server_id: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            timestamp,
            server_id: server_id.into(),
        }
    }

    /// Last-write-wins: true only when `self` is strictly newer than `local`.
    pub fn supersedes(&self, local: Option<&Record>) -> bool {
        match local {
            None => true,
            Some(local) => self.timestamp > local.timestamp,
        }
    }
}

/// ISO-8601 timestamps on the wire and on disk.
///
/// Written as RFC 3339 UTC with microsecond precision. Read back as RFC 3339,
/// or as a naive `YYYY-MM-DDTHH:MM:SS[.ffffff]` string taken to be UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp `{raw}`")))
    }
}
