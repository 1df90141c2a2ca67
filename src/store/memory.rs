//! The node-local key-value map.
//!
//! # Responsibilities
//! - Answer reads from local state only
//! - Stamp local writes with wall-clock time and this node's id
//! - Merge peer snapshots by last-write-wins
//! - Persist the full map after every change
//!
//! # Design Decisions
//! - Plain synchronous type; exclusive access comes from the owning task
//!   in `actor.rs`, never from a lock in here
//! - A write never moves a key's timestamp backwards on this node, even if
//!   the wall clock does
//! - On a failed persist the in-memory change is rolled back, so memory and
//!   disk agree after every returned error

use chrono::{DateTime, SubsecRound, Utc};

use crate::error::Result;
use crate::store::persistence::SnapshotFile;
use crate::store::record::{Record, Snapshot};

#[derive(Debug)]
pub struct Store {
    node_id: String,
    records: Snapshot,
    file: Option<SnapshotFile>,
}

impl Store {
    /// Open the store for `node_id`, loading whatever `file` holds.
    pub fn open(node_id: impl Into<String>, file: SnapshotFile) -> Result<Self> {
        let records = file.load()?;
        Ok(Self {
            node_id: node_id.into(),
            records,
            file: Some(file),
        })
    }

    /// A store that never touches disk.
    pub fn in_memory(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            records: Snapshot::new(),
            file: None,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.records.get(key)
    }

    /// Timestamps are cut to microseconds, the precision they travel with.
    pub fn set(&mut self, key: &str, value: &str) -> Result<Record> {
        self.set_at(key, value, Utc::now().trunc_subsecs(6))
    }

    /// `set` with an explicit clock reading.
    pub fn set_at(&mut self, key: &str, value: &str, now: DateTime<Utc>) -> Result<Record> {
        let timestamp = match self.records.get(key) {
            Some(prev) if prev.timestamp > now => prev.timestamp,
            _ => now,
        };
        let record = Record::new(value, timestamp, self.node_id.as_str());
        let previous = self.records.insert(key.to_string(), record.clone());

        if let Err(e) = self.persist() {
            match previous {
                Some(prev) => self.records.insert(key.to_string(), prev),
                None => self.records.remove(key),
            };
            return Err(e);
        }
        Ok(record)
    }

    /// Merge a peer snapshot, keeping whichever side is strictly newer per
    /// key (ties keep the local record). Returns how many keys changed.
    pub fn merge_incoming(&mut self, remote: Snapshot) -> Result<usize> {
        let mut replaced: Vec<(String, Option<Record>)> = Vec::new();

        for (key, incoming) in remote {
            if incoming.supersedes(self.records.get(&key)) {
                let previous = self.records.insert(key.clone(), incoming);
                replaced.push((key, previous));
            }
        }

        if replaced.is_empty() {
            return Ok(0);
        }

        if let Err(e) = self.persist() {
            for (key, previous) in replaced.into_iter().rev() {
                match previous {
                    Some(prev) => self.records.insert(key, prev),
                    None => self.records.remove(&key),
                };
            }
            return Err(e);
        }
        Ok(replaced.len())
    }

    pub fn snapshot(&self) -> Snapshot {
        self.records.clone()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn persist(&self) -> Result<()> {
        match &self.file {
            Some(file) => file.save(&self.records),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn second_write_wins_locally() {
        let mut store = Store::in_memory("a");
        let first = store.set("k", "v1").unwrap();
        let second = store.set("k", "v2").unwrap();

        let got = store.get("k").unwrap();
        assert_eq!(got.value, "v2");
        assert_eq!(got.server_id, "a");
        assert!(second.timestamp >= first.timestamp);
    }

    #[test]
    fn timestamps_do_not_go_backwards_when_the_clock_does() {
        let mut store = Store::in_memory("a");
        store.set_at("k", "v1", at(200)).unwrap();
        let rec = store.set_at("k", "v2", at(100)).unwrap();
        assert_eq!(rec.timestamp, at(200));
        assert_eq!(store.get("k").unwrap().value, "v2");
    }

    #[test]
    fn merge_keeps_the_newer_side() {
        let mut store = Store::in_memory("a");
        store.set_at("older_here", "local", at(10)).unwrap();
        store.set_at("newer_here", "local", at(30)).unwrap();
        store.set_at("tie", "local", at(20)).unwrap();

        let mut remote = Snapshot::new();
        remote.insert("older_here".into(), Record::new("remote", at(11), "b"));
        remote.insert("newer_here".into(), Record::new("remote", at(29), "b"));
        remote.insert("tie".into(), Record::new("remote", at(20), "b"));
        remote.insert("absent".into(), Record::new("remote", at(1), "b"));

        assert_eq!(store.merge_incoming(remote).unwrap(), 2);
        assert_eq!(store.get("older_here").unwrap().value, "remote");
        assert_eq!(store.get("older_here").unwrap().server_id, "b");
        assert_eq!(store.get("newer_here").unwrap().value, "local");
        assert_eq!(store.get("tie").unwrap().value, "local");
        assert_eq!(store.get("absent").unwrap().value, "remote");
    }

    #[test]
    fn merge_is_idempotent() {
        let mut remote = Snapshot::new();
        remote.insert("x".into(), Record::new("1", at(5), "b"));
        remote.insert("y".into(), Record::new("2", at(6), "b"));

        let mut store = Store::in_memory("a");
        store.set_at("y", "mine", at(7)).unwrap();

        store.merge_incoming(remote.clone()).unwrap();
        let once = store.snapshot();
        assert_eq!(store.merge_incoming(remote).unwrap(), 0);
        assert_eq!(store.snapshot(), once);
    }

    #[test]
    fn two_nodes_converge_on_the_later_write() {
        let t1 = at(1_000);
        let t2 = t1 + Duration::milliseconds(1);

        let mut a = Store::in_memory("a");
        let mut b = Store::in_memory("b");
        a.set_at("k", "from-a", t1).unwrap();
        b.set_at("k", "from-b", t2).unwrap();

        a.merge_incoming(b.snapshot()).unwrap();
        b.merge_incoming(a.snapshot()).unwrap();

        assert_eq!(a.get("k").unwrap().value, "from-b");
        assert_eq!(b.get("k").unwrap().value, "from-b");
        assert_eq!(a.snapshot(), b.snapshot());
    }

    #[test]
    fn reopened_store_sees_persisted_writes() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::for_node(dir.path(), "a");
        {
            let mut store = Store::open("a", file.clone()).unwrap();
            store.set("k", "v").unwrap();
            let mut remote = Snapshot::new();
            remote.insert("m".into(), Record::new("merged", Utc::now(), "b"));
            store.merge_incoming(remote).unwrap();
        }
        let store = Store::open("a", file).unwrap();
        assert_eq!(store.get("k").unwrap().value, "v");
        assert_eq!(store.get("m").unwrap().value, "merged");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn failed_persist_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let mut store = Store::open("a", SnapshotFile::for_node(&data_dir, "a")).unwrap();
        // A regular file where the data directory should be makes every save fail.
        std::fs::write(&data_dir, b"").unwrap();

        assert!(matches!(store.set("k", "v"), Err(Error::Persistence { .. })));
        assert!(store.get("k").is_none());

        let mut remote = Snapshot::new();
        remote.insert("k".into(), Record::new("remote", Utc::now(), "b"));
        assert!(matches!(store.merge_incoming(remote), Err(Error::Persistence { .. })));
        assert!(store.is_empty());
    }
}
