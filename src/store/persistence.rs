//! Durable per-node snapshot file.
//!
//! # Responsibilities
//! - Map a node id to its data file
//! - Load the last snapshot at startup
//! - Overwrite the whole snapshot after every change
//!
//! # Design Decisions
//! - Writes go to a sibling temp file first and are renamed into place, so a
//!   crash mid-write leaves the previous snapshot intact
//! - A missing file is an empty store; an unreadable one is a startup error

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::store::record::Snapshot;

#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    /// The file for `node_id` inside `data_dir`.
    pub fn for_node(data_dir: &Path, node_id: &str) -> Self {
        Self {
            path: data_dir.join(format!("{node_id}_data.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Snapshot> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Snapshot::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Snapshot::new()),
            Err(source) => Err(self.failure(source)),
        }
    }

    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let body = serde_json::to_vec_pretty(snapshot)?;
        self.write_atomically(&body).map_err(|source| self.failure(source))
    }

    fn write_atomically(&self, body: &[u8]) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(body)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)
    }

    fn failure(&self, source: io::Error) -> Error {
        Error::Persistence {
            path: self.path.clone(),
            source,
        }
    }
}
