//! Per-run record of fetched files, grouped by category.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::storage::StorageWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// The database dump.
    Sql,
    /// Incremental file archives.
    Files,
}

/// One fetched file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    /// Name as reported by (and requested from) the server.
    pub remote_filename: String,
    pub local_path: PathBuf,
    /// MD5 of the local file, lowercase hex.
    pub md5: String,
    pub bytes: u64,
    /// The server answered the digest check with a match.
    pub server_confirmed: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    entries: BTreeMap<Category, Vec<DownloadRecord>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record, replacing an earlier one for the same remote file (a
    /// re-fetch overwrites the local file too).
    pub fn record(&mut self, category: Category, record: DownloadRecord) {
        let list = self.entries.entry(category).or_default();
        match list
            .iter_mut()
            .find(|r| r.remote_filename == record.remote_filename)
        {
            Some(existing) => *existing = record,
            None => list.push(record),
        }
    }

    pub fn get(&self, category: Category) -> &[DownloadRecord] {
        self.entries.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find(&self, category: Category, remote_filename: &str) -> Option<&DownloadRecord> {
        self.get(category)
            .iter()
            .find(|r| r.remote_filename == remote_filename)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.values().flatten().map(|r| r.bytes).sum()
    }

    /// Write the ledger as pretty JSON, replacing `path` atomically.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| Error::storage(path, e.into()))?;
        let mut writer = StorageWriter::create(path).map_err(|e| Error::storage(path, e))?;
        std::io::Write::write_all(&mut writer, &json).map_err(|e| Error::storage(path, e))?;
        writer.finalize().map_err(|e| Error::storage(path, e))?;
        Ok(())
    }

    pub fn read_json(path: &Path) -> Result<Self> {
        let data = fs::read(path).map_err(|e| Error::storage(path, e))?;
        serde_json::from_slice(&data).map_err(|e| Error::storage(path, e.into()))
    }
}
