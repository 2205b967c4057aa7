//! Whole-store JSON snapshots.
//!
//! A snapshot is written with a temp file + rename so a crash mid-write
//! never leaves a truncated file behind. Records load back through their
//! validated constructors; a snapshot that would not pass validation today
//! does not load.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use diligence_types::{Fact, Finding, Gap, ValidationError};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::dependency::TrackerSnapshot;
use crate::fact_store::FactLedger;
use crate::inventory::InventorySnapshot;
use crate::reasoning_store::DEFAULT_HASH_LEN;

/// Format version written by this build.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("snapshot version {found} is newer than supported version {SNAPSHOT_VERSION}")]
    UnsupportedVersion { found: u32 },
    #[error("snapshot failed validation: {0}")]
    Invalid(#[from] ValidationError),
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

fn default_hash_len() -> usize {
    DEFAULT_HASH_LEN
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_hash_len")]
    pub id_hash_len: usize,
    #[serde(default)]
    pub facts: Vec<Fact>,
    #[serde(default)]
    pub gaps: Vec<Gap>,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(flatten)]
    pub ledger: FactLedger,
    #[serde(flatten)]
    pub tracker: TrackerSnapshot,
    #[serde(default)]
    pub inventory: InventorySnapshot,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            id_hash_len: DEFAULT_HASH_LEN,
            facts: Vec::new(),
            gaps: Vec::new(),
            findings: Vec::new(),
            ledger: FactLedger::default(),
            tracker: TrackerSnapshot::default(),
            inventory: InventorySnapshot::default(),
        }
    }
}

impl Snapshot {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self).map_err(SnapshotError::Encode)
    }

    fn check_version(&self) -> Result<(), SnapshotError> {
        if self.version > SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: self.version,
            });
        }
        Ok(())
    }

    /// Read and parse `path`. Does not rebuild the stores.
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let text = fs::read_to_string(path).map_err(|source| SnapshotError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot = Self::from_json(&text).map_err(|source| SnapshotError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        snapshot.check_version()?;
        tracing::debug!(
            path = %path.display(),
            facts = snapshot.facts.len(),
            findings = snapshot.findings.len(),
            "Loaded snapshot"
        );
        Ok(snapshot)
    }

    /// Write atomically, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let json = self.to_json()?;
        let write_err = |source: io::Error| SnapshotError::Write {
            path: path.to_path_buf(),
            source,
        };

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(write_err)?;

        let mut tmp = NamedTempFile::new_in(parent).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|err| write_err(err.error))?;

        tracing::debug!(path = %path.display(), bytes = json.len(), "Saved snapshot");
        Ok(())
    }
}
