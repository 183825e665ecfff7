use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use shared::types::NodeRecord;

use crate::error::{Error, Result};

/// Flat-file store of registered nodes: a single JSON array on disk.
/// Every operation loads the whole collection; mutations write it back.
/// There is no locking, so of two concurrent writers the later one wins.
pub struct NodeStore {
    path: PathBuf,
}

/// Input for [`NodeStore::add`]; id and creation time are assigned by the store.
pub struct NewNode {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub token: Option<String>,
}

impl NodeStore {
    /// Open the store, seeding an empty collection if the file is missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        if !path.exists() {
            fs::write(&path, "[]")?;
        }
        Ok(Self { path })
    }

    /// All records. An unreadable or corrupt file reads as empty, matching
    /// the last-write-wins contract of the file itself.
    pub fn list(&self) -> Vec<NodeRecord> {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|contents| serde_json::from_str(&contents).ok())
            .unwrap_or_default()
    }

    pub fn get(&self, id: u32) -> Option<NodeRecord> {
        self.list().into_iter().find(|node| node.id == id)
    }

    /// Add a record, allocating the lowest free id. Fails with
    /// `DuplicateName` before anything is written if the name is taken.
    pub fn add(&self, new: NewNode) -> Result<NodeRecord> {
        let mut nodes = self.list();
        if nodes.iter().any(|node| node.name == new.name) {
            return Err(Error::DuplicateName(new.name));
        }

        let record = NodeRecord {
            id: lowest_available_id(&nodes),
            name: new.name,
            address: new.address,
            port: new.port,
            token: new.token,
            created_at: Utc::now(),
        };
        nodes.push(record.clone());
        self.persist(&nodes)?;
        Ok(record)
    }

    /// Remove exactly the record with the given id. Other records keep
    /// their ids; there is no compaction or renumbering.
    pub fn remove(&self, id: u32) -> Result<Option<NodeRecord>> {
        let mut nodes = self.list();
        let removed = nodes
            .iter()
            .position(|node| node.id == id)
            .map(|i| nodes.remove(i));
        if removed.is_some() {
            self.persist(&nodes)?;
        }
        Ok(removed)
    }

    /// Mutate one record in place and persist the collection.
    pub fn update(
        &self,
        id: u32,
        mutate: impl FnOnce(&mut NodeRecord),
    ) -> Result<Option<NodeRecord>> {
        let mut nodes = self.list();
        let Some(node) = nodes.iter_mut().find(|node| node.id == id) else {
            return Ok(None);
        };
        mutate(node);
        let updated = node.clone();
        self.persist(&nodes)?;
        Ok(Some(updated))
    }

    // Write through a temp file and rename so a crash mid-write leaves the
    // previous state intact.
    fn persist(&self, nodes: &[NodeRecord]) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(nodes)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Smallest positive integer not currently in use.
fn lowest_available_id(nodes: &[NodeRecord]) -> u32 {
    let used: BTreeSet<u32> = nodes.iter().map(|node| node.id).collect();
    let mut id = 1;
    while used.contains(&id) {
        id += 1;
    }
    id
}
