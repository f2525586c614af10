//! Note persistence.
//!
//! Records keep the rich regions as serialized markup; the store never
//! parses them. There is no optimistic concurrency: the last write wins.

use std::cmp::Reverse;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// A stored note as it appears on the wire and on disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub cues: String,
    /// Serialized rich body
    #[serde(default)]
    pub notes: String,
    /// Serialized rich summary
    #[serde(default)]
    pub summary: String,
    /// Epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    /// Fields this crate does not know about, preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A partial note used for create and merge-update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cues: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NoteFields {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

impl NoteRecord {
    /// Shallow merge: only fields present in `fields` overwrite
    pub fn merge(&mut self, fields: NoteFields) {
        if let Some(title) = fields.title {
            self.title = title;
        }
        if let Some(cues) = fields.cues {
            self.cues = cues;
        }
        if let Some(notes) = fields.notes {
            self.notes = notes;
        }
        if let Some(summary) = fields.summary {
            self.summary = summary;
        }
        if let Some(updated_at) = fields.updated_at {
            self.updated_at = Some(updated_at);
        }
        for (key, value) in fields.extra {
            if key != "id" {
                self.extra.insert(key, value);
            }
        }
    }

    fn sort_key(&self) -> i64 {
        self.updated_at
            .or_else(|| self.id.parse().ok())
            .unwrap_or(0)
    }
}

/// Most recently updated first, falling back to the id timestamp
pub fn sorted_for_display(mut notes: Vec<NoteRecord>) -> Vec<NoteRecord> {
    notes.sort_by_key(|n| Reverse(n.sort_key()));
    notes
}

/// The persistence collaborator
pub trait NoteStore: Send + Sync {
    fn list(&self) -> Result<Vec<NoteRecord>, StoreError>;
    fn get(&self, id: &str) -> Result<NoteRecord, StoreError>;
    /// Assigns the id
    fn create(&self, fields: NoteFields) -> Result<NoteRecord, StoreError>;
    fn update(&self, id: &str, fields: NoteFields) -> Result<NoteRecord, StoreError>;
    fn delete(&self, id: &str) -> Result<(), StoreError>;
}

fn next_id(notes: &[NoteRecord]) -> String {
    let mut candidate = Utc::now().timestamp_millis();
    while notes.iter().any(|n| n.id == candidate.to_string()) {
        candidate += 1;
    }
    candidate.to_string()
}

fn create_in(notes: &mut Vec<NoteRecord>, fields: NoteFields) -> NoteRecord {
    let mut record = NoteRecord {
        id: next_id(notes),
        ..NoteRecord::default()
    };
    record.merge(fields);
    record.updated_at.get_or_insert_with(|| Utc::now().timestamp_millis());
    notes.push(record.clone());
    record
}

fn update_in(notes: &mut [NoteRecord], id: &str, mut fields: NoteFields) -> Result<NoteRecord, StoreError> {
    let record = notes
        .iter_mut()
        .find(|n| n.id == id)
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    fields.updated_at.get_or_insert_with(|| Utc::now().timestamp_millis());
    record.merge(fields);
    Ok(record.clone())
}

fn delete_in(notes: &mut Vec<NoteRecord>, id: &str) -> Result<(), StoreError> {
    let index = notes
        .iter()
        .position(|n| n.id == id)
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    notes.remove(index);
    Ok(())
}

fn find_in(notes: &[NoteRecord], id: &str) -> Result<NoteRecord, StoreError> {
    notes
        .iter()
        .find(|n| n.id == id)
        .cloned()
        .ok_or_else(|| StoreError::NotFound(id.to_string()))
}

/// All notes in a single pretty-printed JSON array file
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.lock.lock().map_err(|_| StoreError::Poisoned)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read(&self) -> Result<Vec<NoteRecord>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn write(&self, notes: &[NoteRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let json = serde_json::to_string_pretty(notes)?;
        fs::write(&self.path, json).map_err(|e| self.io_error(e))
    }

    fn modify<T>(
        &self,
        change: impl FnOnce(&mut Vec<NoteRecord>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.guard()?;
        let mut notes = self.read()?;
        let out = change(&mut notes)?;
        self.write(&notes)?;
        Ok(out)
    }
}

impl NoteStore for JsonFileStore {
    fn list(&self) -> Result<Vec<NoteRecord>, StoreError> {
        let _guard = self.guard()?;
        self.read()
    }

    fn get(&self, id: &str) -> Result<NoteRecord, StoreError> {
        let _guard = self.guard()?;
        find_in(&self.read()?, id)
    }

    fn create(&self, fields: NoteFields) -> Result<NoteRecord, StoreError> {
        let record = self.modify(|notes| Ok(create_in(notes, fields)))?;
        tracing::debug!(id = %record.id, path = %self.path.display(), "note created");
        Ok(record)
    }

    fn update(&self, id: &str, fields: NoteFields) -> Result<NoteRecord, StoreError> {
        let record = self.modify(|notes| update_in(notes, id, fields))?;
        tracing::debug!(id, "note updated");
        Ok(record)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.modify(|notes| delete_in(notes, id))?;
        tracing::debug!(id, "note deleted");
        Ok(())
    }
}

/// In-process store, used by tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    notes: Mutex<Vec<NoteRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn notes(&self) -> Result<MutexGuard<'_, Vec<NoteRecord>>, StoreError> {
        self.notes.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl NoteStore for MemoryStore {
    fn list(&self) -> Result<Vec<NoteRecord>, StoreError> {
        Ok(self.notes()?.clone())
    }

    fn get(&self, id: &str) -> Result<NoteRecord, StoreError> {
        let notes = self.notes()?;
        find_in(&notes, id)
    }

    fn create(&self, fields: NoteFields) -> Result<NoteRecord, StoreError> {
        let mut notes = self.notes()?;
        Ok(create_in(&mut notes, fields))
    }

    fn update(&self, id: &str, fields: NoteFields) -> Result<NoteRecord, StoreError> {
        let mut notes = self.notes()?;
        update_in(&mut notes, id, fields)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut notes = self.notes()?;
        delete_in(&mut notes, id)
    }
}
