//! Persistence of the last recording.
//!
//! The file is a compact JSON array of event records. Saving goes through a
//! temporary file in the same directory and an atomic rename, so a failed
//! write leaves the previous copy untouched. Loading never fails: anything
//! that is not a JSON array yields an empty timeline.

use crate::capture::input::types::InputEvent;
use crate::recorder::error::RecordingResult;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Owner of the current timeline.
#[derive(Debug)]
pub struct RecordingStore {
    path: PathBuf,
    events: Vec<InputEvent>,
}

impl RecordingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            events: Vec::new(),
        }
    }

    /// Create a store and populate it from disk.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut store = Self::new(path);
        store.events = load_events(&store.path);
        store
    }

    pub fn events(&self) -> &[InputEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Replace the timeline wholesale.
    pub fn replace(&mut self, events: Vec<InputEvent>) {
        self.events = events;
    }

    /// Read-only copy for one playback.
    pub fn snapshot(&self) -> Vec<InputEvent> {
        self.events.clone()
    }

    pub fn save(&self) -> RecordingResult<()> {
        save_events(&self.path, &self.events)
    }
}

pub fn save_events(path: &Path, events: &[InputEvent]) -> RecordingResult<()> {
    let data = serde_json::to_vec(events)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(&data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    tracing::info!("Saved {} events to {:?}", events.len(), path);
    Ok(())
}

pub fn load_events(path: &Path) -> Vec<InputEvent> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No saved recording at {:?}", path);
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!("Failed to read recording {:?}: {}", path, e);
            return Vec::new();
        }
    };
    parse_events(&content)
}

/// Parse a serialized timeline.
///
/// The payload must be a JSON array; records inside it that do not describe
/// a known event are skipped individually.
pub fn parse_events(content: &str) -> Vec<InputEvent> {
    let records: Vec<serde_json::Value> = match serde_json::from_str(content) {
        Ok(serde_json::Value::Array(records)) => records,
        Ok(_) => {
            tracing::warn!("Saved recording is not a list, ignoring it");
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!("Saved recording is damaged, ignoring it: {}", e);
            return Vec::new();
        }
    };

    let total = records.len();
    let events: Vec<InputEvent> = records
        .into_iter()
        .filter_map(|record| serde_json::from_value(record).ok())
        .collect();

    if events.len() != total {
        tracing::warn!("Skipped {} unreadable records", total - events.len());
    }
    events
}
