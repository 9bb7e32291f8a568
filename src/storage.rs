//! Persistence for the document.
//!
//! The document is stored as one JSON value under a single key in a
//! [`KeyValueStore`]. Loading is forgiving: a missing or malformed value
//! yields the default document, and the older single-timeline shape (a bare
//! `points` array) is upgraded into one flow named "Flow 1".

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::{Document, Flow, FlowId, Point, PointId, Tag, DEFAULT_FILENAME};

/// Key the document lives under
pub const DOCUMENT_KEY: &str = "sumpoints-document";

/// Get/set string values by key
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `$XDG_DATA_HOME/sumpoints`, falling back to `~/.local/share/sumpoints`
    pub fn default_dir() -> PathBuf {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".local")
                    .join("share")
            });
        data_dir.join("sumpoints")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let content =
            fs::read_to_string(&path).with_context(|| format!("Failed to read from {:?}", path))?;
        Ok(Some(content))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {:?}", self.dir))?;
        let path = self.path_for(key);
        fs::write(&path, value).with_context(|| format!("Failed to save to {:?}", path))?;
        Ok(())
    }
}

/// In-memory store, used by tests
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// --- Persisted schema ---

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredPoint {
    id: u64,
    #[serde(default)]
    x: f64,
    y: f64,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredFlow {
    id: String,
    name: String,
    #[serde(default)]
    points: Vec<StoredPoint>,
    #[serde(default, alias = "digitalPoints")]
    tag_a_set: Vec<u64>,
    #[serde(default, alias = "bluePoints")]
    tag_b_set: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredDocument {
    flows: Vec<StoredFlow>,
    #[serde(default)]
    active_flow_id: Option<String>,
    #[serde(default = "default_filename")]
    filename: String,
}

/// The single-timeline shape written before flows existed
#[derive(Debug, Clone, Deserialize)]
struct LegacyDocument {
    points: Vec<StoredPoint>,
    #[serde(default, alias = "digitalPoints")]
    tag_a_set: Vec<u64>,
    #[serde(default, alias = "bluePoints")]
    tag_b_set: Vec<u64>,
    #[serde(default = "default_filename")]
    filename: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum AnyDocument {
    Current(StoredDocument),
    Legacy(LegacyDocument),
}

fn default_filename() -> String {
    DEFAULT_FILENAME.to_string()
}

fn stored_points(points: &[StoredPoint]) -> Vec<Point> {
    points
        .iter()
        .map(|p| Point {
            id: PointId(p.id),
            x: p.x,
            offset: p.y,
            text: p.text.clone(),
        })
        .collect()
}

fn ids(raw: &[u64]) -> Vec<PointId> {
    raw.iter().copied().map(PointId).collect()
}

impl From<&Document> for StoredDocument {
    fn from(doc: &Document) -> Self {
        let flows = doc
            .flows()
            .iter()
            .map(|flow| StoredFlow {
                id: flow.id.to_string(),
                name: flow.name.clone(),
                points: flow
                    .points()
                    .iter()
                    .map(|p| StoredPoint {
                        id: p.id.0,
                        x: p.x,
                        y: p.offset,
                        text: p.text.clone(),
                    })
                    .collect(),
                tag_a_set: flow.tag_set(Tag::A).iter().map(|id| id.0).collect(),
                tag_b_set: flow.tag_set(Tag::B).iter().map(|id| id.0).collect(),
            })
            .collect();
        Self {
            flows,
            active_flow_id: Some(doc.active_flow_id().to_string()),
            filename: doc.filename.clone(),
        }
    }
}

impl StoredDocument {
    fn into_document(self) -> Document {
        let mut active = None;
        let flows = self
            .flows
            .into_iter()
            .map(|stored| {
                // Ids that are not UUIDs get a fresh one; the active pointer follows.
                let id = Uuid::parse_str(&stored.id)
                    .map(FlowId)
                    .unwrap_or_else(|_| FlowId::new());
                if self.active_flow_id.as_deref() == Some(stored.id.as_str()) {
                    active = Some(id);
                }
                Flow::from_parts(
                    id,
                    stored.name,
                    stored_points(&stored.points),
                    ids(&stored.tag_a_set),
                    ids(&stored.tag_b_set),
                )
            })
            .collect();
        Document::from_flows(flows, active, self.filename)
    }
}

impl LegacyDocument {
    fn into_document(self) -> Document {
        tracing::info!(points = self.points.len(), "upgrading single-timeline document");
        let flow = Flow::from_parts(
            FlowId::new(),
            "Flow 1",
            stored_points(&self.points),
            ids(&self.tag_a_set),
            ids(&self.tag_b_set),
        );
        let active = flow.id;
        Document::from_flows(vec![flow], Some(active), self.filename)
    }
}

/// Serialize a document to its persisted JSON form
pub fn to_json(doc: &Document) -> Result<String> {
    serde_json::to_string_pretty(&StoredDocument::from(doc)).context("Failed to encode document")
}

/// Parse persisted JSON in either the current or the legacy shape
pub fn from_json(json: &str) -> Result<Document> {
    let parsed: AnyDocument = serde_json::from_str(json).context("Failed to decode document")?;
    Ok(match parsed {
        AnyDocument::Current(doc) => doc.into_document(),
        AnyDocument::Legacy(doc) => doc.into_document(),
    })
}

/// Load the document, falling back to the default one on any failure
pub fn load_document(store: &dyn KeyValueStore) -> Document {
    let json = match store.get(DOCUMENT_KEY) {
        Ok(Some(json)) => json,
        Ok(None) => {
            tracing::info!("no saved document, starting fresh");
            return Document::default();
        }
        Err(e) => {
            tracing::warn!("failed to read saved document: {e:#}");
            return Document::default();
        }
    };
    match from_json(&json) {
        Ok(doc) => {
            tracing::info!(flows = doc.flows().len(), "loaded document");
            doc
        }
        Err(e) => {
            tracing::warn!("saved document is malformed, starting fresh: {e:#}");
            Document::default()
        }
    }
}

/// Write the document unless it is blank; returns whether anything was written
pub fn save_document(store: &mut dyn KeyValueStore, doc: &Document) -> Result<bool> {
    if doc.is_blank() {
        tracing::debug!("skipping save of blank document");
        return Ok(false);
    }
    let json = to_json(doc)?;
    store.set(DOCUMENT_KEY, &json)?;
    tracing::debug!("saved document");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Document {
        let mut doc = Document::new();
        let a = doc.append_point_at(20.0);
        let b = doc.append_point();
        doc.update_point_text(a, "first");
        doc.toggle_tag(a, Tag::A);
        doc.toggle_tag(b, Tag::B);
        doc.create_flow();
        doc.append_point_at(80.0);
        doc.set_filename("Trip");
        doc
    }

    #[test]
    fn save_and_load_through_files() {
        let dir = tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("nested"));
        let doc = sample();

        assert!(save_document(&mut store, &doc).unwrap());
        assert!(store.path_for(DOCUMENT_KEY).exists());

        let loaded = load_document(&store);
        assert_eq!(loaded.filename, "Trip");
        assert_eq!(loaded.flows().len(), 2);
        assert_eq!(loaded.active_flow_id(), doc.active_flow_id());
        assert_eq!(loaded.flows(), doc.flows());
        assert!(!loaded.is_dirty());
    }

    #[test]
    fn persisted_field_names() {
        let json = to_json(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["activeFlowId"].is_string());
        assert_eq!(value["filename"], "Trip");
        let flow = &value["flows"][1];
        assert_eq!(flow["name"], "Flow 1");
        assert_eq!(flow["points"][0]["y"], 20.0);
        assert_eq!(flow["points"][0]["x"], 75.0);
        assert_eq!(flow["tagASet"].as_array().unwrap().len(), 1);
        assert_eq!(flow["tagBSet"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn blank_document_is_not_persisted() {
        let mut store = MemoryStore::new();
        store.set(DOCUMENT_KEY, "keep me").unwrap();
        assert!(!save_document(&mut store, &Document::new()).unwrap());
        assert_eq!(store.get(DOCUMENT_KEY).unwrap().as_deref(), Some("keep me"));
    }

    #[test]
    fn missing_value_gives_default() {
        let store = MemoryStore::new();
        let doc = load_document(&store);
        assert!(doc.is_blank());
        assert_eq!(doc.active_flow().name, "Flow 1");
    }

    #[test]
    fn malformed_value_gives_default() {
        let mut store = MemoryStore::new();
        store.set(DOCUMENT_KEY, "{not json").unwrap();
        assert!(load_document(&store).is_blank());

        store.set(DOCUMENT_KEY, r#"{"flows": 12}"#).unwrap();
        assert!(load_document(&store).is_blank());
    }

    #[test]
    fn appending_after_loading_maximal_id_is_safe() {
        let json = r#"{"points":[{"id":18446744073709551615,"x":75,"y":50,"text":""}]}"#;
        let mut doc = from_json(json).unwrap();
        let loaded = doc.points()[0].id;
        let next = doc.append_point();
        assert_ne!(next, loaded);
        assert_eq!(doc.points().len(), 2);
    }

    #[test]
    fn legacy_points_become_one_flow() {
        let json = r#"{
            "points": [
                {"id": 10, "x": 300, "y": 22, "text": "hello", "isAbove": true},
                {"id": 11, "x": 75, "y": 50}
            ],
            "digitalPoints": [11, 99],
            "filename": "Old"
        }"#;
        let doc = from_json(json).unwrap();
        assert_eq!(doc.flows().len(), 1);
        let flow = doc.active_flow();
        assert_eq!(flow.name, "Flow 1");
        assert_eq!(doc.filename, "Old");
        assert_eq!(flow.points()[0].x, 75.0);
        assert_eq!(flow.points()[1].x, 150.0);
        assert_eq!(flow.points()[0].offset, 20.0);
        assert_eq!(flow.points()[0].text, "hello");
        assert!(flow.has_tag(PointId(11), Tag::A));
        assert_eq!(flow.tag_set(Tag::A).len(), 1);
    }

    #[test]
    fn non_uuid_flow_ids_keep_active_selection() {
        let json = r#"{
            "flows": [
                {"id": "1700000000000", "name": "One", "points": []},
                {"id": "1700000000001", "name": "Two", "points": [{"id": 1, "x": 75, "y": 50, "text": ""}]}
            ],
            "activeFlowId": "1700000000001",
            "filename": "Mixed"
        }"#;
        let doc = from_json(json).unwrap();
        assert_eq!(doc.active_flow().name, "Two");
    }

    #[test]
    fn loaded_ids_continue_past_stored_ones() {
        let json = r#"{"points": [{"id": 18446744073709551000, "x": 75, "y": 50}]}"#;
        let mut doc = from_json(json).unwrap();
        let next = doc.append_point();
        assert!(next > PointId(18446744073709551000));
    }
}
