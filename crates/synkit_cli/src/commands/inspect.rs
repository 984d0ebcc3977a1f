//! Inspect command implementation.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use synkit_codec::Key;
use synkit_storage::{EntityStore, FileStore};
use synkit_sync_engine::{SyncRecord, SyncRecordStore};

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Application id.
    pub app_id: String,
    /// Number of stored entities, records included.
    pub entity_count: usize,
    /// Sync records.
    pub records: Vec<RecordView>,
}

/// One sync record.
#[derive(Debug, Serialize)]
pub struct RecordView {
    /// Base64 remote key.
    pub remote_key: String,
    /// Decoded remote key.
    pub key: String,
    /// Current version.
    pub version: u64,
    /// Content hash of the last sync.
    pub content_hash: String,
    /// Key of the stored entity.
    pub target_key: String,
    /// Owning principal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl From<&SyncRecord> for RecordView {
    fn from(record: &SyncRecord) -> Self {
        Self {
            remote_key: record.remote_key().to_string(),
            key: Key::decode_remote(record.remote_key())
                .map(|key| key.to_string())
                .unwrap_or_else(|e| format!("<{e}>")),
            version: record.version(),
            content_hash: record.content_hash().to_string(),
            target_key: record.target_key().to_string(),
            owner: record.owner().map(|owner| owner.email().to_string()),
        }
    }
}

/// Runs the inspect command.
pub fn run(path: &Path, app_id: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, app_id)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn inspect(path: &Path, app_id: &str) -> Result<InspectResult, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {:?}", path).into());
    }

    let store = Arc::new(FileStore::open(path)?);
    let entity_count = store.len()?;
    let records = SyncRecordStore::new(store, app_id).list()?;

    Ok(InspectResult {
        path: path.display().to_string(),
        app_id: app_id.to_string(),
        entity_count,
        records: records.iter().map(RecordView::from).collect(),
    })
}

fn print_text_output(result: &InspectResult) {
    println!("Synkit Store Inspection");
    println!("=======================");
    println!();
    println!("Path:     {}", result.path);
    println!("App:      {}", result.app_id);
    println!("Entities: {}", result.entity_count);
    println!("Records:  {}", result.records.len());

    for record in &result.records {
        println!();
        println!("  {}", record.key);
        println!("    remote key: {}", record.remote_key);
        println!("    version:    {}", record.version);
        println!("    hash:       {}", record.content_hash);
        println!("    target:     {}", record.target_key);
        if let Some(owner) = &record.owner {
            println!("    owner:      {owner}");
        }
    }
}
