//! Import history
//!
//! Keeps the most recent import runs in memory, mirrored to a JSON file so
//! the list survives worker restarts.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::types::ImportSummary;

const MAX_HISTORY_SIZE: usize = 100;
const HISTORY_FILE: &str = "logs/import-history.json";
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// One finished (or failed) import run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportHistoryEntry {
    pub id: Uuid,
    /// Empty when the run failed before a location was known
    pub location_id: String,
    pub dry_run: bool,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub imported: u32,
    pub past_count: u32,
    pub future_count: u32,
    pub created_bookings: u32,
    pub would_book: u32,
    pub error_count: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportHistoryRequest {
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportHistoryResponse {
    pub imports: Vec<ImportHistoryEntry>,
    pub total: usize,
}

/// Newest-first ring of import runs
pub struct ImportHistoryService {
    history: RwLock<VecDeque<ImportHistoryEntry>>,
    path: Option<PathBuf>,
}

impl ImportHistoryService {
    /// History persisted at `path`; `None` keeps it in memory only
    pub fn new(path: Option<PathBuf>) -> Self {
        let mut deque = VecDeque::with_capacity(MAX_HISTORY_SIZE);
        if let Some(loaded) = path.as_deref().and_then(load_from_disk) {
            deque.extend(loaded.into_iter().take(MAX_HISTORY_SIZE));
            info!("Loaded {} import history entries from disk", deque.len());
        }
        Self {
            history: RwLock::new(deque),
            path,
        }
    }

    pub fn record_completed(&self, started_at: DateTime<Utc>, summary: &ImportSummary) {
        let completed_at = Utc::now();
        self.add_entry(ImportHistoryEntry {
            id: Uuid::new_v4(),
            location_id: summary.location_id.clone(),
            dry_run: summary.dry_run,
            status: "completed".to_string(),
            started_at,
            completed_at,
            duration_ms: duration_ms(started_at, completed_at),
            imported: summary.imported,
            past_count: summary.past_count,
            future_count: summary.future_count,
            created_bookings: summary.created_bookings,
            would_book: summary.would_book,
            error_count: summary.errors.len(),
            error: None,
        });
    }

    pub fn record_failed(&self, started_at: DateTime<Utc>, location_id: Option<&str>, dry_run: bool, error: String) {
        let completed_at = Utc::now();
        self.add_entry(ImportHistoryEntry {
            id: Uuid::new_v4(),
            location_id: location_id.unwrap_or_default().to_string(),
            dry_run,
            status: "failed".to_string(),
            started_at,
            completed_at,
            duration_ms: duration_ms(started_at, completed_at),
            imported: 0,
            past_count: 0,
            future_count: 0,
            created_bookings: 0,
            would_book: 0,
            error_count: 0,
            error: Some(error),
        });
    }

    fn add_entry(&self, entry: ImportHistoryEntry) {
        let mut history = self.history.write();

        if history.len() >= MAX_HISTORY_SIZE {
            history.pop_back();
        }
        history.push_front(entry);

        if let Some(path) = &self.path {
            save_to_disk(path, &history);
        }
    }

    /// Recent runs across all locations
    pub fn get_recent(&self, limit: usize) -> ImportHistoryResponse {
        let history = self.history.read();
        ImportHistoryResponse {
            imports: history.iter().take(limit).cloned().collect(),
            total: history.len(),
        }
    }

    /// Recent runs for one location
    pub fn get_recent_for_location(&self, location_id: &str, limit: usize) -> ImportHistoryResponse {
        let history = self.history.read();
        let matching: Vec<&ImportHistoryEntry> =
            history.iter().filter(|e| e.location_id == location_id).collect();
        ImportHistoryResponse {
            total: matching.len(),
            imports: matching.into_iter().take(limit).cloned().collect(),
        }
    }
}

fn duration_ms(started_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> u64 {
    (completed_at - started_at).num_milliseconds().max(0) as u64
}

fn load_from_disk(path: &Path) -> Option<Vec<ImportHistoryEntry>> {
    if !path.exists() {
        return None;
    }
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<Vec<ImportHistoryEntry>>(&content) {
            Ok(entries) => Some(entries),
            Err(e) => {
                warn!("Failed to parse import history file: {}", e);
                None
            }
        },
        Err(e) => {
            warn!("Failed to read import history file: {}", e);
            None
        }
    }
}

fn save_to_disk(path: &Path, history: &VecDeque<ImportHistoryEntry>) {
    if let Some(dir) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("Failed to create import history directory: {}", e);
            return;
        }
    }
    match serde_json::to_string_pretty(history) {
        Ok(json) => {
            if let Err(e) = std::fs::write(path, json) {
                warn!("Failed to write import history file: {}", e);
            }
        }
        Err(e) => warn!("Failed to serialize import history: {}", e),
    }
}

lazy_static::lazy_static! {
    pub static ref IMPORT_HISTORY: Arc<ImportHistoryService> =
        Arc::new(ImportHistoryService::new(Some(PathBuf::from(HISTORY_FILE))));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(location_id: &str, imported: u32) -> ImportSummary {
        ImportSummary {
            location_id: location_id.to_string(),
            imported,
            past_count: imported,
            errors: vec!["Row 3: Missing email for name='x'".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_record_completed() {
        let service = ImportHistoryService::new(None);
        let started_at = Utc::now() - chrono::Duration::seconds(2);

        service.record_completed(started_at, &summary("loc1", 4));

        let history = service.get_recent(10);
        assert_eq!(history.total, 1);
        let entry = &history.imports[0];
        assert_eq!(entry.status, "completed");
        assert_eq!(entry.location_id, "loc1");
        assert_eq!(entry.imported, 4);
        assert_eq!(entry.error_count, 1);
        assert!(entry.duration_ms >= 2000);
    }

    #[test]
    fn test_record_failed() {
        let service = ImportHistoryService::new(None);

        service.record_failed(Utc::now(), None, true, "No GHL location connected.".to_string());

        let history = service.get_recent(10);
        assert_eq!(history.imports[0].status, "failed");
        assert_eq!(history.imports[0].location_id, "");
        assert!(history.imports[0].dry_run);
        assert_eq!(history.imports[0].error.as_deref(), Some("No GHL location connected."));
    }

    #[test]
    fn test_history_limit_newest_first() {
        let service = ImportHistoryService::new(None);

        for i in 0..150 {
            service.record_completed(Utc::now(), &summary("loc1", i));
        }

        let history = service.get_recent(200);
        assert_eq!(history.imports.len(), MAX_HISTORY_SIZE);
        assert_eq!(history.imports[0].imported, 149);
    }

    #[test]
    fn test_get_recent_for_location() {
        let service = ImportHistoryService::new(None);

        service.record_completed(Utc::now(), &summary("loc1", 1));
        service.record_completed(Utc::now(), &summary("loc2", 2));
        service.record_completed(Utc::now(), &summary("loc1", 3));

        let history = service.get_recent_for_location("loc1", 1);
        assert_eq!(history.total, 2);
        assert_eq!(history.imports.len(), 1);
        assert_eq!(history.imports[0].imported, 3);
    }

    #[test]
    fn test_persisted_history_reloads() {
        let path = std::env::temp_dir().join(format!("import-history-{}.json", Uuid::new_v4()));

        let service = ImportHistoryService::new(Some(path.clone()));
        service.record_completed(Utc::now(), &summary("loc1", 7));

        let reloaded = ImportHistoryService::new(Some(path.clone()));
        let history = reloaded.get_recent(10);
        assert_eq!(history.total, 1);
        assert_eq!(history.imports[0].imported, 7);

        let _ = std::fs::remove_file(path);
    }
}
