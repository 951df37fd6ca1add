use crate::error::{KanbanError, Result};
use crate::paths;
use crate::store::{self, TaskStore};
use crate::task::TaskRecord;
use crate::types::HistoryAction;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One file under `trash/`, named `<auto_id>.<id>.md`.
#[derive(Debug, Clone, Serialize)]
pub struct TrashEntry {
    pub auto_id: u64,
    pub id: String,
    pub path: PathBuf,
    pub title: Option<String>,
    pub deleted: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    /// The parsed record; `None` when the file could not be read.
    #[serde(skip)]
    pub task: Option<TaskRecord>,
}

/// Split `7.FEAT-03.md` into `(7, "FEAT-03")`.
pub fn parse_file_name(name: &str) -> Option<(u64, String)> {
    let stem = name.strip_suffix(".md")?;
    let (prefix, id) = stem.split_once('.')?;
    let auto_id = prefix.parse::<u64>().ok()?;
    (!id.is_empty()).then(|| (auto_id, id.to_string()))
}

fn read_entry(path: &Path) -> Option<TrashEntry> {
    let (auto_id, id) = parse_file_name(path.file_name()?.to_str()?)?;
    let task = match TaskStore::read_task_file(path, None) {
        Ok(task) => Some(task),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable trash entry");
            None
        }
    };
    let deletion = task.as_ref().and_then(|t| {
        t.history
            .iter()
            .rev()
            .find(|h| h.action == HistoryAction::Delete)
    });
    Some(TrashEntry {
        auto_id,
        id,
        path: path.to_path_buf(),
        title: task.as_ref().map(|t| t.title.clone()),
        deleted: deletion.map(|h| h.timestamp),
        reason: deletion.and_then(|h| h.reason.clone()),
        task,
    })
}

/// Every trash entry, most recently deleted first. Entries without a
/// deletion record sort last.
pub fn list(store: &TaskStore) -> Result<Vec<TrashEntry>> {
    let mut entries: Vec<TrashEntry> = store::md_files(&paths::trash_dir(store.root()))?
        .iter()
        .filter_map(|p| read_entry(p))
        .collect();
    entries.sort_by(|a, b| b.deleted.cmp(&a.deleted).then(b.auto_id.cmp(&a.auto_id)));
    Ok(entries)
}

pub fn find(store: &TaskStore, auto_id: u64) -> Result<TrashEntry> {
    store::md_files(&paths::trash_dir(store.root()))?
        .iter()
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .and_then(parse_file_name)
                .is_some_and(|(n, _)| n == auto_id)
        })
        .find_map(|p| read_entry(p))
        .ok_or(KanbanError::TrashEntryNotFound(auto_id))
}

/// Permanently remove every trash file. Returns how many were removed.
pub fn empty(store: &TaskStore) -> Result<usize> {
    let files = store::md_files(&paths::trash_dir(store.root()))?;
    for path in &files {
        std::fs::remove_file(path)?;
    }
    Ok(files.len())
}
