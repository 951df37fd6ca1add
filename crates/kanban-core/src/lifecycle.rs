//! Creating tasks and changing their identity: create, rename, soft delete
//! into the trash and recovery out of it.

use crate::config::{Registry, Settings};
use crate::error::{KanbanError, Result};
use crate::frontmatter;
use crate::io;
use crate::paths;
use crate::store::TaskStore;
use crate::task::{HistoryEntry, TaskRecord};
use crate::trash;
use crate::types::{HistoryAction, Priority, Status};
use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// create
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub epic: String,
    pub title: String,
    pub story_points: Option<u32>,
    pub priority: Option<Priority>,
    pub tags: Vec<String>,
    pub milestone: Option<String>,
    pub body: Option<String>,
    pub status: Option<Status>,
    /// Explicit number inside the epic; taken from the highest existing one
    /// when absent.
    pub number: Option<u32>,
}

/// Markdown skeleton for a task created with a body. `\n` escapes in the
/// body are expanded.
pub fn body_template(title: &str, body: &str) -> String {
    format!(
        "# {title}\n\n\
         ## Description\n\n{body}\n\n\
         ## Acceptance Criteria\n\n\
         - [ ] Criterion 1\n\
         - [ ] Criterion 2\n\n\
         ## Notes\n\n\
         <!-- Add notes here -->\n",
        body = body.replace("\\n", "\n").trim()
    )
}

pub fn create(store: &TaskStore, req: CreateRequest) -> Result<TaskRecord> {
    let registry = Registry::load(store.root())?;
    let settings = Settings::load(store.root())?;
    let (epic, _) = registry.epic(&req.epic)?;

    let title = req.title.trim();
    if title.is_empty() {
        return Err(KanbanError::InvalidInput("task title must not be empty".into()));
    }
    let body = req
        .body
        .as_deref()
        .filter(|b| !b.replace("\\n", "\n").trim().is_empty());
    let status = req.status.unwrap_or(Status::Stub);
    if matches!(status, Status::Blocked | Status::Archived) {
        return Err(KanbanError::InvalidInput(format!(
            "tasks cannot be created as {status}"
        )));
    }
    if status != Status::Stub && body.is_none() {
        return Err(KanbanError::InvalidInput(format!(
            "creating a task as {status} requires --body; stubs may start empty"
        )));
    }

    let number = match req.number {
        Some(n) => {
            let id = paths::make_task_id(&epic, n)?;
            if store.exists(&id) {
                return Err(KanbanError::TaskExists(id));
            }
            n
        }
        None => store.next_task_number(&epic)?,
    };

    let milestone = match req.milestone.as_deref().map(str::trim) {
        Some(m) if registry.milestones.contains_key(m) => Some(m.to_string()),
        Some(m) if !m.is_empty() => {
            warn!(milestone = %m, "unknown milestone; task created without one");
            None
        }
        _ => None,
    };

    let mut task = TaskRecord::new(&epic, number, title)?;
    task.status = status;
    task.story_points = req
        .story_points
        .unwrap_or(settings.general.default_story_points);
    task.priority = req.priority.unwrap_or(settings.general.default_priority);
    task.tags = dedupe(req.tags);
    task.milestone = milestone;
    if settings.general.apply_default_nfrs {
        task.nfrs = registry.default_nfrs();
    }
    task.verification.command = settings.default_verify_command();
    task.content = body.map(|b| body_template(title, b)).unwrap_or_default();
    task.auto_id = Some(store.next_auto_id()?);

    let mut entry = HistoryEntry::new(HistoryAction::Create).actor(store.actor());
    entry.to_status = Some(status.to_string());
    task.push_history(entry);

    store.write(&mut task)?;
    info!(id = %task.id, %status, "created task");
    Ok(task)
}

fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        let item = item.trim().to_string();
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// rename
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Renamed {
    pub from: String,
    pub to: String,
    pub status: Status,
    /// An existing task under the new id was replaced.
    pub replaced: bool,
}

/// Give a task a new id. Whole-word mentions of the old id in the body follow.
/// An existing `new_id` is only replaced with `force`.
pub fn rename(store: &TaskStore, old_id: &str, new_id: &str, force: bool) -> Result<Renamed> {
    let old = paths::normalize_task_id(old_id)?;
    let new = paths::normalize_task_id(new_id)?;
    if old == new {
        return Err(KanbanError::InvalidInput(format!("{old} already has that id")));
    }
    let (old_path, status) = store
        .find(&old)
        .ok_or_else(|| KanbanError::TaskNotFound(old.clone()))?;
    let mut task = TaskStore::read_task_file(&old_path, Some(status))?;

    let replaced = store.exists(&new);
    if replaced {
        if !force {
            return Err(KanbanError::TaskExists(new));
        }
        warn!(id = %new, "replacing existing task");
        store.remove_file(&new)?;
        store.remove_manifest_entry(&new)?;
    }

    task.reassign_id(&new)?;
    task.push_history(
        HistoryEntry::new(HistoryAction::Rename)
            .actor(store.actor())
            .meta("from_id", old.as_str())
            .meta("to_id", new.as_str()),
    );
    store.write(&mut task)?;
    std::fs::remove_file(&old_path)?;
    store.remove_manifest_entry(&old)?;
    info!(from = %old, to = %new, "renamed task");

    Ok(Renamed {
        from: old,
        to: new,
        status,
        replaced,
    })
}

// ---------------------------------------------------------------------------
// delete / recover
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Deleted {
    pub id: String,
    pub auto_id: u64,
    pub trash_path: PathBuf,
}

fn require_reason(reason: Option<&str>, operation: &str) -> Result<String> {
    reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .ok_or_else(|| KanbanError::MissingReason(operation.to_string()))
}

/// Soft delete: the record, history included, moves to
/// `trash/<auto_id>.<id>.md` and its manifest row is dropped.
pub fn delete(store: &TaskStore, id: &str, reason: Option<&str>) -> Result<Deleted> {
    let reason = require_reason(reason, "delete")?;
    let mut task = store.load(id)?;
    let auto_id = match task.auto_id {
        Some(n) => n,
        None => {
            let n = store.next_auto_id()?;
            info!(id = %task.id, auto_id = n, "assigned auto id before delete");
            task.auto_id = Some(n);
            n
        }
    };
    let trash_path = paths::trash_path(store.root(), auto_id, &task.id);
    if trash_path.exists() {
        return Err(KanbanError::TrashEntryExists(trash_path));
    }

    task.push_history(
        HistoryEntry::new(HistoryAction::Delete)
            .between(task.status.as_str(), "trash")
            .reason(Some(&reason))
            .actor(store.actor()),
    );
    task.updated = Utc::now();
    io::atomic_write(&trash_path, frontmatter::render(&task)?.as_bytes())?;
    store.remove_file(&task.id)?;
    store.remove_manifest_entry(&task.id)?;
    info!(id = %task.id, auto_id, "moved task to trash");

    Ok(Deleted {
        id: task.id,
        auto_id,
        trash_path,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct Recovered {
    pub auto_id: u64,
    pub original_id: String,
    pub id: String,
    pub status: Status,
}

impl Recovered {
    pub fn renumbered(&self) -> bool {
        self.original_id != self.id
    }
}

fn id_in_use(store: &TaskStore, id: &str, manifest_ids: &[String]) -> bool {
    store.exists(id) || manifest_ids.iter().any(|m| m == id)
}

/// First free id in `epic` at or after `max(number + 1, next number)`.
fn free_id(store: &TaskStore, epic: &str, number: u32) -> Result<String> {
    let manifest_ids: Vec<String> = store.manifest_rows()?.into_iter().map(|r| r.id).collect();
    let next = match store.next_task_number(epic) {
        Ok(n) => n,
        Err(KanbanError::NumberSpaceExhausted(_)) => paths::MAX_TASK_NUMBER + 1,
        Err(e) => return Err(e),
    };
    (next.max(number + 1)..=paths::MAX_TASK_NUMBER)
        .map(|n| paths::make_task_id(epic, n))
        .find(|candidate| {
            candidate
                .as_ref()
                .map_or(true, |id| !id_in_use(store, id, &manifest_ids))
        })
        .unwrap_or_else(|| Err(KanbanError::NumberSpaceExhausted(epic.to_string())))
}

/// Bring a trashed task back into its previous status directory. When its
/// id was taken in the meantime it gets the next free number in its epic.
pub fn recover(store: &TaskStore, auto_id: u64, reason: Option<&str>) -> Result<Recovered> {
    let reason = require_reason(reason, "recover")?;
    let entry = trash::find(store, auto_id)?;
    let mut task = TaskStore::read_task_file(&entry.path, None)?;
    task.auto_id.get_or_insert(auto_id);

    let original_id = task.id.clone();
    let manifest_ids: Vec<String> = store.manifest_rows()?.into_iter().map(|r| r.id).collect();
    if id_in_use(store, &original_id, &manifest_ids) {
        let new_id = free_id(store, &task.epic, task.number)?;
        warn!(from = %original_id, to = %new_id, "id taken; recovering under a new number");
        task.reassign_id(&new_id)?;
    }

    task.push_history(
        HistoryEntry::new(HistoryAction::Recover)
            .between("trash", task.status.as_str())
            .reason(Some(&reason))
            .actor(store.actor())
            .meta("from_id", original_id.as_str())
            .meta("to_id", task.id.as_str()),
    );
    store.write(&mut task)?;
    std::fs::remove_file(&entry.path)?;
    info!(id = %task.id, auto_id, "recovered task from trash");

    Ok(Recovered {
        auto_id,
        original_id,
        id: task.id,
        status: task.status,
    })
}
