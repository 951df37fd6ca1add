use crate::error::{KanbanError, Result};
use crate::types::Status;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const KANBAN_DIR: &str = "data/kanban";
pub const STATUS_DIR: &str = "data/kanban/status";
pub const TRASH_DIR: &str = "data/kanban/trash";
pub const INFO_DIR: &str = "data/kanban/info";

pub const MANIFEST_FILE: &str = "data/kanban/manifest.tsv";
pub const SEQUENCE_FILE: &str = "data/kanban/.sequence";

pub const EPICS_FILE: &str = "data/kanban/info/epics.toml";
pub const NFRS_FILE: &str = "data/kanban/info/nfrs.toml";
pub const MILESTONES_FILE: &str = "data/kanban/info/milestones.toml";
pub const CONFIG_FILE: &str = "data/kanban/info/config.toml";
pub const OVERRIDE_LOG_FILE: &str = "data/kanban/info/override_log.txt";

pub const GITIGNORE_ENTRY: &str = "data/kanban/";

/// Largest per-epic number an id can carry (`EPIC-NNN`).
pub const MAX_TASK_NUMBER: u32 = 999;

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn kanban_dir(root: &Path) -> PathBuf {
    root.join(KANBAN_DIR)
}

pub fn status_root(root: &Path) -> PathBuf {
    root.join(STATUS_DIR)
}

pub fn status_dir(root: &Path, status: Status) -> PathBuf {
    status_root(root).join(status.dir_name())
}

pub fn task_path(root: &Path, status: Status, id: &str) -> PathBuf {
    status_dir(root, status).join(format!("{id}.md"))
}

pub fn trash_dir(root: &Path) -> PathBuf {
    root.join(TRASH_DIR)
}

pub fn trash_path(root: &Path, auto_id: u64, id: &str) -> PathBuf {
    trash_dir(root).join(format!("{auto_id}.{id}.md"))
}

pub fn info_dir(root: &Path) -> PathBuf {
    root.join(INFO_DIR)
}

pub fn manifest_path(root: &Path) -> PathBuf {
    root.join(MANIFEST_FILE)
}

pub fn sequence_path(root: &Path) -> PathBuf {
    root.join(SEQUENCE_FILE)
}

pub fn epics_path(root: &Path) -> PathBuf {
    root.join(EPICS_FILE)
}

pub fn nfrs_path(root: &Path) -> PathBuf {
    root.join(NFRS_FILE)
}

pub fn milestones_path(root: &Path) -> PathBuf {
    root.join(MILESTONES_FILE)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn override_log_path(root: &Path) -> PathBuf {
    root.join(OVERRIDE_LOG_FILE)
}

// ---------------------------------------------------------------------------
// Task id validation
// ---------------------------------------------------------------------------

static TASK_ID_RE: OnceLock<Regex> = OnceLock::new();
static EPIC_RE: OnceLock<Regex> = OnceLock::new();

fn task_id_re() -> &'static Regex {
    TASK_ID_RE.get_or_init(|| Regex::new(r"^([A-Z][A-Z0-9]*)-(\d+)$").unwrap())
}

fn epic_re() -> &'static Regex {
    EPIC_RE.get_or_init(|| Regex::new(r"^[A-Z][A-Z0-9]*$").unwrap())
}

pub fn validate_epic(epic: &str) -> Result<()> {
    if !epic_re().is_match(epic) {
        return Err(KanbanError::InvalidInput(format!(
            "invalid epic name '{epic}': expected uppercase letters and digits"
        )));
    }
    Ok(())
}

/// Format a task id: two digits below 100, three digits up to 999.
pub fn make_task_id(epic: &str, number: u32) -> Result<String> {
    validate_epic(epic)?;
    match number {
        0 => Err(KanbanError::InvalidInput(
            "task numbers start at 1".to_string(),
        )),
        1..=99 => Ok(format!("{epic}-{number:02}")),
        100..=MAX_TASK_NUMBER => Ok(format!("{epic}-{number:03}")),
        _ => Err(KanbanError::NumberSpaceExhausted(epic.to_string())),
    }
}

/// Split a task id into `(epic, number)`. Case-insensitive on input.
pub fn parse_task_id(id: &str) -> Result<(String, u32)> {
    let upper = id.trim().to_ascii_uppercase();
    let caps = task_id_re()
        .captures(&upper)
        .ok_or_else(|| KanbanError::InvalidTaskId(id.to_string()))?;
    let number: u32 = caps[2]
        .parse()
        .map_err(|_| KanbanError::InvalidTaskId(id.to_string()))?;
    if number == 0 || number > MAX_TASK_NUMBER {
        return Err(KanbanError::InvalidTaskId(id.to_string()));
    }
    Ok((caps[1].to_string(), number))
}

/// Normalize an id to its canonical spelling (`feat-1` -> `FEAT-01`).
pub fn normalize_task_id(id: &str) -> Result<String> {
    let (epic, number) = parse_task_id(id)?;
    make_task_id(&epic, number)
}

/// Uppercase a reference to another task (`duplicate_of`). Unlike
/// `normalize_task_id`, the referenced task need not be a valid live id, so
/// `BUGS-00` is accepted; only the `EPIC-N` shape is checked.
pub fn normalize_reference(id: &str) -> Result<String> {
    if let Ok(canonical) = normalize_task_id(id) {
        return Ok(canonical);
    }
    let upper = id.trim().to_ascii_uppercase();
    if task_id_re().is_match(&upper) {
        Ok(upper)
    } else {
        Err(KanbanError::InvalidTaskId(id.to_string()))
    }
}

/// Expand batch arguments: each item may hold several ids separated by commas
/// or whitespace. Ids are uppercased and de-duplicated, first occurrence wins.
pub fn parse_task_ids<S: AsRef<str>>(args: &[S]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for arg in args {
        for part in arg
            .as_ref()
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::trim)
            .filter(|p| !p.is_empty())
        {
            let id = part.to_ascii_uppercase();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
