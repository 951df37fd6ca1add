use crate::config::{self, ProjectType};
use crate::error::{KanbanError, Result};
use crate::frontmatter;
use crate::io;
use crate::manifest::{self, ManifestRow, Unusable};
use crate::paths;
use crate::task::TaskRecord;
use crate::types::Status;
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A task file that could not be read during a bulk scan.
#[derive(Debug, Clone, Serialize)]
pub struct Malformed {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of walking every status directory.
#[derive(Debug, Default)]
pub struct Scan {
    pub tasks: Vec<TaskRecord>,
    pub malformed: Vec<Malformed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitReport {
    pub kanban_dir: PathBuf,
    pub project_type: ProjectType,
    pub auto_detected: bool,
    pub gitignore_updated: bool,
}

/// Maps task ids to `status/<status>/<id>.md` and keeps `manifest.tsv` in
/// step with every write.
#[derive(Debug, Clone)]
pub struct TaskStore {
    root: PathBuf,
    actor: Option<String>,
}

impl TaskStore {
    // -----------------------------------------------------------------------
    // Layout
    // -----------------------------------------------------------------------

    pub fn is_initialized(root: &Path) -> bool {
        paths::status_root(root).is_dir()
            && paths::info_dir(root).is_dir()
            && paths::manifest_path(root).is_file()
    }

    /// Create the directory layout, default registries and an empty manifest.
    /// With `force`, registries and config are rewritten; task files never are.
    pub fn init(root: &Path, kind: Option<ProjectType>, force: bool) -> Result<InitReport> {
        if Self::is_initialized(root) && !force {
            return Err(KanbanError::AlreadyInitialized);
        }
        let (kind, auto_detected) = match kind {
            Some(k) => (k, false),
            None => ProjectType::detect(root),
        };

        for status in Status::all() {
            io::ensure_dir(&paths::status_dir(root, *status))?;
        }
        io::ensure_dir(&paths::trash_dir(root))?;
        io::ensure_dir(&paths::info_dir(root))?;

        let registries = [
            (paths::epics_path(root), config::DEFAULT_EPICS.to_string()),
            (paths::nfrs_path(root), config::DEFAULT_NFRS.to_string()),
            (paths::milestones_path(root), config::DEFAULT_MILESTONES.to_string()),
            (paths::config_path(root), config::default_config(kind, auto_detected)),
        ];
        for (path, content) in &registries {
            if force {
                io::atomic_write(path, content.as_bytes())?;
            } else {
                io::write_if_missing(path, content.as_bytes())?;
            }
        }
        io::write_if_missing(&paths::manifest_path(root), manifest::render(&[]).as_bytes())?;
        io::write_if_missing(&paths::sequence_path(root), b"1\n")?;
        let gitignore_updated = io::ensure_gitignore_entry(root, paths::GITIGNORE_ENTRY)?;

        Ok(InitReport {
            kanban_dir: paths::kanban_dir(root),
            project_type: kind,
            auto_detected,
            gitignore_updated,
        })
    }

    /// Open an initialised store. Every entry point goes through here.
    pub fn open(root: &Path) -> Result<Self> {
        if !Self::is_initialized(root) {
            return Err(KanbanError::NotInitialized);
        }
        Ok(Self {
            root: root.to_path_buf(),
            actor: None,
        })
    }

    /// Name recorded as `actor` on history entries.
    pub fn with_actor(mut self, actor: Option<String>) -> Self {
        self.actor = actor.filter(|a| !a.trim().is_empty());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn actor(&self) -> Option<&str> {
        self.actor.as_deref()
    }

    // -----------------------------------------------------------------------
    // Task files
    // -----------------------------------------------------------------------

    /// Locate `<id>.md` by probing each status directory.
    pub fn find(&self, id: &str) -> Option<(PathBuf, Status)> {
        let id = paths::normalize_task_id(id).ok()?;
        Status::all().iter().find_map(|status| {
            let path = paths::task_path(&self.root, *status, &id);
            path.is_file().then_some((path, *status))
        })
    }

    pub fn exists(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    pub fn load(&self, id: &str) -> Result<TaskRecord> {
        let canonical = paths::normalize_task_id(id)?;
        let (path, status) = self
            .find(&canonical)
            .ok_or_else(|| KanbanError::TaskNotFound(canonical.clone()))?;
        Self::read_task_file(&path, Some(status))
    }

    /// Parse a task file. When `status` is given it is the directory the file
    /// lives in, which wins over the header.
    pub fn read_task_file(path: &Path, status: Option<Status>) -> Result<TaskRecord> {
        let text = std::fs::read_to_string(path)?;
        let mut task = frontmatter::parse(&text, path)?;
        if let Some(dir_status) = status {
            if task.status != dir_status {
                warn!(
                    id = %task.id,
                    header = %task.status,
                    directory = %dir_status,
                    "status header disagrees with directory; using directory"
                );
                task.status = dir_status;
            }
        }
        Ok(task)
    }

    /// Persist `task` under its status directory and refresh its manifest row.
    /// A status change relocates the file; the old copy is removed only after
    /// the new one is written.
    pub fn write(&self, task: &mut TaskRecord) -> Result<()> {
        self.write_file(task)?;
        self.upsert_manifest_row(ManifestRow::from_task(task))
    }

    /// Write the task file without touching the manifest.
    pub(crate) fn write_file(&self, task: &mut TaskRecord) -> Result<PathBuf> {
        task.updated = Utc::now();
        let previous = self.find(&task.id);
        let path = paths::task_path(&self.root, task.status, &task.id);
        io::atomic_write(&path, frontmatter::render(task)?.as_bytes())?;
        if let Some((old, old_status)) = previous {
            if old != path {
                std::fs::remove_file(&old)?;
                debug!(id = %task.id, from = %old_status, to = %task.status, "moved task file");
            }
        }
        Ok(path)
    }

    /// Delete a task file outright (used when an id is being replaced).
    pub(crate) fn remove_file(&self, id: &str) -> Result<bool> {
        match self.find(id) {
            Some((path, _)) => {
                std::fs::remove_file(path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Ids of every `*.md` file under `status/`, read from file names only.
    pub fn live_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for status in Status::all() {
            for path in md_files(&paths::status_dir(&self.root, *status))? {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        Ok(ids)
    }

    /// Read every task file. Unreadable files are logged and reported, not fatal.
    pub fn scan(&self) -> Result<Scan> {
        let mut scan = Scan::default();
        for status in Status::all() {
            for path in md_files(&paths::status_dir(&self.root, *status))? {
                match Self::read_task_file(&path, Some(*status)) {
                    Ok(task) => scan.tasks.push(task),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping unreadable task file");
                        scan.malformed.push(Malformed {
                            path,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
        Ok(scan)
    }

    /// Next free number in `epic`: highest live number plus one.
    pub fn next_task_number(&self, epic: &str) -> Result<u32> {
        let max = self
            .live_ids()?
            .iter()
            .filter_map(|id| paths::parse_task_id(id).ok())
            .filter(|(e, _)| e == epic)
            .map(|(_, n)| n)
            .max()
            .unwrap_or(0);
        let next = max + 1;
        if next > paths::MAX_TASK_NUMBER {
            return Err(KanbanError::NumberSpaceExhausted(epic.to_string()));
        }
        Ok(next)
    }

    /// Take the next global auto id from `.sequence`. A missing or garbled
    /// counter is re-derived from live and trashed tasks.
    pub fn next_auto_id(&self) -> Result<u64> {
        let seq_path = paths::sequence_path(&self.root);
        let stored = io::read_optional(&seq_path)?.and_then(|s| s.trim().parse::<u64>().ok());
        let floor = self.highest_auto_id()? + 1;
        let next = match stored {
            Some(n) if n >= floor => n,
            Some(n) => {
                warn!(stored = n, floor, "auto id counter behind existing tasks; advancing");
                floor
            }
            None => floor,
        };
        io::atomic_write(&seq_path, format!("{}\n", next + 1).as_bytes())?;
        Ok(next)
    }

    fn highest_auto_id(&self) -> Result<u64> {
        let live = self
            .manifest_rows()?
            .iter()
            .filter_map(|r| r.auto_id)
            .max()
            .unwrap_or(0);
        let trashed = md_files(&paths::trash_dir(&self.root))?
            .iter()
            .filter_map(|p| p.file_name()?.to_str()?.split('.').next()?.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        Ok(live.max(trashed))
    }

    // -----------------------------------------------------------------------
    // Manifest
    // -----------------------------------------------------------------------

    /// Current manifest rows. An empty or unreadable manifest is rebuilt
    /// from the task files first.
    pub fn manifest_rows(&self) -> Result<Vec<ManifestRow>> {
        let text = io::read_optional(&paths::manifest_path(&self.root))?.unwrap_or_default();
        match manifest::parse(&text) {
            Ok(rows) if !rows.is_empty() => Ok(rows),
            Ok(_) | Err(Unusable::Empty) => {
                if self.live_ids()?.is_empty() {
                    Ok(Vec::new())
                } else {
                    warn!("manifest is empty but task files exist; rebuilding");
                    self.rebuild_rows()
                }
            }
            Err(Unusable::Corrupt(reason)) => {
                warn!(%reason, "manifest is unreadable; rebuilding");
                self.rebuild_rows()
            }
        }
    }

    /// Regenerate `manifest.tsv` from every task file. Returns the row count.
    pub fn rebuild_manifest(&self) -> Result<usize> {
        Ok(self.rebuild_rows()?.len())
    }

    fn rebuild_rows(&self) -> Result<Vec<ManifestRow>> {
        let scan = self.scan()?;
        let rows: Vec<ManifestRow> = scan.tasks.iter().map(ManifestRow::from_task).collect();
        self.save_manifest(&rows)?;
        debug!(rows = rows.len(), "rebuilt manifest");
        Ok(rows)
    }

    fn save_manifest(&self, rows: &[ManifestRow]) -> Result<()> {
        io::atomic_write(
            &paths::manifest_path(&self.root),
            manifest::render(rows).as_bytes(),
        )
    }

    /// Rows to update when writing `id`. A header-only or blank manifest is
    /// taken as-is when `id` is the only task file on disk; otherwise the
    /// usual self-healing applies.
    fn rows_for_upsert(&self, id: &str) -> Result<Vec<ManifestRow>> {
        let text = io::read_optional(&paths::manifest_path(&self.root))?.unwrap_or_default();
        match manifest::parse(&text) {
            Ok(rows) if !rows.is_empty() => Ok(rows),
            Ok(_) | Err(Unusable::Empty) if self.live_ids()?.iter().all(|live| live == id) => {
                Ok(Vec::new())
            }
            _ => self.manifest_rows(),
        }
    }

    fn upsert_manifest_row(&self, row: ManifestRow) -> Result<()> {
        let mut rows = self.rows_for_upsert(&row.id)?;
        match rows.iter_mut().find(|r| r.id == row.id) {
            Some(existing) => *existing = row,
            None => rows.push(row),
        }
        self.save_manifest(&rows)
    }

    /// Drop the row for `id`, leaving the task file alone. Returns whether a
    /// row was present.
    pub fn remove_manifest_entry(&self, id: &str) -> Result<bool> {
        let mut rows = self.manifest_rows()?;
        let before = rows.len();
        rows.retain(|r| r.id != id);
        let removed = rows.len() != before;
        if removed {
            self.save_manifest(&rows)?;
        }
        Ok(removed)
    }
}

/// `*.md` files directly inside `dir`, sorted by name. Missing dir is empty.
pub(crate) fn md_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|x| x == "md"))
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) fn store() -> (TempDir, TaskStore) {
        let dir = TempDir::new().unwrap();
        TaskStore::init(dir.path(), Some(ProjectType::Generic), false).unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        (dir, store)
    }

    pub(crate) fn put(store: &TaskStore, id: &str, status: Status) -> TaskRecord {
        let (epic, number) = paths::parse_task_id(id).unwrap();
        let mut task = TaskRecord::new(&epic, number, &format!("Task {id}")).unwrap();
        task.status = status;
        store.write(&mut task).unwrap();
        task
    }

    fn sorted(mut rows: Vec<ManifestRow>) -> Vec<ManifestRow> {
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        rows
    }

    #[test]
    fn open_requires_init() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            TaskStore::open(dir.path()),
            Err(KanbanError::NotInitialized)
        ));
    }

    #[test]
    fn init_twice_needs_force() {
        let (dir, _store) = store();
        assert!(matches!(
            TaskStore::init(dir.path(), None, false),
            Err(KanbanError::AlreadyInitialized)
        ));
        TaskStore::init(dir.path(), None, true).unwrap();
        let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(gitignore.matches("data/kanban/").count(), 1);
    }

    #[test]
    fn write_moves_file_between_status_dirs() {
        let (dir, store) = store();
        let mut task = put(&store, "FEAT-02", Status::Stub);
        let stub_path = paths::task_path(dir.path(), Status::Stub, "FEAT-02");
        assert!(stub_path.exists());

        task.status = Status::Backlog;
        store.write(&mut task).unwrap();
        assert!(!stub_path.exists());
        assert!(paths::task_path(dir.path(), Status::Backlog, "FEAT-02").exists());
        assert_eq!(store.find("feat-2").unwrap().1, Status::Backlog);

        let rows = store.manifest_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, Status::Backlog);
    }

    #[test]
    fn load_round_trips_and_refreshes_updated() {
        let (_dir, store) = store();
        let mut task = put(&store, "FEAT-01", Status::Ready);
        let first = task.updated;
        let loaded = store.load("FEAT-01").unwrap();
        assert_eq!(loaded, task);
        store.write(&mut task).unwrap();
        assert!(task.updated >= first);
    }

    #[test]
    fn load_missing_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(
            store.load("FEAT-09"),
            Err(KanbanError::TaskNotFound(id)) if id == "FEAT-09"
        ));
        assert!(matches!(
            store.load("garbage"),
            Err(KanbanError::InvalidTaskId(_))
        ));
    }

    #[test]
    fn directory_status_wins_over_header() {
        let (dir, store) = store();
        put(&store, "FEAT-01", Status::Stub);
        let from = paths::task_path(dir.path(), Status::Stub, "FEAT-01");
        let to = paths::task_path(dir.path(), Status::Ready, "FEAT-01");
        std::fs::rename(&from, &to).unwrap();
        assert_eq!(store.load("FEAT-01").unwrap().status, Status::Ready);
    }

    #[test]
    fn rebuild_matches_incremental_manifest() {
        let (_dir, store) = store();
        let mut a = put(&store, "FEAT-01", Status::Stub);
        put(&store, "FEAT-02", Status::Active);
        put(&store, "BUGS-01", Status::Qa);
        a.status = Status::Backlog;
        a.tags = vec!["x".into()];
        store.write(&mut a).unwrap();
        store.remove_manifest_entry("FEAT-02").unwrap();
        store.remove_file("FEAT-02").unwrap();

        let incremental = sorted(store.manifest_rows().unwrap());
        assert_eq!(store.rebuild_manifest().unwrap(), 2);
        assert_eq!(sorted(store.manifest_rows().unwrap()), incremental);
    }

    #[test]
    fn empty_or_corrupt_manifest_self_heals() {
        let (dir, store) = store();
        put(&store, "FEAT-01", Status::Stub);
        put(&store, "FEAT-02", Status::Ready);

        std::fs::write(paths::manifest_path(dir.path()), "").unwrap();
        assert_eq!(store.manifest_rows().unwrap().len(), 2);

        std::fs::write(paths::manifest_path(dir.path()), "id\tstatus\nFEAT-01\n").unwrap();
        assert_eq!(store.manifest_rows().unwrap().len(), 2);
        let text = std::fs::read_to_string(paths::manifest_path(dir.path())).unwrap();
        assert!(text.starts_with("id\tepic\tnumber"));
    }

    #[test]
    fn header_only_manifest_takes_first_row_directly() {
        let (dir, store) = store();
        let header = std::fs::read_to_string(paths::manifest_path(dir.path())).unwrap();
        put(&store, "FEAT-01", Status::Stub);
        let rows = store.manifest_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "FEAT-01");

        // A file the manifest has never seen still gets picked up.
        let (epic, number) = paths::parse_task_id("FEAT-05").unwrap();
        let mut stray = TaskRecord::new(&epic, number, "Stray").unwrap();
        store.write_file(&mut stray).unwrap();
        std::fs::write(paths::manifest_path(dir.path()), header).unwrap();
        put(&store, "FEAT-02", Status::Ready);
        let ids: Vec<_> = sorted(store.manifest_rows().unwrap())
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["FEAT-01", "FEAT-02", "FEAT-05"]);
    }

    #[test]
    fn malformed_files_are_skipped_in_scan() {
        let (dir, store) = store();
        put(&store, "FEAT-01", Status::Stub);
        std::fs::write(
            paths::task_path(dir.path(), Status::Stub, "FEAT-02"),
            "no frontmatter here",
        )
        .unwrap();
        let scan = store.scan().unwrap();
        assert_eq!(scan.tasks.len(), 1);
        assert_eq!(scan.malformed.len(), 1);
        assert_eq!(store.rebuild_manifest().unwrap(), 1);
    }

    #[test]
    fn numbering_and_auto_ids() {
        let (_dir, store) = store();
        assert_eq!(store.next_task_number("FEAT").unwrap(), 1);
        put(&store, "FEAT-01", Status::Stub);
        put(&store, "FEAT-07", Status::Done);
        assert_eq!(store.next_task_number("FEAT").unwrap(), 8);
        assert_eq!(store.next_task_number("BUGS").unwrap(), 1);

        assert_eq!(store.next_auto_id().unwrap(), 1);
        assert_eq!(store.next_auto_id().unwrap(), 2);
        std::fs::remove_file(paths::sequence_path(store.root())).unwrap();
        assert_eq!(store.next_auto_id().unwrap(), 1);
    }

    #[test]
    fn number_space_is_bounded() {
        let (_dir, store) = store();
        put(&store, "FEAT-999", Status::Stub);
        assert!(matches!(
            store.next_task_number("FEAT"),
            Err(KanbanError::NumberSpaceExhausted(_))
        ));
    }
}
