//! Read-side reports over the task files: override aggregation, the merged
//! history timeline, groom audit and statistics.

use crate::error::Result;
use crate::io;
use crate::paths;
use crate::store::TaskStore;
use crate::task::{HistoryEntry, TaskRecord};
use crate::trash;
use crate::types::Status;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Override log
// ---------------------------------------------------------------------------

/// Append one line to `info/override_log.txt`.
pub fn log_override(root: &Path, id: &str, from: Status, to: Status, reason: &str) -> Result<()> {
    let line = format!(
        "{} | {id} | {from}→{to} | Reason: {reason}\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    io::append_text(&paths::override_log_path(root), &line)
}

/// Raw lines of the global override log, oldest first.
pub fn read_override_log(root: &Path) -> Result<Vec<String>> {
    Ok(io::read_optional(&paths::override_log_path(root))?
        .unwrap_or_default()
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct OverrideRecord {
    pub timestamp: DateTime<Utc>,
    pub id: String,
    pub from_status: String,
    pub to_status: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    pub trashed: bool,
}

impl OverrideRecord {
    /// Same shape as a line of the global log.
    pub fn log_line(&self) -> String {
        format!(
            "{} | {} | {}→{} | Reason: {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.id,
            self.from_status,
            self.to_status,
            self.reason
        )
    }
}

fn override_records(task: &TaskRecord, trashed: bool) -> impl Iterator<Item = OverrideRecord> + '_ {
    task.history
        .iter()
        .filter(|h| h.action.is_override())
        .map(move |h| OverrideRecord {
            timestamp: h.timestamp,
            id: task.id.clone(),
            from_status: h.from_status.clone().unwrap_or_else(|| "unknown".into()),
            to_status: h.to_status.clone().unwrap_or_else(|| "unknown".into()),
            reason: h
                .reason
                .clone()
                .unwrap_or_else(|| "No reason provided".into()),
            actor: h.actor.clone(),
            trashed,
        })
}

/// Every override recorded in a task history, live or trashed, newest first.
/// Legacy `override_*` actions count too.
pub fn collect_overrides(store: &TaskStore) -> Result<Vec<OverrideRecord>> {
    let mut out: Vec<OverrideRecord> = Vec::new();
    for task in &store.scan()?.tasks {
        out.extend(override_records(task, false));
    }
    for entry in trash::list(store)? {
        if let Some(task) = &entry.task {
            out.extend(override_records(task, true));
        }
    }
    out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(out)
}

// ---------------------------------------------------------------------------
// History timeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub id: String,
    #[serde(flatten)]
    pub entry: HistoryEntry,
}

/// History of every live task merged into one list, oldest first.
pub fn timeline(store: &TaskStore) -> Result<Vec<TimelineEntry>> {
    let mut out: Vec<TimelineEntry> = store
        .scan()?
        .tasks
        .into_iter()
        .flat_map(|task| {
            let id = task.id;
            task.history.into_iter().map(move |entry| TimelineEntry {
                id: id.clone(),
                entry,
            })
        })
        .collect();
    out.sort_by(|a, b| a.entry.timestamp.cmp(&b.entry.timestamp).then(a.id.cmp(&b.id)));
    Ok(out)
}

// ---------------------------------------------------------------------------
// Groom
// ---------------------------------------------------------------------------

pub const GROOM_RATIO: f64 = 0.5;
pub const GROOM_MIN_CHARS: usize = 200;
pub const GROOM_FALLBACK_MEDIAN: usize = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct GroomItem {
    pub id: String,
    pub title: String,
    pub status: Status,
    pub length: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroomReport {
    /// `None` when no done or archived task exists and the fallback was used.
    pub done_median: Option<usize>,
    pub threshold: usize,
    pub audited: usize,
    /// Tasks under the threshold, shortest first.
    pub needs_detail: Vec<GroomItem>,
}

fn median(mut values: Vec<usize>) -> Option<usize> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2)
    } else {
        Some(values[mid])
    }
}

fn file_lengths(store: &TaskStore, statuses: &[Status]) -> Result<Vec<(TaskRecord, usize)>> {
    let mut out = Vec::new();
    for task in store.scan()?.tasks {
        if !statuses.contains(&task.status) {
            continue;
        }
        let path = paths::task_path(store.root(), task.status, &task.id);
        let length = std::fs::read_to_string(&path)?.chars().count();
        out.push((task, length));
    }
    Ok(out)
}

/// Flag stub and backlog tasks whose file is short compared with finished
/// work: below `max(median done length * ratio, min_chars)`.
pub fn groom(store: &TaskStore, ratio: f64, min_chars: usize) -> Result<GroomReport> {
    let done = file_lengths(store, &[Status::Done, Status::Archived])?;
    let done_median = median(done.into_iter().map(|(_, len)| len).collect());
    let base = done_median.unwrap_or(GROOM_FALLBACK_MEDIAN);
    let threshold = ((base as f64 * ratio) as usize).max(min_chars);

    let candidates = file_lengths(store, &[Status::Stub, Status::Backlog])?;
    let audited = candidates.len();
    let mut needs_detail: Vec<GroomItem> = candidates
        .into_iter()
        .filter(|(_, len)| *len < threshold)
        .map(|(task, length)| GroomItem {
            id: task.id,
            title: task.title,
            status: task.status,
            length,
        })
        .collect();
    needs_detail.sort_by(|a, b| a.length.cmp(&b.length).then(a.id.cmp(&b.id)));

    Ok(GroomReport {
        done_median,
        threshold,
        audited,
        needs_detail,
    })
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Tally {
    pub tasks: usize,
    pub story_points: u32,
}

impl Tally {
    fn add(&mut self, story_points: u32) {
        self.tasks += 1;
        self.story_points += story_points;
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Stats {
    pub total: Tally,
    pub by_status: BTreeMap<String, Tally>,
    pub by_priority: BTreeMap<String, Tally>,
    pub by_epic: BTreeMap<String, Tally>,
}

#[derive(Debug, Clone, Default)]
pub struct StatsFilter {
    pub epic: Option<String>,
    pub milestone: Option<String>,
    pub include_archived: bool,
}

/// Counts and story points from the manifest.
pub fn stats(store: &TaskStore, filter: &StatsFilter) -> Result<Stats> {
    let epic = filter.epic.as_deref().map(str::to_ascii_uppercase);
    let mut stats = Stats::default();
    for row in store.manifest_rows()? {
        if row.status == Status::Archived && !filter.include_archived {
            continue;
        }
        if epic.as_deref().is_some_and(|e| e != row.epic) {
            continue;
        }
        if filter
            .milestone
            .as_deref()
            .is_some_and(|m| row.milestone.as_deref() != Some(m))
        {
            continue;
        }
        stats.total.add(row.story_points);
        stats
            .by_status
            .entry(row.status.to_string())
            .or_default()
            .add(row.story_points);
        stats
            .by_priority
            .entry(row.priority.as_str().to_string())
            .or_default()
            .add(row.story_points);
        stats.by_epic.entry(row.epic).or_default().add(row.story_points);
    }
    Ok(stats)
}
