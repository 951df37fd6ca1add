//! `manifest.tsv`: one row per live task, derived from the task files.
//!
//! The manifest is a cache. Readers that find it missing, empty or
//! unparseable rebuild it from `status/` instead of failing.

use crate::frontmatter::de::parse_timestamp;
use crate::task::TaskRecord;
use crate::types::{Priority, Status, VerificationStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;

pub const COLUMNS: [&str; 20] = [
    "id",
    "epic",
    "number",
    "status",
    "title",
    "story_points",
    "priority",
    "created",
    "updated",
    "tags",
    "dependencies",
    "blocks",
    "verification_status",
    "assigned",
    "milestone",
    "blocked_reason",
    "in_sprint",
    "commit_hash",
    "demotion_reason",
    "auto_id",
];

// ---------------------------------------------------------------------------
// ManifestRow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestRow {
    pub id: String,
    pub epic: String,
    pub number: u32,
    pub status: Status,
    pub title: String,
    pub story_points: u32,
    pub priority: Priority,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub tags: Vec<String>,
    pub dependencies: Vec<String>,
    pub blocks: Vec<String>,
    pub verification_status: VerificationStatus,
    pub assigned: Option<String>,
    pub milestone: Option<String>,
    pub blocked_reason: Option<String>,
    pub in_sprint: bool,
    pub commit_hash: Option<String>,
    pub demotion_reason: Option<String>,
    pub auto_id: Option<u64>,
}

impl ManifestRow {
    pub fn from_task(task: &TaskRecord) -> Self {
        Self {
            id: task.id.clone(),
            epic: task.epic.clone(),
            number: task.number,
            status: task.status,
            title: task.title.clone(),
            story_points: task.story_points,
            priority: task.priority,
            created: task.created,
            updated: task.updated,
            tags: task.tags.clone(),
            dependencies: task.dependencies.clone(),
            blocks: task.blocks.clone(),
            verification_status: task.verification.status,
            assigned: task.assigned.clone(),
            milestone: task.milestone.clone(),
            blocked_reason: task.blocked_reason.clone(),
            in_sprint: task.in_sprint,
            commit_hash: task.commit_hash.clone(),
            demotion_reason: task.demotion_reason.clone(),
            auto_id: task.auto_id,
        }
    }

    fn fields(&self) -> [String; 20] {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        [
            self.id.clone(),
            self.epic.clone(),
            self.number.to_string(),
            self.status.to_string(),
            self.title.clone(),
            self.story_points.to_string(),
            self.priority.to_string(),
            self.created.to_rfc3339(),
            self.updated.to_rfc3339(),
            join_list(&self.tags),
            join_list(&self.dependencies),
            join_list(&self.blocks),
            self.verification_status.to_string(),
            opt(&self.assigned),
            opt(&self.milestone),
            opt(&self.blocked_reason),
            self.in_sprint.to_string(),
            opt(&self.commit_hash),
            opt(&self.demotion_reason),
            self.auto_id.map(|n| n.to_string()).unwrap_or_default(),
        ]
    }

    /// Build a row from a record line, looking columns up by header name so
    /// manifests written with fewer columns still load.
    fn from_record(header: &[String], cells: &[String]) -> Option<Self> {
        let get = |name: &str| -> &str {
            header
                .iter()
                .position(|h| h == name)
                .and_then(|i| cells.get(i))
                .map(String::as_str)
                .unwrap_or("")
        };
        let opt = |name: &str| {
            let v = get(name);
            (!v.is_empty()).then(|| v.to_string())
        };
        let list = |name: &str| split_list(get(name));

        let id = get("id");
        if id.is_empty() {
            return None;
        }
        let (id_epic, id_number) = crate::paths::parse_task_id(id).ok()?;
        let epoch = DateTime::<Utc>::default();
        Some(Self {
            id: id.to_string(),
            epic: opt("epic").unwrap_or(id_epic),
            number: get("number").parse().unwrap_or(id_number),
            status: get("status").parse().ok()?,
            title: get("title").to_string(),
            story_points: get("story_points").parse().unwrap_or(0),
            priority: get("priority").parse().unwrap_or_default(),
            created: parse_timestamp(get("created")).unwrap_or(epoch),
            updated: parse_timestamp(get("updated")).unwrap_or(epoch),
            tags: list("tags"),
            dependencies: list("dependencies"),
            blocks: list("blocks"),
            verification_status: get("verification_status").parse().unwrap_or_default(),
            assigned: opt("assigned"),
            milestone: opt("milestone"),
            blocked_reason: opt("blocked_reason"),
            in_sprint: matches!(get("in_sprint"), "true" | "True" | "1"),
            commit_hash: opt("commit_hash"),
            demotion_reason: opt("demotion_reason"),
            auto_id: get("auto_id").parse().ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// TSV codec
// ---------------------------------------------------------------------------

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// List cells are comma separated; commas inside an item are written `\,`.
fn join_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| item.replace('\\', "\\\\").replace(',', "\\,"))
        .collect::<Vec<_>>()
        .join(",")
}

fn split_list(cell: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = cell.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => current.push(chars.next().unwrap_or('\\')),
            ',' => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn render(rows: &[ManifestRow]) -> String {
    let mut out = COLUMNS.join("\t");
    out.push('\n');
    for row in rows {
        let cells: Vec<String> = row.fields().iter().map(|f| escape(f)).collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
    out
}

/// Why a manifest could not be used as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unusable {
    Empty,
    Corrupt(String),
}

pub fn parse(text: &str) -> std::result::Result<Vec<ManifestRow>, Unusable> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header: Vec<String> = match lines.next() {
        Some(h) => h.split('\t').map(|c| c.trim().to_string()).collect(),
        None => return Err(Unusable::Empty),
    };
    if !header.iter().any(|h| h == "id") || !header.iter().any(|h| h == "status") {
        return Err(Unusable::Corrupt("header lacks id/status columns".into()));
    }
    let mut rows = Vec::new();
    for (n, line) in lines.enumerate() {
        let cells: Vec<String> = line.split('\t').map(unescape).collect();
        if cells.len() != header.len() {
            return Err(Unusable::Corrupt(format!(
                "row {} has {} cells, header has {}",
                n + 2,
                cells.len(),
                header.len()
            )));
        }
        let row = ManifestRow::from_record(&header, &cells)
            .ok_or_else(|| Unusable::Corrupt(format!("row {} is unreadable", n + 2)))?;
        rows.push(row);
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    /// Priority first, then id.
    #[default]
    Priority,
    Id,
    /// Creation order (auto_id, falling back to created).
    Created,
    Updated,
}

impl std::str::FromStr for SortKey {
    type Err = crate::error::KanbanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "priority" => Ok(SortKey::Priority),
            "id" => Ok(SortKey::Id),
            "created" => Ok(SortKey::Created),
            "updated" => Ok(SortKey::Updated),
            _ => Err(crate::error::KanbanError::InvalidInput(format!(
                "invalid sort key '{s}': expected priority, id, created or updated"
            ))),
        }
    }
}

/// Row filter for `list`. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub epic: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub tag: Option<String>,
    pub milestone: Option<String>,
    pub sprint_only: bool,
    pub include_archived: bool,
    pub sort: SortKey,
}

impl Query {
    pub fn matches(&self, row: &ManifestRow) -> bool {
        if !self.include_archived && self.status.is_none() && row.status == Status::Archived {
            return false;
        }
        if let Some(epic) = &self.epic {
            if !row.epic.eq_ignore_ascii_case(epic) {
                return false;
            }
        }
        if self.status.is_some_and(|s| s != row.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != row.priority) {
            return false;
        }
        if let Some(tag) = &self.tag {
            if !row.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        if let Some(m) = &self.milestone {
            if row.milestone.as_deref() != Some(m.as_str()) {
                return false;
            }
        }
        !(self.sprint_only && !row.in_sprint)
    }

    pub fn apply(&self, rows: Vec<ManifestRow>) -> Vec<ManifestRow> {
        let mut out: Vec<ManifestRow> = rows.into_iter().filter(|r| self.matches(r)).collect();
        out.sort_by(|a, b| compare(self.sort, a, b));
        out
    }
}

fn compare(key: SortKey, a: &ManifestRow, b: &ManifestRow) -> Ordering {
    let by_id = || a.epic.cmp(&b.epic).then(a.number.cmp(&b.number));
    match key {
        SortKey::Priority => a.priority.cmp(&b.priority).then_with(by_id),
        SortKey::Id => by_id(),
        SortKey::Created => match (a.auto_id, b.auto_id) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => a.created.cmp(&b.created),
        }
        .then_with(by_id),
        SortKey::Updated => b.updated.cmp(&a.updated).then_with(by_id),
    }
}
