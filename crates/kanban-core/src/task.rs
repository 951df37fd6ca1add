use crate::error::Result;
use crate::paths;
use crate::types::{HistoryAction, Priority, Resolution, Status, VerificationStatus};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// TaskRecord
// ---------------------------------------------------------------------------

/// One task, as stored in `status/<status>/<id>.md`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub title: String,
    pub epic: String,
    pub number: u32,
    pub status: Status,
    pub story_points: u32,
    pub priority: Priority,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub blocks: Vec<String>,
    pub assigned: Option<String>,
    pub milestone: Option<String>,
    pub blocked_reason: Option<String>,
    #[serde(default)]
    pub nfrs: Vec<String>,
    #[serde(default)]
    pub references: References,
    #[serde(default)]
    pub verification: Verification,
    pub commit_hash: Option<String>,
    pub demotion_reason: Option<String>,
    pub resolution: Option<Resolution>,
    pub resolution_reason: Option<String>,
    pub duplicate_of: Option<String>,
    pub auto_id: Option<u64>,
    #[serde(default)]
    pub in_sprint: bool,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub content: String,
}

impl TaskRecord {
    /// A fresh stub with no history and an empty body.
    pub fn new(epic: &str, number: u32, title: &str) -> Result<Self> {
        let id = paths::make_task_id(epic, number)?;
        let now = Utc::now();
        Ok(Self {
            id,
            title: title.to_string(),
            epic: epic.to_string(),
            number,
            status: Status::Stub,
            story_points: 0,
            priority: Priority::default(),
            created: now,
            updated: now,
            tags: Vec::new(),
            dependencies: Vec::new(),
            blocks: Vec::new(),
            assigned: None,
            milestone: None,
            blocked_reason: None,
            nfrs: Vec::new(),
            references: References::default(),
            verification: Verification::default(),
            commit_hash: None,
            demotion_reason: None,
            resolution: None,
            resolution_reason: None,
            duplicate_of: None,
            auto_id: None,
            in_sprint: false,
            history: Vec::new(),
            content: String::new(),
        })
    }

    /// DOCS-family epics swap the code/test/verification gate for doc references.
    pub fn is_docs(&self) -> bool {
        self.epic.starts_with("DOCS")
    }

    pub fn has_commit_hash(&self) -> bool {
        self.commit_hash
            .as_deref()
            .is_some_and(|h| !h.trim().is_empty())
    }

    /// Append to the history log. Entries are never edited or reordered.
    pub fn push_history(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }

    /// Switch identity to `new_id` and rewrite every mention of the old id in
    /// the body.
    pub fn reassign_id(&mut self, new_id: &str) -> Result<()> {
        let (epic, number) = paths::parse_task_id(new_id)?;
        let canonical = paths::make_task_id(&epic, number)?;
        self.content = replace_task_id(&self.content, &self.id, &canonical);
        self.id = canonical;
        self.epic = epic;
        self.number = number;
        Ok(())
    }
}

/// Replace whole-word occurrences of `old_id` with `new_id`.
///
/// `FEAT-01` inside `FEAT-012` is left alone.
pub fn replace_task_id(text: &str, old_id: &str, new_id: &str) -> String {
    let pattern = format!(r"\b{}\b", regex::escape(old_id));
    match Regex::new(&pattern) {
        Ok(re) => re.replace_all(text, regex::NoExpand(new_id)).into_owned(),
        Err(_) => text.to_string(),
    }
}

// ---------------------------------------------------------------------------
// References / Verification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct References {
    #[serde(default)]
    pub code: Vec<String>,
    #[serde(default)]
    pub docs: Vec<String>,
    #[serde(default)]
    pub plans: Vec<String>,
    #[serde(default)]
    pub tests: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub command: Option<String>,
    #[serde(default)]
    pub status: VerificationStatus,
    pub last_run: Option<DateTime<Utc>>,
    pub output: Option<String>,
}

impl Verification {
    pub fn has_command(&self) -> bool {
        self.command.as_deref().is_some_and(|c| !c.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// HistoryEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(deserialize_with = "crate::frontmatter::de::timestamp")]
    pub timestamp: DateTime<Utc>,
    pub action: HistoryAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl HistoryEntry {
    pub fn new(action: HistoryAction) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            from_status: None,
            to_status: None,
            reason: None,
            actor: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Entry for a status change.
    pub fn transition(action: HistoryAction, from: Status, to: Status) -> Self {
        Self::new(action).between(from.as_str(), to.as_str())
    }

    pub fn between(mut self, from: &str, to: &str) -> Self {
        self.from_status = Some(from.to_string());
        self.to_status = Some(to.to_string());
        self
    }

    pub fn reason(mut self, reason: Option<&str>) -> Self {
        self.reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        self
    }

    pub fn actor(mut self, actor: Option<&str>) -> Self {
        self.actor = actor.map(str::to_string);
        self
    }

    pub fn meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}
