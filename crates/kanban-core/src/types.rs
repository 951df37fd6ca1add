use crate::error::KanbanError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Stub,
    Backlog,
    Ready,
    Active,
    Qa,
    Regression,
    Done,
    Archived,
    Blocked,
}

/// The linear promote/demote chain. `regression`, `archived` and `blocked`
/// sit off to the side and are reached through dedicated operations.
const FORWARD: [Status; 6] = [
    Status::Stub,
    Status::Backlog,
    Status::Ready,
    Status::Active,
    Status::Qa,
    Status::Done,
];

impl Status {
    pub fn all() -> &'static [Status] {
        &[
            Status::Stub,
            Status::Backlog,
            Status::Ready,
            Status::Active,
            Status::Qa,
            Status::Regression,
            Status::Done,
            Status::Archived,
            Status::Blocked,
        ]
    }

    fn forward_index(self) -> Option<usize> {
        FORWARD.iter().position(|s| *s == self)
    }

    /// Next status in the forward chain, or `None` at `done` and for statuses
    /// outside the chain.
    pub fn next(self) -> Option<Status> {
        self.forward_index().and_then(|i| FORWARD.get(i + 1).copied())
    }

    pub fn previous(self) -> Option<Status> {
        self.forward_index()
            .and_then(|i| i.checked_sub(1))
            .map(|i| FORWARD[i])
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Stub => "stub",
            Status::Backlog => "backlog",
            Status::Ready => "ready",
            Status::Active => "active",
            Status::Qa => "qa",
            Status::Regression => "regression",
            Status::Done => "done",
            Status::Archived => "archived",
            Status::Blocked => "blocked",
        }
    }

    /// Directory name under `status/`. Total over the enum.
    pub fn dir_name(self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = KanbanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stub" => Ok(Status::Stub),
            "backlog" => Ok(Status::Backlog),
            "ready" => Ok(Status::Ready),
            "active" | "in_progress" => Ok(Status::Active),
            "qa" | "review" => Ok(Status::Qa),
            "regression" => Ok(Status::Regression),
            "done" => Ok(Status::Done),
            "archived" => Ok(Status::Archived),
            "blocked" => Ok(Status::Blocked),
            _ => Err(KanbanError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = KanbanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(KanbanError::InvalidPriority(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// VerificationStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Pending,
    Passed,
    Failed,
    Skipped,
}

impl VerificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Passed => "passed",
            VerificationStatus::Failed => "failed",
            VerificationStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VerificationStatus {
    type Err = KanbanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(VerificationStatus::Pending),
            "passed" => Ok(VerificationStatus::Passed),
            "failed" => Ok(VerificationStatus::Failed),
            "skipped" => Ok(VerificationStatus::Skipped),
            _ => Err(KanbanError::InvalidInput(format!(
                "invalid verification status: {s}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Fixed,
    Duplicate,
    CannotReproduce,
    WontFix,
    ConfigChange,
    DocsOnly,
}

impl Resolution {
    pub fn all() -> &'static [Resolution] {
        &[
            Resolution::Fixed,
            Resolution::Duplicate,
            Resolution::CannotReproduce,
            Resolution::WontFix,
            Resolution::ConfigChange,
            Resolution::DocsOnly,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Fixed => "fixed",
            Resolution::Duplicate => "duplicate",
            Resolution::CannotReproduce => "cannot_reproduce",
            Resolution::WontFix => "wont_fix",
            Resolution::ConfigChange => "config_change",
            Resolution::DocsOnly => "docs_only",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Resolution {
    type Err = KanbanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Resolution::all()
            .iter()
            .copied()
            .find(|r| r.as_str() == normalized)
            .ok_or_else(|| KanbanError::InvalidResolution(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// HistoryAction
// ---------------------------------------------------------------------------

/// What a history entry records. Actions written by other tools (or older
/// versions) survive a load/save cycle through `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HistoryAction {
    Create,
    Promote,
    Demote,
    Move,
    Block,
    Unblock,
    Override,
    Resolve,
    Archive,
    Rename,
    Delete,
    Recover,
    Link,
    Tag,
    Assign,
    Sprint,
    Verify,
    Issue,
    Other(String),
}

impl HistoryAction {
    pub fn as_str(&self) -> &str {
        match self {
            HistoryAction::Create => "create",
            HistoryAction::Promote => "promote",
            HistoryAction::Demote => "demote",
            HistoryAction::Move => "move",
            HistoryAction::Block => "block",
            HistoryAction::Unblock => "unblock",
            HistoryAction::Override => "override",
            HistoryAction::Resolve => "resolve",
            HistoryAction::Archive => "archive",
            HistoryAction::Rename => "rename",
            HistoryAction::Delete => "delete",
            HistoryAction::Recover => "recover",
            HistoryAction::Link => "link",
            HistoryAction::Tag => "tag",
            HistoryAction::Assign => "assign",
            HistoryAction::Sprint => "sprint",
            HistoryAction::Verify => "verify",
            HistoryAction::Issue => "issue",
            HistoryAction::Other(s) => s,
        }
    }

    /// `override` itself, or a legacy `override_<op>` action.
    pub fn is_override(&self) -> bool {
        match self {
            HistoryAction::Override => true,
            HistoryAction::Other(s) => s.starts_with("override_"),
            _ => false,
        }
    }
}

impl From<String> for HistoryAction {
    fn from(s: String) -> Self {
        match s.as_str() {
            "create" => HistoryAction::Create,
            "promote" => HistoryAction::Promote,
            "demote" => HistoryAction::Demote,
            "move" => HistoryAction::Move,
            "block" => HistoryAction::Block,
            "unblock" => HistoryAction::Unblock,
            "override" => HistoryAction::Override,
            "resolve" => HistoryAction::Resolve,
            "archive" => HistoryAction::Archive,
            "rename" => HistoryAction::Rename,
            "delete" => HistoryAction::Delete,
            "recover" => HistoryAction::Recover,
            "link" => HistoryAction::Link,
            "tag" => HistoryAction::Tag,
            "assign" => HistoryAction::Assign,
            "sprint" => HistoryAction::Sprint,
            "verify" => HistoryAction::Verify,
            "issue" => HistoryAction::Issue,
            _ => HistoryAction::Other(s),
        }
    }
}

impl From<HistoryAction> for String {
    fn from(a: HistoryAction) -> Self {
        a.as_str().to_string()
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
