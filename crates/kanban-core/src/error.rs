use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KanbanError {
    #[error("not initialized: run 'kanban init'")]
    NotInitialized,

    #[error("already initialized: use --force to rewrite the registries")]
    AlreadyInitialized,

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("task already exists: {0}")]
    TaskExists(String),

    #[error("{id}: cannot move {from} -> {to}:\n  - {}", .blockers.join("\n  - "))]
    ValidationBlocked {
        id: String,
        from: String,
        to: String,
        blockers: Vec<String>,
    },

    #[error("malformed task file {}: {reason}", .path.display())]
    MalformedRecord { path: PathBuf, reason: String },

    #[error("invalid task id '{0}': expected EPIC-NN (e.g. FEAT-01)")]
    InvalidTaskId(String),

    #[error("unknown epic: {epic} (available: {available})")]
    UnknownEpic { epic: String, available: String },

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("invalid priority: {0}")]
    InvalidPriority(String),

    #[error("invalid resolution: {0}")]
    InvalidResolution(String),

    #[error("{id} cannot be resolved: only BUGS, REG and DEF tasks take a resolution")]
    NotResolvable { id: String },

    #[error("{0} requires a reason")]
    MissingReason(String),

    #[error("archiving requires explicit signoff acknowledgement (--signoff)")]
    SignoffRequired,

    #[error("no free task number left in epic {0} (max 999)")]
    NumberSpaceExhausted(String),

    #[error("trash entry already exists: {}", .0.display())]
    TrashEntryExists(PathBuf),

    #[error("no trash entry with auto_id {0}")]
    TrashEntryNotFound(u64),

    #[error("{0} has no verification command: set one with 'kanban link {0} --verify <cmd>'")]
    NoVerificationCommand(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, KanbanError>;
