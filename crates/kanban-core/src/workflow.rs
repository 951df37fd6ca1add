use crate::audit;
use crate::config::Settings;
use crate::error::{KanbanError, Result};
use crate::gate;
use crate::paths;
use crate::store::TaskStore;
use crate::task::{HistoryEntry, TaskRecord};
use crate::types::{HistoryAction, Resolution, Status};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use tracing::info;

pub const DEFAULT_OVERRIDE_REASON: &str = "No reason provided";

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub id: String,
    pub from: Status,
    pub to: Status,
    pub overridden: bool,
}

/// A request that needed no change (already at the target, already blocked...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unchanged {
    pub id: String,
    pub status: Status,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Moved(Transition),
    Unchanged(Unchanged),
}

#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub id: String,
    pub error: String,
}

/// Per-id results of a batch command. One failing id never stops the rest.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub moved: Vec<Transition>,
    pub unchanged: Vec<Unchanged>,
    pub failed: Vec<Failure>,
    pub hints: Vec<String>,
}

impl BatchReport {
    fn record(&mut self, id: &str, result: Result<Outcome>) {
        match result {
            Ok(Outcome::Moved(t)) => self.moved.push(t),
            Ok(Outcome::Unchanged(u)) => self.unchanged.push(u),
            Err(e) => self.failed.push(Failure {
                id: id.to_string(),
                error: e.to_string(),
            }),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

fn unchanged(task: &TaskRecord, note: impl Into<String>) -> Outcome {
    Outcome::Unchanged(Unchanged {
        id: task.id.clone(),
        status: task.status,
        note: note.into(),
    })
}

fn require_reason(reason: Option<&str>, operation: &str) -> Result<String> {
    reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .ok_or_else(|| KanbanError::MissingReason(operation.to_string()))
}

/// `archived` and `blocked` have their own commands; promote/demote refuse them.
fn check_chain_target(target: Status) -> Result<()> {
    match target {
        Status::Archived => Err(KanbanError::InvalidInput(
            "archived is reached through 'kanban archive'".into(),
        )),
        Status::Blocked => Err(KanbanError::InvalidInput(
            "blocked is reached through 'kanban block'".into(),
        )),
        _ => Ok(()),
    }
}

/// Set the new status, keeping `blocked_reason` present exactly while blocked.
fn apply_status(task: &mut TaskRecord, to: Status, blocked_reason: Option<&str>) {
    task.status = to;
    task.blocked_reason = if to == Status::Blocked {
        blocked_reason.map(str::to_string)
    } else {
        None
    };
}

/// Record the override in the task history and the global log.
fn record_override(
    store: &TaskStore,
    task: &mut TaskRecord,
    to: Status,
    operation: &str,
    reason: &str,
) -> Result<()> {
    let from = task.status;
    task.push_history(
        HistoryEntry::transition(HistoryAction::Override, from, to)
            .reason(Some(reason))
            .actor(store.actor())
            .meta("operation", operation),
    );
    audit::log_override(store.root(), &task.id, from, to, reason)
}

// ---------------------------------------------------------------------------
// promote / demote
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PromoteRequest {
    pub target: Option<Status>,
    pub commit: Option<String>,
    pub override_gates: bool,
    pub reason: Option<String>,
}

/// Default forward target: regression goes back to qa, everything else one
/// step along the chain.
pub fn promote_target(from: Status) -> Option<Status> {
    match from {
        Status::Regression => Some(Status::Qa),
        other => other.next(),
    }
}

pub fn promote(store: &TaskStore, id: &str, req: PromoteRequest) -> Result<Outcome> {
    let mut task = store.load(id)?;
    let from = task.status;
    let commit = req
        .commit
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    if from == Status::Blocked && !req.override_gates {
        let label = req.target.map(|t| t.to_string()).unwrap_or_else(|| "next".into());
        gate::validate(&task, req.target.unwrap_or(Status::Backlog), commit)
            .into_result(&task, &label)?;
    }

    let target = match req.target.or_else(|| promote_target(from)) {
        Some(t) => t,
        None if from == Status::Done => {
            return Ok(unchanged(&task, "already at final status: done"));
        }
        None => {
            return Err(KanbanError::InvalidInput(format!(
                "{} is {from}, which has no next status; use 'kanban move'",
                task.id
            )))
        }
    };
    check_chain_target(target)?;
    if target == from {
        return Ok(unchanged(&task, format!("already {from}")));
    }

    if req.override_gates {
        let reason = req
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_OVERRIDE_REASON);
        record_override(store, &mut task, target, "promote", reason)?;
    } else {
        gate::validate(&task, target, commit).into_result(&task, target.as_str())?;
    }

    if let Some(hash) = commit {
        task.commit_hash = Some(hash.to_string());
    }
    let mut entry = HistoryEntry::transition(HistoryAction::Promote, from, target)
        .reason(req.reason.as_deref())
        .actor(store.actor());
    if let Some(hash) = commit {
        entry = entry.meta("commit", hash);
    }
    task.push_history(entry);
    apply_status(&mut task, target, None);
    store.write(&mut task)?;
    info!(id = %task.id, %from, to = %target, "promoted");

    Ok(Outcome::Moved(Transition {
        id: task.id,
        from,
        to: target,
        overridden: req.override_gates,
    }))
}

#[derive(Debug, Clone, Default)]
pub struct DemoteRequest {
    pub target: Option<Status>,
    pub reason: Option<String>,
    pub override_gates: bool,
}

/// Default backward target: qa fails review into regression, regression goes
/// back to active, everything else one step back along the chain.
pub fn demote_target(from: Status) -> Option<Status> {
    match from {
        Status::Qa => Some(Status::Regression),
        Status::Regression => Some(Status::Active),
        other => other.previous(),
    }
}

pub fn demote(store: &TaskStore, id: &str, req: DemoteRequest) -> Result<Outcome> {
    let mut task = store.load(id)?;
    let from = task.status;
    let reason = req
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());

    if from == Status::Blocked && !req.override_gates {
        let label = req.target.map(|t| t.to_string()).unwrap_or_else(|| "previous".into());
        gate::validate_demotion(&task, reason).into_result(&task, &label)?;
    }

    let target = match req.target.or_else(|| demote_target(from)) {
        Some(t) => t,
        None if from == Status::Stub => {
            return Ok(unchanged(&task, "already at initial status: stub"));
        }
        None => {
            return Err(KanbanError::InvalidInput(format!(
                "{} is {from}, which has no previous status; use 'kanban move'",
                task.id
            )))
        }
    };
    check_chain_target(target)?;
    if target == from {
        return Ok(unchanged(&task, format!("already {from}")));
    }

    if req.override_gates {
        record_override(
            store,
            &mut task,
            target,
            "demote",
            reason.unwrap_or(DEFAULT_OVERRIDE_REASON),
        )?;
    } else {
        gate::validate_demotion(&task, reason).into_result(&task, target.as_str())?;
    }

    if from == Status::Done {
        if let Some(r) = reason {
            task.demotion_reason = Some(r.to_string());
        }
    }
    task.push_history(
        HistoryEntry::transition(HistoryAction::Demote, from, target)
            .reason(reason)
            .actor(store.actor()),
    );
    apply_status(&mut task, target, None);
    store.write(&mut task)?;
    info!(id = %task.id, %from, to = %target, "demoted");

    Ok(Outcome::Moved(Transition {
        id: task.id,
        from,
        to: target,
        overridden: req.override_gates,
    }))
}

// ---------------------------------------------------------------------------
// move / block / unblock
// ---------------------------------------------------------------------------

/// Advice when `move` is used for what promote or demote would do with gates.
pub fn move_hint(from: Status, to: Status) -> Option<String> {
    if promote_target(from) == Some(to) {
        Some(format!(
            "{from} -> {to} is a normal promotion; 'kanban promote' runs the gate checks"
        ))
    } else if demote_target(from) == Some(to) {
        Some(format!("{from} -> {to} is a normal demotion; prefer 'kanban demote'"))
    } else {
        None
    }
}

/// Unconditional status change for each id. No gates run; a reason is required.
pub fn move_tasks(
    store: &TaskStore,
    ids: &[String],
    target: Status,
    reason: Option<&str>,
) -> Result<BatchReport> {
    let reason = require_reason(reason, "move")?;
    let mut report = BatchReport::default();
    for id in ids {
        let result = move_one(store, id, target, &reason, &mut report.hints);
        report.record(id, result);
    }
    Ok(report)
}

fn move_one(
    store: &TaskStore,
    id: &str,
    target: Status,
    reason: &str,
    hints: &mut Vec<String>,
) -> Result<Outcome> {
    let mut task = store.load(id)?;
    let from = task.status;
    if from == target {
        return Ok(unchanged(&task, format!("already {target}")));
    }
    if let Some(hint) = move_hint(from, target) {
        hints.push(format!("{}: {hint}", task.id));
    }
    task.push_history(
        HistoryEntry::transition(HistoryAction::Move, from, target)
            .reason(Some(reason))
            .actor(store.actor()),
    );
    apply_status(&mut task, target, Some(reason));
    store.write(&mut task)?;
    Ok(Outcome::Moved(Transition {
        id: task.id,
        from,
        to: target,
        overridden: false,
    }))
}

/// Park each task in `blocked`. Already-blocked tasks keep their reason.
pub fn block(store: &TaskStore, ids: &[String], reason: Option<&str>) -> Result<BatchReport> {
    let reason = require_reason(reason, "block")?;
    let mut report = BatchReport::default();
    for id in ids {
        report.record(id, block_one(store, id, &reason));
    }
    Ok(report)
}

fn block_one(store: &TaskStore, id: &str, reason: &str) -> Result<Outcome> {
    let mut task = store.load(id)?;
    if task.status == Status::Blocked {
        let note = format!(
            "already blocked: {}",
            task.blocked_reason.as_deref().unwrap_or("no reason provided")
        );
        return Ok(unchanged(&task, note));
    }
    let from = task.status;
    task.push_history(
        HistoryEntry::transition(HistoryAction::Block, from, Status::Blocked)
            .reason(Some(reason))
            .actor(store.actor()),
    );
    apply_status(&mut task, Status::Blocked, Some(reason));
    store.write(&mut task)?;
    Ok(Outcome::Moved(Transition {
        id: task.id,
        from,
        to: Status::Blocked,
        overridden: false,
    }))
}

/// Release blocked tasks. The pre-block status is not remembered; every
/// unblocked task lands in backlog.
pub fn unblock(store: &TaskStore, ids: &[String], reason: Option<&str>) -> Result<BatchReport> {
    let mut report = BatchReport::default();
    for id in ids {
        report.record(id, unblock_one(store, id, reason));
    }
    Ok(report)
}

fn unblock_one(store: &TaskStore, id: &str, reason: Option<&str>) -> Result<Outcome> {
    let mut task = store.load(id)?;
    if task.status != Status::Blocked {
        let note = format!("not blocked (status: {})", task.status);
        return Ok(unchanged(&task, note));
    }
    task.push_history(
        HistoryEntry::transition(HistoryAction::Unblock, Status::Blocked, Status::Backlog)
            .reason(reason)
            .actor(store.actor()),
    );
    apply_status(&mut task, Status::Backlog, None);
    store.write(&mut task)?;
    Ok(Outcome::Moved(Transition {
        id: task.id,
        from: Status::Blocked,
        to: Status::Backlog,
        overridden: false,
    }))
}

// ---------------------------------------------------------------------------
// resolve
// ---------------------------------------------------------------------------

static RESOLVABLE_RE: OnceLock<Regex> = OnceLock::new();

fn resolvable_re() -> &'static Regex {
    RESOLVABLE_RE.get_or_init(|| Regex::new(r"^(BUGS|REG|DEF)").unwrap())
}

pub fn is_resolvable(epic: &str) -> bool {
    resolvable_re().is_match(epic)
}

#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub resolution: Resolution,
    pub reason: Option<String>,
    pub duplicate_of: Option<String>,
}

/// Close a bug-family task straight to `done` with a resolution. The qa gate
/// does not apply.
pub fn resolve(store: &TaskStore, id: &str, req: ResolveRequest) -> Result<Transition> {
    let mut task = store.load(id)?;
    if !is_resolvable(&task.epic) {
        return Err(KanbanError::NotResolvable { id: task.id });
    }
    let reason = require_reason(req.reason.as_deref(), "resolve")?;
    let duplicate_of = req
        .duplicate_of
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(paths::normalize_reference)
        .transpose()?;
    if req.resolution == Resolution::Duplicate && duplicate_of.is_none() {
        return Err(KanbanError::InvalidInput(
            "resolution 'duplicate' requires --duplicate-of <ID>".into(),
        ));
    }

    let from = task.status;
    task.resolution = Some(req.resolution);
    task.resolution_reason = Some(reason.clone());
    task.duplicate_of = duplicate_of.clone();

    let mut entry = HistoryEntry::transition(HistoryAction::Resolve, from, Status::Done)
        .reason(Some(&reason))
        .actor(store.actor())
        .meta("resolution", req.resolution.as_str());
    if let Some(dup) = &duplicate_of {
        entry = entry.meta("duplicate_of", dup.as_str());
    }
    task.push_history(entry);
    apply_status(&mut task, Status::Done, None);
    store.write(&mut task)?;
    info!(id = %task.id, resolution = %req.resolution, "resolved");

    Ok(Transition {
        id: task.id,
        from,
        to: Status::Done,
        overridden: false,
    })
}

// ---------------------------------------------------------------------------
// archive
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ArchiveRequest {
    pub ids: Vec<String>,
    pub all_done: bool,
    /// Explicit acknowledgement that signoff rules apply.
    pub signoff: bool,
    pub reason: Option<String>,
    pub dry_run: bool,
    /// Skip the bulk confirmation.
    pub yes: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveReport {
    pub dry_run: bool,
    pub cancelled: bool,
    pub signoff_mode: bool,
    pub eligible: Vec<String>,
    pub archived: Vec<String>,
    pub failed: Vec<Failure>,
}

/// Move done tasks to `archived` under the signoff rules. `confirm` is asked
/// once, with the eligible ids, when more than one would be archived and
/// `yes` is not set.
pub fn archive<F>(store: &TaskStore, req: ArchiveRequest, confirm: F) -> Result<ArchiveReport>
where
    F: FnOnce(&[String]) -> bool,
{
    if !req.signoff {
        return Err(KanbanError::SignoffRequired);
    }
    let mut settings = Settings::load(store.root())?;
    let signoff_mode = settings.features.signoff_mode;
    let reason = req
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());

    let targets: Vec<String> = if req.all_done {
        store
            .manifest_rows()?
            .into_iter()
            .filter(|r| r.status == Status::Done)
            .map(|r| r.id)
            .collect()
    } else {
        req.ids.clone()
    };

    let mut report = ArchiveReport {
        dry_run: req.dry_run,
        signoff_mode,
        ..Default::default()
    };
    let mut eligible: Vec<TaskRecord> = Vec::new();
    for id in &targets {
        let checked = store.load(id).and_then(|task| {
            let listed = settings.is_signed_off(&task.id);
            gate::validate_archive(&task, signoff_mode, listed, reason)
                .into_result(&task, Status::Archived.as_str())
                .map(|()| task)
        });
        match checked {
            Ok(task) => eligible.push(task),
            Err(e) => report.failed.push(Failure {
                id: id.clone(),
                error: e.to_string(),
            }),
        }
    }
    report.eligible = eligible.iter().map(|t| t.id.clone()).collect();

    if req.dry_run || eligible.is_empty() {
        return Ok(report);
    }
    if eligible.len() > 1 && !req.yes && !confirm(&report.eligible) {
        report.cancelled = true;
        return Ok(report);
    }

    for mut task in eligible {
        let listed = settings.is_signed_off(&task.id);
        task.push_history(
            HistoryEntry::transition(HistoryAction::Archive, task.status, Status::Archived)
                .reason(reason)
                .actor(store.actor())
                .meta("signoff_mode", signoff_mode.to_string())
                .meta("signoff_listed", listed.to_string()),
        );
        apply_status(&mut task, Status::Archived, None);
        match store.write(&mut task) {
            Ok(()) => report.archived.push(task.id),
            Err(e) => report.failed.push(Failure {
                id: task.id,
                error: e.to_string(),
            }),
        }
    }

    if !settings.signoff_remove(&report.archived).is_empty() {
        settings.save(store.root())?;
    }
    Ok(report)
}
