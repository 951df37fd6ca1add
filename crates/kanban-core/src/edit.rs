//! Field edits that do not change status. Each one appends a history entry
//! and rewrites the task.

use crate::config::Registry;
use crate::error::{KanbanError, Result};
use crate::issues;
use crate::store::TaskStore;
use crate::task::{HistoryEntry, TaskRecord};
use crate::types::{HistoryAction, VerificationStatus};
use chrono::Utc;
use tracing::warn;

fn append_unique(list: &mut Vec<String>, items: &[String]) -> Vec<String> {
    let mut added = Vec::new();
    for item in items.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if !list.iter().any(|x| x == item) {
            list.push(item.to_string());
            added.push(item.to_string());
        }
    }
    added
}

// ---------------------------------------------------------------------------
// link
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct LinkRequest {
    pub code: Vec<String>,
    pub docs: Vec<String>,
    pub plans: Vec<String>,
    pub tests: Vec<String>,
    pub nfrs: Vec<String>,
    pub verify: Option<String>,
    pub commit: Option<String>,
}

impl LinkRequest {
    fn is_empty(&self) -> bool {
        self.code.is_empty()
            && self.docs.is_empty()
            && self.plans.is_empty()
            && self.tests.is_empty()
            && self.nfrs.is_empty()
            && self.verify.is_none()
            && self.commit.is_none()
    }
}

/// Attach references, NFRs, a verification command or a commit hash.
/// A new verification command resets the verification result to pending.
pub fn link(store: &TaskStore, id: &str, req: LinkRequest) -> Result<TaskRecord> {
    if req.is_empty() {
        return Err(KanbanError::InvalidInput(
            "nothing to link: pass --code, --docs, --plan, --test, --nfr, --verify or --commit".into(),
        ));
    }
    let mut task = store.load(id)?;
    let mut entry = HistoryEntry::new(HistoryAction::Link).actor(store.actor());

    let refs = &mut task.references;
    for (kind, list, items) in [
        ("code", &mut refs.code, &req.code),
        ("docs", &mut refs.docs, &req.docs),
        ("plans", &mut refs.plans, &req.plans),
        ("tests", &mut refs.tests, &req.tests),
    ] {
        let added = append_unique(list, items);
        if !added.is_empty() {
            entry = entry.meta(kind, added.join(","));
        }
    }

    if !req.nfrs.is_empty() {
        let registry = Registry::load(store.root())?;
        let upper: Vec<String> = req.nfrs.iter().map(|n| n.trim().to_ascii_uppercase()).collect();
        for nfr in upper.iter().filter(|n| !registry.nfrs.contains_key(n.as_str())) {
            warn!(%nfr, "NFR is not in nfrs.toml");
        }
        let added = append_unique(&mut task.nfrs, &upper);
        if !added.is_empty() {
            entry = entry.meta("nfrs", added.join(","));
        }
    }

    if let Some(cmd) = req.verify.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        if task.verification.command.as_deref() != Some(cmd) {
            task.verification.command = Some(cmd.to_string());
            task.verification.status = VerificationStatus::Pending;
            task.verification.output = None;
        }
        entry = entry.meta("verify", cmd);
    }
    if let Some(hash) = req.commit.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        task.commit_hash = Some(hash.to_string());
        entry = entry.meta("commit", hash);
    }

    task.push_history(entry);
    store.write(&mut task)?;
    Ok(task)
}

// ---------------------------------------------------------------------------
// tag / assign / sprint
// ---------------------------------------------------------------------------

pub fn tag(store: &TaskStore, id: &str, add: &[String], remove: &[String]) -> Result<TaskRecord> {
    let mut task = store.load(id)?;
    let added = append_unique(&mut task.tags, add);
    let mut removed = Vec::new();
    task.tags.retain(|t| {
        let hit = remove.iter().any(|r| r.trim() == t);
        if hit {
            removed.push(t.clone());
        }
        !hit
    });
    if added.is_empty() && removed.is_empty() {
        return Ok(task);
    }

    let mut entry = HistoryEntry::new(HistoryAction::Tag).actor(store.actor());
    if !added.is_empty() {
        entry = entry.meta("added", added.join(","));
    }
    if !removed.is_empty() {
        entry = entry.meta("removed", removed.join(","));
    }
    task.push_history(entry);
    store.write(&mut task)?;
    Ok(task)
}

/// Set or clear (`None`) the milestone. The milestone must exist in
/// `milestones.toml`.
pub fn assign(store: &TaskStore, id: &str, milestone: Option<&str>) -> Result<TaskRecord> {
    let milestone = milestone.map(str::trim).filter(|m| !m.is_empty());
    if let Some(m) = milestone {
        Registry::load(store.root())?.milestone(m)?;
    }

    let mut task = store.load(id)?;
    if task.milestone.as_deref() == milestone {
        return Ok(task);
    }
    let previous = task.milestone.take();
    task.milestone = milestone.map(str::to_string);
    let mut entry = HistoryEntry::new(HistoryAction::Assign).actor(store.actor());
    if let Some(p) = previous {
        entry = entry.meta("from", p);
    }
    if let Some(m) = milestone {
        entry = entry.meta("milestone", m);
    }
    task.push_history(entry);
    store.write(&mut task)?;
    Ok(task)
}

/// Add tasks to (or take them out of) the sprint. Returns the ids that changed.
pub fn sprint(store: &TaskStore, ids: &[String], in_sprint: bool) -> Result<Vec<String>> {
    let mut changed = Vec::new();
    for id in ids {
        let mut task = store.load(id)?;
        if task.in_sprint == in_sprint {
            continue;
        }
        task.in_sprint = in_sprint;
        task.push_history(
            HistoryEntry::new(HistoryAction::Sprint)
                .actor(store.actor())
                .meta("in_sprint", in_sprint.to_string()),
        );
        store.write(&mut task)?;
        changed.push(task.id);
    }
    Ok(changed)
}

// ---------------------------------------------------------------------------
// issues
// ---------------------------------------------------------------------------

pub fn add_issue(store: &TaskStore, id: &str, description: &str) -> Result<TaskRecord> {
    let description = description.trim();
    if description.is_empty() {
        return Err(KanbanError::InvalidInput("issue description must not be empty".into()));
    }
    let mut task = store.load(id)?;
    task.content = issues::append_issue(&task.content, description, Utc::now());
    task.push_history(
        HistoryEntry::new(HistoryAction::Issue)
            .reason(Some(description))
            .actor(store.actor()),
    );
    store.write(&mut task)?;
    Ok(task)
}
