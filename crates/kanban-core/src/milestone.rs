//! Milestone progress and status changes in `milestones.toml`.

use crate::config::{Milestone, Registry};
use crate::error::Result;
use crate::manifest::ManifestRow;
use crate::store::TaskStore;
use crate::types::Status;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

pub const ACTIVE: &str = "active";
pub const COMPLETED: &str = "completed";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MilestoneStats {
    pub total_tasks: usize,
    /// Done or archived.
    pub completed_tasks: usize,
    pub story_points_total: u32,
    pub story_points_completed: u32,
    pub story_points_remaining: u32,
    pub by_status: BTreeMap<String, usize>,
    /// Completed story points as a percentage of `goal_sp`, when a goal is set.
    pub goal_progress: Option<f64>,
}

fn is_complete(status: Status) -> bool {
    matches!(status, Status::Done | Status::Archived)
}

impl MilestoneStats {
    fn tally(rows: &[ManifestRow], goal_sp: u32) -> Self {
        let mut stats = Self::default();
        for row in rows {
            stats.total_tasks += 1;
            stats.story_points_total += row.story_points;
            if is_complete(row.status) {
                stats.completed_tasks += 1;
                stats.story_points_completed += row.story_points;
            }
            *stats.by_status.entry(row.status.to_string()).or_default() += 1;
        }
        stats.story_points_remaining = stats
            .story_points_total
            .saturating_sub(stats.story_points_completed);
        stats.goal_progress = (goal_sp > 0)
            .then(|| f64::from(stats.story_points_completed) * 100.0 / f64::from(goal_sp));
        stats
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MilestoneTask {
    pub id: String,
    pub title: String,
    pub status: Status,
    pub story_points: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MilestoneReport {
    pub id: String,
    #[serde(flatten)]
    pub milestone: Milestone,
    pub stats: MilestoneStats,
    pub tasks: Vec<MilestoneTask>,
}

/// Rows assigned to `id`, archived ones included, in id order.
fn assigned_rows(store: &TaskStore, id: &str) -> Result<Vec<ManifestRow>> {
    let mut rows: Vec<ManifestRow> = store
        .manifest_rows()?
        .into_iter()
        .filter(|r| r.milestone.as_deref() == Some(id))
        .collect();
    rows.sort_by(|a, b| a.epic.cmp(&b.epic).then(a.number.cmp(&b.number)));
    Ok(rows)
}

pub fn show(store: &TaskStore, id: &str) -> Result<MilestoneReport> {
    let registry = Registry::load(store.root())?;
    let milestone = registry.milestone(id)?.clone();
    let id = id.trim();
    let rows = assigned_rows(store, id)?;
    Ok(MilestoneReport {
        id: id.to_string(),
        stats: MilestoneStats::tally(&rows, milestone.goal_sp),
        milestone,
        tasks: rows
            .iter()
            .map(|r| MilestoneTask {
                id: r.id.clone(),
                title: r.title.clone(),
                status: r.status,
                story_points: r.story_points,
            })
            .collect(),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub id: String,
    pub name: String,
    pub from: String,
    pub to: String,
    pub changed: bool,
    /// Assigned tasks not yet done or archived.
    pub incomplete: Vec<String>,
}

fn set_status(store: &TaskStore, id: &str, to: &str) -> Result<StatusChange> {
    let mut registry = Registry::load(store.root())?;
    let id = id.trim();
    let current = registry.milestone(id)?;
    let mut change = StatusChange {
        id: id.to_string(),
        name: current.name.clone(),
        from: current.status.clone(),
        to: to.to_string(),
        changed: current.status != to,
        incomplete: Vec::new(),
    };
    if !change.changed {
        return Ok(change);
    }

    if to == COMPLETED {
        change.incomplete = assigned_rows(store, id)?
            .into_iter()
            .filter(|r| !is_complete(r.status))
            .map(|r| r.id)
            .collect();
        if !change.incomplete.is_empty() {
            warn!(
                milestone = %id,
                incomplete = change.incomplete.len(),
                "completing milestone with unfinished tasks"
            );
        }
    }
    if let Some(m) = registry.milestones.get_mut(id) {
        m.status = to.to_string();
    }
    registry.save_milestones(store.root())?;
    info!(milestone = %id, from = %change.from, to, "milestone status changed");
    Ok(change)
}

/// Mark a milestone active.
pub fn start(store: &TaskStore, id: &str) -> Result<StatusChange> {
    set_status(store, id, ACTIVE)
}

/// Mark a milestone completed. Unfinished tasks are reported, not refused.
pub fn complete(store: &TaskStore, id: &str) -> Result<StatusChange> {
    set_status(store, id, COMPLETED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit;
    use crate::error::KanbanError;
    use crate::store::tests::{put, store};

    fn assign(store: &TaskStore, id: &str, status: Status, sp: u32, milestone: &str) {
        let mut task = put(store, id, status);
        task.story_points = sp;
        store.write(&mut task).unwrap();
        edit::assign(store, id, Some(milestone)).unwrap();
    }

    #[test]
    fn show_counts_assigned_tasks() {
        let (_dir, store) = store();
        assign(&store, "FEAT-01", Status::Done, 5, "milestone-1");
        assign(&store, "FEAT-02", Status::Active, 3, "milestone-1");
        assign(&store, "FEAT-03", Status::Archived, 2, "milestone-1");
        assign(&store, "BUGS-01", Status::Ready, 8, "milestone-2");

        let report = show(&store, "milestone-1").unwrap();
        assert_eq!(report.milestone.name, "Foundation MVP");
        let ids: Vec<_> = report.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["FEAT-01", "FEAT-02", "FEAT-03"]);
        assert_eq!(report.stats.total_tasks, 3);
        assert_eq!(report.stats.completed_tasks, 2);
        assert_eq!(report.stats.story_points_total, 10);
        assert_eq!(report.stats.story_points_completed, 7);
        assert_eq!(report.stats.story_points_remaining, 3);
        assert_eq!(report.stats.by_status["done"], 1);
        assert_eq!(report.stats.goal_progress, Some(14.0));
    }

    #[test]
    fn start_and_complete_rewrite_the_registry() {
        let (_dir, store) = store();
        assign(&store, "FEAT-01", Status::Qa, 1, "milestone-2");

        let started = start(&store, "milestone-2").unwrap();
        assert!(started.changed);
        assert_eq!((started.from.as_str(), started.to.as_str()), ("planned", ACTIVE));
        assert!(!start(&store, "milestone-2").unwrap().changed);

        let completed = complete(&store, "milestone-2").unwrap();
        assert_eq!(completed.incomplete, vec!["FEAT-01"]);
        let registry = Registry::load(store.root()).unwrap();
        assert_eq!(registry.milestones["milestone-2"].status, COMPLETED);
        assert_eq!(registry.milestones["milestone-1"].status, ACTIVE);

        assert!(matches!(
            complete(&store, "milestone-7"),
            Err(KanbanError::InvalidInput(_))
        ));
    }
}
