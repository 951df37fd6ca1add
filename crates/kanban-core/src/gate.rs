//! Transition gates.
//!
//! Pure checks over a task and a target status. Nothing here touches disk or
//! mutates the task; the workflow engine decides what to do with a verdict.

use crate::error::{KanbanError, Result};
use crate::task::TaskRecord;
use crate::types::{Status, VerificationStatus};
use serde::Serialize;

pub const MIN_DESCRIPTION_CHARS: usize = 20;

/// Outcome of a gate check: empty `blockers` means the transition may proceed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub blockers: Vec<String>,
}

impl Verdict {
    pub fn pass() -> Self {
        Self::default()
    }

    pub fn is_ok(&self) -> bool {
        self.blockers.is_empty()
    }

    fn block(&mut self, blocker: impl Into<String>) {
        self.blockers.push(blocker.into());
    }

    /// Turn a failed verdict into `ValidationBlocked` for `task`.
    pub fn into_result(self, task: &TaskRecord, target: &str) -> Result<()> {
        if self.is_ok() {
            return Ok(());
        }
        Err(KanbanError::ValidationBlocked {
            id: task.id.clone(),
            from: task.status.to_string(),
            to: target.to_string(),
            blockers: self.blockers,
        })
    }
}

fn blocked_verdict(task: &TaskRecord) -> Verdict {
    let reason = task
        .blocked_reason
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .unwrap_or("no reason provided");
    Verdict {
        blockers: vec![format!(
            "Task is blocked: {reason}. Use 'kanban unblock {}' to unblock first.",
            task.id
        )],
    }
}

/// Forward gate for `task.status -> target`. `commit` stands in for a commit
/// hash not yet stored on the task.
pub fn validate(task: &TaskRecord, target: Status, commit: Option<&str>) -> Verdict {
    if task.status == Status::Blocked {
        return blocked_verdict(task);
    }
    match (task.status, target) {
        (Status::Stub, Status::Backlog) => validate_stub_to_backlog(task),
        (Status::Active, Status::Qa) | (Status::Regression, Status::Qa) => {
            validate_active_to_qa(task)
        }
        (Status::Qa, Status::Done) => validate_qa_to_done(task, commit),
        _ => Verdict::pass(),
    }
}

/// Definition of Ready: a description and an estimate.
pub fn validate_stub_to_backlog(task: &TaskRecord) -> Verdict {
    let mut verdict = Verdict::pass();
    if task.content.trim().chars().count() < MIN_DESCRIPTION_CHARS {
        verdict.block(format!(
            "Task needs description (minimum {MIN_DESCRIPTION_CHARS} characters)"
        ));
    }
    if task.story_points == 0 {
        verdict.block("Task needs story points estimation");
    }
    verdict
}

/// Ready for review: references, tests and a passing verification run.
/// DOCS epics only need doc references.
pub fn validate_active_to_qa(task: &TaskRecord) -> Verdict {
    let mut verdict = Verdict::pass();
    let refs = &task.references;
    if refs.code.is_empty() && refs.docs.is_empty() {
        verdict.block(format!(
            "Task needs code or doc references (use: kanban link {} --code path/to/file or --docs path/to/doc.md)",
            task.id
        ));
    }
    if task.is_docs() {
        if refs.docs.is_empty() {
            verdict.block(format!(
                "DOCS task needs doc references (use: kanban link {} --docs path/to/doc.md)",
                task.id
            ));
        }
        return verdict;
    }
    if refs.tests.is_empty() {
        verdict.block(format!(
            "Task needs test references (use: kanban link {} --test path/to/test)",
            task.id
        ));
    }
    if !task.verification.has_command() {
        verdict.block(format!(
            "Task needs verification command (use: kanban link {} --verify \"test command\")",
            task.id
        ));
    } else if task.verification.status != VerificationStatus::Passed {
        verdict.block(format!(
            "Verification must pass (status: {}). Run: kanban verify {} --update",
            task.verification.status, task.id
        ));
    }
    verdict
}

/// Definition of Done: the work is committed.
pub fn validate_qa_to_done(task: &TaskRecord, commit: Option<&str>) -> Verdict {
    let supplied = commit.is_some_and(|c| !c.trim().is_empty());
    if supplied || task.has_commit_hash() {
        return Verdict::pass();
    }
    Verdict {
        blockers: vec![format!(
            "Task needs commit hash (use: kanban promote {} --commit HASH)",
            task.id
        )],
    }
}

/// Backward gate. Only leaving `done` is guarded; a blocked task must be
/// unblocked before it can move either way.
pub fn validate_demotion(task: &TaskRecord, reason: Option<&str>) -> Verdict {
    if task.status == Status::Blocked {
        return blocked_verdict(task);
    }
    if task.status == Status::Done {
        return validate_done_demotion(reason);
    }
    Verdict::pass()
}

pub fn validate_done_demotion(reason: Option<&str>) -> Verdict {
    if reason.is_some_and(|r| !r.trim().is_empty()) {
        return Verdict::pass();
    }
    Verdict {
        blockers: vec!["Demotion from 'done' requires --reason".to_string()],
    }
}

/// Archival gate. Under signoff mode the list is the only way in; otherwise a
/// reason can stand in for a missing signoff.
pub fn validate_archive(
    task: &TaskRecord,
    signoff_mode: bool,
    signed_off: bool,
    reason: Option<&str>,
) -> Verdict {
    let mut verdict = Verdict::pass();
    if task.status != Status::Done {
        verdict.block(format!(
            "Only done tasks can be archived ({} is {})",
            task.id, task.status
        ));
    }
    let has_reason = reason.is_some_and(|r| !r.trim().is_empty());
    if signoff_mode && !signed_off {
        verdict.block(format!(
            "{} is not on the signoff list (signoff_mode is on; use: kanban signoff add {})",
            task.id, task.id
        ));
    } else if !signoff_mode && !signed_off && !has_reason {
        verdict.block(format!(
            "{} is not on the signoff list; archiving it requires --reason",
            task.id
        ));
    }
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(status: Status) -> TaskRecord {
        let mut t = TaskRecord::new("FEAT", 1, "Login").unwrap();
        t.status = status;
        t
    }

    fn ready_for_qa() -> TaskRecord {
        let mut t = task(Status::Active);
        t.references.code = vec!["src/login.rs".into()];
        t.references.tests = vec!["tests/login.rs".into()];
        t.verification.command = Some("cargo test".into());
        t.verification.status = VerificationStatus::Passed;
        t
    }

    #[test]
    fn empty_stub_fails_both_checks() {
        let verdict = validate(&task(Status::Stub), Status::Backlog, None);
        assert_eq!(verdict.blockers.len(), 2);
        assert!(verdict.blockers[0].contains("description"));
        assert!(verdict.blockers[1].contains("story points"));
    }

    #[test]
    fn stub_with_body_and_points_passes() {
        let mut t = task(Status::Stub);
        t.content = "   a description that is long enough   ".into();
        t.story_points = 3;
        assert!(validate(&t, Status::Backlog, None).is_ok());
        t.content = format!("   {}   ", "x".repeat(19));
        assert!(!validate_stub_to_backlog(&t).is_ok());
    }

    #[test]
    fn complete_task_passes_active_to_qa() {
        assert_eq!(validate(&ready_for_qa(), Status::Qa, None), Verdict::pass());
        let mut regression = ready_for_qa();
        regression.status = Status::Regression;
        assert!(validate(&regression, Status::Qa, None).is_ok());
    }

    #[test]
    fn removing_any_requirement_flips_active_to_qa() {
        let cases: Vec<(&str, Box<dyn Fn(&mut TaskRecord)>)> = vec![
            ("code or doc references", Box::new(|t| t.references.code.clear())),
            ("test references", Box::new(|t| t.references.tests.clear())),
            ("verification command", Box::new(|t| t.verification.command = None)),
            (
                "status: failed",
                Box::new(|t| t.verification.status = VerificationStatus::Failed),
            ),
            (
                "status: pending",
                Box::new(|t| t.verification.status = VerificationStatus::Pending),
            ),
        ];
        for (needle, mutate) in cases {
            let mut t = ready_for_qa();
            mutate(&mut t);
            let verdict = validate_active_to_qa(&t);
            assert!(!verdict.is_ok(), "expected block for {needle}");
            assert!(
                verdict.blockers.iter().any(|b| b.contains(needle)),
                "no blocker mentions {needle}: {:?}",
                verdict.blockers
            );
        }
    }

    #[test]
    fn docs_epic_needs_only_doc_references() {
        let mut t = TaskRecord::new("DOCS", 1, "Guide").unwrap();
        t.status = Status::Active;
        let verdict = validate(&t, Status::Qa, None);
        assert_eq!(verdict.blockers.len(), 2);
        assert!(verdict.blockers[1].starts_with("DOCS task needs doc references"));
        t.references.docs = vec!["docs/guide.md".into()];
        assert!(validate(&t, Status::Qa, None).is_ok());
    }

    #[test]
    fn qa_to_done_accepts_supplied_commit_without_mutation() {
        let t = task(Status::Qa);
        assert!(!validate(&t, Status::Done, None).is_ok());
        assert!(!validate(&t, Status::Done, Some("  ")).is_ok());
        assert!(validate(&t, Status::Done, Some("abc123")).is_ok());
        assert_eq!(t.commit_hash, None);
        let mut stored = task(Status::Qa);
        stored.commit_hash = Some("abc123".into());
        assert!(validate(&stored, Status::Done, None).is_ok());
    }

    #[test]
    fn blocked_takes_precedence() {
        let mut t = ready_for_qa();
        t.status = Status::Blocked;
        t.blocked_reason = Some("waiting on vendor".into());
        let verdict = validate(&t, Status::Qa, None);
        assert_eq!(verdict.blockers.len(), 1);
        assert!(verdict.blockers[0].contains("waiting on vendor"));
        t.blocked_reason = None;
        assert!(validate(&t, Status::Backlog, None).blockers[0].contains("no reason provided"));
        assert!(!validate_demotion(&t, Some("x")).is_ok());
    }

    #[test]
    fn ungated_transitions_pass() {
        assert!(validate(&task(Status::Backlog), Status::Ready, None).is_ok());
        assert!(validate(&task(Status::Ready), Status::Active, None).is_ok());
        assert!(validate(&task(Status::Stub), Status::Done, None).is_ok());
    }

    #[test]
    fn leaving_done_needs_a_reason() {
        let t = task(Status::Done);
        assert!(!validate_demotion(&t, None).is_ok());
        assert!(!validate_demotion(&t, Some(" ")).is_ok());
        assert!(validate_demotion(&t, Some("regressed in prod")).is_ok());
        assert!(validate_demotion(&task(Status::Qa), None).is_ok());
    }

    #[test]
    fn archive_rules() {
        let done = task(Status::Done);
        assert!(validate_archive(&done, true, true, None).is_ok());
        assert!(!validate_archive(&done, true, false, Some("reason")).is_ok());
        assert!(validate_archive(&done, false, false, Some("reason")).is_ok());
        assert!(!validate_archive(&done, false, false, None).is_ok());
        assert!(!validate_archive(&task(Status::Qa), false, true, None).is_ok());
    }

    #[test]
    fn failed_verdict_becomes_validation_error() {
        let t = task(Status::Stub);
        let err = validate(&t, Status::Backlog, None)
            .into_result(&t, "backlog")
            .unwrap_err();
        match err {
            KanbanError::ValidationBlocked { id, from, to, blockers } => {
                assert_eq!((id.as_str(), from.as_str(), to.as_str()), ("FEAT-01", "stub", "backlog"));
                assert_eq!(blockers.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
