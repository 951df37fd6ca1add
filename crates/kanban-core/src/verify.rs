use crate::error::{KanbanError, Result};
use crate::store::TaskStore;
use crate::task::HistoryEntry;
use crate::types::{HistoryAction, VerificationStatus};
use chrono::Utc;
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;
use tracing::{debug, warn};

pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(300);
pub const MAX_OUTPUT_BYTES: usize = 10 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum VerifyOutcome {
    Passed { output: String },
    Failed { output: String },
    TimedOut { seconds: u64 },
}

impl VerifyOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, VerifyOutcome::Passed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub id: String,
    pub command: String,
    #[serde(flatten)]
    pub outcome: VerifyOutcome,
    /// Whether the result was written back to the task.
    pub persisted: bool,
}

/// Run the task's verification command. With `update`, a pass or a failure
/// is written to the task; a timeout never is.
pub fn verify(store: &TaskStore, id: &str, update: bool, timeout: Duration) -> Result<VerifyReport> {
    let mut task = store.load(id)?;
    let command = task
        .verification
        .command
        .clone()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| KanbanError::NoVerificationCommand(task.id.clone()))?;

    let outcome = run_shell(&command, store.root(), timeout)?;
    let result = match &outcome {
        VerifyOutcome::Passed { .. } if update => Some((VerificationStatus::Passed, None)),
        VerifyOutcome::Failed { output } if update => {
            Some((VerificationStatus::Failed, Some(output.clone())))
        }
        _ => None,
    };
    let persist = result.is_some();
    if let Some((status, output)) = result {
        task.verification.status = status;
        task.verification.last_run = Some(Utc::now());
        task.verification.output = output;
        task.push_history(
            HistoryEntry::new(HistoryAction::Verify)
                .actor(store.actor())
                .meta("status", status.as_str()),
        );
        store.write(&mut task)?;
    }
    Ok(VerifyReport {
        id: task.id,
        command,
        outcome,
        persisted: persist,
    })
}

/// Run `command` through `sh -c` in `cwd`. Output is stdout and stderr
/// combined, capped to the last `MAX_OUTPUT_BYTES`.
pub fn run_shell(command: &str, cwd: &Path, timeout: Duration) -> Result<VerifyOutcome> {
    let shell = which::which("sh").map_err(|e| {
        KanbanError::InvalidInput(format!("cannot run verification: no 'sh' on PATH ({e})"))
    })?;
    let mut child = Command::new(shell)
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let pid = child.id();
    debug!(pid, %command, "started verification");

    let stdout = spawn_reader(child.stdout.take());
    let stderr = spawn_reader(child.stderr.take());

    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(child.wait());
    });
    let status: ExitStatus = match rx.recv_timeout(timeout) {
        Ok(result) => result?,
        Err(_) => {
            warn!(pid, secs = timeout.as_secs(), "verification timed out; killing");
            kill(pid);
            return Ok(VerifyOutcome::TimedOut {
                seconds: timeout.as_secs(),
            });
        }
    };

    let output = combine(
        &stdout.join().unwrap_or_default(),
        &stderr.join().unwrap_or_default(),
    );
    Ok(if status.success() {
        VerifyOutcome::Passed { output }
    } else {
        VerifyOutcome::Failed { output }
    })
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut r) = pipe {
            let _ = r.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn combine(stdout: &str, stderr: &str) -> String {
    let joined = match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (false, false) => format!("{}\n{}", stdout.trim_end(), stderr.trim_end()),
        (true, false) => stderr.to_string(),
        _ => stdout.to_string(),
    };
    tail(joined.trim(), MAX_OUTPUT_BYTES).to_string()
}

/// Last `max` bytes of `s`, moved forward to a char boundary.
fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

fn kill(pid: u32) {
    let _ = Command::new("kill")
        .arg("-9")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{put, store};
    use crate::types::Status;

    fn with_command(store: &TaskStore, id: &str, cmd: &str) {
        let mut task = put(store, id, Status::Active);
        task.verification.command = Some(cmd.into());
        store.write(&mut task).unwrap();
    }

    #[test]
    fn pass_is_persisted_only_with_update() {
        let (_dir, store) = store();
        with_command(&store, "FEAT-01", "echo ok");

        let report = verify(&store, "FEAT-01", false, VERIFY_TIMEOUT).unwrap();
        assert!(report.outcome.passed());
        assert!(!report.persisted);
        assert_eq!(
            store.load("FEAT-01").unwrap().verification.status,
            VerificationStatus::Pending
        );

        verify(&store, "FEAT-01", true, VERIFY_TIMEOUT).unwrap();
        let task = store.load("FEAT-01").unwrap();
        assert_eq!(task.verification.status, VerificationStatus::Passed);
        assert!(task.verification.last_run.is_some());
        assert_eq!(task.verification.output, None);
    }

    #[test]
    fn failure_keeps_output() {
        let (_dir, store) = store();
        with_command(&store, "FEAT-01", "echo out; echo boom >&2; exit 3");
        let report = verify(&store, "FEAT-01", true, VERIFY_TIMEOUT).unwrap();
        assert_eq!(
            report.outcome,
            VerifyOutcome::Failed {
                output: "out\nboom".into()
            }
        );
        let task = store.load("FEAT-01").unwrap();
        assert_eq!(task.verification.status, VerificationStatus::Failed);
        assert_eq!(task.verification.output.as_deref(), Some("out\nboom"));
    }

    #[test]
    fn runs_in_project_root() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        with_command(&store, "FEAT-01", "test -f marker.txt");
        assert!(verify(&store, "FEAT-01", false, VERIFY_TIMEOUT).unwrap().outcome.passed());
    }

    #[test]
    fn timeout_leaves_task_unmodified() {
        let (_dir, store) = store();
        with_command(&store, "FEAT-01", "sleep 5");
        let before = store.load("FEAT-01").unwrap();
        let report = verify(&store, "FEAT-01", true, Duration::from_millis(200)).unwrap();
        assert!(matches!(report.outcome, VerifyOutcome::TimedOut { .. }));
        assert!(!report.persisted);
        assert_eq!(store.load("FEAT-01").unwrap(), before);
    }

    #[test]
    fn missing_command_is_an_error() {
        let (_dir, store) = store();
        put(&store, "FEAT-01", Status::Active);
        assert!(matches!(
            verify(&store, "FEAT-01", true, VERIFY_TIMEOUT),
            Err(KanbanError::NoVerificationCommand(_))
        ));
    }

    #[test]
    fn output_keeps_the_tail() {
        let long = format!("{}END", "é".repeat(MAX_OUTPUT_BYTES));
        let capped = combine(&long, "");
        assert!(capped.len() <= MAX_OUTPUT_BYTES);
        assert!(capped.ends_with("END"));
    }
}
