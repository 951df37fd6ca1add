pub mod archive;
pub mod create;
pub mod edit;
pub mod flag;
pub mod init;
pub mod lifecycle;
pub mod manifest;
pub mod query;
pub mod registry;
pub mod report;
pub mod search;
pub mod verify;
pub mod workflow;

use anyhow::bail;
use kanban_core::{paths, TaskStore};
use std::io::{BufRead, Write};
use std::path::Path;

/// Open the store at `root`, stamping history entries with the current actor
/// (`KANBAN_ACTOR`, else `USER`).
pub(crate) fn open_store(root: &Path) -> anyhow::Result<TaskStore> {
    let actor = std::env::var("KANBAN_ACTOR")
        .ok()
        .or_else(|| std::env::var("USER").ok());
    Ok(TaskStore::open(root)?.with_actor(actor))
}

/// Expand comma/space separated id arguments.
pub(crate) fn batch_ids(args: &[String]) -> anyhow::Result<Vec<String>> {
    let ids = paths::parse_task_ids(args);
    if ids.is_empty() {
        bail!("no task ids given");
    }
    Ok(ids)
}

/// Ask a yes/no question on stderr; anything but `y`/`yes` is a no.
pub(crate) fn confirm(prompt: &str) -> bool {
    eprint!("{prompt} (y/N) ");
    let _ = std::io::stderr().flush();
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

pub(crate) fn or_dash(value: Option<&str>) -> String {
    value.filter(|v| !v.is_empty()).unwrap_or("-").to_string()
}
