use crate::cmd::{open_store, or_dash};
use crate::output::{print_json, print_table, truncate};
use clap::Args;
use kanban_core::manifest::{Query, SortKey};
use kanban_core::{audit, Priority, Status};
use std::path::Path;

pub fn show(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let task = store.load(id)?;
    if json {
        return print_json(&task);
    }

    println!("{}: {}", task.id, task.title);
    println!("  status:        {}", task.status);
    if let Some(reason) = &task.blocked_reason {
        println!("  blocked:       {reason}");
    }
    println!("  priority:      {}", task.priority);
    println!("  story points:  {}", task.story_points);
    println!("  milestone:     {}", or_dash(task.milestone.as_deref()));
    if !task.tags.is_empty() {
        println!("  tags:          {}", task.tags.join(", "));
    }
    if task.in_sprint {
        println!("  in sprint");
    }
    if let Some(auto_id) = task.auto_id {
        println!("  auto id:       {auto_id}");
    }

    let refs = &task.references;
    for (label, list) in [
        ("code", &refs.code),
        ("docs", &refs.docs),
        ("plans", &refs.plans),
        ("tests", &refs.tests),
        ("nfrs", &task.nfrs),
    ] {
        if !list.is_empty() {
            println!("  {label:<14} {}", list.join(", "));
        }
    }
    println!(
        "  verification:  {} ({})",
        or_dash(task.verification.command.as_deref()),
        task.verification.status
    );
    if let Some(hash) = &task.commit_hash {
        println!("  commit:        {hash}");
    }
    if let Some(resolution) = task.resolution {
        println!(
            "  resolution:    {resolution} - {}",
            or_dash(task.resolution_reason.as_deref())
        );
    }
    if let Some(reason) = &task.demotion_reason {
        println!("  demoted:       {reason}");
    }
    if !task.content.trim().is_empty() {
        println!("\n{}", task.content.trim_end());
    }
    Ok(())
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long)]
    pub epic: Option<String>,
    #[arg(long)]
    pub status: Option<Status>,
    #[arg(long)]
    pub priority: Option<Priority>,
    #[arg(long)]
    pub tag: Option<String>,
    #[arg(long)]
    pub milestone: Option<String>,
    /// Only tasks in the sprint
    #[arg(long)]
    pub sprint: bool,
    /// Include archived tasks
    #[arg(long)]
    pub all: bool,
    /// priority, id, created or updated
    #[arg(long, default_value = "priority")]
    pub sort: SortKey,
}

pub fn list(root: &Path, args: ListArgs, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let query = Query {
        epic: args.epic,
        status: args.status,
        priority: args.priority,
        tag: args.tag,
        milestone: args.milestone,
        sprint_only: args.sprint,
        include_archived: args.all,
        sort: args.sort,
    };
    let rows = query.apply(store.manifest_rows()?);

    if json {
        let out: Vec<_> = rows
            .iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.id,
                    "title": r.title,
                    "status": r.status,
                    "priority": r.priority,
                    "story_points": r.story_points,
                    "milestone": r.milestone,
                    "tags": r.tags,
                    "in_sprint": r.in_sprint,
                    "auto_id": r.auto_id,
                })
            })
            .collect();
        return print_json(&out);
    }
    if rows.is_empty() {
        println!("No tasks.");
        return Ok(());
    }
    let table: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.id.clone(),
                r.status.to_string(),
                r.priority.to_string(),
                r.story_points.to_string(),
                truncate(&r.title, 50),
            ]
        })
        .collect();
    print_table(&["ID", "STATUS", "PRIORITY", "SP", "TITLE"], table);
    Ok(())
}

pub fn history(root: &Path, id: Option<&str>, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let entries: Vec<(String, _)> = match id {
        Some(id) => {
            let task = store.load(id)?;
            let task_id = task.id;
            task.history.into_iter().map(|e| (task_id.clone(), e)).collect()
        }
        None => audit::timeline(&store)?
            .into_iter()
            .map(|t| (t.id, t.entry))
            .collect(),
    };

    if json {
        let out: Vec<_> = entries
            .iter()
            .map(|(id, e)| serde_json::json!({ "id": id, "entry": e }))
            .collect();
        return print_json(&out);
    }
    if entries.is_empty() {
        println!("No history.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|(id, e)| {
            let transition = match (&e.from_status, &e.to_status) {
                (Some(from), Some(to)) => format!("{from} → {to}"),
                (None, Some(to)) => format!("→ {to}"),
                _ => String::new(),
            };
            vec![
                e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                id.clone(),
                e.action.to_string(),
                transition,
                or_dash(e.reason.as_deref()),
            ]
        })
        .collect();
    print_table(&["TIME", "ID", "ACTION", "TRANSITION", "REASON"], rows);
    Ok(())
}
