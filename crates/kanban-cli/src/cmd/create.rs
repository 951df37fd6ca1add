use crate::cmd::open_store;
use crate::output::print_json;
use clap::Args;
use kanban_core::lifecycle::{self, CreateRequest};
use kanban_core::{gate, paths, workflow, Priority, Status};
use std::path::Path;

#[derive(Args)]
pub struct CreateArgs {
    /// Epic name from epics.toml (e.g. FEAT)
    pub epic: String,
    #[arg(required = true)]
    pub title: Vec<String>,
    /// Story points
    #[arg(long = "sp", alias = "story-points")]
    pub story_points: Option<u32>,
    #[arg(long)]
    pub priority: Option<Priority>,
    /// Comma-separated tags
    #[arg(long)]
    pub tags: Option<String>,
    #[arg(long)]
    pub milestone: Option<String>,
    /// Description; fills the markdown template (`\n` becomes a newline)
    #[arg(long)]
    pub body: Option<String>,
    /// Initial status; anything but stub needs --body
    #[arg(long)]
    pub status: Option<Status>,
    /// Explicit number within the epic
    #[arg(long)]
    pub number: Option<u32>,
}

pub fn run(root: &Path, args: CreateArgs, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let req = CreateRequest {
        epic: args.epic,
        title: args.title.join(" "),
        story_points: args.story_points,
        priority: args.priority,
        tags: args
            .tags
            .map(|t| t.split(',').map(str::to_string).collect())
            .unwrap_or_default(),
        milestone: args.milestone,
        body: args.body,
        status: args.status,
        number: args.number,
    };
    let task = lifecycle::create(&store, req)?;

    if json {
        return print_json(&serde_json::json!({
            "id": task.id,
            "auto_id": task.auto_id,
            "status": task.status,
            "path": paths::task_path(root, task.status, &task.id),
        }));
    }
    println!("Created {}: {}", task.id, task.title);
    println!("  status: {}  story points: {}  priority: {}", task.status, task.story_points, task.priority);
    println!("  file: {}", paths::task_path(root, task.status, &task.id).display());

    if let Some(next) = workflow::promote_target(task.status) {
        let verdict = gate::validate(&task, next, None);
        if !verdict.is_ok() {
            println!("\nBefore {} -> {}:", task.status, next);
            for blocker in &verdict.blockers {
                println!("  - {blocker}");
            }
        }
    }
    Ok(())
}
