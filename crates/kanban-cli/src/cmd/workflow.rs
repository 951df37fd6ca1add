use crate::cmd::{batch_ids, open_store};
use crate::output::print_json;
use anyhow::bail;
use clap::Args;
use kanban_core::workflow::{
    self, BatchReport, DemoteRequest, Outcome, PromoteRequest, ResolveRequest,
};
use kanban_core::{Resolution, Status};
use std::path::Path;

fn print_outcome(outcome: &Outcome, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(outcome);
    }
    match outcome {
        Outcome::Moved(t) => {
            let tag = if t.overridden { " (override)" } else { "" };
            println!("{}: {} → {}{tag}", t.id, t.from, t.to);
        }
        Outcome::Unchanged(u) => println!("{}: {}", u.id, u.note),
    }
    Ok(())
}

/// Print a batch report; any per-id failure turns into a non-zero exit.
fn finish_batch(report: &BatchReport, json: bool) -> anyhow::Result<()> {
    if json {
        print_json(report)?;
    } else {
        for t in &report.moved {
            println!("{}: {} → {}", t.id, t.from, t.to);
        }
        for u in &report.unchanged {
            println!("{}: {}", u.id, u.note);
        }
        for f in &report.failed {
            eprintln!("{}: {}", f.id, f.error);
        }
        for hint in &report.hints {
            println!("hint: {hint}");
        }
    }
    if report.has_failures() {
        bail!("{} of the requested tasks failed", report.failed.len());
    }
    Ok(())
}

#[derive(Args)]
pub struct PromoteArgs {
    pub id: String,
    /// Target status (default: next in the chain)
    pub target: Option<Status>,
    /// Commit hash; satisfies the qa → done gate and is stored on the task
    #[arg(long)]
    pub commit: Option<String>,
    /// Skip the gate; recorded in the task history and the override log
    #[arg(long = "override")]
    pub override_gates: bool,
    #[arg(long)]
    pub reason: Option<String>,
}

pub fn promote(root: &Path, args: PromoteArgs, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let outcome = workflow::promote(
        &store,
        &args.id,
        PromoteRequest {
            target: args.target,
            commit: args.commit,
            override_gates: args.override_gates,
            reason: args.reason,
        },
    )?;
    print_outcome(&outcome, json)
}

#[derive(Args)]
pub struct DemoteArgs {
    pub id: String,
    /// Target status (default: qa → regression, regression → active, else one step back)
    pub target: Option<Status>,
    /// Required when leaving done
    #[arg(long)]
    pub reason: Option<String>,
    #[arg(long = "override")]
    pub override_gates: bool,
}

pub fn demote(root: &Path, args: DemoteArgs, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let outcome = workflow::demote(
        &store,
        &args.id,
        DemoteRequest {
            target: args.target,
            reason: args.reason,
            override_gates: args.override_gates,
        },
    )?;
    print_outcome(&outcome, json)
}

#[derive(Args)]
pub struct MoveArgs {
    /// Task ids followed by the target status
    #[arg(required = true, num_args = 2.., value_name = "IDS... STATUS")]
    pub args: Vec<String>,
    #[arg(long)]
    pub reason: Option<String>,
}

pub fn move_tasks(root: &Path, args: MoveArgs, json: bool) -> anyhow::Result<()> {
    let Some((status, ids)) = args.args.split_last() else {
        bail!("usage: kanban move <IDS>... <STATUS> --reason <REASON>");
    };
    let target: Status = status.parse()?;
    let ids = batch_ids(ids)?;
    let store = open_store(root)?;
    let report = workflow::move_tasks(&store, &ids, target, args.reason.as_deref())?;
    finish_batch(&report, json)
}

pub fn block(root: &Path, ids: &[String], reason: Option<&str>, json: bool) -> anyhow::Result<()> {
    let ids = batch_ids(ids)?;
    let store = open_store(root)?;
    finish_batch(&workflow::block(&store, &ids, reason)?, json)
}

pub fn unblock(root: &Path, ids: &[String], reason: Option<&str>, json: bool) -> anyhow::Result<()> {
    let ids = batch_ids(ids)?;
    let store = open_store(root)?;
    finish_batch(&workflow::unblock(&store, &ids, reason)?, json)
}

#[derive(Args)]
pub struct ResolveArgs {
    pub id: String,
    /// fixed, duplicate, cannot_reproduce, wont_fix, config_change or docs_only
    #[arg(long)]
    pub resolution: Resolution,
    #[arg(long)]
    pub reason: Option<String>,
    /// Required with --resolution duplicate
    #[arg(long)]
    pub duplicate_of: Option<String>,
}

pub fn resolve(root: &Path, args: ResolveArgs, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let transition = workflow::resolve(
        &store,
        &args.id,
        ResolveRequest {
            resolution: args.resolution,
            reason: args.reason,
            duplicate_of: args.duplicate_of,
        },
    )?;
    if json {
        return print_json(&serde_json::json!({
            "id": transition.id,
            "from": transition.from,
            "to": transition.to,
            "resolution": args.resolution,
        }));
    }
    println!(
        "{}: {} → {} (resolved: {})",
        transition.id, transition.from, transition.to, args.resolution
    );
    Ok(())
}
