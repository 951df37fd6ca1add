use crate::cmd::{batch_ids, confirm, open_store};
use crate::output::print_json;
use anyhow::{bail, Context};
use clap::{Args, Subcommand};
use kanban_core::config::Settings;
use kanban_core::workflow::{self, ArchiveRequest};
use std::path::Path;

#[derive(Args)]
pub struct ArchiveArgs {
    pub ids: Vec<String>,
    /// Archive every task in done
    #[arg(long, conflicts_with = "ids")]
    pub all_done: bool,
    /// Acknowledge the signoff rules (required)
    #[arg(long)]
    pub signoff: bool,
    /// Stands in for a missing signoff when signoff_mode is off
    #[arg(long)]
    pub reason: Option<String>,
    /// Show what would be archived
    #[arg(long)]
    pub dry_run: bool,
    /// Skip the confirmation for bulk archives
    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub fn run(root: &Path, args: ArchiveArgs, json: bool) -> anyhow::Result<()> {
    if !args.all_done && args.ids.is_empty() {
        bail!("give task ids or --all-done");
    }
    let ids = if args.all_done {
        Vec::new()
    } else {
        batch_ids(&args.ids)?
    };
    let store = open_store(root)?;
    let req = ArchiveRequest {
        ids,
        all_done: args.all_done,
        signoff: args.signoff,
        reason: args.reason,
        dry_run: args.dry_run,
        yes: args.yes || json,
    };
    let report = workflow::archive(&store, req, |eligible| {
        confirm(&format!("Archive {} tasks: {}?", eligible.len(), eligible.join(", ")))
    })?;

    if json {
        print_json(&report)?;
    } else if report.dry_run {
        println!("Would archive: {}", list_or_none(&report.eligible));
    } else if report.cancelled {
        println!("Archive cancelled.");
    } else {
        for id in &report.archived {
            println!("{id}: done → archived");
        }
    }
    if !json {
        for f in &report.failed {
            eprintln!("{}: {}", f.id, f.error);
        }
    }
    if !report.dry_run && !report.failed.is_empty() {
        bail!("{} task(s) could not be archived", report.failed.len());
    }
    Ok(())
}

fn list_or_none(ids: &[String]) -> String {
    if ids.is_empty() {
        "(none)".to_string()
    } else {
        ids.join(", ")
    }
}

#[derive(Subcommand)]
pub enum SignoffSubcommand {
    /// Approve tasks for archival
    Add {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Withdraw approval
    Remove {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Show the signoff list
    List,
}

pub fn signoff(root: &Path, subcmd: SignoffSubcommand, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let mut settings = Settings::load(store.root()).context("failed to load config.toml")?;
    match subcmd {
        SignoffSubcommand::Add { ids } => {
            let ids = batch_ids(&ids)?;
            for id in &ids {
                if !store.exists(id) {
                    eprintln!("warning: {id} does not exist");
                }
            }
            let added = settings.signoff_add(&ids);
            settings.save(store.root())?;
            if json {
                return print_json(&serde_json::json!({ "added": added }));
            }
            println!("Signed off: {}", list_or_none(&added));
        }
        SignoffSubcommand::Remove { ids } => {
            let removed = settings.signoff_remove(&batch_ids(&ids)?);
            settings.save(store.root())?;
            if json {
                return print_json(&serde_json::json!({ "removed": removed }));
            }
            println!("Removed: {}", list_or_none(&removed));
        }
        SignoffSubcommand::List => {
            if json {
                return print_json(&serde_json::json!({
                    "signoff_mode": settings.features.signoff_mode,
                    "tickets": settings.signoff.tickets,
                }));
            }
            let mode = if settings.features.signoff_mode { "on" } else { "off" };
            println!("signoff_mode: {mode}");
            for id in &settings.signoff.tickets {
                println!("  {id}");
            }
        }
    }
    Ok(())
}
