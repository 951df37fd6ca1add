use crate::cmd::{open_store, or_dash};
use crate::output::{print_json, print_table, truncate};
use clap::Subcommand;
use kanban_core::config::Registry;
use kanban_core::milestone::{self, StatusChange};
use std::path::Path;

fn load(root: &Path) -> anyhow::Result<Registry> {
    let store = open_store(root)?;
    Ok(Registry::load(store.root())?)
}

pub fn epics(root: &Path, json: bool) -> anyhow::Result<()> {
    let registry = load(root)?;
    if json {
        return print_json(&registry.epics);
    }
    if registry.epics.is_empty() {
        println!("No epics. Add them to data/kanban/info/epics.toml.");
        return Ok(());
    }
    let rows = registry
        .epics
        .iter()
        .map(|(name, e)| {
            vec![
                name.clone(),
                if e.active { "yes" } else { "no" }.to_string(),
                e.story_point_budget
                    .map(|b| b.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                truncate(&e.description, 60),
            ]
        })
        .collect();
    print_table(&["EPIC", "ACTIVE", "BUDGET", "DESCRIPTION"], rows);
    Ok(())
}

pub fn milestones(root: &Path, json: bool) -> anyhow::Result<()> {
    let registry = load(root)?;
    let ordered = registry.milestones_in_order();
    if json {
        let out: Vec<_> = ordered
            .iter()
            .map(|(id, m)| serde_json::json!({ "id": id, "milestone": m }))
            .collect();
        return print_json(&out);
    }
    if ordered.is_empty() {
        println!("No milestones.");
        return Ok(());
    }
    let rows = ordered
        .iter()
        .map(|(id, m)| {
            vec![
                m.priority.to_string(),
                (*id).clone(),
                m.status.clone(),
                m.goal_sp.to_string(),
                truncate(&m.name, 40),
                or_dash(m.blocked_reason.as_deref()),
            ]
        })
        .collect();
    print_table(&["#", "ID", "STATUS", "GOAL SP", "NAME", "BLOCKED"], rows);
    Ok(())
}

#[derive(Subcommand)]
pub enum MilestoneSubcommand {
    /// Show a milestone with its tasks and progress
    Show { id: String },
    /// Mark a milestone active
    Start { id: String },
    /// Mark a milestone completed
    Complete { id: String },
}

pub fn milestone(root: &Path, subcmd: MilestoneSubcommand, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let change = match subcmd {
        MilestoneSubcommand::Show { id } => {
            let report = milestone::show(&store, &id)?;
            if json {
                return print_json(&report);
            }
            let m = &report.milestone;
            let stats = &report.stats;
            println!("{}: {}", report.id, m.name);
            println!("  status:        {}", m.status);
            println!("  priority:      {}", m.priority);
            if let Some(reason) = &m.blocked_reason {
                println!("  blocked:       {reason}");
            }
            if !m.description.is_empty() {
                println!("  description:   {}", m.description);
            }
            println!(
                "  tasks:         {} of {} complete",
                stats.completed_tasks, stats.total_tasks
            );
            println!(
                "  story points:  {} of {} complete ({} remaining)",
                stats.story_points_completed, stats.story_points_total, stats.story_points_remaining
            );
            if let Some(progress) = stats.goal_progress {
                println!("  goal:          {} SP ({progress:.1}%)", m.goal_sp);
            }
            if !report.tasks.is_empty() {
                println!();
                let rows = report
                    .tasks
                    .iter()
                    .map(|t| {
                        vec![
                            t.id.clone(),
                            t.status.to_string(),
                            t.story_points.to_string(),
                            truncate(&t.title, 50),
                        ]
                    })
                    .collect();
                print_table(&["ID", "STATUS", "SP", "TITLE"], rows);
            }
            return Ok(());
        }
        MilestoneSubcommand::Start { id } => milestone::start(&store, &id)?,
        MilestoneSubcommand::Complete { id } => milestone::complete(&store, &id)?,
    };
    print_change(&change, json)
}

fn print_change(change: &StatusChange, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(change);
    }
    if !change.changed {
        println!("{} is already {}", change.id, change.to);
        return Ok(());
    }
    println!("{} ({}): {} → {}", change.id, change.name, change.from, change.to);
    if !change.incomplete.is_empty() {
        eprintln!(
            "warning: {} unfinished task(s): {}",
            change.incomplete.len(),
            change.incomplete.join(", ")
        );
    }
    Ok(())
}

pub fn nfrs(root: &Path, json: bool) -> anyhow::Result<()> {
    let registry = load(root)?;
    if json {
        return print_json(&registry.nfrs);
    }
    if registry.nfrs.is_empty() {
        println!("No NFRs.");
        return Ok(());
    }
    let rows = registry
        .nfrs
        .iter()
        .map(|(id, n)| {
            vec![
                id.clone(),
                n.category.clone(),
                if n.default { "*" } else { "" }.to_string(),
                truncate(&n.title, 60),
            ]
        })
        .collect();
    print_table(&["ID", "CATEGORY", "DEFAULT", "TITLE"], rows);
    Ok(())
}
