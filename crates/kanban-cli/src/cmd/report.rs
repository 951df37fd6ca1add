use crate::cmd::open_store;
use crate::output::{print_json, print_table, truncate};
use clap::Args;
use kanban_core::audit::{self, StatsFilter, Tally, GROOM_MIN_CHARS, GROOM_RATIO};
use std::collections::BTreeMap;
use std::path::Path;

pub fn overrides(root: &Path, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let records = audit::collect_overrides(&store)?;
    if json {
        return print_json(&serde_json::json!({
            "overrides": records,
            "log": audit::read_override_log(store.root())?,
        }));
    }
    if records.is_empty() {
        println!("No overrides recorded.");
        return Ok(());
    }
    for record in &records {
        let trashed = if record.trashed { " (trashed)" } else { "" };
        println!("{}{trashed}", record.log_line());
    }
    println!("\n{} overrides", records.len());
    Ok(())
}

#[derive(Args)]
pub struct GroomArgs {
    /// Fraction of the median done-task length a task must reach
    #[arg(long, default_value_t = GROOM_RATIO)]
    pub ratio: f64,
    /// Absolute floor for the threshold, in characters
    #[arg(long, default_value_t = GROOM_MIN_CHARS)]
    pub min_chars: usize,
}

pub fn groom(root: &Path, args: GroomArgs, json: bool) -> anyhow::Result<()> {
    if !(args.ratio > 0.0) {
        anyhow::bail!("--ratio must be positive");
    }
    let store = open_store(root)?;
    let report = audit::groom(&store, args.ratio, args.min_chars)?;
    if json {
        return print_json(&report);
    }
    match report.done_median {
        Some(m) => println!("Median done length: {m} chars"),
        None => println!("No finished tasks yet; using a {} char baseline", audit::GROOM_FALLBACK_MEDIAN),
    }
    println!(
        "Threshold: {} chars; audited {} stub/backlog tasks",
        report.threshold, report.audited
    );
    if report.needs_detail.is_empty() {
        println!("All tasks meet the threshold.");
        return Ok(());
    }
    println!();
    let rows = report
        .needs_detail
        .iter()
        .map(|item| {
            vec![
                item.id.clone(),
                item.status.to_string(),
                item.length.to_string(),
                truncate(&item.title, 50),
            ]
        })
        .collect();
    print_table(&["ID", "STATUS", "CHARS", "TITLE"], rows);
    Ok(())
}

#[derive(Args)]
pub struct StatsArgs {
    #[arg(long)]
    pub epic: Option<String>,
    #[arg(long)]
    pub milestone: Option<String>,
    /// Include archived tasks
    #[arg(long)]
    pub all: bool,
}

fn tally_rows(map: &BTreeMap<String, Tally>) -> Vec<Vec<String>> {
    map.iter()
        .map(|(key, t)| vec![key.clone(), t.tasks.to_string(), t.story_points.to_string()])
        .collect()
}

pub fn stats(root: &Path, args: StatsArgs, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let stats = audit::stats(
        &store,
        &StatsFilter {
            epic: args.epic,
            milestone: args.milestone,
            include_archived: args.all,
        },
    )?;
    if json {
        return print_json(&stats);
    }
    println!(
        "{} tasks, {} story points\n",
        stats.total.tasks, stats.total.story_points
    );
    for (label, map) in [
        ("STATUS", &stats.by_status),
        ("PRIORITY", &stats.by_priority),
        ("EPIC", &stats.by_epic),
    ] {
        if map.is_empty() {
            continue;
        }
        print_table(&[label, "TASKS", "SP"], tally_rows(map));
        println!();
    }
    Ok(())
}
