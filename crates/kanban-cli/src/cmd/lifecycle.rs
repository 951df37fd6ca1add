use crate::cmd::{confirm, open_store, or_dash};
use crate::output::{print_json, print_table, truncate};
use clap::Subcommand;
use kanban_core::{lifecycle, trash};
use std::path::Path;

pub fn rename(root: &Path, old_id: &str, new_id: &str, force: bool, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let renamed = lifecycle::rename(&store, old_id, new_id, force)?;
    if json {
        return print_json(&renamed);
    }
    println!("Renamed {} → {} ({})", renamed.from, renamed.to, renamed.status);
    if renamed.replaced {
        println!("  replaced the existing {}", renamed.to);
    }
    Ok(())
}

pub fn delete(root: &Path, id: &str, reason: Option<&str>, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let deleted = lifecycle::delete(&store, id, reason)?;
    if json {
        return print_json(&deleted);
    }
    println!("Deleted {} (auto id {})", deleted.id, deleted.auto_id);
    println!("  recover with: kanban recover {} --reason \"...\"", deleted.auto_id);
    Ok(())
}

pub fn recover(root: &Path, auto_id: u64, reason: Option<&str>, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let recovered = lifecycle::recover(&store, auto_id, reason)?;
    if json {
        return print_json(&recovered);
    }
    if recovered.renumbered() {
        println!(
            "Recovered {} as {} ({}); {} was taken",
            recovered.original_id, recovered.id, recovered.status, recovered.original_id
        );
    } else {
        println!("Recovered {} ({})", recovered.id, recovered.status);
    }
    Ok(())
}

#[derive(Subcommand)]
pub enum TrashSubcommand {
    /// Show trashed tasks, newest deletion first
    List,
    /// Permanently remove everything in the trash
    Empty {
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

pub fn trash(root: &Path, subcmd: TrashSubcommand, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    match subcmd {
        TrashSubcommand::List => {
            let entries = trash::list(&store)?;
            if json {
                return print_json(&entries);
            }
            if entries.is_empty() {
                println!("Trash is empty.");
                return Ok(());
            }
            let rows = entries
                .iter()
                .map(|e| {
                    vec![
                        e.auto_id.to_string(),
                        e.id.clone(),
                        e.deleted
                            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                            .unwrap_or_else(|| "-".to_string()),
                        truncate(&or_dash(e.title.as_deref()), 40),
                        truncate(&or_dash(e.reason.as_deref()), 40),
                    ]
                })
                .collect();
            print_table(&["AUTO", "ID", "DELETED", "TITLE", "REASON"], rows);
        }
        TrashSubcommand::Empty { yes } => {
            let count = trash::list(&store)?.len();
            if count == 0 {
                if json {
                    return print_json(&serde_json::json!({ "removed": 0 }));
                }
                println!("Trash is empty.");
                return Ok(());
            }
            if !yes {
                if json {
                    anyhow::bail!("trash empty needs --yes when output is JSON");
                }
                if !confirm(&format!("Permanently remove {count} trashed tasks?")) {
                    println!("Cancelled.");
                    return Ok(());
                }
            }
            let removed = trash::empty(&store)?;
            if json {
                return print_json(&serde_json::json!({ "removed": removed }));
            }
            println!("Removed {removed} trashed tasks.");
        }
    }
    Ok(())
}
