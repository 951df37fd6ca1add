use crate::output::print_json;
use anyhow::Context;
use kanban_core::config::ProjectType;
use kanban_core::TaskStore;
use std::path::Path;

pub fn run(root: &Path, kind: Option<ProjectType>, force: bool, json: bool) -> anyhow::Result<()> {
    let report = TaskStore::init(root, kind, force)
        .with_context(|| format!("failed to initialize kanban in {}", root.display()))?;

    if json {
        return print_json(&report);
    }
    println!("Initialized kanban in {}", report.kanban_dir.display());
    let how = if report.auto_detected { "detected" } else { "default" };
    println!("  project type: {} ({how})", report.project_type);
    if report.gitignore_updated {
        println!("  added data/kanban/ to .gitignore");
    }
    println!("\nNext: kanban create FEAT \"First task\"");
    Ok(())
}
