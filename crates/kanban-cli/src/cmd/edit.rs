use crate::cmd::{batch_ids, open_store, or_dash};
use crate::output::{print_json, print_table, truncate};
use anyhow::bail;
use clap::{Args, Subcommand};
use kanban_core::edit::{self, LinkRequest};
use kanban_core::issues;
use kanban_core::manifest::Query;
use std::path::Path;

#[derive(Args)]
pub struct LinkArgs {
    pub id: String,
    /// Source file (repeatable)
    #[arg(long)]
    pub code: Vec<String>,
    #[arg(long)]
    pub docs: Vec<String>,
    #[arg(long = "plan")]
    pub plans: Vec<String>,
    #[arg(long = "test")]
    pub tests: Vec<String>,
    /// NFR id from nfrs.toml (repeatable)
    #[arg(long = "nfr")]
    pub nfrs: Vec<String>,
    /// Shell command that proves the task works
    #[arg(long)]
    pub verify: Option<String>,
    #[arg(long)]
    pub commit: Option<String>,
}

pub fn link(root: &Path, args: LinkArgs, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let task = edit::link(
        &store,
        &args.id,
        LinkRequest {
            code: args.code,
            docs: args.docs,
            plans: args.plans,
            tests: args.tests,
            nfrs: args.nfrs,
            verify: args.verify,
            commit: args.commit,
        },
    )?;
    if json {
        return print_json(&serde_json::json!({
            "id": task.id,
            "references": task.references,
            "nfrs": task.nfrs,
            "verification": task.verification,
            "commit_hash": task.commit_hash,
        }));
    }
    println!("Linked {}", task.id);
    let refs = &task.references;
    for (label, list) in [
        ("code", &refs.code),
        ("docs", &refs.docs),
        ("plans", &refs.plans),
        ("tests", &refs.tests),
        ("nfrs", &task.nfrs),
    ] {
        if !list.is_empty() {
            println!("  {label:<6} {}", list.join(", "));
        }
    }
    if let Some(cmd) = &task.verification.command {
        println!("  verify {cmd}");
    }
    Ok(())
}

#[derive(Args)]
pub struct TagArgs {
    pub id: String,
    /// Tags to add (comma separated or repeated)
    #[arg(long, value_delimiter = ',')]
    pub add: Vec<String>,
    #[arg(long, value_delimiter = ',')]
    pub remove: Vec<String>,
}

pub fn tag(root: &Path, args: TagArgs, json: bool) -> anyhow::Result<()> {
    if args.add.is_empty() && args.remove.is_empty() {
        bail!("pass --add or --remove");
    }
    let store = open_store(root)?;
    let task = edit::tag(&store, &args.id, &args.add, &args.remove)?;
    if json {
        return print_json(&serde_json::json!({ "id": task.id, "tags": task.tags }));
    }
    println!("{}: tags [{}]", task.id, task.tags.join(", "));
    Ok(())
}

pub fn assign(
    root: &Path,
    id: &str,
    milestone: Option<&str>,
    clear: bool,
    json: bool,
) -> anyhow::Result<()> {
    let milestone = match (milestone, clear) {
        (Some(_), true) => bail!("give a milestone or --clear, not both"),
        (None, false) => bail!("give a milestone or --clear"),
        (m, _) => m,
    };
    let store = open_store(root)?;
    let task = edit::assign(&store, id, milestone)?;
    if json {
        return print_json(&serde_json::json!({ "id": task.id, "milestone": task.milestone }));
    }
    println!("{}: milestone {}", task.id, or_dash(task.milestone.as_deref()));
    Ok(())
}

#[derive(Subcommand)]
pub enum SprintSubcommand {
    /// Put tasks in the current sprint
    Add {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Take tasks out of the sprint
    Remove {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Tasks in the sprint
    List,
}

pub fn sprint(root: &Path, subcmd: SprintSubcommand, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let (changed, verb) = match subcmd {
        SprintSubcommand::Add { ids } => (edit::sprint(&store, &batch_ids(&ids)?, true)?, "Added"),
        SprintSubcommand::Remove { ids } => {
            (edit::sprint(&store, &batch_ids(&ids)?, false)?, "Removed")
        }
        SprintSubcommand::List => {
            let query = Query {
                sprint_only: true,
                ..Query::default()
            };
            let rows = query.apply(store.manifest_rows()?);
            if json {
                let ids: Vec<_> = rows.iter().map(|r| &r.id).collect();
                return print_json(&ids);
            }
            if rows.is_empty() {
                println!("Sprint is empty.");
                return Ok(());
            }
            let sp: u32 = rows.iter().map(|r| r.story_points).sum();
            let table = rows
                .iter()
                .map(|r| {
                    vec![
                        r.id.clone(),
                        r.status.to_string(),
                        r.story_points.to_string(),
                        truncate(&r.title, 50),
                    ]
                })
                .collect();
            print_table(&["ID", "STATUS", "SP", "TITLE"], table);
            println!("\n{} tasks, {sp} story points", rows.len());
            return Ok(());
        }
    };
    if json {
        return print_json(&serde_json::json!({ "changed": changed }));
    }
    if changed.is_empty() {
        println!("Nothing to change.");
    } else {
        println!("{verb}: {}", changed.join(", "));
    }
    Ok(())
}

#[derive(Subcommand)]
pub enum IssuesSubcommand {
    /// Show the issue log of a task
    List { id: String },
    /// Append a timestamped issue
    Add {
        id: String,
        #[arg(required = true)]
        description: Vec<String>,
    },
}

pub fn issues(root: &Path, subcmd: IssuesSubcommand, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    match subcmd {
        IssuesSubcommand::List { id } => {
            let task = store.load(&id)?;
            let found = issues::parse_issues(&task.content);
            if json {
                return print_json(&found);
            }
            if found.is_empty() {
                println!("{}: no issues", task.id);
            }
            for issue in &found {
                match &issue.timestamp {
                    Some(ts) => println!("[{ts}] {}", issue.description),
                    None => println!("{}", issue.description),
                }
            }
        }
        IssuesSubcommand::Add { id, description } => {
            let task = edit::add_issue(&store, &id, &description.join(" "))?;
            if json {
                return print_json(&issues::parse_issues(&task.content));
            }
            println!("{}: issue logged", task.id);
        }
    }
    Ok(())
}
