use crate::cmd::open_store;
use crate::output::{print_json, print_table, truncate};
use clap::Args;
use kanban_core::search::{self, SearchField, SearchRequest};
use kanban_core::Status;
use std::path::Path;

#[derive(Args)]
pub struct SearchArgs {
    /// Every keyword must match (case-insensitive)
    #[arg(required = true)]
    pub keywords: Vec<String>,
    /// Fields to search: title, body, tags, id, epic, status
    #[arg(long, default_value = "title,body,tags")]
    pub filter: String,
    /// Statuses to include, comma separated
    #[arg(long, value_delimiter = ',')]
    pub status: Vec<Status>,
    #[arg(long)]
    pub epic: Option<String>,
    /// Only tasks in the sprint
    #[arg(long)]
    pub in_sprint: bool,
    /// Include archived tasks
    #[arg(long)]
    pub archived: bool,
}

pub fn run(root: &Path, args: SearchArgs, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let req = SearchRequest {
        keywords: args.keywords,
        fields: SearchField::parse_list(&args.filter)?,
        statuses: args.status,
        epic: args.epic,
        in_sprint: args.in_sprint,
        include_archived: args.archived,
    };
    let hits = search::search(&store, &req)?;

    if json {
        return print_json(&serde_json::json!({
            "count": hits.len(),
            "items": hits,
            "fields": req.fields,
        }));
    }
    if hits.is_empty() {
        println!("No tasks matched.");
        return Ok(());
    }
    let rows = hits
        .iter()
        .map(|h| {
            vec![
                h.id.clone(),
                h.status.to_string(),
                h.story_points.to_string(),
                truncate(&h.title, 50),
                h.tags.join(", "),
            ]
        })
        .collect();
    print_table(&["ID", "STATUS", "SP", "TITLE", "TAGS"], rows);
    Ok(())
}
