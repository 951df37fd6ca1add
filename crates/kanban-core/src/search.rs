//! Keyword search over the manifest, optionally reaching into task bodies.

use crate::error::{KanbanError, Result};
use crate::manifest::ManifestRow;
use crate::store::TaskStore;
use crate::types::{Priority, Status};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    Title,
    Body,
    Tags,
    Id,
    Epic,
    Status,
}

impl SearchField {
    pub const DEFAULT: [SearchField; 3] = [SearchField::Title, SearchField::Body, SearchField::Tags];

    /// Parse `title,body,tags`. An empty list yields the defaults.
    pub fn parse_list(csv: &str) -> Result<Vec<SearchField>> {
        let mut fields = Vec::new();
        let mut invalid = Vec::new();
        for name in csv.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match name.parse::<SearchField>() {
                Ok(f) if !fields.contains(&f) => fields.push(f),
                Ok(_) => {}
                Err(_) => invalid.push(name.to_string()),
            }
        }
        if !invalid.is_empty() {
            return Err(KanbanError::InvalidInput(format!(
                "invalid search fields: {} (expected title, body, tags, id, epic or status)",
                invalid.join(", ")
            )));
        }
        if fields.is_empty() {
            fields.extend(Self::DEFAULT);
        }
        Ok(fields)
    }
}

impl std::str::FromStr for SearchField {
    type Err = KanbanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" => Ok(SearchField::Title),
            "body" => Ok(SearchField::Body),
            "tags" => Ok(SearchField::Tags),
            "id" => Ok(SearchField::Id),
            "epic" => Ok(SearchField::Epic),
            "status" => Ok(SearchField::Status),
            _ => Err(KanbanError::InvalidInput(format!("invalid search field '{s}'"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Every keyword must appear in at least one searched field.
    pub keywords: Vec<String>,
    pub fields: Vec<SearchField>,
    /// Empty means any status.
    pub statuses: Vec<Status>,
    pub epic: Option<String>,
    pub in_sprint: bool,
    /// Archived tasks are also included when `statuses` names archived.
    pub include_archived: bool,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            fields: SearchField::DEFAULT.to_vec(),
            statuses: Vec::new(),
            epic: None,
            in_sprint: false,
            include_archived: false,
        }
    }
}

impl SearchRequest {
    fn admits(&self, row: &ManifestRow) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&row.status) {
            return false;
        }
        if row.status == Status::Archived
            && !self.include_archived
            && !self.statuses.contains(&Status::Archived)
        {
            return false;
        }
        if let Some(epic) = &self.epic {
            if !row.epic.eq_ignore_ascii_case(epic) {
                return false;
            }
        }
        !(self.in_sprint && !row.in_sprint)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub status: Status,
    pub priority: Priority,
    pub story_points: u32,
    pub tags: Vec<String>,
    pub in_sprint: bool,
}

impl From<&ManifestRow> for SearchHit {
    fn from(row: &ManifestRow) -> Self {
        Self {
            id: row.id.clone(),
            title: row.title.clone(),
            status: row.status,
            priority: row.priority,
            story_points: row.story_points,
            tags: row.tags.clone(),
            in_sprint: row.in_sprint,
        }
    }
}

fn field_text(store: &TaskStore, row: &ManifestRow, field: SearchField) -> String {
    match field {
        SearchField::Title => row.title.clone(),
        SearchField::Tags => row.tags.join(", "),
        SearchField::Id => row.id.clone(),
        SearchField::Epic => row.epic.clone(),
        SearchField::Status => row.status.to_string(),
        SearchField::Body => match store.load(&row.id) {
            Ok(task) => task.content,
            Err(e) => {
                debug!(id = %row.id, error = %e, "no body to search");
                String::new()
            }
        },
    }
}

/// Case-insensitive substring search, results in id order.
pub fn search(store: &TaskStore, req: &SearchRequest) -> Result<Vec<SearchHit>> {
    let keywords: Vec<String> = req
        .keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    if keywords.is_empty() {
        return Err(KanbanError::InvalidInput("no search keywords given".into()));
    }
    let fields = if req.fields.is_empty() {
        SearchField::DEFAULT.to_vec()
    } else {
        req.fields.clone()
    };

    let mut rows: Vec<ManifestRow> = store
        .manifest_rows()?
        .into_iter()
        .filter(|r| req.admits(r))
        .collect();
    rows.sort_by(|a, b| a.epic.cmp(&b.epic).then(a.number.cmp(&b.number)));

    let mut hits = Vec::new();
    for row in &rows {
        let haystacks: Vec<String> = fields
            .iter()
            .map(|f| field_text(store, row, *f).to_lowercase())
            .collect();
        if keywords
            .iter()
            .all(|kw| haystacks.iter().any(|h| h.contains(kw.as_str())))
        {
            hits.push(SearchHit::from(row));
        }
    }
    Ok(hits)
}
