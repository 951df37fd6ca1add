use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

pub const ISSUES_HEADING: &str = "## ISSUES";

/// One bullet of the `## ISSUES` log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub timestamp: Option<String>,
    pub description: String,
}

static ISSUE_RE: OnceLock<Regex> = OnceLock::new();

fn issue_re() -> &'static Regex {
    ISSUE_RE.get_or_init(|| Regex::new(r"^- \*\*(.+?)\*\* - (.*)$").unwrap())
}

/// Line range `(heading, end)` of the ISSUES section; `end` is exclusive.
/// Headings inside fenced code blocks do not count.
fn section_bounds(lines: &[&str]) -> Option<(usize, usize)> {
    let mut in_fence = false;
    let mut heading = None;
    for (i, line) in lines.iter().enumerate() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if !in_fence && line.trim_end() == ISSUES_HEADING {
            heading = Some(i);
            break;
        }
    }
    let start = heading?;
    let mut in_fence = false;
    let mut end = lines.len();
    for (i, line) in lines.iter().enumerate().skip(start + 1) {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        if !in_fence && line.starts_with("## ") {
            end = i;
            break;
        }
    }
    Some((start, end))
}

/// Collect the `- ` bullets under `## ISSUES`, in file order.
pub fn parse_issues(content: &str) -> Vec<Issue> {
    let lines: Vec<&str> = content.lines().collect();
    let Some((start, end)) = section_bounds(&lines) else {
        return Vec::new();
    };
    lines[start + 1..end]
        .iter()
        .filter(|l| l.starts_with("- "))
        .map(|l| match issue_re().captures(l) {
            Some(caps) => Issue {
                timestamp: Some(caps[1].to_string()),
                description: caps[2].trim().to_string(),
            },
            None => Issue {
                timestamp: None,
                description: l[2..].trim().to_string(),
            },
        })
        .collect()
}

/// Return `content` with a timestamped bullet appended to the ISSUES section,
/// creating the section at the end of the body when absent.
pub fn append_issue(content: &str, description: &str, at: DateTime<Utc>) -> String {
    let bullet = format!(
        "- **{}** - {}",
        at.format("%Y-%m-%d %H:%M:%S UTC"),
        description.trim().replace('\n', " ")
    );
    let lines: Vec<&str> = content.lines().collect();
    let Some((start, end)) = section_bounds(&lines) else {
        let mut out = content.to_string();
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(ISSUES_HEADING);
        out.push_str("\n\n");
        out.push_str(&bullet);
        out.push('\n');
        return out;
    };

    // After the last bullet, or after the heading's blank line when empty.
    let insert_at = lines[start + 1..end]
        .iter()
        .rposition(|l| l.starts_with("- "))
        .map(|i| start + 1 + i + 1)
        .unwrap_or_else(|| (start + 2).min(end));

    let mut out: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    out.insert(insert_at, bullet);
    if insert_at == start + 1 {
        out.insert(start + 1, String::new());
    }
    let mut joined = out.join("\n");
    if content.ends_with('\n') || insert_at == out.len() - 1 {
        joined.push('\n');
    }
    joined
}
