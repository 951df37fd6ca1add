//! Task file codec.
//!
//! A task file is a `---` delimited header followed by the markdown body:
//!
//! ```text
//! ---
//! id: FEAT-01
//! title: Login form
//! tags: [auth, ui]
//! references.code: [src/login.rs]
//! verification.status: pending
//! history:
//! - timestamp: 2026-01-05T10:00:00Z
//!   action: create
//! ---
//!
//! # Login form
//! ```
//!
//! Scalars that YAML could misread are written as double-quoted strings, so
//! the whole header is parsed back with `serde_yaml`.

use crate::error::{KanbanError, Result};
use crate::paths;
use crate::task::{HistoryEntry, References, TaskRecord, Verification};
use crate::types::{Priority, Resolution, Status, VerificationStatus};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;

const DELIMITER: &str = "---";

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub fn render(task: &TaskRecord) -> Result<String> {
    let mut out = String::with_capacity(512 + task.content.len());
    out.push_str(DELIMITER);
    out.push('\n');

    scalar_line(&mut out, "id", &task.id)?;
    scalar_line(&mut out, "title", &task.title)?;
    scalar_line(&mut out, "epic", &task.epic)?;
    raw_line(&mut out, "number", &task.number.to_string());
    raw_line(&mut out, "status", task.status.as_str());
    raw_line(&mut out, "story_points", &task.story_points.to_string());
    raw_line(&mut out, "priority", task.priority.as_str());
    scalar_line(&mut out, "created", &timestamp(&task.created))?;
    scalar_line(&mut out, "updated", &timestamp(&task.updated))?;
    if let Some(auto_id) = task.auto_id {
        raw_line(&mut out, "auto_id", &auto_id.to_string());
    }
    optional_line(&mut out, "assigned", task.assigned.as_deref())?;
    optional_line(&mut out, "milestone", task.milestone.as_deref())?;
    optional_line(&mut out, "blocked_reason", task.blocked_reason.as_deref())?;
    if task.in_sprint {
        raw_line(&mut out, "in_sprint", "true");
    }
    optional_line(&mut out, "commit_hash", task.commit_hash.as_deref())?;
    optional_line(&mut out, "demotion_reason", task.demotion_reason.as_deref())?;
    if let Some(resolution) = task.resolution {
        raw_line(&mut out, "resolution", resolution.as_str());
    }
    optional_line(&mut out, "resolution_reason", task.resolution_reason.as_deref())?;
    optional_line(&mut out, "duplicate_of", task.duplicate_of.as_deref())?;

    list_line(&mut out, "tags", &task.tags)?;
    list_line(&mut out, "dependencies", &task.dependencies)?;
    list_line(&mut out, "blocks", &task.blocks)?;
    list_line(&mut out, "nfrs", &task.nfrs)?;

    list_line(&mut out, "references.code", &task.references.code)?;
    list_line(&mut out, "references.docs", &task.references.docs)?;
    list_line(&mut out, "references.plans", &task.references.plans)?;
    list_line(&mut out, "references.tests", &task.references.tests)?;

    let v = &task.verification;
    optional_line(&mut out, "verification.command", v.command.as_deref())?;
    raw_line(&mut out, "verification.status", v.status.as_str());
    if let Some(last_run) = &v.last_run {
        scalar_line(&mut out, "verification.last_run", &timestamp(last_run))?;
    }
    optional_line(&mut out, "verification.output", v.output.as_deref())?;

    if !task.history.is_empty() {
        out.push_str("history:\n");
        out.push_str(&serde_yaml::to_string(&task.history)?);
    }

    out.push_str(DELIMITER);
    out.push_str("\n\n");
    out.push_str(&task.content);
    Ok(out)
}

fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
}

fn raw_line(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push_str(": ");
    out.push_str(value);
    out.push('\n');
}

fn scalar_line(out: &mut String, key: &str, value: &str) -> Result<()> {
    let rendered = scalar(value)?;
    raw_line(out, key, &rendered);
    Ok(())
}

fn optional_line(out: &mut String, key: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(v) if !v.is_empty() => scalar_line(out, key, v),
        _ => Ok(()),
    }
}

fn list_line(out: &mut String, key: &str, items: &[String]) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }
    let rendered: Vec<String> = items.iter().map(|i| scalar(i)).collect::<Result<_>>()?;
    raw_line(out, key, &format!("[{}]", rendered.join(", ")));
    Ok(())
}

/// Plain when YAML reads it back as the same string, JSON-quoted otherwise.
/// JSON string syntax is a subset of YAML double-quoted scalars.
fn scalar(value: &str) -> Result<String> {
    if is_plain_safe(value) {
        Ok(value.to_string())
    } else {
        Ok(serde_json::to_string(value)?)
    }
}

fn is_plain_safe(value: &str) -> bool {
    const RESERVED: [&str; 11] = [
        "true", "false", "null", "yes", "no", "on", "off", "y", "n", "nan", "inf",
    ];
    let Some(first) = value.chars().next() else {
        return false;
    };
    if !(first.is_alphabetic() || first == '_' || first == '/') {
        return false;
    }
    if value.ends_with(' ') || value.contains("  ") {
        return false;
    }
    if RESERVED.contains(&value.to_ascii_lowercase().as_str()) {
        return false;
    }
    value
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.' | '/' | '(' | ')' | '\'' | '+' | '@'))
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Split a task file into `(header, body)`. `None` when the delimiters are
/// missing. One blank line after the closing delimiter belongs to the layout,
/// not the body.
pub fn split(text: &str) -> Option<(&str, &str)> {
    let rest = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))?;
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(&['\n', '\r'][..]) == DELIMITER {
            let header = &rest[..offset];
            let body = &rest[offset + line.len()..];
            let body = body
                .strip_prefix("\r\n")
                .or_else(|| body.strip_prefix('\n'))
                .unwrap_or(body);
            return Some((header, body));
        }
        offset += line.len();
    }
    None
}

/// Header fields as found on disk. Everything is optional here; `parse`
/// decides what is required.
#[derive(Debug, Default, Deserialize)]
struct RawHeader {
    #[serde(default, deserialize_with = "de::opt_string")]
    id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    title: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    epic: Option<String>,
    #[serde(default, deserialize_with = "de::opt_u64")]
    number: Option<u64>,
    #[serde(default, deserialize_with = "de::opt_string")]
    status: Option<String>,
    #[serde(default, deserialize_with = "de::opt_u64")]
    story_points: Option<u64>,
    #[serde(default, deserialize_with = "de::opt_string")]
    priority: Option<String>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    created: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    updated: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_u64")]
    auto_id: Option<u64>,
    #[serde(default, deserialize_with = "de::opt_string")]
    assigned: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    milestone: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    blocked_reason: Option<String>,
    #[serde(default, deserialize_with = "de::opt_bool")]
    in_sprint: Option<bool>,
    #[serde(default, deserialize_with = "de::opt_string")]
    commit_hash: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    demotion_reason: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    resolution: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    resolution_reason: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    duplicate_of: Option<String>,
    #[serde(default, deserialize_with = "de::list")]
    tags: Vec<String>,
    #[serde(default, deserialize_with = "de::list")]
    dependencies: Vec<String>,
    #[serde(default, deserialize_with = "de::list")]
    blocks: Vec<String>,
    #[serde(default, deserialize_with = "de::list")]
    nfrs: Vec<String>,
    #[serde(rename = "references.code", default, deserialize_with = "de::list")]
    code: Vec<String>,
    #[serde(rename = "references.docs", default, deserialize_with = "de::list")]
    docs: Vec<String>,
    #[serde(rename = "references.plans", default, deserialize_with = "de::list")]
    plans: Vec<String>,
    #[serde(rename = "references.tests", default, deserialize_with = "de::list")]
    tests: Vec<String>,
    #[serde(rename = "verification.command", default, deserialize_with = "de::opt_string")]
    verify_command: Option<String>,
    #[serde(rename = "verification.status", default, deserialize_with = "de::opt_string")]
    verify_status: Option<String>,
    #[serde(rename = "verification.last_run", default, deserialize_with = "de::opt_timestamp")]
    verify_last_run: Option<DateTime<Utc>>,
    #[serde(rename = "verification.output", default, deserialize_with = "de::opt_string")]
    verify_output: Option<String>,
    #[serde(default, deserialize_with = "de::history")]
    history: Vec<HistoryEntry>,
}

/// Parse a task file. `path` only feeds error messages.
pub fn parse(text: &str, path: &Path) -> Result<TaskRecord> {
    let malformed = |reason: String| KanbanError::MalformedRecord {
        path: path.to_path_buf(),
        reason,
    };

    let (header, body) =
        split(text).ok_or_else(|| malformed("missing '---' frontmatter delimiters".into()))?;
    let raw: RawHeader = if header.trim().is_empty() {
        RawHeader::default()
    } else {
        serde_yaml::from_str(header).map_err(|e| malformed(e.to_string()))?
    };

    let id = raw.id.ok_or_else(|| malformed("missing field 'id'".into()))?;
    let (id_epic, id_number) = paths::parse_task_id(&id).map_err(|e| malformed(e.to_string()))?;
    let number = match raw.number {
        Some(n) => u32::try_from(n).map_err(|_| malformed(format!("number out of range: {n}")))?,
        None => id_number,
    };
    let status = match raw.status.as_deref() {
        Some(s) => s.parse::<Status>().map_err(|e| malformed(e.to_string()))?,
        None => Status::Stub,
    };
    let priority = match raw.priority.as_deref() {
        Some(p) => p.parse::<Priority>().map_err(|e| malformed(e.to_string()))?,
        None => Priority::default(),
    };
    let resolution = raw
        .resolution
        .as_deref()
        .map(str::parse::<Resolution>)
        .transpose()
        .map_err(|e| malformed(e.to_string()))?;
    let verify_status = match raw.verify_status.as_deref() {
        Some(s) => s
            .parse::<VerificationStatus>()
            .map_err(|e| malformed(e.to_string()))?,
        None => VerificationStatus::Pending,
    };
    let story_points = u32::try_from(raw.story_points.unwrap_or(0))
        .map_err(|_| malformed("story_points out of range".into()))?;

    let epoch = DateTime::<Utc>::default();
    Ok(TaskRecord {
        id,
        title: raw.title.unwrap_or_default(),
        epic: raw.epic.unwrap_or(id_epic),
        number,
        status,
        story_points,
        priority,
        created: raw.created.unwrap_or(epoch),
        updated: raw.updated.or(raw.created).unwrap_or(epoch),
        tags: raw.tags,
        dependencies: raw.dependencies,
        blocks: raw.blocks,
        assigned: raw.assigned,
        milestone: raw.milestone,
        blocked_reason: raw.blocked_reason,
        nfrs: raw.nfrs,
        references: References {
            code: raw.code,
            docs: raw.docs,
            plans: raw.plans,
            tests: raw.tests,
        },
        verification: Verification {
            command: raw.verify_command,
            status: verify_status,
            last_run: raw.verify_last_run,
            output: raw.verify_output,
        },
        commit_hash: raw.commit_hash,
        demotion_reason: raw.demotion_reason,
        resolution,
        resolution_reason: raw.resolution_reason,
        duplicate_of: raw.duplicate_of,
        auto_id: raw.auto_id,
        in_sprint: raw.in_sprint.unwrap_or(false),
        history: raw.history,
        content: body.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Lenient field deserializers
// ---------------------------------------------------------------------------

/// Hand-edited files write `tags: a, b` as often as `tags: [a, b]`, and
/// `commit_hash: 1234567` comes back from YAML as a number.
pub(crate) mod de {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};
    use serde_yaml::Value;

    fn scalar_to_string<E: serde::de::Error>(value: Value) -> Result<Option<String>, E> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            Value::Bool(b) => Ok(Some(b.to_string())),
            Value::Number(n) => Ok(Some(n.to_string())),
            Value::Tagged(tagged) => scalar_to_string(tagged.value),
            Value::Sequence(_) | Value::Mapping(_) => {
                Err(E::custom("expected a scalar, found a collection"))
            }
        }
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(scalar_to_string::<D::Error>(value)?.filter(|s| !s.is_empty()))
    }

    pub fn opt_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::Number(n) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("expected a non-negative integer, found {n}"))),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("expected an integer, found '{s}'"))),
            other => Err(D::Error::custom(format!("expected an integer, found {other:?}"))),
        }
    }

    pub fn opt_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(b)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "" => Ok(None),
                "true" | "yes" | "1" => Ok(Some(true)),
                "false" | "no" | "0" => Ok(Some(false)),
                _ => Err(D::Error::custom(format!("expected a boolean, found '{s}'"))),
            },
            Value::Number(n) => Ok(Some(n.as_u64() != Some(0))),
            other => Err(D::Error::custom(format!("expected a boolean, found {other:?}"))),
        }
    }

    pub fn list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(Vec::new()),
            Value::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(s) = scalar_to_string::<D::Error>(item)? {
                        out.push(s);
                    }
                }
                Ok(out)
            }
            other => Ok(scalar_to_string::<D::Error>(other)?
                .map(|s| {
                    s.split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()),
        }
    }

    pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
        let s = s.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
            return Some(ts.with_timezone(&Utc));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            .map(|naive| naive.and_utc())
    }

    pub fn opt_timestamp<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match scalar_to_string::<D::Error>(Value::deserialize(d)?)? {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => parse_timestamp(&s)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{s}'"))),
        }
    }

    pub fn timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        opt_timestamp(d)?.ok_or_else(|| D::Error::custom("missing timestamp"))
    }

    pub fn history<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Vec<super::HistoryEntry>, D::Error> {
        Ok(Option::<Vec<super::HistoryEntry>>::deserialize(d)?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::HistoryEntry;
    use crate::types::HistoryAction;
    use std::path::PathBuf;

    fn sample() -> TaskRecord {
        let mut task = TaskRecord::new("FEAT", 1, "Login form").unwrap();
        task.content = "# Login form\n\n## Description\n\nBuild it.\n".to_string();
        task
    }

    fn round_trip(task: &TaskRecord) -> TaskRecord {
        let text = render(task).unwrap();
        parse(&text, &PathBuf::from("FEAT-01.md")).unwrap()
    }

    #[test]
    fn minimal_record_round_trips() {
        let task = sample();
        assert_eq!(round_trip(&task), task);
    }

    #[test]
    fn fully_populated_record_round_trips() {
        let mut task = sample();
        task.status = Status::Blocked;
        task.story_points = 5;
        task.priority = Priority::Critical;
        task.tags = vec!["auth".into(), "needs review".into(), "v1.2".into()];
        task.dependencies = vec!["FEAT-02".into()];
        task.blocks = vec!["FEAT-09".into(), "BUGS-01".into()];
        task.assigned = Some("ops@example.com".into());
        task.milestone = Some("milestone-1".into());
        task.blocked_reason = Some("waiting on API: v2 #42".into());
        task.nfrs = vec!["NFR-SEC-001".into()];
        task.references.code = vec!["src/login.rs".into(), "src/auth/mod.rs".into()];
        task.references.docs = vec!["https://example.com/a?b=c".into()];
        task.references.plans = vec!["plans/login.md".into()];
        task.references.tests = vec!["tests/login.rs::happy_path".into()];
        task.verification.command = Some("cargo test -p auth -- --nocapture".into());
        task.verification.status = VerificationStatus::Failed;
        task.verification.last_run = Some(Utc::now());
        task.verification.output = Some("line one\nline two: \"quoted\"\n---\n".into());
        task.commit_hash = Some("0123456".into());
        task.demotion_reason = Some("regressed".into());
        task.resolution = Some(Resolution::WontFix);
        task.resolution_reason = Some("no".into());
        task.duplicate_of = Some("FEAT-00".into());
        task.auto_id = Some(42);
        task.in_sprint = true;
        task.push_history(
            HistoryEntry::transition(HistoryAction::Block, Status::Active, Status::Blocked)
                .reason(Some("multi\nline\n---\nreason"))
                .actor(Some("dev"))
                .meta("signoff_mode", "true"),
        );
        task.push_history(HistoryEntry::new(HistoryAction::Other("override_promote".into())));
        assert_eq!(round_trip(&task), task);
    }

    #[test]
    fn unicode_and_awkward_scalars_round_trip() {
        let mut task = sample();
        task.title = "Ünïcödé: title with #hash, [brackets] & 'quotes' 🚀".into();
        task.tags = vec!["yes".into(), "null".into(), "123".into(), "a,b".into(), " pad ".into()];
        task.content = "日本語の本文\n\n```\n---\n```\n".into();
        assert_eq!(round_trip(&task), task);
    }

    #[test]
    fn empty_body_round_trips() {
        let mut task = sample();
        task.content.clear();
        assert_eq!(round_trip(&task), task);
    }

    #[test]
    fn header_uses_flat_dotted_keys() {
        let mut task = sample();
        task.tags = vec!["auth".into(), "ui".into()];
        task.references.code = vec!["src/login.rs".into()];
        let text = render(&task).unwrap();
        assert!(text.starts_with("---\nid: FEAT-01\ntitle: Login form\n"));
        assert!(text.contains("\ntags: [auth, ui]\n"));
        assert!(text.contains("\nreferences.code: [src/login.rs]\n"));
        assert!(text.contains("\nverification.status: pending\n"));
    }

    #[test]
    fn missing_delimiter_is_malformed() {
        let err = parse("id: FEAT-01\n", Path::new("x.md")).unwrap_err();
        assert!(matches!(err, KanbanError::MalformedRecord { .. }));
        let err = parse("---\nid: FEAT-01\n", Path::new("x.md")).unwrap_err();
        assert!(matches!(err, KanbanError::MalformedRecord { .. }));
    }

    #[test]
    fn hand_edited_header_is_accepted() {
        let text = "---\nid: BUGS-07\ntitle: Crash on save\nstatus: in_progress\n\
                    tags: crash, io\ncommit_hash: 1234567\nstory_points: '3'\n\
                    created: 2025-03-01T09:30:00\n---\nBody\n";
        let task = parse(text, Path::new("BUGS-07.md")).unwrap();
        assert_eq!(task.epic, "BUGS");
        assert_eq!(task.number, 7);
        assert_eq!(task.status, Status::Active);
        assert_eq!(task.tags, vec!["crash", "io"]);
        assert_eq!(task.commit_hash.as_deref(), Some("1234567"));
        assert_eq!(task.story_points, 3);
        assert_eq!(task.updated, task.created);
        assert_eq!(task.content, "Body\n");
    }
}
