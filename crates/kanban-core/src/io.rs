use crate::error::Result;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// A crash mid-write leaves either the old file or the new one, never a torn task file.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Write a file only if it does not already exist. Returns true if written.
pub fn write_if_missing(path: &Path, data: &[u8]) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    atomic_write(path, data)?;
    Ok(true)
}

/// Read a file, mapping "does not exist" to `None`.
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Append text to a file, creating it (and its parent) if needed.
pub fn append_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    f.write_all(text.as_bytes())?;
    Ok(())
}

/// Add `entry` to `root/.gitignore` unless a line already covers it.
///
/// `data/kanban`, `/data/kanban` and `/data/kanban/` all count as covering
/// `data/kanban/`. Returns true if the file was changed.
pub fn ensure_gitignore_entry(root: &Path, entry: &str) -> Result<bool> {
    let gitignore = root.join(".gitignore");
    let existing = read_optional(&gitignore)?.unwrap_or_default();
    let bare = entry.trim_matches('/');
    if existing
        .lines()
        .any(|l| l.trim().trim_matches('/') == bare)
    {
        return Ok(false);
    }
    let sep = if existing.is_empty() || existing.ends_with('\n') {
        ""
    } else {
        "\n"
    };
    append_text(&gitignore, &format!("{sep}# kanban task data\n{entry}\n"))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("status/stub/FEAT-01.md");
        atomic_write(&path, b"---\nid: FEAT-01\n---\n").unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "---\nid: FEAT-01\n---\n"
        );
    }

    #[test]
    fn read_optional_missing_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(read_optional(&dir.path().join("nope")).unwrap().is_none());
    }

    #[test]
    fn append_text_accumulates_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("info/override_log.txt");
        append_text(&path, "one\n").unwrap();
        append_text(&path, "two\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn gitignore_entry_is_added_once() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "target").unwrap();
        assert!(ensure_gitignore_entry(dir.path(), "data/kanban/").unwrap());
        assert!(!ensure_gitignore_entry(dir.path(), "data/kanban/").unwrap());
        let content = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert!(content.starts_with("target\n"));
        assert_eq!(content.matches("data/kanban/").count(), 1);
    }

    #[test]
    fn gitignore_variant_spelling_counts() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "/data/kanban\n").unwrap();
        assert!(!ensure_gitignore_entry(dir.path(), "data/kanban/").unwrap());
    }

    #[test]
    fn write_if_missing_skips_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("epics.toml");
        std::fs::write(&path, b"[FEAT]\n").unwrap();
        assert!(!write_if_missing(&path, b"[BUGS]\n").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[FEAT]\n");
    }
}
