use crate::error::{KanbanError, Result};
use crate::io;
use crate::paths;
use crate::types::Priority;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Registries (epics.toml, nfrs.toml, milestones.toml)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epic {
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_point_budget: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nfr {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub verification: String,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: u32,
    #[serde(default = "default_milestone_status")]
    pub status: String,
    #[serde(default)]
    pub goal_sp: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
}

fn default_milestone_status() -> String {
    "planned".to_string()
}

/// Lookups loaded from `info/`. Missing files yield empty maps.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    pub epics: BTreeMap<String, Epic>,
    pub nfrs: BTreeMap<String, Nfr>,
    pub milestones: BTreeMap<String, Milestone>,
}

fn load_toml_map<T: serde::de::DeserializeOwned>(path: &Path) -> Result<BTreeMap<String, T>> {
    match io::read_optional(path)? {
        Some(text) => Ok(toml::from_str(&text)?),
        None => Ok(BTreeMap::new()),
    }
}

impl Registry {
    pub fn load(root: &Path) -> Result<Self> {
        Ok(Self {
            epics: load_toml_map(&paths::epics_path(root))?,
            nfrs: load_toml_map(&paths::nfrs_path(root))?,
            milestones: load_toml_map(&paths::milestones_path(root))?,
        })
    }

    /// Look up an epic by name, case-insensitively. Inactive epics are
    /// returned with a warning.
    pub fn epic(&self, name: &str) -> Result<(String, &Epic)> {
        let upper = name.trim().to_ascii_uppercase();
        let epic = self
            .epics
            .get(&upper)
            .ok_or_else(|| KanbanError::UnknownEpic {
                epic: upper.clone(),
                available: self.epics.keys().cloned().collect::<Vec<_>>().join(", "),
            })?;
        if !epic.active {
            warn!(epic = %upper, "epic is marked inactive");
        }
        Ok((upper, epic))
    }

    pub fn default_nfrs(&self) -> Vec<String> {
        self.nfrs
            .iter()
            .filter(|(_, n)| n.default)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn milestone(&self, id: &str) -> Result<&Milestone> {
        self.milestones.get(id.trim()).ok_or_else(|| {
            KanbanError::InvalidInput(format!(
                "unknown milestone '{}' (available: {})",
                id.trim(),
                self.milestones.keys().cloned().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    /// Rewrite `milestones.toml` from the loaded map. Comments are not kept.
    pub fn save_milestones(&self, root: &Path) -> Result<()> {
        let text = format!(
            "{MILESTONES_HEADER}\n{}",
            toml::to_string(&self.milestones)?
        );
        io::atomic_write(&paths::milestones_path(root), text.as_bytes())
    }

    /// Milestones ordered by priority, then id.
    pub fn milestones_in_order(&self) -> Vec<(&String, &Milestone)> {
        let mut out: Vec<_> = self.milestones.iter().collect();
        out.sort_by(|a, b| a.1.priority.cmp(&b.1.priority).then(a.0.cmp(b.0)));
        out
    }
}

// ---------------------------------------------------------------------------
// ProjectType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    Rust,
    Python,
    Node,
    Shell,
    #[default]
    Generic,
}

impl ProjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectType::Rust => "rust",
            ProjectType::Python => "python",
            ProjectType::Node => "node",
            ProjectType::Shell => "shell",
            ProjectType::Generic => "generic",
        }
    }

    /// Guess from marker files in the project root. Returns
    /// `(type, auto_detected)`; falling back to generic is not a detection.
    pub fn detect(root: &Path) -> (ProjectType, bool) {
        if root.join("Cargo.toml").exists() {
            return (ProjectType::Rust, true);
        }
        if ["pyproject.toml", "setup.py", "requirements.txt"]
            .iter()
            .any(|f| root.join(f).exists())
        {
            return (ProjectType::Python, true);
        }
        if root.join("package.json").exists() {
            return (ProjectType::Node, true);
        }
        let shell_scripts: usize = ["bin", "src"]
            .iter()
            .filter_map(|d| std::fs::read_dir(root.join(d)).ok())
            .flat_map(|entries| entries.flatten())
            .filter(|e| e.path().extension().is_some_and(|x| x == "sh"))
            .count();
        if shell_scripts >= 2 {
            return (ProjectType::Shell, true);
        }
        (ProjectType::Generic, false)
    }

    pub fn defaults(self) -> ProjectDefaults {
        let (cmd, code, tests): (&str, &[&str], &[&str]) = match self {
            ProjectType::Rust => ("cargo test", &["src/**/*.rs", "tests/**/*.rs"], &["tests/**/*.rs"]),
            ProjectType::Python => (
                "pytest tests/",
                &["src/**/*.py", "tests/**/*.py"],
                &["tests/**/*.py", "test_*.py"],
            ),
            ProjectType::Node => (
                "npm test",
                &["src/**/*.js", "src/**/*.ts", "test/**/*.js"],
                &["test/**/*.js", "__tests__/**/*.js"],
            ),
            ProjectType::Shell => (
                "./run_tests.sh",
                &["bin/**/*.sh", "src/**/*.sh"],
                &["tests/**/*.sh", "test_*.sh"],
            ),
            ProjectType::Generic => ("", &["src/**/*"], &["tests/**/*", "test/**/*"]),
        };
        let owned = |v: &[&str]| v.iter().map(|s| s.to_string()).collect();
        ProjectDefaults {
            verify_command: cmd.to_string(),
            code_patterns: owned(code),
            test_patterns: owned(tests),
        }
    }
}

impl std::fmt::Display for ProjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProjectType {
    type Err = KanbanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rust" => Ok(ProjectType::Rust),
            "python" => Ok(ProjectType::Python),
            "node" => Ok(ProjectType::Node),
            "shell" => Ok(ProjectType::Shell),
            "generic" => Ok(ProjectType::Generic),
            _ => Err(KanbanError::InvalidInput(format!(
                "invalid project type '{s}': expected rust, python, node, shell or generic"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Settings (config.toml)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDefaults {
    #[serde(default)]
    pub verify_command: String,
    #[serde(default)]
    pub code_patterns: Vec<String>,
    #[serde(default)]
    pub test_patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSection {
    #[serde(rename = "type", default)]
    pub kind: ProjectType,
    #[serde(default)]
    pub auto_detected: bool,
    #[serde(default)]
    pub defaults: ProjectDefaults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralSection {
    #[serde(default)]
    pub default_story_points: u32,
    #[serde(default = "default_true")]
    pub apply_default_nfrs: bool,
    #[serde(default)]
    pub default_priority: Priority,
}

impl Default for GeneralSection {
    fn default() -> Self {
        Self {
            default_story_points: 0,
            apply_default_nfrs: true,
            default_priority: Priority::Medium,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_command: Option<String>,
    #[serde(default)]
    pub require_tests: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Features {
    /// Every archived task must be on the signoff list.
    #[serde(default)]
    pub signoff_mode: bool,
    /// Flags this crate does not act on.
    #[serde(flatten)]
    pub other: BTreeMap<String, toml::Value>,
}

/// Flags `flag enable|disable` accepts, with what they switch on.
pub const FEATURE_FLAGS: &[(&str, &str)] = &[(
    "signoff_mode",
    "Only tasks on the signoff list may be archived",
)];

/// `signoff-mode` and `SIGNOFF_MODE` both name `signoff_mode`.
pub fn normalize_flag(name: &str) -> String {
    name.trim().replace('-', "_").to_ascii_lowercase()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignoffSection {
    #[serde(default)]
    pub tickets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub general: GeneralSection,
    #[serde(default)]
    pub verification: VerificationSection,
    #[serde(default)]
    pub features: Features,
    #[serde(default)]
    pub signoff: SignoffSection,
    /// Sections this crate does not interpret, kept so a save does not drop them.
    #[serde(flatten)]
    pub extra: BTreeMap<String, toml::Value>,
}

impl Settings {
    pub fn load(root: &Path) -> Result<Self> {
        match io::read_optional(&paths::config_path(root))? {
            Some(text) => Ok(toml::from_str(&text)?),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let text = toml::to_string(self)?;
        io::atomic_write(&paths::config_path(root), text.as_bytes())
    }

    /// Command new tasks start with: `[verification] test_command`, else the
    /// project default.
    pub fn default_verify_command(&self) -> Option<String> {
        self.verification
            .test_command
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .or_else(|| Some(self.project.defaults.verify_command.as_str()))
            .filter(|c| !c.trim().is_empty())
            .map(str::to_string)
    }

    /// Every flag in `[features]`, known or not. Non-boolean values read as off.
    pub fn flags(&self) -> BTreeMap<String, bool> {
        let mut flags: BTreeMap<String, bool> = self
            .features
            .other
            .iter()
            .map(|(name, value)| (name.clone(), value.as_bool().unwrap_or(false)))
            .collect();
        flags.insert("signoff_mode".to_string(), self.features.signoff_mode);
        flags
    }

    /// Switch a known flag. Returns its previous value.
    pub fn set_flag(&mut self, name: &str, enabled: bool) -> Result<bool> {
        match normalize_flag(name).as_str() {
            "signoff_mode" => Ok(std::mem::replace(&mut self.features.signoff_mode, enabled)),
            other => Err(KanbanError::InvalidInput(format!(
                "unknown flag '{other}' (available: {})",
                FEATURE_FLAGS
                    .iter()
                    .map(|(flag, _)| *flag)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    pub fn is_signed_off(&self, id: &str) -> bool {
        self.signoff.tickets.iter().any(|t| t.eq_ignore_ascii_case(id))
    }

    /// Add ids to the signoff list; returns the ones that were new.
    pub fn signoff_add(&mut self, ids: &[String]) -> Vec<String> {
        let mut added = Vec::new();
        for id in ids {
            if !self.is_signed_off(id) {
                self.signoff.tickets.push(id.clone());
                added.push(id.clone());
            }
        }
        added
    }

    /// Remove ids from the signoff list; returns the ones that were present.
    pub fn signoff_remove(&mut self, ids: &[String]) -> Vec<String> {
        let mut removed = Vec::new();
        self.signoff.tickets.retain(|t| {
            let hit = ids.iter().any(|id| id.eq_ignore_ascii_case(t));
            if hit {
                removed.push(t.clone());
            }
            !hit
        });
        removed
    }
}

// ---------------------------------------------------------------------------
// Default file contents written by `init`
// ---------------------------------------------------------------------------

pub const DEFAULT_EPICS: &str = r#"# Epic definitions. Each epic is its own id namespace (EPIC-NN).

[BUGS]
description = "Bug fixes and corrections"
active = true

[DOCS]
description = "Documentation work"
active = true

[FEAT]
description = "New features and enhancements"
active = true

[REF]
description = "Refactoring and code cleanup"
active = true

[RX]
description = "Research and exploration"
prefix = "RX"
active = true

[UAT]
description = "User acceptance testing"
active = true

[QOL]
description = "Quality of life improvements"
active = true

[TEST]
description = "Test infrastructure and improvements"
active = true

[DEPS]
description = "Dependency management and updates"
active = true

[INFRA]
description = "Infrastructure and tooling"
active = true

[M0]
description = "Milestone 0: setup, skeleton and foundation"
active = true

# [MYEPIC]
# description = "Custom epic"
# active = true
# story_point_budget = 100
"#;

pub const DEFAULT_NFRS: &str = r#"# Non-functional requirements that can be attached to tasks.

[NFR-SEC-001]
category = "SEC"
number = 1
title = "Code must be free of common security vulnerabilities"
description = "No SQL injection, XSS, command injection, path traversal, etc."
verification = "Run security linters and manual code review"
default = true

[NFR-TEST-001]
category = "TEST"
number = 1
title = "All code must have passing tests"
description = "Unit and integration tests as appropriate. No placeholder tests."
verification = "Run the project test suite"
default = true

[NFR-DOC-001]
category = "DOC"
number = 1
title = "Public APIs must be documented"
description = "All public functions, types and modules carry documentation comments."
verification = "Build the API docs without warnings"
default = true

[NFR-PERF-001]
category = "PERF"
number = 1
title = "Operations must complete in reasonable time"
description = "No operations that hang indefinitely or cause unacceptable latency."
verification = "Performance testing and profiling"
default = false

[NFR-SCALE-001]
category = "SCALE"
number = 1
title = "Must handle expected data volumes"
description = "System must scale to the expected user and data load."
verification = "Load testing and benchmarking"
default = false
"#;

const MILESTONES_HEADER: &str =
    "# Project milestones. `priority` sets execution order (1 = first).\n";

pub const DEFAULT_MILESTONES: &str = r#"# Project milestones. `priority` sets execution order (1 = first).

[milestone-1]
name = "Foundation MVP"
description = "Core functionality and basic workflow"
priority = 1
status = "active"
goal_sp = 50

[milestone-2]
name = "Feature Complete"
description = "All planned features implemented"
priority = 2
status = "planned"
goal_sp = 100

[milestone-3]
name = "Polish and Release"
description = "UX improvements, documentation, and release prep"
priority = 3
status = "planned"
goal_sp = 40
"#;

/// `config.toml` for a freshly initialised project of the given type.
pub fn default_config(kind: ProjectType, auto_detected: bool) -> String {
    let defaults = kind.defaults();
    let array = |items: &[String]| {
        toml::Value::Array(items.iter().cloned().map(toml::Value::String).collect()).to_string()
    };
    let quoted = |s: &str| toml::Value::String(s.to_string()).to_string();
    let test_command = if defaults.verify_command.is_empty() {
        "# test_command = \"make test\"".to_string()
    } else {
        format!("test_command = {}", quoted(&defaults.verify_command))
    };
    format!(
        r#"# kanban configuration

[project]
# rust, python, node, shell or generic
type = "{kind}"
auto_detected = {auto_detected}

[project.defaults]
verify_command = {verify}
code_patterns = {code}
test_patterns = {tests}

[general]
default_story_points = 0
apply_default_nfrs = true
default_priority = "medium"

[verification]
# Pre-filled as verification.command on new tasks
{test_command}
require_tests = false

[features]
# Only tasks on the signoff list below may be archived
signoff_mode = false

[signoff]
tickets = []
"#,
        verify = quoted(&defaults.verify_command),
        code = array(&defaults.code_patterns),
        tests = array(&defaults.test_patterns),
    )
}
