//! Migration Applier
//!
//! Applies a migration file (rename / alias / deprecate / noop actions) to the
//! persisted store. The whole batch is simulated in memory first; structural
//! problems and (optionally) missing source keys abort it before anything is
//! written.
//!
//! Each action moves through `pending -> validated -> applied | skipped | errored`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, TokenError};
use crate::naming::is_addressable;
use crate::store::{NodeKind, TokenStore};
use crate::writer::{SafeWriter, WriteOutcome};

// =============================================================================
// Migration File
// =============================================================================

/// A migration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Migration {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub actions: Vec<MigrationAction>,
}

impl Migration {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| TokenError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| TokenError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// One action in a migration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationAction {
    #[serde(default)]
    pub old_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_key: Option<String>,
    pub action: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reversible: Option<bool>,
}

impl MigrationAction {
    /// `newKey`, ignoring empty strings
    pub fn target(&self) -> Option<&str> {
        self.new_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

/// Action name. Unknown names are kept so they can be reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    Rename,
    Alias,
    Deprecate,
    Noop,
    Unknown(String),
}

impl From<String> for ActionKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "rename" => ActionKind::Rename,
            "alias" => ActionKind::Alias,
            "deprecate" => ActionKind::Deprecate,
            "noop" => ActionKind::Noop,
            _ => ActionKind::Unknown(name),
        }
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Rename => write!(f, "rename"),
            ActionKind::Alias => write!(f, "alias"),
            ActionKind::Deprecate => write!(f, "deprecate"),
            ActionKind::Noop => write!(f, "noop"),
            ActionKind::Unknown(name) => write!(f, "{}", name),
        }
    }
}

// =============================================================================
// Outcomes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionState {
    Pending,
    Validated,
    Applied,
    Skipped,
    Errored,
}

/// What happened to one action
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub action: ActionKind,
    pub old_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_key: Option<String>,
    pub state: ActionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ActionOutcome {
    fn pending(action: &MigrationAction) -> Self {
        Self {
            action: action.action.clone(),
            old_key: action.old_key.clone(),
            new_key: action.target().map(String::from),
            state: ActionState::Pending,
            note: None,
        }
    }

    fn finish(&mut self, state: ActionState, note: Option<String>) {
        self.state = state;
        self.note = note;
    }
}

/// Result of simulating a migration against a store
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub store: TokenStore,
    pub actions: Vec<ActionOutcome>,
    pub warnings: Vec<String>,
    /// The store differs from the input
    pub changed: bool,
}

impl MigrationOutcome {
    pub fn count(&self, state: ActionState) -> usize {
        self.actions.iter().filter(|a| a.state == state).count()
    }

    /// JSON summary for CLI output
    pub fn summary(&self) -> Value {
        let applied: Vec<&ActionOutcome> = self
            .actions
            .iter()
            .filter(|a| a.state == ActionState::Applied)
            .collect();
        serde_json::json!({
            "applied": applied,
            "skipped": self.count(ActionState::Skipped),
            "warnings": self.warnings,
        })
    }
}

/// A migration run against a store file
#[derive(Debug)]
pub struct MigrationRun {
    pub outcome: MigrationOutcome,
    /// None on dry runs and when nothing changed
    pub write: Option<WriteOutcome>,
}

// =============================================================================
// Applier
// =============================================================================

/// Result of one simulated action
enum Step {
    /// With an optional warning
    Applied(Option<String>),
    Skipped(String),
    Missing,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationApplier {
    /// Missing source keys abort the batch instead of warning
    pub fail_on_missing: bool,
}

impl MigrationApplier {
    pub fn new(fail_on_missing: bool) -> Self {
        Self { fail_on_missing }
    }

    /// Structural problems across every action, reported together
    pub fn validate(&self, migration: &Migration) -> Vec<String> {
        let mut errors = Vec::new();
        for (i, action) in migration.actions.iter().enumerate() {
            let n = i + 1;
            if action.old_key.trim().is_empty() {
                errors.push(format!("action {} ({}) has no oldKey", n, action.action));
            }
            match action.action {
                ActionKind::Rename | ActionKind::Alias if action.target().is_none() => {
                    errors.push(format!(
                        "{} action requires newKey for {}",
                        action.action, action.old_key
                    ));
                }
                _ => {}
            }
            if let Some(new_key) = action.target() {
                if !is_addressable(new_key) {
                    errors.push(format!(
                        "action {} ({}) newKey '{}' has empty segments",
                        n, action.action, new_key
                    ));
                }
            }
        }
        errors
    }

    /// Simulate `migration` on a copy of `store`
    pub fn apply(&self, migration: &Migration, store: &TokenStore) -> Result<MigrationOutcome> {
        let structural = self.validate(migration);
        if !structural.is_empty() {
            return Err(TokenError::StructuralMigration(structural));
        }

        let mut next = store.clone();
        let mut outcomes = Vec::with_capacity(migration.actions.len());
        let mut warnings = Vec::new();
        let mut missing = Vec::new();

        for action in &migration.actions {
            let mut outcome = ActionOutcome::pending(action);
            outcome.state = ActionState::Validated;

            let (state, note) = match self.step(&mut next, action) {
                Step::Applied(note) => (ActionState::Applied, note),
                Step::Skipped(note) => (ActionState::Skipped, Some(note)),
                Step::Missing => {
                    missing.push(action.old_key.clone());
                    let state = if self.fail_on_missing {
                        ActionState::Errored
                    } else {
                        ActionState::Skipped
                    };
                    (state, Some(format!("Missing token: {}", action.old_key)))
                }
            };
            if let Some(note) = &note {
                warn!(old_key = %action.old_key, "{}", note);
                warnings.push(note.clone());
            }
            debug!(action = %action.action, old_key = %action.old_key, ?state, "migration action");
            outcome.finish(state, note);
            outcomes.push(outcome);
        }

        if self.fail_on_missing && !missing.is_empty() {
            return Err(TokenError::MissingKeys(missing));
        }

        let changed = next != *store;
        Ok(MigrationOutcome {
            store: next,
            actions: outcomes,
            warnings,
            changed,
        })
    }

    fn step(&self, store: &mut TokenStore, action: &MigrationAction) -> Step {
        let old_key = action.old_key.as_str();
        if !store.contains_node(old_key) {
            return Step::Missing;
        }

        match &action.action {
            ActionKind::Rename => {
                let Some(new_key) = action.target() else {
                    return Step::Skipped(format!("rename requires newKey for {}", old_key));
                };
                match store.node_kind(new_key) {
                    NodeKind::Leaf | NodeKind::Namespace | NodeKind::Stray => {
                        return Step::Skipped(format!(
                            "Target key already exists: {} (skipping overwrite)",
                            new_key
                        ))
                    }
                    NodeKind::Blocked => {
                        return Step::Skipped(format!("Target key {} is under an existing token (skipping)", new_key))
                    }
                    NodeKind::Absent => {}
                }
                if new_key.starts_with(&format!("{}.", old_key)) {
                    return Step::Skipped(format!("Cannot rename {} into its own subtree {}", old_key, new_key));
                }
                let Some(node) = store.remove(old_key) else {
                    return Step::Missing;
                };
                store.set_node(new_key, node);
                Step::Applied(None)
            }
            ActionKind::Alias => {
                let Some(new_key) = action.target() else {
                    return Step::Skipped(format!("alias requires newKey for {}", old_key));
                };
                let Some(record) = store.leaf(old_key).cloned() else {
                    return Step::Skipped(format!("alias source {} is not a token", old_key));
                };
                let note = match store.node_kind(new_key) {
                    NodeKind::Namespace | NodeKind::Blocked => {
                        return Step::Skipped(format!(
                            "alias target {} conflicts with the store layout (skipping)",
                            new_key
                        ))
                    }
                    NodeKind::Leaf | NodeKind::Stray => {
                        Some(format!("alias target {} already existed and was replaced", new_key))
                    }
                    NodeKind::Absent => None,
                };
                store.set(new_key, record.clone());
                let mut deprecated = record;
                deprecated.insert("deprecated".to_string(), Value::Bool(true));
                deprecated.insert("replacement".to_string(), Value::String(new_key.to_string()));
                store.set(old_key, deprecated);
                Step::Applied(note)
            }
            ActionKind::Deprecate => {
                let Some(record) = store.leaf_mut(old_key) else {
                    return Step::Skipped(format!("deprecate target {} is not a token", old_key));
                };
                record.insert("deprecated".to_string(), Value::Bool(true));
                if let Some(new_key) = action.target() {
                    record.insert("replacement".to_string(), Value::String(new_key.to_string()));
                }
                Step::Applied(None)
            }
            ActionKind::Noop => Step::Applied(None),
            ActionKind::Unknown(name) => Step::Skipped(format!("Unknown action \"{}\" for {}", name, old_key)),
        }
    }

    /// Load the store, simulate, and unless `dry_run` back up and overwrite it
    pub fn apply_to_file(
        &self,
        migration: &Migration,
        store_path: &Path,
        writer: &SafeWriter,
        dry_run: bool,
        now: DateTime<Utc>,
    ) -> Result<MigrationRun> {
        let store = TokenStore::load(store_path)?;
        let outcome = self.apply(migration, &store)?;

        if dry_run || !outcome.changed {
            info!(dry_run, changed = outcome.changed, "migration not written");
            return Ok(MigrationRun {
                outcome,
                write: None,
            });
        }

        let contents = outcome.store.to_pretty_json()?;
        let write = writer.write(store_path, &contents, now)?;
        info!(id = %migration.id, applied = outcome.count(ActionState::Applied), "migration applied");
        Ok(MigrationRun {
            outcome,
            write: Some(write),
        })
    }
}

// =============================================================================
// Preview
// =============================================================================

/// One action as listed by the read-only report
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewLine {
    pub action: ActionKind,
    pub old_key: String,
    pub new_key: Option<String>,
    pub missing: bool,
}

/// Read-only listing of a migration against the current store
#[derive(Debug, Clone)]
pub struct MigrationPreview {
    pub migration: Migration,
    pub lines: Vec<PreviewLine>,
}

impl MigrationPreview {
    /// Without a store every key counts as missing
    pub fn build(migration: &Migration, store: Option<&TokenStore>) -> Self {
        let lines = migration
            .actions
            .iter()
            .map(|a| PreviewLine {
                action: a.action.clone(),
                old_key: a.old_key.clone(),
                new_key: a.target().map(String::from),
                missing: store.map(|s| !s.contains_node(&a.old_key)).unwrap_or(true),
            })
            .collect();
        Self {
            migration: migration.clone(),
            lines,
        }
    }

    pub fn missing(&self) -> usize {
        self.lines.iter().filter(|l| l.missing).count()
    }

    pub fn render(&self) -> String {
        let m = &self.migration;
        let mut out = Vec::new();
        out.push(format!("Migration id: {}", m.id));
        out.push(format!("Date: {}", m.date.as_deref().unwrap_or("-")));
        out.push(format!("Author: {}", m.author.as_deref().unwrap_or("-")));
        out.push(format!("Description: {}", m.description.as_deref().unwrap_or("-")));
        out.push("Actions:".to_string());
        for (i, line) in self.lines.iter().enumerate() {
            out.push(format!(
                " {}. {} {} -> {}{}",
                i + 1,
                line.action.to_string().to_uppercase(),
                line.old_key,
                line.new_key.as_deref().unwrap_or("(none)"),
                if line.missing { " [MISSING]" } else { "" }
            ));
        }
        out.push(String::new());
        out.push(format!(
            "Summary: total actions: {}, missing keys: {}",
            self.lines.len(),
            self.missing()
        ));
        if self.missing() > 0 {
            out.push(String::new());
            out.push("Hints:".to_string());
            out.push(" - Run token-migrate with --dry to preview (no changes).".to_string());
            out.push(" - Fix missing keys or confirm they will be added before applying.".to_string());
        }
        out.join("\n")
    }
}

/// Migration files (`*.json`) under `dir`, in file-name order
pub fn collect_migration_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| TokenError::Read {
            path: dir.to_path_buf(),
            source: e.into(),
        })?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().map(|e| e == "json").unwrap_or(false) {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}
