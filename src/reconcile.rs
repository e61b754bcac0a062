//! Reconciliation
//!
//! Diffs freshly canonicalized tokens against the persisted store and merges
//! them into a new store. [`Reconciler::reconcile`] is pure: no I/O, the
//! existing store is never mutated.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::canonical::{merge_meta, Canonicalizer};
use crate::error::Result;
use crate::extract::{extract, ExportShape};
use crate::store::{NodeKind, TokenStore};
use crate::token::Token;
use crate::writer::{SafeWriter, WriteOutcome};

// =============================================================================
// Report
// =============================================================================

/// One classified token
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub dot_path: String,
    /// Raw name in the export
    pub name: String,
    pub value: Value,
    /// Stored value before the update
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<Value>,
}

/// A raw entry that could not be placed in the store
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmappedEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dot_path: Option<String>,
    pub reason: String,
}

/// Result of one reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub added: Vec<ReportEntry>,
    pub updated: Vec<ReportEntry>,
    pub unchanged: Vec<ReportEntry>,
    pub unmapped: Vec<UnmappedEntry>,
    pub warnings: Vec<String>,
}

impl SyncReport {
    /// Whether applying this report would change the store
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.updated.is_empty()
    }

    fn forget(&mut self, dot_path: &str) {
        self.added.retain(|e| e.dot_path != dot_path);
        self.updated.retain(|e| e.dot_path != dot_path);
        self.unchanged.retain(|e| e.dot_path != dot_path);
    }
}

// =============================================================================
// Reconciler
// =============================================================================

/// Classifies and merges canonical tokens into a store
#[derive(Debug, Clone)]
pub struct Reconciler {
    protected_fields: Vec<String>,
}

impl Reconciler {
    pub fn new(protected_fields: Vec<String>) -> Self {
        Self { protected_fields }
    }

    pub fn protected_fields(&self) -> &[String] {
        &self.protected_fields
    }

    pub fn reconcile(&self, existing: &TokenStore, tokens: &[Token]) -> (TokenStore, SyncReport) {
        let mut next = existing.clone();
        let mut report = SyncReport::default();
        let mut seen: HashMap<String, String> = HashMap::new();

        for token in tokens {
            let path = token.dot_path.as_str();

            if let Some(previous_name) = seen.get(path) {
                report.warnings.push(format!(
                    "duplicate dot path {}: '{}' overrides '{}'",
                    path, token.name, previous_name
                ));
                report.forget(path);
            }

            match next.node_kind(path) {
                NodeKind::Namespace => {
                    report.unmapped.push(UnmappedEntry {
                        name: token.name.clone(),
                        dot_path: Some(path.to_string()),
                        reason: "conflicts with existing namespace".to_string(),
                    });
                    continue;
                }
                NodeKind::Blocked => {
                    report.unmapped.push(UnmappedEntry {
                        name: token.name.clone(),
                        dot_path: Some(path.to_string()),
                        reason: "parent is a leaf".to_string(),
                    });
                    continue;
                }
                NodeKind::Leaf | NodeKind::Stray | NodeKind::Absent => {}
            }
            seen.insert(path.to_string(), token.name.clone());

            let entry = ReportEntry {
                dot_path: path.to_string(),
                name: token.name.clone(),
                value: token.value.clone(),
                previous: None,
            };

            match existing.leaf(path) {
                None => {
                    next.set(path, token.to_store_record());
                    report.added.push(entry);
                }
                Some(prior) if prior.get("value") == Some(&token.value) => {
                    // a same-path token earlier in this batch may have rewritten it
                    next.set(path, prior.clone());
                    report.unchanged.push(entry);
                }
                Some(prior) => {
                    next.set(path, self.merge_record(prior, token));
                    report.updated.push(ReportEntry {
                        previous: prior.get("value").cloned(),
                        ..entry
                    });
                }
            }
        }

        debug!(
            added = report.added.len(),
            updated = report.updated.len(),
            unchanged = report.unchanged.len(),
            unmapped = report.unmapped.len(),
            "reconciled"
        );
        (next, report)
    }

    /// Existing record overlaid with the token's fields; meta merged with
    /// protected fields carried forward
    pub fn merge_record(&self, prior: &Map<String, Value>, token: &Token) -> Map<String, Value> {
        let mut record = prior.clone();
        for (key, value) in token.to_store_record() {
            if key != "meta" {
                record.insert(key, value);
            }
        }
        let prior_meta = prior
            .get("meta")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let meta = merge_meta(&prior_meta, &token.full_meta(), &self.protected_fields);
        record.insert("meta".to_string(), Value::Object(meta));
        record
    }
}

// =============================================================================
// Sync Pipeline
// =============================================================================

/// Everything a sync run computes before deciding whether to write
#[derive(Debug)]
pub struct SyncPlan {
    pub shape: Option<ExportShape>,
    pub store: TokenStore,
    pub report: SyncReport,
}

/// Extract, canonicalize and reconcile `doc` against `existing`
pub fn plan_sync(
    doc: &Value,
    existing: &TokenStore,
    canonicalizer: &Canonicalizer,
    reconciler: &Reconciler,
) -> SyncPlan {
    let extraction = extract(doc);
    let mut warnings: Vec<String> = extraction
        .warnings
        .iter()
        .map(|w| {
            if w.path.is_empty() {
                w.note.clone()
            } else {
                format!("{}: {}", w.path, w.note)
            }
        })
        .collect();
    if extraction.shape.is_none() {
        warnings.push("no tokens found in input document".to_string());
    }

    let batch = canonicalizer.canonicalize_all(&extraction.entries);
    for (dot_path, name, reason) in &batch.dropped {
        warnings.push(format!("{} ({}): {}, token dropped", dot_path, name, reason));
    }

    let (store, mut report) = reconciler.reconcile(existing, &batch.tokens);
    let mut unmapped: Vec<UnmappedEntry> = batch
        .unmapped
        .into_iter()
        .map(|(name, reason)| UnmappedEntry {
            name,
            dot_path: None,
            reason,
        })
        .collect();
    unmapped.append(&mut report.unmapped);
    report.unmapped = unmapped;
    warnings.append(&mut report.warnings);
    report.warnings = warnings;

    info!(
        shape = extraction.shape.map(|s| s.label()).unwrap_or("none"),
        tokens = batch.tokens.len(),
        "sync planned"
    );
    SyncPlan {
        shape: extraction.shape,
        store,
        report,
    }
}

/// A planned sync and, unless nothing was written, the write it made
#[derive(Debug)]
pub struct SyncRun {
    /// Store as it was on disk (empty when the file did not exist)
    pub previous: TokenStore,
    pub plan: SyncPlan,
    pub write: Option<WriteOutcome>,
}

/// Plan a sync of `doc` against the store at `store_path`, then unless
/// `dry_run` back it up and overwrite it.
///
/// An existing store with no changes is left alone.
pub fn sync_to_file(
    doc: &Value,
    store_path: &Path,
    canonicalizer: &Canonicalizer,
    reconciler: &Reconciler,
    writer: &SafeWriter,
    dry_run: bool,
    now: DateTime<Utc>,
) -> Result<SyncRun> {
    let previous = TokenStore::load_or_empty(store_path)?;
    let plan = plan_sync(doc, &previous, canonicalizer, reconciler);

    if dry_run || (!plan.report.has_changes() && store_path.exists()) {
        info!(dry_run, changed = plan.report.has_changes(), "sync not written");
        return Ok(SyncRun {
            previous,
            plan,
            write: None,
        });
    }

    let contents = plan.store.to_pretty_json()?;
    let write = writer.write(store_path, &contents, now)?;
    Ok(SyncRun {
        previous,
        plan,
        write: Some(write),
    })
}
