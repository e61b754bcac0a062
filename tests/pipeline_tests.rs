//! End-to-end pipeline tests
//!
//! Sync, migrate and lint against a store on disk.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

use design_tokens::{
    plan_sync, sync_to_file, CanonicalExport, Canonicalizer, Migration, MigrationApplier,
    Reconciler, RunMode, SafeWriter, SemanticValidator, StyleMap, TokenError, TokenStore,
    ValueNormalizer,
};

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 9, hour, 5, 7).unwrap()
}

fn canonicalizer() -> Canonicalizer {
    Canonicalizer::new(ValueNormalizer::default(), StyleMap::default(), 4096)
}

fn reconciler() -> Reconciler {
    Reconciler::new(vec!["owner".to_string(), "notes".to_string()])
}

fn sync_into(doc: &Value, store_path: &Path, writer: &SafeWriter, now: DateTime<Utc>) {
    let existing = TokenStore::load_or_empty(store_path).unwrap();
    let plan = plan_sync(doc, &existing, &canonicalizer(), &reconciler());
    writer
        .write(store_path, &plan.store.to_pretty_json().unwrap(), now)
        .unwrap();
}

fn backup_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    files.sort();
    files
}

fn seed_store(path: &Path) -> String {
    let store = json!({
        "color": {
            "brand": {
                "primary": {"value": "#0A84FF", "type": "color"}
            },
            "legacy": {
                "blue": {"value": "#0060DF", "type": "color"}
            }
        },
        "spacing": {
            "scale": {
                "2": {"value": 8, "type": "spacing"}
            }
        }
    });
    let contents = format!("{}\n", serde_json::to_string_pretty(&store).unwrap());
    fs::write(path, &contents).unwrap();
    contents
}

fn migration(actions: Value) -> Migration {
    serde_json::from_value(json!({
        "id": "2024-03-rebrand",
        "author": "design-systems",
        "actions": actions
    }))
    .unwrap()
}

// =============================================================================
// Sync
// =============================================================================

#[test]
fn test_sync_creates_store_then_converges() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("tokens").join("tokens.json");
    let backups = dir.path().join("backups");
    let writer = SafeWriter::new(Some(backups.clone()));
    let doc: Value = serde_json::from_str(include_str!("fixtures/figma-tokens-export.json")).unwrap();

    let existing = TokenStore::load_or_empty(&store_path).unwrap();
    assert_eq!(existing.leaf_count(), 0);
    let plan = plan_sync(&doc, &existing, &canonicalizer(), &reconciler());
    assert_eq!(plan.report.added.len(), 4);

    let first = writer
        .write(&store_path, &plan.store.to_pretty_json().unwrap(), at(10))
        .unwrap();
    assert!(first.backup.is_none());
    assert!(backup_files(&backups).is_empty());

    // a second run over the same export changes nothing
    let stored = TokenStore::load(&store_path).unwrap();
    let again = plan_sync(&doc, &stored, &canonicalizer(), &reconciler());
    assert!(again.report.added.is_empty());
    assert!(again.report.updated.is_empty());
    assert_eq!(again.report.unchanged.len(), 4);
    assert!(!again.report.has_changes());
    assert_eq!(again.store, stored);
}

#[test]
fn test_sync_update_backs_up_previous_store() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("tokens.json");
    let backups = dir.path().join("backups");
    let writer = SafeWriter::new(Some(backups.clone()));
    let mut doc: Value =
        serde_json::from_str(include_str!("fixtures/figma-tokens-export.json")).unwrap();

    sync_into(&doc, &store_path, &writer, at(10));
    let before = fs::read_to_string(&store_path).unwrap();

    // owner-managed metadata survives the next sync
    let mut stored = TokenStore::load(&store_path).unwrap();
    let record = stored.leaf_mut("color.brand.primary").unwrap();
    record["meta"]["owner"] = json!("brand-team");
    fs::write(&store_path, stored.to_pretty_json().unwrap()).unwrap();
    let edited = fs::read_to_string(&store_path).unwrap();
    assert_ne!(before, edited);

    doc["global"]["color"]["brand"]["primary"]["value"] = json!("#ff0000");
    let existing = TokenStore::load(&store_path).unwrap();
    let plan = plan_sync(&doc, &existing, &canonicalizer(), &reconciler());
    assert_eq!(plan.report.updated.len(), 1);
    assert_eq!(plan.report.updated[0].previous, Some(json!("#0A84FF")));
    assert_eq!(plan.report.updated[0].value, json!("#FF0000"));

    let outcome = writer
        .write(&store_path, &plan.store.to_pretty_json().unwrap(), at(11))
        .unwrap();
    let backup = outcome.backup.unwrap();
    assert_eq!(backup, backups.join("tokens.json.bak.2024-03-09T11-05-07-000Z.json"));
    assert_eq!(fs::read_to_string(&backup).unwrap(), edited);

    let updated = TokenStore::load(&store_path).unwrap();
    let record = updated.leaf("color.brand.primary").unwrap();
    assert_eq!(record["value"], json!("#FF0000"));
    assert_eq!(record["meta"]["owner"], json!("brand-team"));
}

#[test]
fn test_sync_dry_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("tokens.json");
    let backups = dir.path().join("backups");
    let writer = SafeWriter::new(Some(backups.clone()));
    let mut doc: Value =
        serde_json::from_str(include_str!("fixtures/figma-tokens-export.json")).unwrap();

    sync_into(&doc, &store_path, &writer, at(10));
    fs::create_dir_all(&backups).unwrap();
    fs::write(backups.join("tokens.json.bak.earlier.json"), "{}\n").unwrap();
    let store_before = fs::read(&store_path).unwrap();
    let backups_before = backup_files(&backups);

    doc["global"]["color"]["brand"]["primary"]["value"] = json!("#ff0000");
    let run = sync_to_file(
        &doc,
        &store_path,
        &canonicalizer(),
        &reconciler(),
        &writer,
        true,
        at(11),
    )
    .unwrap();

    assert!(run.write.is_none());
    assert_eq!(run.plan.report.updated.len(), 1);
    assert_ne!(run.plan.store, run.previous);
    assert_eq!(fs::read(&store_path).unwrap(), store_before);
    assert_eq!(backup_files(&backups), backups_before);
    assert_eq!(fs::read_to_string(&backups_before[0]).unwrap(), "{}\n");
}

#[test]
fn test_sync_without_changes_leaves_store_alone() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("tokens.json");
    let backups = dir.path().join("backups");
    let writer = SafeWriter::new(Some(backups.clone()));
    let doc: Value = serde_json::from_str(include_str!("fixtures/figma-tokens-export.json")).unwrap();

    let first = sync_to_file(&doc, &store_path, &canonicalizer(), &reconciler(), &writer, false, at(10))
        .unwrap();
    assert!(first.write.is_some());
    let written = fs::read(&store_path).unwrap();

    let second = sync_to_file(&doc, &store_path, &canonicalizer(), &reconciler(), &writer, false, at(11))
        .unwrap();
    assert!(second.write.is_none());
    assert_eq!(fs::read(&store_path).unwrap(), written);
    assert!(backup_files(&backups).is_empty());
}

#[test]
fn test_adapter_export_syncs_like_the_source() {
    let doc: Value = serde_json::from_str(include_str!("fixtures/token-studio-export.json")).unwrap();

    let direct = plan_sync(&doc, &TokenStore::new(), &canonicalizer(), &reconciler());

    let tokens = canonicalizer()
        .canonicalize_all(&design_tokens::extract(&doc).entries)
        .tokens;
    let export = CanonicalExport::new("token-studio-adapter", at(9), &tokens);
    let export_doc = serde_json::to_value(&export).unwrap();
    assert_eq!(export_doc["schemaVersion"], json!("1.0"));
    assert_eq!(export_doc["source"]["plugin"], json!("token-studio-adapter"));

    let via_export = plan_sync(&export_doc, &TokenStore::new(), &canonicalizer(), &reconciler());
    assert_eq!(via_export.store, direct.store);
    assert_eq!(via_export.report.added.len(), direct.report.added.len());
}

#[test]
fn test_synced_store_passes_deep_lint() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("tokens.json");
    let writer = SafeWriter::new(None);
    let doc: Value = serde_json::from_str(include_str!("fixtures/figma-tokens-export.json")).unwrap();
    sync_into(&doc, &store_path, &writer, at(10));

    let store = TokenStore::load(&store_path).unwrap();
    let result = SemanticValidator::new(RunMode::Deep).validate(&store);
    assert_eq!(result.tokens, 4);
    assert!(result.is_clean(), "{:?}", result.errors);
}

// =============================================================================
// Migrations
// =============================================================================

#[test]
fn test_rename_and_alias_written_with_backup() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("tokens.json");
    let backups = dir.path().join("backups");
    let original = seed_store(&store_path);

    let m = migration(json!([
        {"oldKey": "color.brand.primary", "newKey": "color.brand.accent", "action": "rename"},
        {"oldKey": "color.legacy.blue", "newKey": "color.brand.blue", "action": "alias"}
    ]));
    let run = MigrationApplier::new(false)
        .apply_to_file(&m, &store_path, &SafeWriter::new(Some(backups.clone())), false, at(12))
        .unwrap();

    assert!(run.outcome.changed);
    let write = run.write.unwrap();
    assert_eq!(fs::read_to_string(write.backup.unwrap()).unwrap(), original);

    let store = TokenStore::load(&store_path).unwrap();
    assert!(store.get("color.brand.primary").is_none());
    assert_eq!(store.leaf("color.brand.accent").unwrap()["value"], json!("#0A84FF"));
    assert_eq!(store.leaf("color.brand.blue").unwrap()["value"], json!("#0060DF"));
    let legacy = store.leaf("color.legacy.blue").unwrap();
    assert_eq!(legacy["deprecated"], json!(true));
    assert_eq!(legacy["replacement"], json!("color.brand.blue"));
}

#[test]
fn test_fail_on_missing_leaves_store_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("tokens.json");
    let backups = dir.path().join("backups");
    let original = seed_store(&store_path);

    let m = migration(json!([
        {"oldKey": "color.brand.primary", "newKey": "color.brand.accent", "action": "rename"},
        {"oldKey": "color.brand.missing", "action": "deprecate"}
    ]));
    let err = MigrationApplier::new(true)
        .apply_to_file(&m, &store_path, &SafeWriter::new(Some(backups.clone())), false, at(12))
        .unwrap_err();

    match &err {
        TokenError::MissingKeys(keys) => assert_eq!(keys, &vec!["color.brand.missing".to_string()]),
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(err.exit_code(), 1);
    assert_eq!(fs::read_to_string(&store_path).unwrap(), original);
    assert!(backup_files(&backups).is_empty());
}

#[test]
fn test_dry_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("tokens.json");
    let backups = dir.path().join("backups");
    let original = seed_store(&store_path);

    let m = migration(json!([
        {"oldKey": "color.legacy.blue", "newKey": "color.brand.primary", "action": "deprecate"}
    ]));
    let run = MigrationApplier::new(false)
        .apply_to_file(&m, &store_path, &SafeWriter::new(Some(backups.clone())), true, at(12))
        .unwrap();

    assert!(run.outcome.changed);
    assert!(run.write.is_none());
    assert_eq!(fs::read_to_string(&store_path).unwrap(), original);
    assert!(backup_files(&backups).is_empty());
}

#[test]
fn test_structural_errors_abort_before_any_write() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("tokens.json");
    let original = seed_store(&store_path);

    let m = migration(json!([
        {"oldKey": "color.brand.primary", "action": "rename"}
    ]));
    let err = MigrationApplier::new(false)
        .apply_to_file(&m, &store_path, &SafeWriter::new(None), false, at(12))
        .unwrap_err();

    assert!(matches!(err, TokenError::StructuralMigration(_)));
    assert_eq!(fs::read_to_string(&store_path).unwrap(), original);
}

// =============================================================================
// Lint
// =============================================================================

#[test]
fn test_same_category_duplicates_reported_once() {
    let store = TokenStore::from_value(json!({
        "color": {
            "a": {"value": "#FFFFFF", "type": "color"},
            "b": {"value": "#FFFFFF", "type": "color"},
            "c": {"value": " #FFFFFF ", "type": "color"}
        }
    }))
    .unwrap();

    let result = SemanticValidator::new(RunMode::Fast).validate(&store);
    let duplicates: Vec<_> = result
        .errors
        .iter()
        .filter(|e| e.code == "DUPLICATE_VALUE_SAME_CATEGORY")
        .collect();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].path, "color.a");
    assert!(duplicates[0].message.contains("color.a, color.b, color.c"));
}

#[test]
fn test_deep_mode_escalates_deprecations() {
    let store = TokenStore::from_value(json!({
        "color": {
            "old": {"value": "#111111", "type": "color", "deprecated": true},
            "gone": {"value": "#222222", "type": "color", "deprecated": true, "replacement": "color.nowhere"}
        }
    }))
    .unwrap();

    let fast = SemanticValidator::new(RunMode::Fast).validate(&store);
    assert!(fast.is_clean());
    assert_eq!(fast.warnings.len(), 2);

    let deep = SemanticValidator::new(RunMode::Deep).validate(&store);
    let codes: Vec<&str> = deep.errors.iter().map(|e| e.code).collect();
    assert_eq!(codes, vec!["DEPRECATED_NO_REPLACEMENT", "REPLACEMENT_MISSING"]);
    assert_eq!(
        TokenError::Validation(deep.error_messages()).exit_code(),
        1
    );
}
