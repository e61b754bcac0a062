//! Design Token Pipeline
//!
//! Ingests token exports from design tools, canonicalizes them, reconciles
//! them against a persisted JSON token store, applies versioned migrations,
//! and validates the store semantically.
//!
//! ## Features
//!
//! - **Shape Detection**: canonical exports, flat maps, `properties` maps,
//!   style arrays and arbitrary trees, each a tagged [`ExportShape`]
//! - **Canonicalization**: stable dot paths, normalized colors, multi-mode
//!   values, bounded provenance
//! - **Reconciliation**: pure diff of new tokens against the store with a
//!   Markdown/JSON report
//! - **Migrations**: rename, alias, deprecate and noop actions, validated as a
//!   batch before anything is written
//! - **Safe Writes**: verified timestamped backup, then an atomic overwrite
//!
//! ## Pipeline
//!
//! ```text
//! export.json
//!   └─ extract ──> (rawName, rawEntry)*
//!        └─ canonicalize ──> Token*
//!             └─ reconcile(store) ──> (store', SyncReport)
//!                  └─ SafeWriter: backup, verify, atomic replace
//!
//! migration.json ──> MigrationApplier(store) ──> SafeWriter
//! tokens.json ──> SemanticValidator ──> LintResult
//! ```

pub mod canonical;
pub mod checksum;
pub mod config;
pub mod error;
pub mod extract;
pub mod lint;
pub mod migration;
pub mod naming;
pub mod reconcile;
pub mod report;
pub mod store;
pub mod token;
pub mod value;
pub mod writer;

pub use canonical::{CanonicalExport, Canonicalizer, StyleMap};
pub use checksum::Checksum;
pub use config::TokenConfig;
pub use error::{Result, TokenError};
pub use extract::{extract, ExportShape, Extraction, RawEntry};
pub use lint::{LintResult, RunMode, SemanticValidator};
pub use migration::{Migration, MigrationApplier, MigrationPreview};
pub use reconcile::{plan_sync, sync_to_file, Reconciler, SyncPlan, SyncReport, SyncRun};
pub use store::TokenStore;
pub use token::{Provenance, Token};
pub use value::{ModeStrategy, ValueNormalizer};
pub use writer::SafeWriter;
