//! Migration CLI
//!
//! Applies a migration file to the token store. `--dry` prints the summary
//! without touching the filesystem.

use chrono::Utc;
use clap::Parser;
use design_tokens::{
    migration::ActionState, Migration, MigrationApplier, SafeWriter, TokenConfig, TokenError,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "token-migrate")]
#[command(about = "Apply a token migration (rename / alias / deprecate / noop)")]
struct Cli {
    /// Migration file
    #[arg(short, long)]
    file: PathBuf,

    /// Token store (defaults to the configured store path)
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Preview only: no backup, no write
    #[arg(long)]
    dry: bool,

    /// Abort the whole batch if any oldKey is missing
    #[arg(long)]
    fail_on_missing: bool,

    /// Config file layered over tokens.toml
    #[arg(long)]
    config: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("❌ {}", e);
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), TokenError> {
    let config = TokenConfig::load_from(cli.config.as_deref())?;
    let store_path = cli.store.clone().unwrap_or_else(|| config.store_path());

    if !cli.file.exists() {
        return Err(TokenError::Usage(format!(
            "migration file not found: {}",
            cli.file.display()
        )));
    }
    if !store_path.exists() {
        return Err(TokenError::Usage(format!(
            "token store not found: {}",
            store_path.display()
        )));
    }

    let migration = Migration::load(&cli.file)?;
    let applier = MigrationApplier::new(cli.fail_on_missing);
    let writer = SafeWriter::new(config.store.backup_dir.clone());
    let applied = applier.apply_to_file(&migration, &store_path, &writer, cli.dry, Utc::now())?;

    for warning in &applied.outcome.warnings {
        eprintln!("⚠️  {}", warning);
    }
    let summary = serde_json::to_string_pretty(&applied.outcome.summary())?;

    if cli.dry {
        println!("🔍 Dry-run: no files written. Summary:");
        println!("{}", summary);
        return Ok(());
    }

    match &applied.write {
        Some(write) => {
            if let Some(backup) = &write.backup {
                println!("💾 Backup created at {}", backup.display());
            }
            println!("✅ Updated tokens written to {}", write.path.display());
        }
        None => println!("✅ No changes to write ({} applied)", applied.outcome.count(ActionState::Applied)),
    }
    println!("Migration summary:");
    println!("{}", summary);
    println!("Next steps: run token-lint --mode deep and open a PR with this change.");
    Ok(())
}
