//! Migration Report CLI
//!
//! Lists the actions of one migration file, or every migration in a
//! directory, against the current store. Never writes.

use clap::Parser;
use design_tokens::{
    migration::collect_migration_files, Migration, MigrationPreview, TokenConfig, TokenError,
    TokenStore,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "token-migration-report")]
#[command(about = "Preview token migrations against the store (read-only)")]
struct Cli {
    /// Migration file
    #[arg(short, long, conflicts_with = "dir", required_unless_present = "dir")]
    file: Option<PathBuf>,

    /// Directory of migration files, reported in file-name order
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Token store (defaults to the configured store path)
    #[arg(short, long)]
    store: Option<PathBuf>,

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

    let files = match (&cli.file, &cli.dir) {
        (Some(file), _) => {
            if !file.exists() {
                return Err(TokenError::Usage(format!(
                    "migration file not found: {}",
                    file.display()
                )));
            }
            vec![file.clone()]
        }
        (None, Some(dir)) => {
            if !dir.is_dir() {
                return Err(TokenError::Usage(format!(
                    "migration directory not found: {}",
                    dir.display()
                )));
            }
            collect_migration_files(dir)?
        }
        (None, None) => return Err(TokenError::Usage("--file or --dir is required".to_string())),
    };

    // without a store every key is reported missing
    let store = if store_path.exists() {
        Some(TokenStore::load(&store_path)?)
    } else {
        eprintln!("⚠️  token store not found: {}", store_path.display());
        None
    };

    if files.is_empty() {
        println!("No migration files found.");
        return Ok(());
    }

    for (i, file) in files.iter().enumerate() {
        if i > 0 {
            println!();
        }
        let migration = Migration::load(file)?;
        let preview = MigrationPreview::build(&migration, store.as_ref());
        if files.len() > 1 {
            println!("📄 {}", file.display());
        }
        println!("{}", preview.render());
    }
    Ok(())
}
