//! Token Lint CLI
//!
//! Runs the semantic validator over the token store.
//! Exit codes: 0 clean, 1 rule violations, 2 missing or unreadable store.

use clap::{Parser, ValueEnum};
use design_tokens::{
    lint::render_text, RunMode, SemanticValidator, TokenConfig, TokenError, TokenStore,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "token-lint")]
#[command(about = "Semantic checks on the token store")]
struct Cli {
    /// Token store (defaults to the configured store path)
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// fast (warnings for soft rules) or deep (CI, soft rules become errors)
    #[arg(short, long)]
    mode: Option<RunMode>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Config file layered over tokens.toml
    #[arg(long)]
    config: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
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
    let mode = cli.mode.unwrap_or(config.lint.mode);

    if !store_path.exists() {
        return Err(TokenError::Usage(format!(
            "token store not found: {}",
            store_path.display()
        )));
    }
    let store = TokenStore::load(&store_path)?;
    let result = SemanticValidator::new(mode).validate(&store);

    match cli.format {
        Format::Text => println!("{}", render_text(&result)),
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    if result.is_clean() && result.has_warnings() {
        eprintln!(
            "⚠️  {} warnings (run with --mode deep to treat them as errors)",
            result.warnings.len()
        );
    }

    if !result.is_clean() {
        eprintln!("❌ Token lint FAILED ({} errors)", result.errors.len());
        std::process::exit(TokenError::Validation(result.error_messages()).exit_code());
    }
    Ok(())
}
