//! Token Sync CLI
//!
//! Reconciles a design-tool export with the persisted token store. Prints a
//! report; without `--dry` it backs up the store and writes the merged result.

use chrono::Utc;
use clap::{Parser, ValueEnum};
use design_tokens::{
    extract::load_document,
    report::{render_json, render_markdown, store_diff, ReportContext},
    sync_to_file, Canonicalizer, ModeStrategy, Reconciler, SafeWriter, StyleMap, TokenConfig,
    TokenError, ValueNormalizer,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "token-sync")]
#[command(about = "Sync a design-tool export into the canonical token store")]
struct Cli {
    /// Export to ingest (canonical or tool-native)
    #[arg(short, long)]
    input: PathBuf,

    /// Style map translating raw names to dot paths
    #[arg(short, long)]
    map: Option<PathBuf>,

    /// Token store to reconcile against and write
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Preview only: print the report, write nothing
    #[arg(long)]
    dry: bool,

    /// How multi-mode values are stored
    #[arg(long)]
    modes: Option<ModeStrategy>,

    /// Report format
    #[arg(long, value_enum, default_value_t = Format::Markdown)]
    format: Format,

    /// Append a unified diff of the store
    #[arg(long)]
    diff: bool,

    /// Config file layered over tokens.toml
    #[arg(long)]
    config: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Markdown,
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("❌ token-sync failed: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), TokenError> {
    let config = TokenConfig::load_from(cli.config.as_deref())?;
    let modes = cli.modes.unwrap_or(config.sync.modes);
    let map_path = cli.map.clone().unwrap_or_else(|| config.sync.map.clone());
    let store_path = cli.output.clone().unwrap_or_else(|| config.store_path());

    if !cli.input.exists() {
        return Err(TokenError::Usage(format!(
            "input file not found: {}",
            cli.input.display()
        )));
    }
    let doc = load_document(&cli.input)?;

    let canonicalizer = Canonicalizer::new(
        ValueNormalizer::new(modes, config.sync.mode_names.clone()),
        StyleMap::load(&map_path)?,
        config.sync.provenance_limit,
    );
    let reconciler = Reconciler::new(config.sync.protected_fields.clone());
    let writer = SafeWriter::new(config.store.backup_dir.clone());
    let run = sync_to_file(
        &doc,
        &store_path,
        &canonicalizer,
        &reconciler,
        &writer,
        cli.dry,
        Utc::now(),
    )?;

    let ctx = ReportContext {
        input: &cli.input,
        map: &map_path,
        output: &store_path,
        dry_run: cli.dry,
    };
    let mut rendered = match cli.format {
        Format::Markdown => render_markdown(&run.plan.report, &ctx),
        Format::Json => render_json(&run.plan.report, &ctx)?,
    };

    let before = run.previous.to_pretty_json()?;
    let after = run.plan.store.to_pretty_json()?;
    if cli.diff && cli.format == Format::Markdown && before != after {
        let label = store_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        rendered.push_str("\n### Store diff\n\n```diff\n");
        rendered.push_str(&store_diff(&before, &after, &label));
        rendered.push_str("```\n");
    }

    if cli.dry {
        println!("{}", rendered);
        return Ok(());
    }

    match &run.write {
        Some(write) => {
            if let Some(backup) = &write.backup {
                println!("💾 Backup created: {}", backup.display());
            }
            println!(
                "✅ Wrote updated tokens to {} ({})",
                store_path.display(),
                write.checksum.short()
            );
        }
        None => println!("✅ Store already up to date: {}", store_path.display()),
    }
    println!();
    println!("{}", rendered);
    Ok(())
}
