//! Token Adapter CLI
//!
//! Converts a design-tool export (Figma Tokens, Token Studio, Figmagic, style
//! arrays, plain trees) into a canonical export document.

use chrono::Utc;
use clap::{Parser, ValueEnum};
use design_tokens::{
    extract::load_document, writer::write_atomic, CanonicalExport, Canonicalizer, ModeStrategy,
    StyleMap, TokenConfig, TokenError, ValueNormalizer,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "token-adapter")]
#[command(about = "Convert a design-tool token export into the canonical export format")]
struct Cli {
    /// Plugin export to convert
    #[arg(short, long)]
    input: PathBuf,

    /// Canonical export to write
    #[arg(short, long, default_value = "figma/canonical-export.json")]
    output: PathBuf,

    /// Tool that produced the export (recorded as source.plugin)
    #[arg(short, long, value_enum, default_value_t = Source::FigmaTokens)]
    source: Source,

    /// How multi-mode values are represented
    #[arg(long)]
    modes: Option<ModeStrategy>,

    /// Optional style map applied while deriving dot paths
    #[arg(long)]
    map: Option<PathBuf>,

    /// Config file layered over tokens.toml
    #[arg(long)]
    config: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Source {
    FigmaTokens,
    TokenStudio,
    Figmagic,
}

impl Source {
    fn plugin(self) -> &'static str {
        match self {
            Source::FigmaTokens => "figma-tokens-adapter",
            Source::TokenStudio => "token-studio-adapter",
            Source::Figmagic => "figmagic-adapter",
        }
    }
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
    let modes = cli.modes.unwrap_or(config.sync.modes);

    let doc = load_document(&cli.input)?;
    let style_map = match &cli.map {
        Some(path) => StyleMap::load(path)?,
        None => StyleMap::default(),
    };
    let canonicalizer = Canonicalizer::new(
        ValueNormalizer::new(modes, config.sync.mode_names.clone()),
        style_map,
        config.sync.provenance_limit,
    );

    let extraction = design_tokens::extract(&doc);
    for warning in &extraction.warnings {
        eprintln!("⚠️  {}: {}", warning.path, warning.note);
    }
    let Some(shape) = extraction.shape else {
        return Err(TokenError::Validation(vec![format!(
            "no tokens found in {}",
            cli.input.display()
        )]));
    };

    let batch = canonicalizer.canonicalize_all(&extraction.entries);
    for (name, reason) in &batch.unmapped {
        eprintln!("⚠️  {}: {}, skipped", name, reason);
    }
    for (dot_path, name, reason) in &batch.dropped {
        eprintln!("⚠️  {} ({}): {}, dropped", dot_path, name, reason);
    }

    let export = CanonicalExport::new(cli.source.plugin(), Utc::now(), &batch.tokens);
    let mut json = serde_json::to_string_pretty(&export)?;
    json.push('\n');
    write_atomic(&cli.output, &json)?;

    println!(
        "✅ Wrote canonical export ({} tokens, {} shape, modes={}) to {}",
        batch.tokens.len(),
        shape.label(),
        modes,
        cli.output.display()
    );
    Ok(())
}
