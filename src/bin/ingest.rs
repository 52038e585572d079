use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use gameshelf::api::models::MultiGameResponse;
use gameshelf::env_boot;
use gameshelf::ingest::models::{BatchOutcome, IngestionItem, SourceKind};
use gameshelf::util::env as env_util;
use gameshelf::util::logging::init_tracing;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceArg {
    Wiki,
    Steam,
    Catalog,
}

impl From<SourceArg> for SourceKind {
    fn from(s: SourceArg) -> Self {
        match s {
            SourceArg::Wiki => SourceKind::Wiki,
            SourceArg::Steam => SourceKind::Steam,
            SourceArg::Catalog => SourceKind::Catalog,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "ingest", version, about = "Create games in bulk from names")]
struct Cli {
    /// Catalog user that will own the created games
    #[arg(long, env = "INGEST_USER_ID")]
    user_id: i64,

    /// Source every name is resolved against
    #[arg(long, value_enum, default_value = "wiki")]
    source: SourceArg,

    /// Read additional names from a file, one per line
    #[arg(long)]
    file: Option<std::path::PathBuf>,

    /// Game names
    names: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    init_tracing("info,sqlx=warn")?;

    let cli = Cli::parse();
    let mut names = cli.names.clone();
    if let Some(path) = &cli.file {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        names.extend(
            raw.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        );
    }

    let source = SourceKind::from(cli.source);
    let items: Vec<IngestionItem> = names
        .iter()
        .map(|n| IngestionItem::new(n.as_str(), source))
        .collect();

    let booted = env_boot::boot().await?;
    info!(count = items.len(), %source, user_id = cli.user_id, "running batch");
    let result = booted
        .orchestrator
        .run(items, Some(cli.user_id))
        .await
        .map_err(|rejection| anyhow::anyhow!(rejection))?;

    let outcome = result.outcome();
    let body = MultiGameResponse::from(result);
    println!("{}", serde_json::to_string_pretty(&body)?);

    if outcome == BatchOutcome::InternalError {
        std::process::exit(2);
    }
    Ok(())
}
