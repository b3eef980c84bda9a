use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use tdc_importer::config::ImporterConfig;
use tdc_importer::idgen::UuidIds;
use tdc_importer::importer::ImportOrchestrator;
use tdc_importer::logging::init_logging;
use tdc_importer::matcher::SongMatcher;
use tdc_importer::pipeline::{self, OperatorMappings};
use tdc_importer::storage::sqlite::SqliteCatalog;

#[derive(Parser)]
#[command(name = "tdc_importer")]
#[command(about = "Legacy CSV importer for the Touhou Doujin Catalog")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a legacy CSV export and print records plus song match
    /// candidates for review. Performs no writes.
    Preview {
        /// Path to the legacy CSV export
        #[arg(long)]
        file: PathBuf,
        /// Path to the SQLite catalog database
        #[arg(long)]
        db: PathBuf,
    },
    /// Import a legacy CSV export into the catalog.
    Import {
        /// Path to the legacy CSV export
        #[arg(long)]
        file: PathBuf,
        /// Path to the SQLite catalog database
        #[arg(long)]
        db: PathBuf,
        /// JSON file of operator-confirmed song mappings
        /// ({"mappings": {name: song_id}, "custom_names": {name: text}})
        #[arg(long)]
        mappings: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let config = ImporterConfig::load_or_default()?;
    init_logging(&config.log_dir);

    let cli = Cli::parse();

    match cli.command {
        Commands::Preview { file, db } => {
            let csv_text = std::fs::read_to_string(&file)?;
            let catalog = Arc::new(SqliteCatalog::open(&db)?);
            let matcher = SongMatcher::new(catalog, config.candidate_limit);

            let preview = pipeline::preview(&csv_text, &matcher).await?;
            info!(
                records = preview.outcome.records.len(),
                parse_errors = preview.outcome.errors.len(),
                songs = preview.matches.len(),
                "preview complete"
            );
            println!("{}", serde_json::to_string_pretty(&preview)?);
        }
        Commands::Import { file, db, mappings } => {
            let csv_text = std::fs::read_to_string(&file)?;
            let catalog = Arc::new(SqliteCatalog::open(&db)?);
            let matcher = SongMatcher::new(catalog.clone(), config.candidate_limit);

            let preview = pipeline::preview(&csv_text, &matcher).await?;
            if !preview.outcome.success && preview.outcome.records.is_empty() {
                anyhow::bail!(
                    "CSV failed structural validation: {}",
                    preview
                        .outcome
                        .errors
                        .first()
                        .map(|e| e.message.as_str())
                        .unwrap_or("unknown")
                );
            }

            let operator = match mappings {
                Some(path) => OperatorMappings::load(&path)?,
                None => OperatorMappings::default(),
            };

            // Auto-matched names stand unless the operator overrode them;
            // "partial" names stay unmapped (and are skipped) without an
            // operator decision.
            let mut song_mappings = operator.mappings;
            let mut custom_names = operator.custom_names;
            for matched in &preview.matches {
                if !matched.auto_matched {
                    continue;
                }
                if let Some(id) = &matched.selected_id {
                    song_mappings
                        .entry(matched.original_name.clone())
                        .or_insert_with(|| id.clone());
                }
                if let Some(custom) = &matched.custom_song_name {
                    custom_names
                        .entry(matched.original_name.clone())
                        .or_insert_with(|| custom.clone());
                }
            }

            let orchestrator =
                ImportOrchestrator::new(catalog, Arc::new(UuidIds), config.clone());
            let result = orchestrator
                .execute_import(&preview.outcome.records, &song_mappings, &custom_names)
                .await;

            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
