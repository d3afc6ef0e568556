mod report;

use brandpulse_core::{AppConfig, EntityConfig};
use brandpulse_monitor::{
    ArtifactWriter, Pipeline, RawPost, SnapshotStore, Source, ValidationOutcome,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "brandpulse-cli")]
#[command(about = "Brand mention monitoring command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the full pipeline once and print the ranking report
    Refresh {
        /// Print the snapshot as JSON instead of the text report
        #[arg(long)]
        json: bool,
    },
    /// Classify a single ad-hoc post for one tracked entity
    Validate {
        /// Tracked entity name, as listed in the entities file
        #[arg(long)]
        entity: String,

        #[arg(long)]
        title: String,

        #[arg(long)]
        body: Option<String>,
    },
    /// List tracked entities and how they are matched
    Entities,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = brandpulse_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let entities = brandpulse_core::load_entities(&config.entities_path)?.entities;

    match cli.command {
        Some(Commands::Refresh { json }) => run_refresh(&config, &entities, json).await?,
        Some(Commands::Validate {
            entity,
            title,
            body,
        }) => run_validate(&config, &entities, &entity, title, body).await?,
        Some(Commands::Entities) => run_entities(&entities),
        None => println!("brandpulse-cli ready; see --help for commands"),
    }

    Ok(())
}

/// Run one refresh and print the result.
///
/// Ctrl-c cancels the run; nothing is printed or written in that case.
async fn run_refresh(
    config: &AppConfig,
    entities: &[EntityConfig],
    json: bool,
) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_config(config, entities)?;
    let artifacts = config.artifacts_dir.clone().map(ArtifactWriter::new);
    let store = SnapshotStore::new(pipeline, artifacts);

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted; cancelling refresh");
                cancel.cancel();
            }
        })
    };

    let result = store.refresh(&cancel).await;
    watcher.abort();
    let snapshot = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
    } else {
        print!("{}", report::Report::new(&snapshot, Utc::now()));
    }
    if let Some(dir) = &config.artifacts_dir {
        println!("artifacts written to {}", dir.display());
    }
    Ok(())
}

async fn run_validate(
    config: &AppConfig,
    entities: &[EntityConfig],
    entity: &str,
    title: String,
    body: Option<String>,
) -> anyhow::Result<()> {
    let Some(tracked) = entities.iter().find(|e| e.name.eq_ignore_ascii_case(entity)) else {
        anyhow::bail!("entity '{entity}' is not tracked");
    };

    let pipeline = Pipeline::from_config(config, entities)?;
    let post = adhoc_post(&tracked.name, title, body);
    let outcome = pipeline.validator().validate(&post).await;

    match &outcome {
        ValidationOutcome::Dropped { error } => {
            anyhow::bail!("model call failed: {error}");
        }
        ValidationOutcome::Fallback { reason, .. } => {
            println!("model output was unusable ({reason}); fallback verdict applied");
        }
        ValidationOutcome::Repaired(_) => println!("model output repaired on second attempt"),
        ValidationOutcome::Validated(_) => {}
    }
    if let Some(result) = outcome.result() {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}

fn adhoc_post(entity: &str, title: String, body: Option<String>) -> RawPost {
    RawPost {
        source_id: "cli".to_string(),
        source: Source::Reddit,
        title,
        body: body.filter(|b| !b.trim().is_empty()),
        raw_score: 0,
        comment_count: 0,
        extra_ratio: 1.0,
        created_at: Utc::now(),
        permalink: String::new(),
        community: "cli".to_string(),
        author: String::new(),
        matched_brand: Some(entity.to_string()),
    }
}

fn run_entities(entities: &[EntityConfig]) {
    println!("{:<25}MATCHING", "ENTITY");
    for entity in entities {
        println!("{:<25}{}", entity.name, entity.policy());
    }
}
