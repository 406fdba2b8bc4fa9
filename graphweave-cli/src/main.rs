use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use graphweave::cache::MemoryCache;
use graphweave::database::migrations::Migrator;
use graphweave::database::{establish_connection, get_database_url};
use graphweave::domain::{DataStaging, KeyKind, OntologyKey, TransformationRule};
use graphweave::ontology::{CachedKeyLookup, DatabaseOntology, InMemoryOntology};
use graphweave::queue::{DatabaseQueue, Queue};
use graphweave::services::{
    EdgeLinker, EdgeQueueConsumer, EdgeQueueProducer, ProcessingService, StagingService,
    TransformationRepository,
};
use graphweave::workers::{self, ProcessDataSource};
use graphweave::{EngineConfig, TransformationEngine};
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    /// TOML engine configuration
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,
    /// Database path or URL, overriding the configuration
    #[clap(short, long, global = true)]
    database: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Db {
        #[clap(subcommand)]
        command: DbCommands,
    },
    /// Load metatype and relationship keys into the database
    Ontology {
        #[clap(short, long)]
        file: PathBuf,
    },
    Transformation {
        #[clap(subcommand)]
        command: TransformationCommands,
    },
    /// Apply one rule to one payload without touching the database
    Transform {
        #[clap(short, long)]
        rule: PathBuf,
        #[clap(short, long)]
        payload: PathBuf,
        #[clap(short, long)]
        ontology: PathBuf,
    },
    /// Stage a JSON payload, or every element of a JSON array
    Stage {
        #[clap(long)]
        data_source: String,
        #[clap(short, long)]
        file: PathBuf,
        #[clap(short, long)]
        import: Option<String>,
    },
    Process {
        #[clap(long, required = true)]
        data_source: Vec<String>,
        /// Put a processing request on the queue instead of running inline
        #[clap(long)]
        enqueue: bool,
    },
    /// Run one batch linking pass over orphaned edges
    Link {
        #[clap(long)]
        container: Option<String>,
    },
    /// Run the queue consumers and periodic linking until interrupted
    Work,
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    Init,
    Migrate {
        #[clap(subcommand)]
        direction: MigrateDirection,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum MigrateDirection {
    Up,
    Down,
    Fresh,
}

#[derive(Subcommand, Debug)]
enum TransformationCommands {
    Add {
        #[clap(long)]
        data_source: String,
        #[clap(short, long)]
        file: PathBuf,
    },
    List {
        #[clap(long)]
        data_source: String,
    },
    Archive {
        id: uuid::Uuid,
    },
}

#[derive(Debug, Deserialize)]
struct OntologyKeys {
    #[serde(default)]
    metatype_keys: Vec<ParentedKey>,
    #[serde(default)]
    relationship_keys: Vec<ParentedKey>,
}

#[derive(Debug, Deserialize)]
struct ParentedKey {
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(flatten)]
    key: OntologyKey,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    let mut config = EngineConfig::load(args.config.as_deref())?;
    if let Some(database) = &args.database {
        config.database_url = get_database_url(Some(database));
    }

    match args.command {
        Commands::Db { command } => match command {
            DbCommands::Init => {
                info!("Initializing database: {}", config.database_url);
                migrate_database(&config, MigrateDirection::Up).await?;
            }
            DbCommands::Migrate { direction } => {
                info!("Running database migration: {:?}", direction);
                migrate_database(&config, direction).await?;
            }
        },
        Commands::Ontology { file } => {
            let db = connect(&config).await?;
            let keys: OntologyKeys = serde_json::from_str(&read(&file)?)
                .with_context(|| format!("invalid ontology file {}", file.display()))?;
            let ontology = DatabaseOntology::new(db);
            let mut saved = 0;
            for (kind, entries) in [
                (KeyKind::Metatype, keys.metatype_keys),
                (KeyKind::Relationship, keys.relationship_keys),
            ] {
                for entry in entries {
                    ontology
                        .save_key(kind, entry.parent_id.as_deref(), &entry.key)
                        .await?;
                    saved += 1;
                }
            }
            info!("Saved {} ontology keys", saved);
        }
        Commands::Transformation { command } => {
            let repository = TransformationRepository::new(connect(&config).await?);
            match command {
                TransformationCommands::Add { data_source, file } => {
                    let rule: TransformationRule = serde_json::from_str(&read(&file)?)
                        .with_context(|| format!("invalid transformation {}", file.display()))?;
                    rule.target()?;
                    let rule = repository.create(&data_source, rule).await?;
                    info!("Created transformation {}", rule.display_id());
                }
                TransformationCommands::List { data_source } => {
                    let rules = repository.list_active(&data_source).await?;
                    println!("{}", serde_json::to_string_pretty(&rules)?);
                }
                TransformationCommands::Archive { id } => {
                    repository.archive(id).await?;
                    info!("Archived transformation {}", id);
                }
            }
        }
        Commands::Transform {
            rule,
            payload,
            ontology,
        } => {
            let rule: TransformationRule = serde_json::from_str(&read(&rule)?)
                .with_context(|| format!("invalid transformation {}", rule.display()))?;
            let data: Value = serde_json::from_str(&read(&payload)?)
                .with_context(|| format!("invalid payload {}", payload.display()))?;
            let keys = InMemoryOntology::from_json(&read(&ontology)?)
                .with_context(|| format!("invalid ontology file {}", ontology.display()))?;

            let data_source_id = rule.data_source_id.clone().unwrap_or_default();
            let staging = DataStaging::new(data_source_id, data);
            let engine = TransformationEngine::new(Arc::new(keys));
            let output = engine.apply(&rule, &staging).await?;

            info!("Transformation produced {} entities", output.len());
            let rendered = if output.edges().is_empty() {
                serde_json::to_string_pretty(output.nodes())?
            } else {
                serde_json::to_string_pretty(output.edges())?
            };
            println!("{}", rendered);
        }
        Commands::Stage {
            data_source,
            file,
            import,
        } => {
            let data: Value = serde_json::from_str(&read(&file)?)
                .with_context(|| format!("invalid payload {}", file.display()))?;
            let records = match data {
                Value::Array(items) => items,
                other => vec![other],
            };
            let staged = StagingService::new(connect(&config).await?)
                .create_many(&data_source, import.as_deref(), records)
                .await?;
            info!("Staged {} records for {}", staged.len(), data_source);
        }
        Commands::Process {
            data_source,
            enqueue,
        } => {
            let db = connect(&config).await?;
            if enqueue {
                let queue = DatabaseQueue::new(db);
                for data_source_id in data_source {
                    let message = ProcessDataSource::new(data_source_id.as_str()).to_message()?;
                    queue.put(&config.data_processing_topic, message).await?;
                    info!("Queued processing of {}", data_source_id);
                }
                return Ok(());
            }

            let queue: Arc<dyn Queue> = Arc::new(DatabaseQueue::new(db.clone()));
            let producer = Arc::new(EdgeQueueProducer::from_config(
                queue,
                Arc::new(MemoryCache::new()),
                &config,
            ));
            let service = processing_service(db, &config).with_edge_queue(producer);

            let mut failed = false;
            for result in service.process_data_sources(data_source).await {
                match result {
                    Ok(report) => info!(
                        "{}: {} records, {} nodes, {} edges, {} with errors, {} failed",
                        report.data_source_id,
                        report.records,
                        report.nodes,
                        report.edges,
                        report.records_with_errors,
                        report.failed_records
                    ),
                    Err(err) => {
                        failed = true;
                        warn!("Processing failed: {}", err);
                    }
                }
            }
            if failed {
                bail!("one or more data sources failed to process");
            }
        }
        Commands::Link { container } => {
            let linker = EdgeLinker::new(connect(&config).await?, config.link_batch_size);
            let report = linker.link_orphaned_edges(container.as_deref()).await?;
            info!(
                "Scanned {} edges: {} resolved, {} still orphaned",
                report.scanned, report.resolved, report.still_orphaned
            );
        }
        Commands::Work => run_workers(&config).await?,
    }

    Ok(())
}

async fn connect(config: &EngineConfig) -> Result<DatabaseConnection> {
    establish_connection(&config.database_url)
        .await
        .with_context(|| format!("failed to connect to {}", config.database_url))
}

async fn migrate_database(config: &EngineConfig, direction: MigrateDirection) -> Result<()> {
    let db = connect(config).await?;
    match direction {
        MigrateDirection::Up => Migrator::up(&db, None).await?,
        MigrateDirection::Down => Migrator::down(&db, None).await?,
        MigrateDirection::Fresh => Migrator::fresh(&db).await?,
    }
    info!("Database migrations completed");
    Ok(())
}

fn processing_service(db: DatabaseConnection, config: &EngineConfig) -> ProcessingService {
    let keys = CachedKeyLookup::new(DatabaseOntology::new(db.clone()));
    let engine = Arc::new(TransformationEngine::new(Arc::new(keys)));
    ProcessingService::new(db, engine).with_concurrency(config.concurrency())
}

async fn run_workers(config: &EngineConfig) -> Result<()> {
    let db = connect(config).await?;
    Migrator::up(&db, None).await?;

    let queue: Arc<dyn Queue> = Arc::new(DatabaseQueue::new(db.clone()));
    let producer = Arc::new(EdgeQueueProducer::from_config(
        queue.clone(),
        Arc::new(MemoryCache::new()),
        config,
    ));
    let linker = Arc::new(EdgeLinker::new(db.clone(), config.link_batch_size));
    let consumer = Arc::new(EdgeQueueConsumer::from_config(
        db.clone(),
        linker.clone(),
        producer.clone(),
        config,
    ));
    let service = Arc::new(processing_service(db, config).with_edge_queue(producer));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let edge_worker =
        workers::spawn_edge_linker_worker(queue.clone(), consumer, config, shutdown_rx.clone());
    let processing_worker =
        workers::spawn_processing_worker(queue, service, config, shutdown_rx.clone());
    let maintenance = workers::spawn_link_maintenance(linker, config.link_interval(), shutdown_rx);

    info!("Workers running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down workers");
    shutdown_tx.send(true)?;

    let edge_stats = edge_worker.await?;
    let processing_stats = processing_worker.await?;
    let passes = maintenance.await?;
    info!(
        "Edge messages: {} handled, {} failed; processing messages: {} handled, {} failed; {} link passes",
        edge_stats.handled,
        edge_stats.failed,
        processing_stats.handled,
        processing_stats.failed,
        passes
    );
    Ok(())
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("sqlx=warn,{}", log_level)))
        .without_time()
        .init();
}
