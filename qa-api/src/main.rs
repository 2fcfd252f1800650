use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use time::macros::format_description;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt::time::LocalTime, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
    app_state::{build_search, AppState},
    config::{read_config, Settings},
    domain::search::{run_search_index_worker, BackfillStats, EntityKind, IndexQueue},
};

mod app_state;
mod config;
mod domain;
mod router;
mod routes;

#[derive(Parser)]
#[command(name = "qa-api", about = "Semantic search and indexing for the Q&A app")]
struct Opts {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API and the background index worker (default)
    Serve,
    /// Embed every row that has no embedding yet
    Backfill {
        /// Only backfill this entity type
        #[arg(long)]
        kind: Option<EntityKind>,
    },
    /// Re-embed rows edited since they were last indexed
    ReindexStale {
        /// Only re-index this entity type
        #[arg(long)]
        kind: Option<EntityKind>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::from_filename(".env.local").ok();
    init_tracing();

    let opts = Opts::parse();
    let config = read_config().context("Failed to read configuration")?;

    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect_with(config.database.with_db())
        .await
        .context("Failed to connect to database")?;

    if config.database.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("Failed to run migrations")?;
    }

    match opts.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(db_pool, config).await,
        Command::Backfill { kind } => {
            let (_, indexer) = build_search(db_pool, &config).await?;
            let stats = match kind {
                Some(kind) => single_kind(kind, indexer.backfill(kind).await?),
                None => indexer.index_all().await,
            };
            print_stats("Backfill", &stats);
            Ok(())
        }
        Command::ReindexStale { kind } => {
            let (_, indexer) = build_search(db_pool, &config).await?;
            let stats = match kind {
                Some(kind) => single_kind(kind, indexer.reindex_stale(kind).await?),
                None => indexer.reindex_all_stale().await,
            };
            print_stats("Stale re-index", &stats);
            Ok(())
        }
    }
}

async fn serve(db_pool: sqlx::PgPool, config: Settings) -> anyhow::Result<()> {
    let (index_queue, receiver) = IndexQueue::new(config.indexing.queue_capacity);
    let app_state = AppState::new(db_pool, &config, index_queue).await?;

    tokio::spawn(run_search_index_worker(
        receiver,
        Arc::clone(&app_state.indexer),
    ));

    let app = router::create(app_state, &config);

    let addr = format!("{}:{}", config.application.host, config.application.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("qa_api=debug,tower_http=info"));
    let timer = LocalTime::new(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_timer(timer))
        .init();
}

fn single_kind(kind: EntityKind, count: usize) -> BackfillStats {
    let mut stats = BackfillStats::default();
    stats.record(kind, count);
    stats
}

fn print_stats(label: &str, stats: &BackfillStats) {
    println!(
        "{label}: {} questions, {} answers, {} tags, {} users ({} errors)",
        stats.questions, stats.answers, stats.tags, stats.users, stats.errors
    );
}
