//! `collect` command: one fetch pass persisted inside a tracked collection run.
//!
//! Source failures are logged and skipped inside the fetch layer; a database
//! failure marks the run failed and aborts.

use chrono::{NaiveDate, Utc};
use devbrief_core::{AppConfig, Entity, WatchlistFile};
use devbrief_sources::{collect_all, CollectionPlan, Collected, SourceClients};
use devbrief_trends::{link, AppendOutcome, EntityCatalog};
use futures::future::FutureExt;
use futures::stream::{self, StreamExt};

use crate::fail_run_best_effort;

const DRY_RUN_PREVIEW: usize = 10;

/// Counts reported at the end of a collection run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CollectTotals {
    pub entities: usize,
    pub snapshots: usize,
    pub duplicate_snapshots: usize,
    pub items: usize,
    pub mentions: usize,
}

impl CollectTotals {
    /// Entities plus content items, as stored in `records_processed`.
    fn records(&self) -> i32 {
        i32::try_from(self.entities + self.items).unwrap_or(i32::MAX)
    }
}

/// Fetch today's repositories and forum content and persist them.
///
/// When `dry_run` is `true` the sources are fetched and summarised but the
/// database is not touched.
///
/// # Errors
///
/// Returns an error if the watchlist cannot be loaded, the source clients
/// cannot be built, every source came back empty, or a database write fails.
pub(crate) async fn run_collect(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    trigger: &'static str,
    dry_run: bool,
) -> anyhow::Result<()> {
    let watchlist = devbrief_core::load_watchlist(&config.watchlist_path)?;
    let plan = CollectionPlan::from_config(config);
    let clients = SourceClients::from_config(config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to build source clients: {e}"))?;
    let today = Utc::now().date_naive();

    if dry_run {
        let collected = collect_all(&clients, &watchlist, &plan, today).await;
        print_dry_run(&collected);
        return Ok(());
    }

    let run = devbrief_db::create_collection_run(pool, "collect", trigger).await?;
    if let Err(e) = devbrief_db::start_collection_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, "collect", format!("{e:#}")).await;
        return Err(e.into());
    }

    let collected = collect_all(&clients, &watchlist, &plan, today).await;
    if collected.entities.is_empty() && collected.items.is_empty() {
        let message = "every source returned no data".to_string();
        fail_run_best_effort(pool, run.id, "collect", message.clone()).await;
        anyhow::bail!("{message}");
    }

    let totals = match persist_collected(pool, config, run.id, &collected, &watchlist, today).await {
        Ok(totals) => totals,
        Err(e) => {
            fail_run_best_effort(pool, run.id, "collect", format!("{e:#}")).await;
            return Err(e);
        }
    };

    if let Err(err) = devbrief_db::complete_collection_run(pool, run.id, totals.records()).await {
        fail_run_best_effort(pool, run.id, "collect", format!("{err:#}")).await;
        return Err(err.into());
    }

    if totals.duplicate_snapshots > 0 {
        tracing::info!(
            duplicates = totals.duplicate_snapshots,
            "snapshots already recorded today were kept unchanged"
        );
    }
    println!(
        "collected {} repositories ({} new snapshots), {} items, {} mentions",
        totals.entities, totals.snapshots, totals.items, totals.mentions
    );
    Ok(())
}

/// Write entities, snapshots, items and mentions for one run.
async fn persist_collected(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    run_id: i64,
    collected: &Collected,
    watchlist: &WatchlistFile,
    today: NaiveDate,
) -> anyhow::Result<CollectTotals> {
    let mut totals = CollectTotals::default();

    let pending: Vec<_> = collected
        .entities
        .iter()
        .map(|entity| persist_entity(pool, run_id, entity, today).boxed())
        .collect();
    let outcomes: Vec<anyhow::Result<AppendOutcome>> = stream::iter(pending)
        .buffer_unordered(usize::try_from(config.db_max_connections).unwrap_or(1).max(1))
        .collect()
        .await;
    for outcome in outcomes {
        match outcome? {
            AppendOutcome::Inserted => totals.snapshots += 1,
            AppendOutcome::Duplicate => totals.duplicate_snapshots += 1,
        }
        totals.entities += 1;
    }

    for item in &collected.items {
        devbrief_db::upsert_content_item(pool, item).await?;
        totals.items += 1;
    }

    // Catalog covers the whole report window, not only today's fetch.
    let known: Vec<Entity> =
        devbrief_db::list_entities_seen_since(pool, crate::trends::window_start(config, today))
            .await?
            .into_iter()
            .map(devbrief_db::EntityRow::into_entity)
            .collect();
    let catalog = EntityCatalog::from_entities(&known, watchlist);
    let mentions = link(&collected.items, &catalog);
    tracing::debug!(catalog = catalog.len(), mentions = mentions.len(), "linked content");

    for mention in &mentions {
        if devbrief_db::insert_mention(pool, mention).await? {
            totals.mentions += 1;
        }
    }

    Ok(totals)
}

async fn persist_entity(
    pool: &sqlx::PgPool,
    run_id: i64,
    entity: &Entity,
    today: NaiveDate,
) -> anyhow::Result<AppendOutcome> {
    let row = devbrief_db::upsert_entity(pool, entity, today).await?;
    let outcome =
        devbrief_db::append_snapshot(pool, row.id, &entity.snapshot(today), Some(run_id)).await?;
    tracing::debug!(entity = %entity.id, stars = entity.stars, ?outcome, "snapshot");
    Ok(outcome)
}

fn print_dry_run(collected: &Collected) {
    println!(
        "dry-run: would store {} repositories and {} items",
        collected.entities.len(),
        collected.items.len()
    );
    for entity in collected.entities.iter().take(DRY_RUN_PREVIEW) {
        println!("  repo  {:<40} {:>8} stars", entity.full_name, entity.stars);
    }
    for item in collected.items.iter().take(DRY_RUN_PREVIEW) {
        println!("  {:<12}{:>6}  {}", item.source.as_str(), item.score, item.title);
    }
}
