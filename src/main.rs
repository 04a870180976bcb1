//! # Pocket Corpus
//!
//! Collects a user's saved Pocket articles, enriches each with page text and
//! outbound links, and produces two flat tables for downstream analysis:
//! articles, and article → link edges.
//!
//! ## Usage
//!
//! ```sh
//! pocket_corpus -d ./data collect      # Pocket + Diffbot → record store
//! pocket_corpus -d ./data tables       # record store → tables
//! pocket_corpus -d ./data onboard      # Pocket + direct scraping → tables
//! ```
//!
//! ## Architecture
//!
//! The application follows a batch pipeline:
//! 1. **Fetching**: Pull the full bookmark list from Pocket (cached on disk)
//! 2. **Enrichment**: Diffbot analysis or direct scraping, one page at a time
//! 3. **Normalization**: Merge bookmark and analysis fields into one article
//! 4. **Links**: One edge per outbound link, independent of filtering
//! 5. **Filtering**: Drop articles with missing or untrustworthy text
//! 6. **Output**: JSON tables plus a run summary

use chrono::{DateTime, Utc};
use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod error;
mod filter;
mod links;
mod models;
mod normalize;
mod outputs;
mod scrapers;
mod utils;

use api::{DiffbotEnricher, ScrapeEnricher, enrich_bookmarks};
use cli::{Cli, Command, PocketArgs};
use config::AppConfig;
use error::PipelineError;
use filter::{PipelineConfig, PipelineKind};
use models::{AnnotatedBookmark, RawBookmarkRecord};
use outputs::json::{self as json_out, RunSummary};
use outputs::store::RecordStore;
use scrapers::pocket::{self, PocketAuth};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("pocket_corpus starting up");

    let args = Cli::parse();
    debug!(?args.data_dir, ?args.config, "Parsed CLI arguments");

    let app_config = AppConfig::load(args.config.as_deref())?;

    // The store is the one persistence handle for the whole run.
    let mut store = match RecordStore::open(&args.data_dir).await {
        Ok(store) => store,
        Err(e) => {
            error!(
                path = %args.data_dir.display(),
                error = %e,
                "Data directory is not writable (fix perms or choose a different path)"
            );
            return Err(e.into());
        }
    };

    let result = match args.command {
        Command::Collect {
            pocket,
            diffbot_token,
        } => run_collect(&mut store, &app_config, &pocket, diffbot_token).await,
        Command::Tables { pipeline } => run_tables(&store, &app_config, pipeline).await,
        Command::Onboard { pocket } => run_onboard(&store, &app_config, &pocket).await,
    };

    let written = match settle(result, store.close().await) {
        Ok(written) => written,
        Err(e) => {
            error!(error = %e, "Run failed");
            return Err(e.into());
        }
    };

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        records_written = written,
        "Execution complete"
    );
    Ok(())
}

/// Combine the run outcome with the store close outcome. The run's own error
/// wins; a close error alongside it is logged rather than lost.
fn settle(
    result: Result<(), PipelineError>,
    closed: Result<usize, PipelineError>,
) -> Result<usize, PipelineError> {
    match (result, closed) {
        (Ok(()), closed) => closed,
        (Err(e), Ok(_)) => Err(e),
        (Err(e), Err(close_err)) => {
            error!(error = %close_err, "Closing the record store also failed");
            Err(e)
        }
    }
}

/// Pick the CLI/env value, else the config file value, else fail.
fn credential(
    cli_value: Option<String>,
    file_value: Option<&String>,
    name: &'static str,
) -> Result<String, PipelineError> {
    cli_value
        .or_else(|| file_value.cloned())
        .ok_or(PipelineError::MissingCredential(name))
}

/// Fetch (or load the cached) bookmark list.
async fn fetch_bookmarks(
    client: &reqwest::Client,
    app_config: &AppConfig,
    args: &PocketArgs,
    data_dir: &Path,
) -> Result<Vec<RawBookmarkRecord>, PipelineError> {
    let auth = PocketAuth {
        consumer_key: credential(
            args.consumer_key.clone(),
            app_config.pocket.consumer_key.as_ref(),
            "Pocket consumer key",
        )?,
        redirect_uri: app_config.pocket.redirect_uri.clone(),
        access_token: args
            .access_token
            .clone()
            .or_else(|| app_config.pocket.access_token.clone()),
        authorize_wait: Duration::from_secs(args.authorize_wait_secs),
    };

    let list = pocket::load_or_fetch(client, &auth, data_dir, args.refresh).await?;
    let mut bookmarks = list.bookmarks()?;
    if let Some(limit) = args.limit {
        bookmarks.truncate(limit);
    }
    info!(count = bookmarks.len(), "Bookmarks to process");
    Ok(bookmarks)
}

/// Online ingestion: Pocket → Diffbot → record store.
#[instrument(level = "info", skip_all)]
async fn run_collect(
    store: &mut RecordStore,
    app_config: &AppConfig,
    args: &PocketArgs,
    diffbot_token: Option<String>,
) -> Result<(), PipelineError> {
    let token = credential(diffbot_token, app_config.diffbot.token.as_ref(), "Diffbot token")?;
    let client = scrapers::http_client(&app_config.scrape.user_agent, app_config.scrape.timeout_secs)?;

    let bookmarks = fetch_bookmarks(&client, app_config, args, store.dir()).await?;
    let enricher = DiffbotEnricher {
        client: &client,
        token: &token,
    };
    let annotated = enrich_bookmarks(&enricher, bookmarks).await;

    for record in annotated {
        store.insert(record).await?;
    }
    Ok(())
}

/// Store batch: record store → tables.
#[instrument(level = "info", skip_all, fields(%pipeline))]
async fn run_tables(
    store: &RecordStore,
    app_config: &AppConfig,
    pipeline: PipelineKind,
) -> Result<(), PipelineError> {
    let started_at = Utc::now();
    let stored = store.load().await?;
    let config = app_config.filter.apply(PipelineConfig::for_kind(pipeline));
    let run = TableRun {
        config: &config,
        started_at,
        skipped_records: stored.skipped,
        keep_raw: false,
    };
    build_tables(store.dir(), &stored.records, run).await
}

/// Onboarding: Pocket → direct scraping → tables.
#[instrument(level = "info", skip_all)]
async fn run_onboard(
    store: &RecordStore,
    app_config: &AppConfig,
    args: &PocketArgs,
) -> Result<(), PipelineError> {
    let started_at = Utc::now();
    let client = scrapers::http_client(&app_config.scrape.user_agent, app_config.scrape.timeout_secs)?;

    let bookmarks = fetch_bookmarks(&client, app_config, args, store.dir()).await?;
    let annotated = enrich_bookmarks(&ScrapeEnricher { client: &client }, bookmarks).await;

    let config = app_config.filter.apply(PipelineConfig::onboarding());
    let run = TableRun {
        config: &config,
        started_at,
        skipped_records: 0,
        keep_raw: true,
    };
    build_tables(store.dir(), &annotated, run).await
}

/// Settings for one [`build_tables`] call.
struct TableRun<'a> {
    config: &'a PipelineConfig,
    started_at: DateTime<Utc>,
    /// Stored lines the loader could not decode.
    skipped_records: usize,
    /// Also write every merged article before filtering.
    keep_raw: bool,
}

/// Normalize, link, filter and write both tables.
async fn build_tables(
    dir: &Path,
    records: &[AnnotatedBookmark],
    run: TableRun<'_>,
) -> Result<(), PipelineError> {
    let config = run.config;
    // Both tables see the same article population.
    let unique = normalize::first_per_resolved_id(records);
    let articles = normalize::normalize_all(
        unique
            .iter()
            .map(|r| (&r.bookmark, r.analysis.as_ref())),
    )?;
    if run.keep_raw {
        json_out::write_table(dir, json_out::RAW_ARTICLES_FILE, &articles).await?;
    }

    // Edges come from every record, including ones filtering will drop.
    let edges = links::build_links(unique.iter().filter_map(|r| {
        r.bookmark
            .resolved_id
            .as_deref()
            .map(|id| (id, r.extracted_links.as_ref()))
    }));
    json_out::write_links(dir, &edges, config.link_column).await?;

    let (survivors, report) = filter::filter(articles, config);
    let rows: Vec<_> = survivors.iter().map(|a| a.project(&config.fields)).collect();
    json_out::write_table(dir, json_out::ARTICLES_FILE, &rows).await?;

    for stage in report.dropping_stages() {
        info!(stage = stage.stage, dropped = stage.dropped(), remaining = stage.after, "Filter stage dropped articles");
    }

    let summary = RunSummary {
        pipeline: config.kind.to_string(),
        started_at: run.started_at.to_rfc3339(),
        finished_at: Utc::now().to_rfc3339(),
        bookmarks: records.len(),
        skipped_records: run.skipped_records,
        duplicates: records.len() - unique.len(),
        enriched: unique.iter().filter(|r| r.analysis.is_some()).count(),
        links: edges.len(),
        articles: rows.len(),
        filter: report,
    };
    json_out::write_summary(dir, &summary).await?;

    info!(
        bookmarks = summary.bookmarks,
        skipped = summary.skipped_records,
        duplicates = summary.duplicates,
        links = summary.links,
        articles = summary.articles,
        "Tables written"
    );
    Ok(())
}
