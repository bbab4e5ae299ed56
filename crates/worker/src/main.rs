use anyhow::Context;
use clap::Parser;
use chrono::NaiveDate;
use feudwatch_core::config::Settings;
use feudwatch_core::evaluation::{Evaluator, EvaluatorOptions};
use feudwatch_core::ingest::quote::YahooQuoteProvider;
use feudwatch_core::ingest::social::HttpPostSource;
use feudwatch_core::pipeline::{Pipeline, RunReport};
use feudwatch_core::storage::history::CsvHistoryStore;
use feudwatch_core::storage::lock::try_acquire_run_lock;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "feudwatch_worker")]
struct Args {
    /// Run date (YYYY-MM-DD). Defaults to today's local date.
    #[arg(long)]
    date: Option<String>,

    /// Score past predictions and exit without scraping or recommending.
    #[arg(long)]
    evaluate_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let today = resolve_run_date(args.date.as_deref(), chrono::Local::now().date_naive())?;

    let history_path = std::path::PathBuf::from(&settings.history_path);
    let Some(lock) = try_acquire_run_lock(&history_path)? else {
        tracing::warn!(path = %history_path.display(), "run lock not acquired; another run in progress");
        return Ok(());
    };
    tracing::info!(
        %today,
        run_id = %lock.run_id(),
        lock = %lock.path().display(),
        evaluate_only = args.evaluate_only,
        "run started"
    );

    if args.evaluate_only {
        println!("{}", evaluate_only(&settings, today).await?);
        return Ok(());
    }

    let store = Arc::new(CsvHistoryStore::new(&history_path));
    let quotes = Arc::new(YahooQuoteProvider::from_env()?);
    let posts = Arc::new(HttpPostSource::from_env()?);
    let llm = feudwatch_core::llm::client_from_settings(&settings)?;

    let pipeline = Pipeline::from_settings(&settings, store, quotes, posts, llm)?;

    match pipeline.run(today).await {
        Ok(report) => {
            print_report(&report);
            tracing::info!(%today, recorded = report.recorded.len(), "run finished");
            Ok(())
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(%today, error = %format!("{err:#}"), "run failed");
            Err(err).context("daily run failed")
        }
    }
}

/// Scores the log without touching the scraper or any language model.
async fn evaluate_only(settings: &Settings, today: NaiveDate) -> anyhow::Result<String> {
    let evaluator = Evaluator::new(
        Arc::new(CsvHistoryStore::new(&settings.history_path)),
        Arc::new(YahooQuoteProvider::from_env()?),
        EvaluatorOptions::from_settings(settings),
    );
    Ok(evaluator.feedback(today).await)
}

fn print_report(report: &RunReport) {
    match report.summary.as_deref() {
        Some(summary) => println!("Feud summary: {summary}"),
        None => println!("Feud summary unavailable."),
    }
    println!("Feedback: {}", report.feedback);
    if report.recommendations.is_empty() {
        println!("No recommendations today.");
    }
    for rec in &report.recommendations {
        println!("{} - {} ({})", rec.ticker, rec.action, rec.reason);
    }
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

fn resolve_run_date(date_arg: Option<&str>, local_today: NaiveDate) -> anyhow::Result<NaiveDate> {
    match date_arg {
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .with_context(|| format!("--date must be YYYY-MM-DD (got {s})")),
        None => Ok(local_today),
    }
}
