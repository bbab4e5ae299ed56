use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feudwatch_core::domain::prediction::PredictionRow;
use feudwatch_core::storage::history::{CsvHistoryStore, HistoryStore};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = feudwatch_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let store = Arc::new(CsvHistoryStore::new(&settings.history_path));
    if !store.path().exists() {
        tracing::warn!(path = %store.path().display(), "history log not found yet; serving empty results");
    }
    let state = AppState { store };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/predictions", get(get_predictions))
        .route("/predictions/:date", get(get_predictions_by_date))
        .route("/evaluations", get(get_evaluations))
        .route("/evaluations/latest", get(get_latest_evaluation))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    store: Arc<CsvHistoryStore>,
}

#[derive(Debug, Deserialize)]
struct PredictionQuery {
    ticker: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ApiEvaluation {
    date: NaiveDate,
    accuracy: Option<f64>,
    summary: String,
}

impl From<PredictionRow> for ApiEvaluation {
    fn from(row: PredictionRow) -> Self {
        Self {
            date: row.date,
            accuracy: row.accuracy(),
            summary: row.reason,
        }
    }
}

async fn load_rows(state: &AppState) -> Result<Vec<PredictionRow>, StatusCode> {
    let store = state.store.clone();
    let loaded = tokio::task::spawn_blocking(move || store.load())
        .await
        .map_err(|e| {
            let err = anyhow::Error::new(e);
            sentry_anyhow::capture_anyhow(&err);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    loaded.map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        tracing::error!(error = %format!("{e:#}"), "history log unavailable");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn get_predictions(
    State(state): State<AppState>,
    Query(query): Query<PredictionQuery>,
) -> Result<Json<Vec<PredictionRow>>, StatusCode> {
    let rows = load_rows(&state).await?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    Ok(Json(recent_predictions(rows, query.ticker.as_deref(), limit)))
}

async fn get_predictions_by_date(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<Vec<PredictionRow>>, StatusCode> {
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|_| StatusCode::BAD_REQUEST)?;
    let rows = load_rows(&state).await?;
    Ok(Json(predictions_on(rows, date)))
}

async fn get_evaluations(
    State(state): State<AppState>,
) -> Result<Json<Vec<ApiEvaluation>>, StatusCode> {
    let rows = load_rows(&state).await?;
    Ok(Json(evaluations(rows).into_iter().map(ApiEvaluation::from).collect()))
}

async fn get_latest_evaluation(
    State(state): State<AppState>,
) -> Result<Json<ApiEvaluation>, StatusCode> {
    let rows = load_rows(&state).await?;
    evaluations(rows)
        .into_iter()
        .next()
        .map(|row| Json(ApiEvaluation::from(row)))
        .ok_or(StatusCode::NOT_FOUND)
}

/// Real rows, newest date first; ties keep the later-appended row first.
fn recent_predictions(rows: Vec<PredictionRow>, ticker: Option<&str>, limit: usize) -> Vec<PredictionRow> {
    let mut out: Vec<PredictionRow> = rows
        .into_iter()
        .rev()
        .filter(|r| !r.is_evaluation())
        .filter(|r| ticker.map_or(true, |t| r.ticker.eq_ignore_ascii_case(t.trim())))
        .collect();
    out.sort_by(|a, b| b.date.cmp(&a.date));
    out.truncate(limit);
    out
}

fn predictions_on(rows: Vec<PredictionRow>, date: NaiveDate) -> Vec<PredictionRow> {
    rows.into_iter()
        .filter(|r| !r.is_evaluation() && r.date == date)
        .collect()
}

fn evaluations(rows: Vec<PredictionRow>) -> Vec<PredictionRow> {
    let mut out: Vec<PredictionRow> = rows.into_iter().rev().filter(|r| r.is_evaluation()).collect();
    out.sort_by(|a, b| b.date.cmp(&a.date));
    out
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &feudwatch_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use feudwatch_core::domain::recommendation::Action;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn row(ticker: &str, d: u32) -> PredictionRow {
        PredictionRow {
            ticker: ticker.to_string(),
            action: Action::Buy,
            sentiment: "n/a".to_string(),
            price: 10.0,
            date: day(d),
            reason: "r".to_string(),
        }
    }

    fn log() -> Vec<PredictionRow> {
        vec![
            row("TSLA", 1),
            row("F", 1),
            PredictionRow::summary(day(2), 50.0, "first".to_string()),
            row("TSLA", 2),
            PredictionRow::summary(day(3), 100.0, "second".to_string()),
        ]
    }

    #[test]
    fn recent_predictions_skip_evaluations_and_filter_ticker() {
        let rows = recent_predictions(log(), None, 10);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].date, day(2));
        assert_eq!(rows[1].ticker, "F");

        let tsla = recent_predictions(log(), Some("tsla"), 10);
        assert_eq!(tsla.len(), 2);
        assert_eq!(recent_predictions(log(), None, 1).len(), 1);
    }

    #[test]
    fn predictions_on_date_exclude_summary_rows() {
        let rows = predictions_on(log(), day(2));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ticker, "TSLA");
    }

    #[test]
    fn evaluations_newest_first_with_accuracy() {
        let evals: Vec<ApiEvaluation> = evaluations(log()).into_iter().map(ApiEvaluation::from).collect();
        assert_eq!(evals.len(), 2);
        assert_eq!(evals[0].date, day(3));
        assert_eq!(evals[0].accuracy, Some(100.0));
        assert_eq!(evals[1].summary, "first");
    }
}
