//! Scores earlier recommendations against current prices and turns the result
//! into feedback for the next recommendation round.
//!
//! Each pass appends one synthetic `EVALUATION`/`SUMMARY` row to the history
//! log. Those rows are never scored themselves.

pub mod scoring;

use crate::config::Settings;
use crate::domain::prediction::PredictionRow;
use crate::domain::recommendation::Action;
use crate::ingest::quote::QuoteLookup;
use crate::storage::history::HistoryStore;
use anyhow::Context;
use chrono::NaiveDate;
use scoring::{accuracy_pct, is_correct, HoldPolicy};
use std::sync::Arc;

/// How many of the most recent real rows a pass re-prices.
pub const DEFAULT_WINDOW: usize = 50;
/// How many per-row lines make it into the summary text.
pub const DEFAULT_MAX_NOTES: usize = 5;

/// Feedback used when there is nothing to score or the log cannot be read.
pub const NO_EVALUATION: &str = "No evaluation available.";
const FEEDBACK_SUFFIX: &str =
    "Take this track record into account and adjust future predictions accordingly.";

#[derive(Debug, Clone, Copy)]
pub struct EvaluatorOptions {
    pub window: usize,
    pub max_notes: usize,
    pub hold_policy: HoldPolicy,
}

impl EvaluatorOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            window: settings.evaluation_window,
            max_notes: settings.evaluation_max_notes,
            hold_policy: HoldPolicy::from_tolerance(settings.hold_tolerance_pct),
        }
    }
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            max_notes: DEFAULT_MAX_NOTES,
            hold_policy: HoldPolicy::default(),
        }
    }
}

/// One re-priced row. `correct` is `None` when no current price was found.
#[derive(Debug, Clone)]
pub struct ScoredRow {
    pub ticker: String,
    pub action: Action,
    pub date: NaiveDate,
    pub recorded_price: f64,
    pub current_price: Option<f64>,
    pub correct: Option<bool>,
}

impl ScoredRow {
    fn note(&self) -> String {
        let Some(current) = self.current_price else {
            return format!("{}: no current price available, skipped", self.ticker);
        };
        let verdict = if self.correct == Some(true) {
            "correct"
        } else {
            "incorrect"
        };
        let mut note = format!(
            "{} {} on {} at ${:.2}, now ${:.2}: {}",
            self.ticker, self.action, self.date, self.recorded_price, current, verdict
        );
        if self.recorded_price == 0.0 {
            note.push_str(" (no snapshot price)");
        }
        note
    }
}

#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub evaluated_on: NaiveDate,
    pub correct: usize,
    pub total: usize,
    pub skipped: usize,
    pub accuracy: f64,
    pub rows: Vec<ScoredRow>,
    /// Aggregate sentence plus at most `max_notes` per-row lines.
    pub summary: String,
}

impl EvaluationReport {
    fn build(evaluated_on: NaiveDate, rows: Vec<ScoredRow>, max_notes: usize) -> Self {
        let total = rows.iter().filter(|r| r.correct.is_some()).count();
        let correct = rows.iter().filter(|r| r.correct == Some(true)).count();
        let skipped = rows.len() - total;
        let accuracy = accuracy_pct(correct, total);

        let mut lines = vec![aggregate_sentence(accuracy, correct, total)];
        lines.extend(rows.iter().take(max_notes).map(ScoredRow::note));

        Self {
            evaluated_on,
            correct,
            total,
            skipped,
            accuracy,
            rows,
            summary: lines.join("\n"),
        }
    }

    pub fn aggregate(&self) -> String {
        aggregate_sentence(self.accuracy, self.correct, self.total)
    }

    /// Text embedded verbatim in the next recommendation prompt.
    pub fn feedback(&self) -> String {
        format!("{} {FEEDBACK_SUFFIX}", self.aggregate())
    }

    pub fn to_row(&self) -> PredictionRow {
        PredictionRow::summary(self.evaluated_on, self.accuracy, self.summary.clone())
    }
}

fn aggregate_sentence(accuracy: f64, correct: usize, total: usize) -> String {
    format!(
        "Accuracy of recent predictions: {accuracy:.2}% ({correct} of {total} correct)."
    )
}

#[derive(Debug, Clone)]
pub enum Evaluation {
    /// Nothing to score: empty log, only evaluation rows, or no prices found.
    NoData,
    Scored(EvaluationReport),
}

impl Evaluation {
    pub fn feedback(&self) -> String {
        match self {
            Evaluation::NoData => NO_EVALUATION.to_string(),
            Evaluation::Scored(report) => report.feedback(),
        }
    }

    pub fn report(&self) -> Option<&EvaluationReport> {
        match self {
            Evaluation::NoData => None,
            Evaluation::Scored(report) => Some(report),
        }
    }
}

/// Real rows only, newest date first, capped at `window`. Rows sharing a
/// date keep their log order.
pub fn select_recent(rows: Vec<PredictionRow>, window: usize) -> Vec<PredictionRow> {
    let mut real: Vec<PredictionRow> = rows.into_iter().filter(|r| !r.is_evaluation()).collect();
    real.sort_by(|a, b| b.date.cmp(&a.date));
    real.truncate(window);
    real
}

pub struct Evaluator {
    store: Arc<dyn HistoryStore>,
    quotes: Arc<dyn QuoteLookup>,
    opts: EvaluatorOptions,
}

impl Evaluator {
    pub fn new(
        store: Arc<dyn HistoryStore>,
        quotes: Arc<dyn QuoteLookup>,
        opts: EvaluatorOptions,
    ) -> Self {
        Self {
            store,
            quotes,
            opts,
        }
    }

    /// Scores the recent window and, when anything could be scored, appends
    /// the synthetic summary row. Fails only when the log cannot be read or
    /// written.
    pub async fn evaluate(&self, today: NaiveDate) -> anyhow::Result<Evaluation> {
        let rows = self
            .store
            .load()
            .context("failed to load prediction history")?;
        let loaded = rows.len();

        let recent = select_recent(rows, self.opts.window);
        if recent.is_empty() {
            tracing::info!(loaded, "no past predictions to evaluate");
            return Ok(Evaluation::NoData);
        }

        let mut scored = Vec::with_capacity(recent.len());
        for row in recent {
            let current_price = self.quotes.latest_close(&row.ticker).await;
            if current_price.is_none() {
                tracing::warn!(
                    ticker = %row.ticker,
                    date = %row.date,
                    provider = self.quotes.provider_name(),
                    "no current price; excluded from accuracy"
                );
            }
            let correct = current_price
                .map(|current| is_correct(&row.action, row.price, current, self.opts.hold_policy));
            scored.push(ScoredRow {
                ticker: row.ticker,
                action: row.action,
                date: row.date,
                recorded_price: row.price,
                current_price,
                correct,
            });
        }

        let report = EvaluationReport::build(today, scored, self.opts.max_notes);
        if report.total == 0 {
            tracing::warn!(skipped = report.skipped, "no prices available; nothing scored");
            return Ok(Evaluation::NoData);
        }

        self.store
            .append(&[report.to_row()])
            .context("failed to record evaluation row")?;

        tracing::info!(
            accuracy = report.accuracy,
            correct = report.correct,
            total = report.total,
            skipped = report.skipped,
            "evaluation recorded"
        );
        Ok(Evaluation::Scored(report))
    }

    /// Runs a pass and returns the feedback text. A broken log degrades to
    /// the no-evaluation sentence instead of failing the caller.
    pub async fn feedback(&self, today: NaiveDate) -> String {
        match self.evaluate(today).await {
            Ok(Evaluation::Scored(report)) => {
                tracing::info!(accuracy = report.accuracy, "{}", report.aggregate());
                report.feedback()
            }
            Ok(Evaluation::NoData) => NO_EVALUATION.to_string(),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "evaluation unavailable");
                NO_EVALUATION.to_string()
            }
        }
    }
}
