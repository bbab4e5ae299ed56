use crate::domain::recommendation::Action;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Ticker sentinel for synthetic evaluation rows.
pub const EVALUATION_TICKER: &str = "EVALUATION";

/// Sentiment placeholder for real recommendation rows.
pub const SENTIMENT_NOT_AVAILABLE: &str = "n/a";

/// Column order of the persisted log.
pub const COLUMNS: [&str; 6] = ["ticker", "action", "sentiment", "price", "date", "reason"];

/// Rounds a price or percentage to two decimals.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// One row of the prediction log. Rows are written once and never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    pub ticker: String,
    pub action: Action,
    pub sentiment: String,
    /// Snapshot price at creation; `0` means unknown.
    pub price: f64,
    pub date: NaiveDate,
    pub reason: String,
}

impl PredictionRow {
    pub fn summary(date: NaiveDate, accuracy: f64, reason: String) -> Self {
        Self {
            ticker: EVALUATION_TICKER.to_string(),
            action: Action::Summary,
            sentiment: format!("{accuracy:.2}"),
            price: 0.0,
            date,
            reason,
        }
    }

    pub fn is_evaluation(&self) -> bool {
        self.ticker.trim().eq_ignore_ascii_case(EVALUATION_TICKER)
    }

    /// Accuracy carried by a synthetic row, if it parses.
    pub fn accuracy(&self) -> Option<f64> {
        if !self.is_evaluation() {
            return None;
        }
        self.sentiment.trim().parse::<f64>().ok()
    }
}
