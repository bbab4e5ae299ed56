use crate::domain::prediction::{PredictionRow, SENTIMENT_NOT_AVAILABLE};
use crate::domain::recommendation::Recommendation;
use crate::ingest::quote::QuoteLookup;
use crate::storage::history::HistoryStore;
use anyhow::Context;
use chrono::NaiveDate;
use std::sync::Arc;

/// Stamps recommendations with today's date and a price snapshot, then
/// appends them to the log in one batch.
pub struct Recorder {
    store: Arc<dyn HistoryStore>,
    quotes: Arc<dyn QuoteLookup>,
}

impl Recorder {
    pub fn new(store: Arc<dyn HistoryStore>, quotes: Arc<dyn QuoteLookup>) -> Self {
        Self { store, quotes }
    }

    pub async fn record(
        &self,
        recs: &[Recommendation],
        today: NaiveDate,
    ) -> anyhow::Result<Vec<PredictionRow>> {
        if recs.is_empty() {
            tracing::info!("no recommendations to record");
            return Ok(Vec::new());
        }

        let mut rows = Vec::with_capacity(recs.len());
        for rec in recs {
            let price = match self.quotes.latest_close(&rec.ticker).await {
                Some(p) => p,
                None => {
                    tracing::warn!(
                        ticker = %rec.ticker,
                        provider = self.quotes.provider_name(),
                        "no snapshot price; recording 0"
                    );
                    0.0
                }
            };
            rows.push(PredictionRow {
                ticker: rec.ticker.clone(),
                action: rec.action.clone(),
                sentiment: rec
                    .sentiment
                    .clone()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| SENTIMENT_NOT_AVAILABLE.to_string()),
                price,
                date: today,
                reason: rec.reason.clone(),
            });
        }

        self.store
            .append(&rows)
            .context("failed to record recommendations")?;
        tracing::info!(count = rows.len(), %today, "recommendations recorded");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recommendation::Action;
    use crate::evaluation::tests::{day, row, FixedQuotes};
    use crate::storage::history::CsvHistoryStore;

    fn rec(ticker: &str, action: Action, sentiment: Option<&str>) -> Recommendation {
        Recommendation {
            ticker: ticker.to_string(),
            action,
            reason: format!("{ticker}, in the crossfire"),
            sentiment: sentiment.map(String::from),
        }
    }

    #[tokio::test]
    async fn stamps_date_price_and_sentiment() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CsvHistoryStore::new(dir.path().join("h.csv")));
        let recorder = Recorder::new(store.clone(), Arc::new(FixedQuotes::new(&[("TSLA", 201.456)])));

        let rows = recorder
            .record(
                &[
                    rec("TSLA", Action::Buy, None),
                    rec("DJT", Action::Sell, Some("bearish")),
                ],
                day(12),
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].price, 201.456);
        assert_eq!(rows[0].sentiment, SENTIMENT_NOT_AVAILABLE);
        assert_eq!(rows[1].price, 0.0);
        assert_eq!(rows[1].sentiment, "bearish");
        assert!(rows.iter().all(|r| r.date == day(12)));
        assert_eq!(store.load().unwrap(), rows);
    }

    #[tokio::test]
    async fn nothing_to_record_leaves_log_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.csv");
        let store = Arc::new(CsvHistoryStore::new(&path));
        store.append(&[row("F", Action::Hold, 12.0, day(1))]).unwrap();
        let before = std::fs::read(&path).unwrap();

        let recorder = Recorder::new(store, Arc::new(FixedQuotes::new(&[])));
        let rows = recorder.record(&[], day(2)).await.unwrap();

        assert!(rows.is_empty());
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }
}
