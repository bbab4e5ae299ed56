//! One daily run: evaluate, scrape, summarize, recommend, record.

pub mod recorder;

use crate::config::Settings;
use crate::domain::prediction::PredictionRow;
use crate::domain::recommendation::Recommendation;
use crate::evaluation::{Evaluator, EvaluatorOptions};
use crate::ingest::quote::QuoteLookup;
use crate::ingest::social::{PostSource, DEFAULT_MAX_POSTS};
use crate::llm::engine::{recommend, summarize_feud};
use crate::llm::prompts::AccountPosts;
use crate::llm::LlmClient;
use crate::storage::history::HistoryStore;
use chrono::NaiveDate;
use recorder::Recorder;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RunReport {
    pub feedback: String,
    /// `None` when the summary request failed; nothing was recommended then.
    pub summary: Option<String>,
    pub recommendations: Vec<Recommendation>,
    pub recorded: Vec<PredictionRow>,
}

pub struct Pipeline {
    evaluator: Evaluator,
    recorder: Recorder,
    posts: Arc<dyn PostSource>,
    llm: Arc<dyn LlmClient>,
    accounts: (String, String),
    max_posts: usize,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn HistoryStore>,
        quotes: Arc<dyn QuoteLookup>,
        posts: Arc<dyn PostSource>,
        llm: Arc<dyn LlmClient>,
        accounts: (String, String),
        opts: EvaluatorOptions,
    ) -> Self {
        Self {
            evaluator: Evaluator::new(store.clone(), quotes.clone(), opts),
            recorder: Recorder::new(store, quotes),
            posts,
            llm,
            accounts,
            max_posts: DEFAULT_MAX_POSTS,
        }
    }

    pub fn from_settings(
        settings: &Settings,
        store: Arc<dyn HistoryStore>,
        quotes: Arc<dyn QuoteLookup>,
        posts: Arc<dyn PostSource>,
        llm: Arc<dyn LlmClient>,
    ) -> anyhow::Result<Self> {
        let (first, second) = settings.require_feud_accounts()?;
        let opts = EvaluatorOptions::from_settings(settings);
        let mut pipeline = Self::new(
            store,
            quotes,
            posts,
            llm,
            (first.to_string(), second.to_string()),
            opts,
        );
        pipeline.max_posts = settings.max_posts;
        Ok(pipeline)
    }

    pub async fn evaluate(&self, today: NaiveDate) -> String {
        self.evaluator.feedback(today).await
    }

    async fn collect(&self, account: &str) -> AccountPosts {
        let posts = self.posts.recent_posts(account, self.max_posts).await;
        if posts.is_empty() {
            tracing::warn!(account, source = self.posts.source_name(), "no posts found");
        }
        AccountPosts {
            account: account.to_string(),
            posts,
        }
    }

    /// Runs the full loop. Only a failure to write new recommendations is an
    /// error; every upstream failure shrinks the run instead.
    pub async fn run(&self, today: NaiveDate) -> anyhow::Result<RunReport> {
        let feedback = self.evaluate(today).await;

        let (first, second) = (&self.accounts.0, &self.accounts.1);
        let first = self.collect(first).await;
        let second = self.collect(second).await;

        let summary = match summarize_feud(self.llm.as_ref(), &first, &second).await {
            Ok(s) => Some(s),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "feud summary failed; skipping recommendations");
                None
            }
        };

        let recommendations = match summary.as_deref() {
            Some(s) => recommend(self.llm.as_ref(), s, &feedback).await,
            None => Vec::new(),
        };

        let recorded = self.recorder.record(&recommendations, today).await?;

        Ok(RunReport {
            feedback,
            summary,
            recommendations,
            recorded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recommendation::Action;
    use crate::evaluation::NO_EVALUATION;
    use crate::evaluation::tests::{day, row, FixedQuotes};
    use crate::llm::engine::tests::ScriptedLlm;
    use crate::storage::history::CsvHistoryStore;

    struct CannedPosts;

    #[async_trait::async_trait]
    impl PostSource for CannedPosts {
        fn source_name(&self) -> &'static str {
            "canned"
        }

        async fn recent_posts(&self, account: &str, max: usize) -> Vec<String> {
            (0..max.min(2))
                .map(|i| format!("{account} post {i}"))
                .collect()
        }
    }

    const TWO_RECS: &str = r#"[
        {"ticker": "TSLA", "action": "BUY", "reason": "EV spotlight"},
        {"ticker": "DJT", "action": "SELL", "reason": "Backlash"}
    ]"#;

    fn pipeline(
        store: Arc<CsvHistoryStore>,
        quotes: &[(&str, f64)],
        llm: Arc<ScriptedLlm>,
    ) -> Pipeline {
        Pipeline::new(
            store,
            Arc::new(FixedQuotes::new(quotes)),
            Arc::new(CannedPosts),
            llm,
            ("elonmusk".to_string(), "realDonaldTrump".to_string()),
            EvaluatorOptions::default(),
        )
    }

    #[tokio::test]
    async fn first_run_records_recommendations_without_feedback() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CsvHistoryStore::new(dir.path().join("h.csv")));
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok("They argue about EV subsidies.".to_string()),
            Ok(TWO_RECS.to_string()),
        ]));
        let p = pipeline(store.clone(), &[("TSLA", 200.0), ("DJT", 30.0)], llm.clone());

        let report = p.run(day(10)).await.unwrap();

        assert_eq!(report.feedback, NO_EVALUATION);
        assert_eq!(report.summary.as_deref(), Some("They argue about EV subsidies."));
        assert_eq!(report.recorded.len(), 2);
        assert_eq!(store.load().unwrap().len(), 2);

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("elonmusk post 0"));
        assert!(prompts[0].contains("realDonaldTrump post 1"));
        assert!(prompts[1].contains(NO_EVALUATION));
    }

    #[tokio::test]
    async fn second_run_feeds_back_accuracy_and_appends_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CsvHistoryStore::new(dir.path().join("h.csv")));
        store
            .append(&[
                row("TSLA", Action::Buy, 180.0, day(1)),
                row("F", Action::Sell, 12.0, day(1)),
            ])
            .unwrap();
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok("Tariff spat.".to_string()),
            Ok(TWO_RECS.to_string()),
        ]));
        let p = pipeline(store.clone(), &[("TSLA", 200.0), ("F", 13.0), ("DJT", 30.0)], llm.clone());

        let report = p.run(day(10)).await.unwrap();

        assert!(report.feedback.contains("50.00% (1 of 2 correct)"));
        assert!(llm.prompts.lock().unwrap()[1].contains(&report.feedback));

        let log = store.load().unwrap();
        assert_eq!(log.len(), 5);
        assert!(log[2].is_evaluation());
        assert_eq!(log[2].sentiment, "50.00");
        assert_eq!(log[3].ticker, "TSLA");
        assert_eq!(log[4].ticker, "DJT");
    }

    #[tokio::test]
    async fn unparsable_engine_output_appends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CsvHistoryStore::new(dir.path().join("h.csv")));
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok("A feud.".to_string()),
            Ok("I'd rather not pick stocks.".to_string()),
        ]));
        let p = pipeline(store.clone(), &[], llm);

        let report = p.run(day(10)).await.unwrap();

        assert!(report.recommendations.is_empty());
        assert!(report.recorded.is_empty());
        assert!(store.load().unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn failed_summary_skips_recommendation_request() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CsvHistoryStore::new(dir.path().join("h.csv")));
        let llm = Arc::new(ScriptedLlm::new(vec![Err(anyhow::anyhow!("HTTP 429"))]));
        let p = pipeline(store.clone(), &[], llm.clone());

        let report = p.run(day(10)).await.unwrap();

        assert!(report.summary.is_none());
        assert!(report.recorded.is_empty());
        assert_eq!(llm.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn broken_log_degrades_to_no_evaluation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.csv");
        std::fs::write(&path, "ticker,action\nTSLA,BUY\n").unwrap();
        let store = Arc::new(CsvHistoryStore::new(&path));
        let llm = Arc::new(ScriptedLlm::new(vec![Err(anyhow::anyhow!("offline"))]));
        let p = pipeline(store, &[], llm);

        assert_eq!(p.evaluate(day(10)).await, NO_EVALUATION);
    }
}
