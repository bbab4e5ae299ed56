use crate::domain::prediction::EVALUATION_TICKER;
use crate::domain::recommendation::{Action, Recommendation};
use anyhow::ensure;
use serde::{Deserialize, Serialize};

/// Shape the engine is asked to emit: a JSON array of these items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRecommendationItem {
    pub ticker: String,
    pub action: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub sentiment: Option<String>,
}

/// Some models wrap the list in an object instead of returning a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LlmRecommendationPayload {
    List(Vec<LlmRecommendationItem>),
    Wrapped {
        recommendations: Vec<LlmRecommendationItem>,
    },
    Single(LlmRecommendationItem),
}

impl LlmRecommendationPayload {
    pub fn into_items(self) -> Vec<LlmRecommendationItem> {
        match self {
            LlmRecommendationPayload::List(items) => items,
            LlmRecommendationPayload::Wrapped { recommendations } => recommendations,
            LlmRecommendationPayload::Single(item) => vec![item],
        }
    }
}

impl LlmRecommendationItem {
    pub fn validate_and_into_recommendation(self) -> anyhow::Result<Recommendation> {
        let ticker = self
            .ticker
            .trim()
            .trim_start_matches('$')
            .to_ascii_uppercase();
        ensure!(!ticker.is_empty(), "ticker must be non-empty");
        ensure!(
            !ticker.contains(char::is_whitespace),
            "ticker must not contain whitespace: {ticker}"
        );

        ensure!(
            !ticker.eq_ignore_ascii_case(EVALUATION_TICKER),
            "{EVALUATION_TICKER} is reserved for evaluation rows"
        );

        let action = Action::parse(self.action.trim());
        ensure!(
            !matches!(action, Action::Summary),
            "SUMMARY is reserved for evaluation rows (ticker={ticker})"
        );

        let sentiment = self
            .sentiment
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Recommendation {
            ticker,
            action,
            reason: self.reason.trim().to_string(),
            sentiment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(ticker: &str, action: &str) -> LlmRecommendationItem {
        LlmRecommendationItem {
            ticker: ticker.to_string(),
            action: action.to_string(),
            reason: "  because  ".to_string(),
            sentiment: None,
        }
    }

    #[test]
    fn normalizes_ticker_and_action() {
        let rec = item(" $tsla ", "buy").validate_and_into_recommendation().unwrap();
        assert_eq!(rec.ticker, "TSLA");
        assert_eq!(rec.action, Action::Buy);
        assert_eq!(rec.reason, "because");
    }

    #[test]
    fn rejects_empty_ticker_and_summary_action() {
        assert!(item("  ", "BUY").validate_and_into_recommendation().is_err());
        assert!(item("F", "SUMMARY").validate_and_into_recommendation().is_err());
    }

    #[test]
    fn rejects_evaluation_ticker_in_any_case() {
        for t in ["EVALUATION", "evaluation", " $Evaluation "] {
            assert!(item(t, "BUY").validate_and_into_recommendation().is_err(), "{t}");
        }
    }
}
