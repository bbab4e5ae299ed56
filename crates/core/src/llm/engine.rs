use crate::domain::recommendation::Recommendation;
use crate::llm::json::parse_recommendations;
use crate::llm::prompts::{feud_prompt, recommendation_prompt, AccountPosts, SYSTEM_PROMPT};
use crate::llm::LlmClient;
use anyhow::Context;

/// Asks the model for a 1-2 sentence summary of the conflict between two accounts.
pub async fn summarize_feud(
    client: &dyn LlmClient,
    first: &AccountPosts,
    second: &AccountPosts,
) -> anyhow::Result<String> {
    let summary = client
        .complete(SYSTEM_PROMPT, &feud_prompt(first, second))
        .await
        .context("feud summary request failed")?;
    anyhow::ensure!(!summary.trim().is_empty(), "feud summary is empty");
    Ok(summary.trim().to_string())
}

/// Turns a feud summary plus evaluation feedback into trade recommendations.
///
/// Request and parse failures are reported and yield an empty list; the run
/// carries on with nothing to record.
pub async fn recommend(client: &dyn LlmClient, summary: &str, feedback: &str) -> Vec<Recommendation> {
    let text = match client
        .complete(SYSTEM_PROMPT, &recommendation_prompt(summary, feedback))
        .await
    {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(provider = ?client.provider(), error = %err, "recommendation request failed");
            return Vec::new();
        }
    };

    match parse_recommendations(&text) {
        Ok(recs) => {
            if !(2..=3).contains(&recs.len()) {
                tracing::warn!(count = recs.len(), "engine returned an unexpected number of recommendations");
            }
            recs
        }
        Err(err) => {
            tracing::warn!(error = %err, "could not parse recommendations");
            Vec::new()
        }
    }
}
