use crate::domain::contract::LlmRecommendationPayload;
use crate::domain::recommendation::Recommendation;
use anyhow::Context;

/// Pulls the JSON document out of a model reply that may be fenced in
/// markdown or wrapped in prose.
pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        let mut inner = trimmed;
        if let Some(after_first) = inner.splitn(2, '\n').nth(1) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    // Outermost array or object, whichever opens first.
    let start = trimmed.find(|c: char| c == '[' || c == '{')?;
    let close = if trimmed[start..].starts_with('[') { ']' } else { '}' };
    let end = trimmed.rfind(close)?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

/// Parses the engine's structured reply. Malformed JSON is an error; items
/// that parse but fail validation are dropped individually.
pub fn parse_recommendations(text: &str) -> anyhow::Result<Vec<Recommendation>> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    let payload = serde_json::from_str::<LlmRecommendationPayload>(&json_str)
        .with_context(|| format!("LLM output is not valid recommendation JSON: {json_str}"))?;

    let mut out = Vec::new();
    for item in payload.into_items() {
        match item.validate_and_into_recommendation() {
            Ok(rec) => out.push(rec),
            Err(err) => tracing::warn!(error = %err, "dropping invalid recommendation item"),
        }
    }
    Ok(out)
}
