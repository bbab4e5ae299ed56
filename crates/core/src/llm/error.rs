use crate::llm::Provider;
use std::fmt;

// Raw bodies can be large HTML error pages; keep log lines readable.
const RAW_PREVIEW_CHARS: usize = 300;

/// Failure of one model round trip, with whatever the provider sent back.
#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    pub stage: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
}

impl LlmDiagnosticsError {
    pub fn http(provider: Provider, status: reqwest::StatusCode, body: String) -> Self {
        Self {
            provider,
            stage: "http",
            detail: format!("status={status}"),
            raw_output: Some(body),
        }
    }

    pub fn empty_output(provider: Provider) -> Self {
        Self {
            provider,
            stage: "decode",
            detail: "response carried no text".to_string(),
            raw_output: None,
        }
    }

    pub fn raw_preview(&self) -> Option<String> {
        self.raw_output
            .as_deref()
            .map(|raw| raw.chars().take(RAW_PREVIEW_CHARS).collect())
    }
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LLM error (provider={:?}, stage={}): {}",
            self.provider, self.stage, self.detail
        )?;
        if let Some(preview) = self.raw_preview() {
            write!(f, " [raw: {preview}]")?;
        }
        Ok(())
    }
}

impl std::error::Error for LlmDiagnosticsError {}
