pub mod domain;
pub mod evaluation;
pub mod ingest;
pub mod llm;
pub mod pipeline;
pub mod storage;

pub mod config {
    use anyhow::Context;

    const DEFAULT_HISTORY_PATH: &str = "prediction_history.csv";
    const DEFAULT_ACCOUNTS: &str = "elonmusk,realDonaldTrump";

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LlmProviderKind {
        OpenAI,
        Anthropic,
    }

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub history_path: String,
        pub accounts: Vec<String>,
        pub max_posts: usize,
        pub llm_provider: LlmProviderKind,
        pub anthropic_api_key: Option<String>,
        pub openai_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
        pub evaluation_window: usize,
        pub evaluation_max_notes: usize,
        pub hold_tolerance_pct: Option<f64>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let llm_provider = match std::env::var("LLM_PROVIDER")
                .unwrap_or_else(|_| "openai".to_string())
                .trim()
                .to_ascii_lowercase()
                .as_str()
            {
                "openai" => LlmProviderKind::OpenAI,
                "anthropic" => LlmProviderKind::Anthropic,
                other => anyhow::bail!("LLM_PROVIDER must be 'openai' or 'anthropic' (got {other})"),
            };

            let hold_tolerance_pct = match std::env::var("HOLD_TOLERANCE_PCT") {
                Ok(s) if !s.trim().is_empty() => {
                    let v = s
                        .trim()
                        .parse::<f64>()
                        .with_context(|| format!("HOLD_TOLERANCE_PCT is not a number: {s}"))?;
                    anyhow::ensure!(
                        v.is_finite() && v >= 0.0,
                        "HOLD_TOLERANCE_PCT must be >= 0 (got {v})"
                    );
                    Some(v)
                }
                _ => None,
            };

            Ok(Self {
                history_path: std::env::var("HISTORY_PATH")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_HISTORY_PATH.to_string()),
                accounts: parse_accounts(
                    &std::env::var("FEUD_ACCOUNTS").unwrap_or_else(|_| DEFAULT_ACCOUNTS.to_string()),
                ),
                max_posts: env_usize("SOCIAL_MAX_POSTS")
                    .filter(|n| *n > 0)
                    .unwrap_or(crate::ingest::social::DEFAULT_MAX_POSTS),
                llm_provider,
                anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
                openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                evaluation_window: env_usize("EVALUATION_WINDOW")
                    .unwrap_or(crate::evaluation::DEFAULT_WINDOW),
                evaluation_max_notes: env_usize("EVALUATION_MAX_NOTES")
                    .unwrap_or(crate::evaluation::DEFAULT_MAX_NOTES),
                hold_tolerance_pct,
            })
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }

        pub fn require_openai_api_key(&self) -> anyhow::Result<&str> {
            self.openai_api_key
                .as_deref()
                .context("OPENAI_API_KEY is required")
        }

        pub fn require_feud_accounts(&self) -> anyhow::Result<(&str, &str)> {
            match self.accounts.as_slice() {
                [a, b, ..] => Ok((a.as_str(), b.as_str())),
                _ => anyhow::bail!(
                    "FEUD_ACCOUNTS must name two accounts (got {})",
                    self.accounts.len()
                ),
            }
        }
    }

    fn parse_accounts(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|s| s.trim().trim_start_matches('@'))
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    fn env_usize(key: &str) -> Option<usize> {
        std::env::var(key).ok().and_then(|s| s.trim().parse::<usize>().ok())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn parses_account_list() {
            assert_eq!(
                parse_accounts(" elonmusk, @realDonaldTrump ,,"),
                vec!["elonmusk".to_string(), "realDonaldTrump".to_string()]
            );
        }
    }
}
