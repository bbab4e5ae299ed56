use anyhow::{Context, Result};
use regex::Regex;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://x.com";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_POSTS: usize = 5;
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_0) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/113.0.0.0 Safari/537.36";

// Post bodies are rendered inside elements tagged with this test id.
const POST_TEXT_PATTERN: &str = r#"(?s)<div[^>]*data-testid="tweetText"[^>]*>(.*?)</div>"#;
const TAG_PATTERN: &str = r"(?s)<[^>]+>";
const ENTITY_PATTERN: &str = r"&(?:#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z][a-zA-Z0-9]{1,31});";

/// Source of an account's most recent public posts. Never fails: any scrape
/// problem yields an empty list.
#[async_trait::async_trait]
pub trait PostSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn recent_posts(&self, account: &str, max: usize) -> Vec<String>;
}

#[derive(Debug, Clone)]
pub struct HttpPostSource {
    http: reqwest::Client,
    base_url: String,
    post_re: Regex,
    tag_re: Regex,
    entity_re: Regex,
}

impl HttpPostSource {
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("SOCIAL_BASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("SOCIAL_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .context("failed to build social http client")?;

        Self::with_client(http, base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: String) -> Result<Self> {
        Ok(Self {
            http,
            base_url,
            post_re: Regex::new(POST_TEXT_PATTERN).context("invalid post pattern")?,
            tag_re: Regex::new(TAG_PATTERN).context("invalid tag pattern")?,
            entity_re: Regex::new(ENTITY_PATTERN).context("invalid entity pattern")?,
        })
    }

    async fn fetch_page(&self, account: &str) -> Result<String> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), account);
        tracing::info!(%url, "visiting profile page");

        let res = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("profile request failed: {url}"))?;

        let status = res.status();
        anyhow::ensure!(status.is_success(), "profile page HTTP {status}: {url}");
        res.text().await.context("failed to read profile page")
    }

    pub fn extract_posts(&self, html: &str, max: usize) -> Vec<String> {
        self.post_re
            .captures_iter(html)
            .filter_map(|c| c.get(1))
            .map(|m| self.clean_text(&self.tag_re.replace_all(m.as_str(), " ")))
            .filter(|s| !s.is_empty())
            .take(max)
            .collect()
    }

    /// Decodes named and numeric entities, then collapses whitespace.
    /// Anything that is not a known entity is left as written.
    fn clean_text(&self, s: &str) -> String {
        let decoded = self.entity_re.replace_all(s, |caps: &regex::Captures| {
            let raw = &caps[0];
            htmlescape::decode_html(raw).unwrap_or_else(|_| raw.to_string())
        });
        decoded.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

#[async_trait::async_trait]
impl PostSource for HttpPostSource {
    fn source_name(&self) -> &'static str {
        "http_profile_page"
    }

    async fn recent_posts(&self, account: &str, max: usize) -> Vec<String> {
        let html = match self.fetch_page(account).await {
            Ok(html) => html,
            Err(err) => {
                tracing::warn!(account, error = %err, "could not load posts");
                return Vec::new();
            }
        };

        let posts = self.extract_posts(&html, max);
        if posts.is_empty() {
            tracing::warn!(account, "no posts found on profile page");
        } else {
            tracing::info!(account, found = posts.len(), "posts found");
        }
        posts
    }
}
