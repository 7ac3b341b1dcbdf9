use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};

/// One article card as it appears in the rendered listing. Numeric fields
/// that the feed omits decode as zero; a missing or unparseable timestamp
/// becomes `None` and sorts as epoch zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub rank: u32,
    pub score: u32,
    pub comment_count: u32,
    pub submitted_at: Option<DateTime<Utc>>,
    pub sponsored: bool,
    pub title: String,
    pub url: String,
    pub permalink: String,
    pub summary: String,
    pub author: String,
    pub feature_image: Option<String>,
    pub favicon: Option<String>,
}

/// Wire form of an item, mirroring the data attributes the page template
/// writes onto each card.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawItem {
    pub rank: u32,
    #[serde(default)]
    pub score: Option<u32>,
    #[serde(default)]
    pub comments: Option<u32>,
    #[serde(default)]
    pub submitted: Option<String>,
    #[serde(default)]
    pub sponsored: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub feature_image: Option<String>,
    #[serde(default)]
    pub favicon: Option<String>,
}

impl RawItem {
    pub fn into_item(self) -> Item {
        let submitted_at = self.submitted.as_deref().and_then(parse_timestamp);
        if submitted_at.is_none() {
            if let Some(raw) = &self.submitted {
                tracing::debug!(rank = self.rank, raw, "unparseable submit time");
            }
        }
        Item {
            rank: self.rank,
            score: self.score.unwrap_or(0),
            comment_count: self.comments.unwrap_or(0),
            submitted_at,
            sponsored: self.sponsored,
            title: self.title,
            url: self.url,
            permalink: self.permalink,
            summary: self.summary,
            author: self.author,
            feature_image: self.feature_image,
            favicon: self.favicon,
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDigest {
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub items: Vec<RawItem>,
}

#[derive(Debug, Clone, Default)]
pub struct Digest {
    pub generated_at: Option<DateTime<Utc>>,
    pub items: Vec<Item>,
}

impl RawDigest {
    pub fn into_digest(self) -> Digest {
        Digest {
            generated_at: self.generated_at.as_deref().and_then(parse_timestamp),
            items: self.items.into_iter().map(RawItem::into_item).collect(),
        }
    }
}

pub trait DigestService: Send + Sync {
    fn load(&self) -> Result<Digest>;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub user_agent: String,
    pub http_client: Option<HttpClient>,
}

pub struct HttpDigestService {
    http: HttpClient,
    url: String,
    user_agent: String,
}

impl HttpDigestService {
    pub fn new(url: &str, config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("digest client user agent required");
        }

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(Duration::from_secs(20))
                .build()?,
        };

        Ok(Self {
            http,
            url: url.to_string(),
            user_agent: config.user_agent,
        })
    }
}

impl DigestService for HttpDigestService {
    fn load(&self) -> Result<Digest> {
        let raw: RawDigest = self
            .http
            .get(&self.url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .with_context(|| format!("fetch digest from {}", self.url))?
            .json()
            .context("decode digest feed")?;
        Ok(raw.into_digest())
    }
}

pub struct FileDigestService {
    path: PathBuf,
}

impl FileDigestService {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl DigestService for FileDigestService {
    fn load(&self) -> Result<Digest> {
        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("read digest file {}", self.path.display()))?;
        let raw: RawDigest = serde_json::from_str(&data)
            .with_context(|| format!("decode digest file {}", self.path.display()))?;
        Ok(raw.into_digest())
    }
}

/// Placeholder cards shown when no digest source is reachable, so the
/// bindings can still be explored offline.
#[derive(Default)]
pub struct MockDigestService;

impl DigestService for MockDigestService {
    fn load(&self) -> Result<Digest> {
        let items = vec![
            RawItem {
                rank: 1,
                score: Some(128),
                comments: Some(42),
                submitted: Some("2026-01-01T08:00:00Z".into()),
                title: "Welcome to Newsdeck".into(),
                url: String::new(),
                permalink: String::new(),
                summary: "Browse the daily digest from your terminal. Use j/k to move, \
                          1-4 to sort, f to filter, q to quit."
                    .into(),
                author: "newsdeck".into(),
                ..RawItem::default()
            },
            RawItem {
                rank: 2,
                score: Some(64),
                comments: Some(7),
                submitted: Some("2026-01-01T06:30:00Z".into()),
                title: "No digest loaded".into(),
                url: String::new(),
                permalink: String::new(),
                summary: "Point newsdeck at a digest with --digest <path|url> or set \
                          digest.source in the config file."
                    .into(),
                author: "newsdeck".into(),
                ..RawItem::default()
            },
        ];
        Ok(RawDigest {
            generated_at: None,
            items,
        }
        .into_digest())
    }
}
