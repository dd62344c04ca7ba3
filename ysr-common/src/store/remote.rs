//! Remote article store over a PostgREST-style HTTP interface
//!
//! Table `articles` with snake_case columns; `segments`, `key_vocabulary` and
//! `tags` are JSON columns. View counts go through the
//! `increment_view_count` RPC when the backend provides it.

use super::{sort_newest_first, ArticleStore};
use crate::config::RemoteConfig;
use crate::model::{Article, ArticleDraft, Segment, VocabularyItem};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

const TABLE: &str = "articles";
const INCREMENT_RPC: &str = "increment_view_count";

/// Row as returned by the remote table
#[derive(Debug, Deserialize)]
struct ArticleRow {
    id: String,
    title: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    segments: Option<Vec<Segment>>,
    #[serde(default)]
    key_vocabulary: Option<Vec<VocabularyItem>>,
    created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    view_count: Option<i64>,
    #[serde(default)]
    is_published: Option<bool>,
    #[serde(default)]
    cover_image: Option<String>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Article {
            id: row.id,
            title: row.title,
            author: row.author,
            segments: row.segments.unwrap_or_default(),
            tags: row.tags.unwrap_or_default(),
            key_vocabulary: row.key_vocabulary.unwrap_or_default(),
            created_at: row.created_at.timestamp_millis(),
            view_count: row.view_count.unwrap_or(0).max(0) as u64,
            is_published: row.is_published.unwrap_or(true),
            cover_image: row.cover_image,
        }
    }
}

/// Upsert body; `created_at` and `view_count` are left to column defaults
#[derive(Debug, Serialize)]
struct ArticlePayload<'a> {
    id: &'a str,
    title: &'a str,
    segments: &'a [Segment],
    key_vocabulary: &'a [VocabularyItem],
    author: &'a str,
    tags: &'a [String],
    is_published: bool,
    cover_image: Option<&'a str>,
}

impl<'a> From<&'a ArticleDraft> for ArticlePayload<'a> {
    fn from(draft: &'a ArticleDraft) -> Self {
        Self {
            id: &draft.id,
            title: &draft.title,
            segments: &draft.segments,
            key_vocabulary: &draft.key_vocabulary,
            author: &draft.author,
            tags: &draft.tags,
            is_published: draft.is_published,
            cover_image: draft.cover_image.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ViewCountRow {
    #[serde(default)]
    view_count: Option<i64>,
}

pub struct RemoteStore {
    client: Client,
    base_url: String,
}

impl RemoteStore {
    /// Build a client for `base_url` (project root, without `/rest/v1`)
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(anon_key)
            .map_err(|e| Error::Config(format!("Invalid remote key: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", anon_key))
            .map_err(|e| Error::Config(format!("Invalid remote key: {}", e)))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &RemoteConfig) -> Result<Self> {
        match (config.url.as_deref(), config.anon_key.as_deref()) {
            (Some(url), Some(key)) => Self::new(url, key),
            _ => Err(Error::Config("Remote store requires url and anon_key".to_string())),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, TABLE)
    }

    fn rpc_url(&self, name: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, name)
    }

    async fn fallback_increment(&self, id: &str) -> Result<()> {
        let rows: Vec<ViewCountRow> = check(
            self.client
                .get(self.table_url())
                .query(&[("select", "view_count".to_string()), ("id", format!("eq.{}", id))])
                .send()
                .await?,
        )
        .await?
        .json()
        .await?;

        let current = rows.first().and_then(|r| r.view_count).unwrap_or(0);
        check(
            self.client
                .patch(self.table_url())
                .query(&[("id", format!("eq.{}", id))])
                .json(&json!({ "view_count": current + 1 }))
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }
}

/// Map non-2xx responses to [`Error::Remote`]
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(Error::Remote {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ArticleStore for RemoteStore {
    fn backend_name(&self) -> &'static str {
        "remote"
    }

    async fn fetch_articles(&self) -> Result<Vec<Article>> {
        let rows: Vec<ArticleRow> = check(
            self.client
                .get(self.table_url())
                .query(&[("select", "*"), ("order", "created_at.desc")])
                .send()
                .await?,
        )
        .await?
        .json()
        .await?;

        let mut articles: Vec<Article> = rows.into_iter().map(Article::from).collect();
        sort_newest_first(&mut articles);
        debug!("Remote store: fetched {} articles", articles.len());
        Ok(articles)
    }

    async fn save_article(&self, draft: ArticleDraft) -> Result<()> {
        let payload = ArticlePayload::from(&draft);
        check(
            self.client
                .post(self.table_url())
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(&payload)
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn delete_article(&self, id: &str) -> Result<()> {
        check(
            self.client
                .delete(self.table_url())
                .query(&[("id", format!("eq.{}", id))])
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn toggle_publish(&self, id: &str, current_state: bool) -> Result<()> {
        check(
            self.client
                .patch(self.table_url())
                .query(&[("id", format!("eq.{}", id))])
                .json(&json!({ "is_published": !current_state }))
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn increment_view_count(&self, id: &str) -> Result<()> {
        let rpc = self
            .client
            .post(self.rpc_url(INCREMENT_RPC))
            .json(&json!({ "article_id": id }))
            .send()
            .await;

        let rpc_result = match rpc {
            Ok(response) => check(response).await.map(|_| ()),
            Err(e) => Err(Error::from(e)),
        };

        match rpc_result {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("increment RPC failed ({}), falling back to read-then-write", e);
                self.fallback_increment(id).await
            }
        }
    }
}
