//! Local (mock mode) article store
//!
//! The whole article list lives in one `local_storage` record as a JSON array.
//! Every mutation is a read-modify-write of that record, serialized by a
//! process-local lock. Reads take the same lock, since loading a legacy list
//! writes the migrated form back.

use super::{now_millis, sort_newest_first, ArticleStore};
use crate::db;
use crate::model::{Article, ArticleDraft};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Record key holding the article list
pub const ARTICLES_KEY: &str = "local_reader_articles_v1";

pub struct LocalStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
        }
    }

    /// Load the list, backfilling a missing publication flag as published.
    ///
    /// When any entry needed the backfill the migrated list is written back,
    /// so callers must hold `write_lock`.
    async fn load(&self) -> Result<Vec<Article>> {
        let Some(raw) = db::get_record(&self.pool, ARTICLES_KEY).await? else {
            return Ok(Vec::new());
        };

        let mut entries: Vec<Value> = serde_json::from_str(&raw)?;
        let mut migrated = 0usize;
        for entry in entries.iter_mut() {
            if let Some(obj) = entry.as_object_mut() {
                let has_flag = obj.get("isPublished").map(Value::is_boolean).unwrap_or(false);
                if !has_flag {
                    obj.insert("isPublished".to_string(), Value::Bool(true));
                    migrated += 1;
                }
            }
        }

        let articles = entries
            .into_iter()
            .map(serde_json::from_value::<Article>)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if migrated > 0 {
            info!("Backfilled publication flag on {} stored article(s)", migrated);
            self.persist(&articles).await?;
        }

        Ok(articles)
    }

    async fn persist(&self, articles: &[Article]) -> Result<()> {
        let json = serde_json::to_string(articles)?;
        db::set_record(&self.pool, ARTICLES_KEY, &json).await
    }

    /// Apply `f` to the article with `id` and persist; unknown ids are a no-op
    async fn update_one<F>(&self, id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut Article),
    {
        let _guard = self.write_lock.lock().await;
        let mut articles = self.load().await?;
        match articles.iter_mut().find(|a| a.id == id) {
            Some(article) => {
                f(article);
                self.persist(&articles).await
            }
            None => {
                debug!("Local store: article {} not found, nothing to update", id);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ArticleStore for LocalStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn fetch_articles(&self) -> Result<Vec<Article>> {
        let _guard = self.write_lock.lock().await;
        let mut articles = self.load().await?;
        sort_newest_first(&mut articles);
        Ok(articles)
    }

    async fn save_article(&self, draft: ArticleDraft) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut articles = self.load().await?;

        match articles.iter_mut().find(|a| a.id == draft.id) {
            Some(existing) => {
                debug!("Local store: updating article {}", draft.id);
                existing.merge_draft(draft);
            }
            None => {
                debug!("Local store: inserting article {}", draft.id);
                articles.insert(0, Article::from_draft(draft, now_millis()));
            }
        }

        self.persist(&articles).await
    }

    async fn delete_article(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if db::get_record(&self.pool, ARTICLES_KEY).await?.is_none() {
            return Ok(());
        }
        let mut articles = self.load().await?;
        articles.retain(|a| a.id != id);
        self.persist(&articles).await
    }

    async fn toggle_publish(&self, id: &str, current_state: bool) -> Result<()> {
        self.update_one(id, |a| a.is_published = !current_state).await
    }

    async fn increment_view_count(&self, id: &str) -> Result<()> {
        self.update_one(id, |a| a.view_count = a.view_count.saturating_add(1))
            .await
    }
}
