//! Article Store Facade
//!
//! One contract over two backends: the local persisted record (mock mode) and
//! the remote table-backed service. The backend is chosen once at startup by
//! [`select_store`]; callers only ever see `Arc<dyn ArticleStore>`.

pub mod local;
pub mod remote;

use crate::config::RemoteConfig;
use crate::model::{Article, ArticleDraft};
use crate::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};

pub use local::LocalStore;
pub use remote::RemoteStore;

/// Persistence operations used by the view router
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Backend name for logs and the health endpoint
    fn backend_name(&self) -> &'static str;

    /// All articles, newest first
    async fn fetch_articles(&self) -> Result<Vec<Article>>;

    /// Upsert by id. New ids start with zero views and `created_at = now`.
    async fn save_article(&self, draft: ArticleDraft) -> Result<()>;

    async fn delete_article(&self, id: &str) -> Result<()>;

    /// Set the publication flag to `!current_state`
    async fn toggle_publish(&self, id: &str, current_state: bool) -> Result<()>;

    async fn increment_view_count(&self, id: &str) -> Result<()>;
}

/// Pick the backend: remote when real credentials are configured, otherwise local
pub fn select_store(remote: &RemoteConfig, pool: SqlitePool) -> Result<Arc<dyn ArticleStore>> {
    if remote.is_configured() {
        let store = RemoteStore::from_config(remote)?;
        info!("Article store: remote ({})", store.base_url());
        Ok(Arc::new(store))
    } else {
        warn!("No remote credentials configured, using local mock store");
        Ok(Arc::new(LocalStore::new(pool)))
    }
}

/// Current time in epoch milliseconds
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Sort newest first; ties keep their stored order
pub(crate) fn sort_newest_first(articles: &mut [Article]) {
    articles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
