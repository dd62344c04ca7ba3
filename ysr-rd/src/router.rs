//! View router
//!
//! Binds the reader and admin pages to URL query state (`?view=admin`) and
//! in-memory navigation. Owns the article collection and dispatches every
//! mutation to the article store, reloading the collection once the write
//! has completed.

use crate::error::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;
use ysr_common::events::{EventBus, ReaderEvent, View};
use ysr_common::store::ArticleStore;
use ysr_common::{Article, ArticleDraft, ArticleSummary};

/// View selected by a URL query string (with or without the leading `?`)
pub fn view_from_query(query: Option<&str>) -> View {
    let query = query.unwrap_or_default().trim_start_matches('?');
    let admin = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .any(|(key, value)| key == "view" && value == "admin");
    if admin {
        View::Admin
    } else {
        View::Reader
    }
}

/// Query string the client should push for `view`
pub fn query_for(view: View) -> &'static str {
    match view {
        View::Admin => "?view=admin",
        View::Reader => "",
    }
}

#[derive(Debug, Default)]
struct RouterState {
    view: View,
    articles: Vec<Article>,
    selected: Option<String>,
    editing: Option<String>,
    show_editor: bool,
}

/// Navigation state reported to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterSnapshot {
    pub view: View,
    /// Query string matching `view`
    pub query: String,
    pub selected_article_id: Option<String>,
    pub editing_article_id: Option<String>,
    pub show_editor: bool,
    pub article_count: usize,
}

pub struct ViewRouter {
    store: Arc<dyn ArticleStore>,
    state: RwLock<RouterState>,
    events: EventBus,
}

impl ViewRouter {
    pub fn new(store: Arc<dyn ArticleStore>, events: EventBus, initial: View) -> Self {
        Self {
            store,
            state: RwLock::new(RouterState {
                view: initial,
                ..Default::default()
            }),
            events,
        }
    }

    pub fn store_backend(&self) -> &'static str {
        self.store.backend_name()
    }

    pub async fn snapshot(&self) -> RouterSnapshot {
        let state = self.state.read().await;
        RouterSnapshot {
            view: state.view,
            query: query_for(state.view).to_string(),
            selected_article_id: state.selected.clone(),
            editing_article_id: state.editing.clone(),
            show_editor: state.show_editor,
            article_count: state.articles.len(),
        }
    }

    pub async fn view(&self) -> View {
        self.state.read().await.view
    }

    /// Switch pages, clearing the open article and the editor
    pub async fn navigate(&self, target: View) -> RouterSnapshot {
        {
            let mut state = self.state.write().await;
            state.view = target;
            state.selected = None;
            state.show_editor = false;
            state.editing = None;
        }
        debug!("Navigated to {:?}", target);
        self.events.emit(ReaderEvent::ViewChanged {
            view: target,
            timestamp: chrono::Utc::now(),
        });
        self.snapshot().await
    }

    /// Browser back/forward: take the view from the URL and close the article and editor
    pub async fn pop_state(&self, query: Option<&str>) -> RouterSnapshot {
        let view = view_from_query(query);
        {
            let mut state = self.state.write().await;
            state.view = view;
            state.selected = None;
            state.show_editor = false;
        }
        self.events.emit(ReaderEvent::ViewChanged {
            view,
            timestamp: chrono::Utc::now(),
        });
        self.snapshot().await
    }

    /// Reload the collection. On failure the prior list is kept and the error logged.
    pub async fn load(&self) -> usize {
        match self.store.fetch_articles().await {
            Ok(articles) => {
                let count = articles.len();
                self.state.write().await.articles = articles;
                debug!("Loaded {} articles from {} store", count, self.store.backend_name());
                self.events.emit(ReaderEvent::ArticlesChanged {
                    count,
                    timestamp: chrono::Utc::now(),
                });
                count
            }
            Err(e) => {
                warn!("Failed to load articles, keeping previous list: {}", e);
                self.state.read().await.articles.len()
            }
        }
    }

    /// Reader cards: published articles only, newest first
    pub async fn published(&self) -> Vec<ArticleSummary> {
        self.state
            .read()
            .await
            .articles
            .iter()
            .filter(|a| a.is_published)
            .map(Article::summary)
            .collect()
    }

    /// Admin listing: every article
    pub async fn all_articles(&self) -> Vec<Article> {
        self.state.read().await.articles.clone()
    }

    pub async fn article(&self, id: &str) -> Option<Article> {
        self.state
            .read()
            .await
            .articles
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }

    pub async fn selected(&self) -> Option<Article> {
        let state = self.state.read().await;
        let id = state.selected.as_deref()?;
        state.articles.iter().find(|a| a.id == id).cloned()
    }

    /// Open a published article on the reader page and count the view
    pub async fn select_article(&self, id: &str) -> Result<Article> {
        let exists = self
            .state
            .read()
            .await
            .articles
            .iter()
            .any(|a| a.id == id && a.is_published);
        if !exists {
            return Err(Error::NotFound(format!("Published article {}", id)));
        }

        let counted = match self.store.increment_view_count(id).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to record view of {}: {}", id, e);
                false
            }
        };

        let mut state = self.state.write().await;
        state.selected = Some(id.to_string());
        let article = state
            .articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::NotFound(format!("Article {}", id)))?;
        if counted {
            article.view_count = article.view_count.saturating_add(1);
        }
        info!("Opened article {} ({} views)", id, article.view_count);
        Ok(article.clone())
    }

    pub async fn close_article(&self) -> Option<String> {
        self.state.write().await.selected.take()
    }

    /// Show the editor, for a new article (`None`) or an existing one
    pub async fn open_editor(&self, id: Option<&str>) -> Result<Option<Article>> {
        let mut state = self.state.write().await;
        let article = match id {
            Some(id) => Some(
                state
                    .articles
                    .iter()
                    .find(|a| a.id == id)
                    .cloned()
                    .ok_or_else(|| Error::NotFound(format!("Article {}", id)))?,
            ),
            None => None,
        };
        state.editing = id.map(str::to_string);
        state.show_editor = true;
        Ok(article)
    }

    pub async fn cancel_editor(&self) {
        let mut state = self.state.write().await;
        state.show_editor = false;
        state.editing = None;
    }

    /// Upsert through the store and reload. A blank id gets a fresh UUID.
    pub async fn save_article(&self, mut draft: ArticleDraft) -> Result<String> {
        if draft.title.trim().is_empty() {
            return Err(Error::BadRequest("Title is required".to_string()));
        }
        if draft.id.trim().is_empty() {
            draft.id = Uuid::new_v4().to_string();
        }
        let id = draft.id.clone();

        self.store.save_article(draft).await?;
        info!("Saved article {}", id);

        self.cancel_editor().await;
        self.load().await;
        Ok(id)
    }

    pub async fn delete_article(&self, id: &str) -> Result<()> {
        self.store.delete_article(id).await?;
        info!("Deleted article {}", id);

        {
            let mut state = self.state.write().await;
            if state.selected.as_deref() == Some(id) {
                state.selected = None;
            }
            if state.editing.as_deref() == Some(id) {
                state.editing = None;
                state.show_editor = false;
            }
        }
        self.load().await;
        Ok(())
    }

    /// Flip publication; returns the new state
    pub async fn toggle_publish(&self, id: &str) -> Result<bool> {
        let current = self
            .article(id)
            .await
            .map(|a| a.is_published)
            .ok_or_else(|| Error::NotFound(format!("Article {}", id)))?;

        self.store.toggle_publish(id, current).await?;
        info!("Article {} published: {}", id, !current);

        self.load().await;
        Ok(!current)
    }
}
