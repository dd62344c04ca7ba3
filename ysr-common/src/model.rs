//! Article data model
//!
//! Articles are authored on the admin page and read on the reader page.
//! Field names serialize as camelCase so the persisted local record and the
//! HTTP API share one layout.

use serde::{Deserialize, Serialize};

/// Number of characters kept in a reader card preview.
pub const PREVIEW_CHARS: usize = 150;

/// One sentence (or other unit) of an article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Unique within its article
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    /// URL, resource path, or inline encoded payload; the format is detected at decode time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_data: Option<String>,
}

impl Segment {
    /// Audio reference if one is configured (blank strings count as missing)
    pub fn audio_ref(&self) -> Option<&str> {
        non_blank(self.audio_data.as_deref())
    }
}

/// Key vocabulary entry highlighted inside segment text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyItem {
    pub id: String,
    /// Case-insensitive match key (word or phrase)
    pub word: String,
    pub definition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_data: Option<String>,
}

impl VocabularyItem {
    /// Pronunciation audio reference if one is configured
    pub fn audio_ref(&self) -> Option<&str> {
        non_blank(self.audio_data.as_deref())
    }
}

/// A stored article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub key_vocabulary: Vec<VocabularyItem>,
    /// Creation time, epoch milliseconds; 0 for entries saved without one
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub view_count: u64,
    pub is_published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
}

impl Article {
    /// Build a new article from a draft, stamping creation time and a zero view count
    pub fn from_draft(draft: ArticleDraft, created_at: i64) -> Self {
        Self {
            id: draft.id,
            title: draft.title,
            author: draft.author,
            segments: draft.segments,
            tags: draft.tags,
            key_vocabulary: draft.key_vocabulary,
            created_at,
            view_count: 0,
            is_published: draft.is_published,
            cover_image: draft.cover_image,
        }
    }

    /// Replace every editable field with the draft's, keeping id, view count and creation time
    pub fn merge_draft(&mut self, draft: ArticleDraft) {
        self.title = draft.title;
        self.author = draft.author;
        self.segments = draft.segments;
        self.tags = draft.tags;
        self.key_vocabulary = draft.key_vocabulary;
        self.is_published = draft.is_published;
        self.cover_image = draft.cover_image;
    }

    pub fn segment(&self, segment_id: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == segment_id)
    }

    pub fn vocabulary(&self, vocabulary_id: &str) -> Option<&VocabularyItem> {
        self.key_vocabulary.iter().find(|v| v.id == vocabulary_id)
    }

    /// Reader card projection
    pub fn summary(&self) -> ArticleSummary {
        ArticleSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            author: self.author.clone(),
            tags: self.tags.clone(),
            view_count: self.view_count,
            created_at: self.created_at,
            is_published: self.is_published,
            cover_image: self.cover_image.clone(),
            preview: preview_text(&self.segments),
        }
    }
}

/// Article as submitted by the admin editor (no view count, no creation time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDraft {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub key_vocabulary: Vec<VocabularyItem>,
    #[serde(default = "default_published")]
    pub is_published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
}

fn default_published() -> bool {
    true
}

/// Reader-facing card for the article list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSummary {
    pub id: String,
    pub title: String,
    pub author: String,
    pub tags: Vec<String>,
    pub view_count: u64,
    pub created_at: i64,
    pub is_published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    pub preview: String,
}

/// All segment texts joined by a space, cut to [`PREVIEW_CHARS`] characters, with `...` appended
pub fn preview_text(segments: &[Segment]) -> String {
    let joined = segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let mut preview: String = joined.chars().take(PREVIEW_CHARS).collect();
    preview.push_str("...");
    preview
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
