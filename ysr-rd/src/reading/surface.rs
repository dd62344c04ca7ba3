//! Reading surface: an opened article with highlighted segments

use crate::reading::highlight::{Fragment, Highlighter};
use serde::Serialize;
use ysr_common::{Article, VocabularyItem};

/// Owned render fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SurfaceFragment {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Vocabulary {
        text: String,
        vocabulary_id: String,
    },
}

impl From<Fragment<'_>> for SurfaceFragment {
    fn from(fragment: Fragment<'_>) -> Self {
        match fragment {
            Fragment::Text(text) => SurfaceFragment::Text {
                text: text.to_string(),
            },
            Fragment::Vocabulary { text, item } => SurfaceFragment::Vocabulary {
                text: text.to_string(),
                vocabulary_id: item.id.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceSegment {
    pub id: String,
    pub fragments: Vec<SurfaceFragment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    /// Whether the play control is shown
    pub has_audio: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingSurface {
    pub id: String,
    pub title: String,
    pub author: String,
    pub tags: Vec<String>,
    pub view_count: u64,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    pub segments: Vec<SurfaceSegment>,
    pub vocabulary: Vec<VocabularyItem>,
}

impl ReadingSurface {
    pub fn build(article: &Article) -> Self {
        let highlighter = Highlighter::new(&article.key_vocabulary);

        let segments = article
            .segments
            .iter()
            .map(|segment| SurfaceSegment {
                id: segment.id.clone(),
                fragments: highlighter
                    .highlight(&segment.text)
                    .into_iter()
                    .map(SurfaceFragment::from)
                    .collect(),
                translation: segment.translation.clone(),
                has_audio: segment.audio_ref().is_some(),
            })
            .collect();

        Self {
            id: article.id.clone(),
            title: article.title.clone(),
            author: article.author.clone(),
            tags: article.tags.clone(),
            view_count: article.view_count,
            created_at: article.created_at,
            cover_image: article.cover_image.clone(),
            segments,
            vocabulary: article.key_vocabulary.clone(),
        }
    }
}
