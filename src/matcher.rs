//! Multi-tier matcher mapping free-text "original song" references onto
//! canonical official-song records.
//!
//! Precedence per name: the オリジナル keyword, then an exact name search,
//! then a bounded partial search needing human review, then the catch-all
//! "other song" sentinel so an unknown reference never blocks an import.

use crate::constants::{ORIGINAL_KEYWORD, OTHER_SONG_ID};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Partial,
    None,
}

/// One official-song record proposed for a free-text reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongCandidate {
    pub id: String,
    pub name: String,
    pub name_ja: Option<String>,
    pub official_work_name: Option<String>,
    pub match_type: MatchType,
}

/// Match outcome for one input name, in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongMatchResult {
    pub original_name: String,
    pub is_original: bool,
    pub match_type: MatchType,
    pub candidates: Vec<SongCandidate>,
    pub auto_matched: bool,
    pub selected_id: Option<String>,
    pub custom_song_name: Option<String>,
}

/// Read-only song lookups the matcher is built over. Implementations own
/// their result ordering; exact search must be deterministic (the catalog
/// stores sort ascending by id) because the first exact hit wins.
#[async_trait]
pub trait SongSearch: Send + Sync {
    async fn search_exact(&self, name: &str) -> Result<Vec<SongCandidate>>;
    async fn search_partial(&self, name: &str, limit: usize) -> Result<Vec<SongCandidate>>;
    async fn find_canonical_original(&self) -> Result<Option<SongCandidate>>;
}

pub struct SongMatcher {
    search: Arc<dyn SongSearch>,
    candidate_limit: usize,
    // Looked up at most once per matcher instance.
    canonical_original: OnceCell<Option<SongCandidate>>,
}

impl SongMatcher {
    pub fn new(search: Arc<dyn SongSearch>, candidate_limit: usize) -> Self {
        Self {
            search,
            candidate_limit,
            canonical_original: OnceCell::new(),
        }
    }

    /// Match each name in input order, one result per name.
    pub async fn match_songs(&self, names: &[String]) -> Result<Vec<SongMatchResult>> {
        let mut results = Vec::with_capacity(names.len());
        for name in names {
            results.push(self.match_one(name).await?);
        }
        Ok(results)
    }

    async fn match_one(&self, raw_name: &str) -> Result<SongMatchResult> {
        let name = raw_name.trim();

        if name.is_empty() {
            // A blank cell is not a failed match; never auto-assign it
            // to the sentinel.
            return Ok(SongMatchResult {
                original_name: raw_name.to_string(),
                is_original: false,
                match_type: MatchType::None,
                candidates: Vec::new(),
                auto_matched: false,
                selected_id: None,
                custom_song_name: None,
            });
        }

        if name == ORIGINAL_KEYWORD {
            if let Some(original) = self.canonical_original().await? {
                return Ok(SongMatchResult {
                    original_name: raw_name.to_string(),
                    is_original: true,
                    match_type: MatchType::Exact,
                    candidates: vec![original.clone()],
                    auto_matched: true,
                    selected_id: Some(original.id),
                    custom_song_name: None,
                });
            }
        }

        let exact = self.search.search_exact(name).await?;
        if !exact.is_empty() {
            let selected_id = exact[0].id.clone();
            debug!(name, %selected_id, hits = exact.len(), "exact song match");
            return Ok(SongMatchResult {
                original_name: raw_name.to_string(),
                is_original: false,
                match_type: MatchType::Exact,
                candidates: exact,
                auto_matched: true,
                selected_id: Some(selected_id),
                custom_song_name: None,
            });
        }

        let partial = self.search.search_partial(name, self.candidate_limit).await?;
        if !partial.is_empty() {
            debug!(name, hits = partial.len(), "partial song match, needs review");
            return Ok(SongMatchResult {
                original_name: raw_name.to_string(),
                is_original: false,
                match_type: MatchType::Partial,
                candidates: partial,
                auto_matched: false,
                selected_id: None,
                custom_song_name: None,
            });
        }

        // No hit at all: link to the catch-all record but keep the raw
        // name for display and audit.
        debug!(name, "no song match, falling back to the other-song record");
        Ok(SongMatchResult {
            original_name: raw_name.to_string(),
            is_original: false,
            match_type: MatchType::None,
            candidates: Vec::new(),
            auto_matched: true,
            selected_id: Some(OTHER_SONG_ID.to_string()),
            custom_song_name: Some(name.to_string()),
        })
    }

    async fn canonical_original(&self) -> Result<Option<SongCandidate>> {
        self.canonical_original
            .get_or_try_init(|| self.search.find_canonical_original())
            .await
            .map(|cached| cached.clone())
    }
}
