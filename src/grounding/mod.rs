
pub mod language;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::Result;
use crate::retrieval::{Retriever, SourceReference, dedup_sources};

pub use language::{Language, LanguagePack};

// Source extraction runs a looser search than the chat default
const SOURCE_LIMIT: usize = 3;
const SOURCE_SCORE_THRESHOLD: f32 = 0.3;

// Queries at or under this length are too short to search meaningfully
const MIN_SEARCHABLE_QUERY_CHARS: usize = 10;

/// Decides whether a query needs retrieval and whether an answer counts as
/// grounded.
///
/// This is a policy seam: the heuristic below checks phrasing and source
/// presence only. A stricter check (e.g. citation-span verification) can
/// replace it without touching callers.
#[async_trait]
pub trait GroundingPolicy: Send + Sync {
    /// Whether the query is a greeting/courtesy exchange that skips retrieval
    fn is_conversational(&self, query: &str) -> bool;

    /// Citations likely backing an answer to this query, unique by chunk id
    /// in first-seen order
    async fn extract_sources(&self, query: &str, answer: &str) -> Result<Vec<SourceReference>>;

    /// Whether the answer counts as grounded in the given sources
    fn is_grounded(&self, query: &str, answer: &str, sources: &[SourceReference]) -> bool;
}

/// Phrase-list + source-count grounding heuristic
pub struct HeuristicGrounding {
    retriever: Arc<dyn Retriever>,
}

impl HeuristicGrounding {
    #[inline]
    pub fn new(retriever: Arc<dyn Retriever>) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl GroundingPolicy for HeuristicGrounding {
    #[inline]
    fn is_conversational(&self, query: &str) -> bool {
        let trimmed = query.trim();
        let lowered = trimmed.to_lowercase();

        for language in Language::ALL {
            let pack = language.pack();

            for greeting in pack.greetings {
                if lowered == *greeting {
                    return true;
                }
                // A greeting followed by punctuation or more words still counts
                if lowered.starts_with(greeting)
                    && lowered[greeting.len()..]
                        .chars()
                        .next()
                        .is_some_and(|c| c == ' ' || c == '!' || c == ',')
                {
                    return true;
                }
            }

            // Short queries may carry a greeting anywhere; checked raw as well
            // since non-Latin scripts do not lowercase
            if trimmed.chars().count() < pack.short_query_limit
                && pack
                    .greetings
                    .iter()
                    .any(|g| lowered.contains(g) || trimmed.contains(g))
            {
                return true;
            }
        }

        false
    }

    #[inline]
    async fn extract_sources(&self, query: &str, _answer: &str) -> Result<Vec<SourceReference>> {
        if self.is_conversational(query) {
            return Ok(Vec::new());
        }

        // Too short to search meaningfully
        if query.chars().count() <= MIN_SEARCHABLE_QUERY_CHARS {
            debug!("Query too short for source extraction: '{}'", query);
            return Ok(Vec::new());
        }

        let hits = self
            .retriever
            .search(query, SOURCE_LIMIT, SOURCE_SCORE_THRESHOLD, None)
            .await?;

        Ok(dedup_sources(hits))
    }

    #[inline]
    fn is_grounded(&self, query: &str, answer: &str, sources: &[SourceReference]) -> bool {
        // Greetings don't need sources
        if self.is_conversational(query) {
            return true;
        }

        let answer_lower = answer.to_lowercase();
        for language in Language::ALL {
            for phrase in language.pack().refusal_phrases {
                if answer_lower.contains(phrase) || answer.contains(phrase) {
                    return false;
                }
            }
        }

        !sources.is_empty()
    }
}
