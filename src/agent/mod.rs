#[cfg(test)]
mod tests;

pub mod runtime;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::Result;
use crate::grounding::{GroundingPolicy, Language};
use crate::retrieval::SourceReference;
use crate::session::SessionRegistry;

pub use runtime::{AgentRuntime, OpenAiAgentRuntime};

/// Result of one chat turn
#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    pub answer: String,
    pub sources: Vec<SourceReference>,
    pub grounded: bool,
    pub conversation_id: String,
}

/// Coordinates one chat request: session resolution, message composition,
/// the agent runtime call, and the grounding check.
pub struct ChatAgent {
    runtime: Arc<dyn AgentRuntime>,
    grounding: Arc<dyn GroundingPolicy>,
    sessions: SessionRegistry,
}

impl ChatAgent {
    #[inline]
    pub fn new(
        runtime: Arc<dyn AgentRuntime>,
        grounding: Arc<dyn GroundingPolicy>,
        sessions: SessionRegistry,
    ) -> Self {
        Self {
            runtime,
            grounding,
            sessions,
        }
    }

    /// Process a chat query and return a grounded response.
    ///
    /// The grounding check runs against the original query, not the composed
    /// message sent to the runtime.
    #[inline]
    pub async fn chat(
        &self,
        query: &str,
        selected_text: Option<&str>,
        conversation_id: Option<String>,
        language: Language,
    ) -> Result<ChatOutcome> {
        let conversation_id = conversation_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let session = self.sessions.get_or_create(&conversation_id).await;

        let message = match selected_text {
            Some(selection) if !selection.trim().is_empty() => {
                language.compose_selection_message(selection, query)
            }
            _ => query.to_string(),
        };

        debug!("Running agent for conversation {}", conversation_id);
        let raw_answer = self.runtime.run(language, &session, &message).await?;

        let answer = if raw_answer.trim().is_empty() {
            language.pack().fallback_answer.to_string()
        } else {
            raw_answer
        };

        let sources = self.grounding.extract_sources(query, &answer).await?;
        let grounded = self.grounding.is_grounded(query, &answer, &sources);

        Ok(ChatOutcome {
            answer,
            sources,
            grounded,
            conversation_id,
        })
    }

    /// Clear a conversation's cached session and persisted history.
    ///
    /// Idempotent; returns whether the conversation existed in either place.
    #[inline]
    pub async fn clear_conversation(&self, conversation_id: &str) -> Result<bool> {
        let cached = self.sessions.remove(conversation_id).await;
        let persisted = self.sessions.database().clear(conversation_id).await?;

        if cached || persisted {
            info!("Cleared conversation {}", conversation_id);
        }

        Ok(cached || persisted)
    }

    /// Conversation ids with an active session in this process
    #[inline]
    pub async fn active_conversations(&self) -> Vec<String> {
        self.sessions.active_ids().await
    }
}
