
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::config::Config;
use crate::grounding::Language;
use crate::retrieval::Retriever;
use crate::session::Session;
use crate::{RagError, Result};

const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

// The model may chain a few searches before answering
const MAX_TOOL_ROUNDS: usize = 4;

/// Search parameters for the agent's `search_textbook` tool
pub const TOOL_SEARCH_LIMIT: usize = 5;
pub const TOOL_SCORE_THRESHOLD: f32 = 0.3;

/// Sentinel returned to the model when a search finds nothing relevant
pub const NO_RESULTS_SENTINEL: &str =
    "NO_RESULTS: No relevant content found in the textbook for this query.";

/// Hosted LLM agent runtime: given language-specific instructions, the
/// retrieval search tool, and a session, produces a final answer text.
///
/// The runtime injects prior turns from the session and persists the new
/// turn; callers never manage dialogue history directly.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn run(&self, language: Language, session: &Session, input: &str) -> Result<String>;
}

/// AgentRuntime over the OpenAI chat-completions API with function calling
pub struct OpenAiAgentRuntime {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    retriever: Arc<dyn Retriever>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    tools: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ChatMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct SearchToolArguments {
    query: String,
}

impl OpenAiAgentRuntime {
    #[inline]
    pub fn new(config: &Config, retriever: Arc<dyn Retriever>) -> Result<Self> {
        let api_key = config
            .resolved_api_key()
            .ok_or_else(|| RagError::Config("OPENAI_API_KEY is not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| RagError::Agent(format!("Failed to build HTTP client: {e}")))?;

        let endpoint = format!(
            "{}/chat/completions",
            config.openai.api_base.trim_end_matches('/')
        );

        Ok(Self {
            client,
            endpoint,
            api_key,
            model: config.openai.agent_model.clone(),
            retriever,
        })
    }

    fn search_tool_definition() -> serde_json::Value {
        json!({
            "type": "function",
            "function": {
                "name": "search_textbook",
                "description": "Search the textbook for relevant content. Use this for ANY \
                                technical question about the book's subject matter. Do NOT use \
                                this for greetings or casual conversation.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The search query to find relevant textbook sections"
                        }
                    },
                    "required": ["query"],
                    "additionalProperties": false
                }
            }
        })
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<ChatMessage> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            tools: vec![Self::search_tool_definition()],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Agent(format!("Agent request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Agent(format!(
                "Agent request returned HTTP {status}: {body}"
            )));
        }

        let mut parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| RagError::Agent(format!("Failed to parse agent response: {e}")))?;

        if parsed.choices.is_empty() {
            return Err(RagError::Agent("Agent returned no choices".to_string()));
        }

        Ok(parsed.choices.swap_remove(0).message)
    }

    async fn run_search_tool(&self, arguments: &str) -> Result<String> {
        let args: SearchToolArguments = serde_json::from_str(arguments)
            .map_err(|e| RagError::Agent(format!("Invalid search tool arguments: {e}")))?;

        debug!("Agent invoked search_textbook: '{}'", args.query);

        let hits = self
            .retriever
            .search(&args.query, TOOL_SEARCH_LIMIT, TOOL_SCORE_THRESHOLD, None)
            .await?;

        Ok(format_search_results(&hits))
    }
}

/// Format retrieval hits as labeled excerpts for the model, or the
/// no-results sentinel
#[inline]
pub fn format_search_results(hits: &[crate::retrieval::SearchHit]) -> String {
    if hits.is_empty() {
        return NO_RESULTS_SENTINEL.to_string();
    }

    let formatted: Vec<String> = hits
        .iter()
        .map(|hit| {
            format!(
                "[{}: {}] (relevance: {:.2})\n{}",
                hit.source.chapter, hit.source.section, hit.score, hit.text
            )
        })
        .collect();

    format!("TEXTBOOK CONTENT:\n\n{}", formatted.join("\n\n---\n\n"))
}

#[async_trait]
impl AgentRuntime for OpenAiAgentRuntime {
    #[inline]
    async fn run(&self, language: Language, session: &Session, input: &str) -> Result<String> {
        let mut messages = vec![ChatMessage {
            role: "system".to_string(),
            content: Some(language.pack().instructions.to_string()),
            ..ChatMessage::default()
        }];

        for prior in session.history().await? {
            messages.push(ChatMessage {
                role: prior.role,
                content: Some(prior.content),
                ..ChatMessage::default()
            });
        }

        messages.push(ChatMessage {
            role: "user".to_string(),
            content: Some(input.to_string()),
            ..ChatMessage::default()
        });

        let mut final_answer = String::new();

        for round in 0..=MAX_TOOL_ROUNDS {
            let reply = self.complete(&messages).await?;

            let Some(tool_calls) = reply.tool_calls.clone().filter(|c| !c.is_empty()) else {
                final_answer = reply.content.unwrap_or_default();
                break;
            };

            if round == MAX_TOOL_ROUNDS {
                warn!("Agent exceeded tool round limit, answering without further searches");
                final_answer = reply.content.unwrap_or_default();
                break;
            }

            messages.push(reply);

            for call in tool_calls {
                let result = self.run_search_tool(&call.function.arguments).await?;
                messages.push(ChatMessage {
                    role: "tool".to_string(),
                    content: Some(result),
                    tool_call_id: Some(call.id),
                    ..ChatMessage::default()
                });
            }
        }

        session.record_turn(input, &final_answer).await?;

        Ok(final_answer)
    }
}
