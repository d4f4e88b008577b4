use super::*;
use anyhow::Result as AnyResult;
use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Mutex;

use crate::database::sqlite::SessionDatabase;
use crate::retrieval::{Retriever, SearchHit};
use crate::session::Session;

/// Runtime stub that records its input and replays a canned answer
struct FakeRuntime {
    answer: String,
    last_input: Mutex<Option<String>>,
}

impl FakeRuntime {
    fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            last_input: Mutex::new(None),
        }
    }
}

#[async_trait]
impl AgentRuntime for FakeRuntime {
    async fn run(
        &self,
        _language: Language,
        session: &Session,
        input: &str,
    ) -> crate::Result<String> {
        *self.last_input.lock().await = Some(input.to_string());
        session.record_turn(input, &self.answer).await?;
        Ok(self.answer.clone())
    }
}

struct FakeRetriever {
    hits: Vec<SearchHit>,
}

#[async_trait]
impl Retriever for FakeRetriever {
    async fn search(
        &self,
        _query: &str,
        limit: usize,
        score_threshold: f32,
        _chapter_filter: Option<&str>,
    ) -> crate::Result<Vec<SearchHit>> {
        Ok(self
            .hits
            .iter()
            .filter(|hit| hit.score >= score_threshold)
            .take(limit)
            .cloned()
            .collect())
    }
}

fn indexed_hit() -> SearchHit {
    SearchHit {
        text: "Nodes publish to topics.".to_string(),
        source: crate::retrieval::SourceReference {
            chunk_id: "02-ros2:topics:0".to_string(),
            chapter: "ROS 2".to_string(),
            section: "Topics".to_string(),
            score: 0.85,
        },
        score: 0.85,
    }
}

struct TestHarness {
    _temp_dir: TempDir,
    agent: ChatAgent,
    runtime: Arc<FakeRuntime>,
}

async fn create_agent(answer: &str, hits: Vec<SearchHit>) -> AnyResult<TestHarness> {
    let temp_dir = TempDir::new()?;
    let database = SessionDatabase::new(temp_dir.path().join("sessions.db")).await?;
    let sessions = SessionRegistry::new(database, 8);

    let runtime = Arc::new(FakeRuntime::answering(answer));
    let retriever: Arc<dyn Retriever> = Arc::new(FakeRetriever { hits });
    let grounding: Arc<dyn GroundingPolicy> =
        Arc::new(crate::grounding::HeuristicGrounding::new(retriever));

    let agent = ChatAgent::new(
        Arc::clone(&runtime) as Arc<dyn AgentRuntime>,
        grounding,
        sessions,
    );

    Ok(TestHarness {
        _temp_dir: temp_dir,
        agent,
        runtime,
    })
}

#[tokio::test]
async fn mints_a_conversation_id_when_absent() -> AnyResult<()> {
    let harness = create_agent("An answer [ROS 2: Topics].", vec![indexed_hit()]).await?;

    let outcome = harness
        .agent
        .chat("How do ROS 2 nodes communicate?", None, None, Language::En)
        .await?;

    assert!(!outcome.conversation_id.is_empty());
    uuid::Uuid::parse_str(&outcome.conversation_id).expect("generated id is a uuid");

    Ok(())
}

#[tokio::test]
async fn preserves_a_caller_supplied_conversation_id() -> AnyResult<()> {
    let harness = create_agent("An answer.", vec![indexed_hit()]).await?;

    let outcome = harness
        .agent
        .chat(
            "How do ROS 2 nodes communicate?",
            None,
            Some("conv-42".to_string()),
            Language::En,
        )
        .await?;

    assert_eq!(outcome.conversation_id, "conv-42");
    assert_eq!(harness.agent.active_conversations().await, vec!["conv-42"]);

    Ok(())
}

#[tokio::test]
async fn selected_text_is_wrapped_and_truncated() -> AnyResult<()> {
    let harness = create_agent("An answer.", vec![indexed_hit()]).await?;

    let selection: String = "x".repeat(600);
    harness
        .agent
        .chat(
            "What does this paragraph mean?",
            Some(&selection),
            None,
            Language::En,
        )
        .await?;

    let input = harness
        .runtime
        .last_input
        .lock()
        .await
        .clone()
        .expect("runtime was invoked");

    assert!(input.contains("The user selected this text from the textbook"));
    assert!(input.contains("Their question: What does this paragraph mean?"));
    // Only the first 500 characters of the selection are embedded
    assert!(input.contains(&"x".repeat(500)));
    assert!(!input.contains(&"x".repeat(501)));

    Ok(())
}

#[tokio::test]
async fn plain_queries_are_sent_verbatim() -> AnyResult<()> {
    let harness = create_agent("An answer.", vec![indexed_hit()]).await?;

    harness
        .agent
        .chat("How do ROS 2 nodes communicate?", None, None, Language::En)
        .await?;

    let input = harness
        .runtime
        .last_input
        .lock()
        .await
        .clone()
        .expect("runtime was invoked");
    assert_eq!(input, "How do ROS 2 nodes communicate?");

    Ok(())
}

#[tokio::test]
async fn empty_runtime_output_falls_back() -> AnyResult<()> {
    let harness = create_agent("   ", vec![indexed_hit()]).await?;

    let outcome = harness
        .agent
        .chat("How do ROS 2 nodes communicate?", None, None, Language::En)
        .await?;

    assert_eq!(outcome.answer, "I couldn't generate a response.");

    Ok(())
}

#[tokio::test]
async fn technical_answers_carry_sources_and_grounding() -> AnyResult<()> {
    let harness = create_agent("Nodes use topics [ROS 2: Topics].", vec![indexed_hit()]).await?;

    let outcome = harness
        .agent
        .chat("How do ROS 2 nodes communicate?", None, None, Language::En)
        .await?;

    assert_eq!(outcome.sources.len(), 1);
    assert_eq!(outcome.sources[0].chunk_id, "02-ros2:topics:0");
    assert!(outcome.grounded);

    Ok(())
}

#[tokio::test]
async fn refusal_answers_are_ungrounded_despite_sources() -> AnyResult<()> {
    let harness = create_agent(
        "This topic isn't covered in the textbook.",
        vec![indexed_hit()],
    )
    .await?;

    let outcome = harness
        .agent
        .chat("What is quantum computing in robotics?", None, None, Language::En)
        .await?;

    assert!(!outcome.grounded);

    Ok(())
}

#[tokio::test]
async fn greetings_skip_retrieval_and_stay_grounded() -> AnyResult<()> {
    let harness = create_agent("Hello! How can I help?", vec![indexed_hit()]).await?;

    let outcome = harness.agent.chat("Hi!", None, None, Language::En).await?;

    assert!(outcome.sources.is_empty());
    assert!(outcome.grounded);

    Ok(())
}

#[tokio::test]
async fn conversations_are_isolated_and_clear_is_idempotent() -> AnyResult<()> {
    let harness = create_agent("An answer.", vec![indexed_hit()]).await?;

    harness
        .agent
        .chat(
            "How do ROS 2 nodes communicate?",
            None,
            Some("conv-a".to_string()),
            Language::En,
        )
        .await?;
    harness
        .agent
        .chat(
            "What is gait generation?",
            None,
            Some("conv-b".to_string()),
            Language::En,
        )
        .await?;

    assert_eq!(
        harness.agent.active_conversations().await,
        vec!["conv-a", "conv-b"]
    );

    assert!(harness.agent.clear_conversation("conv-a").await?);
    assert_eq!(harness.agent.active_conversations().await, vec!["conv-b"]);

    // Second clear finds nothing
    assert!(!harness.agent.clear_conversation("conv-a").await?);

    // Unknown conversations report false rather than failing
    assert!(!harness.agent.clear_conversation("never-existed").await?);

    Ok(())
}
