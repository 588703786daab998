//! Offline pipeline tests against a scripted model provider.
//!
//! Covers index memoization, router decomposition and fallback, chat turn
//! bookkeeping, and error mapping, without touching the network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use specbot::core::config::RetrievalSettings;
use specbot::core::errors::ApiError;
use specbot::engine::{QueryEngine, QueryEngineTool, SubQuestionEngine};
use specbot::ingest::chunker::TextChunk;
use specbot::ingest::Document;
use specbot::llm::provider::{LlmError, LlmProvider};
use specbot::llm::types::ChatRequest;
use specbot::server::handlers::chat::run_chat_turn;
use specbot::transcript::{Role, TranscriptStore};

const TEXT_4139: &str = "The PXIe-4139 is a single-channel system SMU. \
    Output range spans 0 V to 60 V at up to 3 A pulsed. \
    Measurement resolution reaches 100 fA on the lowest current range.";

const TEXT_4147: &str = "The PXIe-4147 is a four-channel precision SMU. \
    Each channel sources up to 8 V and 3 A with remote sense. \
    Channels can be combined in parallel for higher current.";

struct ScriptedProvider {
    chat_script: Mutex<VecDeque<String>>,
    chat_calls: AtomicUsize,
    embed_calls: AtomicUsize,
    fail_chat: bool,
    missing_credential: bool,
}

impl ScriptedProvider {
    fn new(script: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            chat_script: Mutex::new(script.iter().map(|s| s.to_string()).collect()),
            chat_calls: AtomicUsize::new(0),
            embed_calls: AtomicUsize::new(0),
            fail_chat: false,
            missing_credential: false,
        })
    }

    fn failing_chat() -> Arc<Self> {
        Arc::new(Self {
            chat_script: Mutex::new(VecDeque::new()),
            chat_calls: AtomicUsize::new(0),
            embed_calls: AtomicUsize::new(0),
            fail_chat: true,
            missing_credential: false,
        })
    }

    fn without_credential() -> Arc<Self> {
        Arc::new(Self {
            chat_script: Mutex::new(VecDeque::new()),
            chat_calls: AtomicUsize::new(0),
            embed_calls: AtomicUsize::new(0),
            fail_chat: false,
            missing_credential: true,
        })
    }

    fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }
}

/// Deterministic stand-in embedding: byte histogram folded into 8 dims.
/// Identical text gives an identical vector.
fn embedding_for(text: &str) -> Vec<f32> {
    let mut v = vec![0.1f32; 8];
    for (i, b) in text.bytes().enumerate() {
        v[i % 8] += f32::from(b) / 255.0;
    }
    v
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn health_check(&self) -> Result<bool, LlmError> {
        Ok(true)
    }

    async fn chat(&self, _request: ChatRequest) -> Result<String, LlmError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        if self.missing_credential {
            return Err(LlmError::MissingCredential);
        }
        if self.fail_chat {
            return Err(LlmError::Api {
                status: 500,
                message: "scripted failure".to_string(),
            });
        }

        let mut script = self.chat_script.lock().unwrap();
        Ok(script
            .pop_front()
            .unwrap_or_else(|| "scripted answer".to_string()))
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if self.missing_credential {
            return Err(LlmError::MissingCredential);
        }
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        Ok(inputs.iter().map(|text| embedding_for(text)).collect())
    }
}

fn retrieval() -> RetrievalSettings {
    RetrievalSettings {
        top_k: 2,
        ..RetrievalSettings::default()
    }
}

fn chunk(text: &str, source: &str, index: usize) -> TextChunk {
    TextChunk {
        chunk_id: format!("{}-chunk-{}", source, index),
        text: text.to_string(),
        source: source.to_string(),
        start_offset: index * 100,
        chunk_index: index,
    }
}

fn engine_for(source: &str, sentences: &[&str], provider: Arc<ScriptedProvider>) -> QueryEngine {
    let document = Document {
        id: format!("{}-id", source),
        source: source.to_string(),
        text: sentences.join(" "),
    };
    let chunks = sentences
        .iter()
        .enumerate()
        .map(|(i, sentence)| chunk(sentence, source, i))
        .collect();
    QueryEngine::new(&document, chunks, provider, &retrieval())
}

fn tool_pair(provider: &Arc<ScriptedProvider>) -> Vec<QueryEngineTool> {
    vec![
        QueryEngineTool::new(
            "pxie-4139",
            "Provides information about pxie-4139 instrument",
            engine_for(
                "pxie-4139_specifications.pdf",
                &[TEXT_4139],
                provider.clone(),
            ),
        ),
        QueryEngineTool::new(
            "pxie-4147",
            "Provides information about pxie-4147 instrument",
            engine_for(
                "pxie-4147_specifications.pdf",
                &[TEXT_4147],
                provider.clone(),
            ),
        ),
    ]
}

fn router(provider: &Arc<ScriptedProvider>) -> SubQuestionEngine {
    SubQuestionEngine::from_tools(tool_pair(provider), provider.clone(), 5)
        .expect("tool names are unique")
}

#[tokio::test]
async fn retrieval_ranks_identical_text_first() {
    let provider = ScriptedProvider::new(&[]);
    let sentences = [
        "The PXIe-4139 supplies up to 3 A pulsed.",
        "Thermal derating applies above 35 C ambient.",
    ];
    let engine = engine_for("pxie-4139_specifications.pdf", &sentences, provider.clone());

    let response = engine.query(sentences[1]).await.unwrap();

    assert_eq!(response.answer, "scripted answer");
    assert_eq!(response.sources.len(), 2);
    assert_eq!(response.sources[0].snippet, sentences[1]);
    assert!(response.sources[0].score > response.sources[1].score);
    assert_eq!(response.sources[0].source, "pxie-4139_specifications.pdf");
}

#[tokio::test]
async fn vector_index_is_built_once_per_engine() {
    let provider = ScriptedProvider::new(&[]);
    let engine = engine_for("pxie-4139_specifications.pdf", &[TEXT_4139], provider.clone());

    // First query embeds the chunk batch plus the question
    engine.query("What is the output range?").await.unwrap();
    assert_eq!(provider.embed_calls(), 2);
    assert!(engine.is_ready());

    // Second query reuses the index
    engine.query("What about resolution?").await.unwrap();
    assert_eq!(provider.embed_calls(), 3);

    // A fresh engine over the same document embeds from scratch
    let rebuilt = engine_for("pxie-4139_specifications.pdf", &[TEXT_4139], provider.clone());
    assert!(!rebuilt.is_ready());
    rebuilt.query("What is the output range?").await.unwrap();
    assert_eq!(provider.embed_calls(), 5);
}

#[test]
fn router_requires_unique_tool_names() {
    let provider = ScriptedProvider::new(&[]);

    assert!(SubQuestionEngine::from_tools(tool_pair(&provider), provider.clone(), 5).is_ok());

    let mut tools = tool_pair(&provider);
    let clash = QueryEngineTool::new(
        "pxie-4139",
        "Duplicate name",
        engine_for("other.pdf", &[TEXT_4147], provider.clone()),
    );
    tools.push(clash);
    let err = SubQuestionEngine::from_tools(tools, provider.clone(), 5).unwrap_err();
    assert!(err.to_string().contains("pxie-4139"));
}

#[tokio::test]
async fn chat_turns_stay_ordered_across_queries() {
    // Per query: decomposition, two sub-answers, synthesis. An empty JSON
    // array from decomposition falls back to asking every tool.
    let provider = ScriptedProvider::new(&[
        "[]",
        "partial answer",
        "partial answer",
        "Answer one.",
        "[]",
        "partial answer",
        "partial answer",
        "Answer two.",
    ]);
    let engine = router(&provider);
    let transcripts = TranscriptStore::new();

    let first = run_chat_turn(&engine, &transcripts, "s1", "What is the maximum output current?")
        .await
        .unwrap();
    assert_eq!(first.answer, "Answer one.");

    let second = run_chat_turn(&engine, &transcripts, "s1", "And the channel count?")
        .await
        .unwrap();
    assert_eq!(second.answer, "Answer two.");

    let turns = transcripts.turns("s1");
    assert_eq!(turns.len(), 4);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[0].content, "What is the maximum output current?");
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(turns[1].content, "Answer one.");
    assert_eq!(turns[2].role, Role::User);
    assert_eq!(turns[2].content, "And the channel count?");
    assert_eq!(turns[3].role, Role::Assistant);
    assert_eq!(turns[3].content, "Answer two.");
    for pair in turns.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
}

#[tokio::test]
async fn blank_chat_message_is_rejected_before_any_work() {
    let provider = ScriptedProvider::new(&[]);
    let engine = router(&provider);
    let transcripts = TranscriptStore::new();

    let err = run_chat_turn(&engine, &transcripts, "s1", "   ")
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::BadRequest(_)));
    assert_eq!(provider.chat_calls(), 0);
    assert_eq!(provider.embed_calls(), 0);
    assert!(transcripts.turns("s1").is_empty());
}

#[tokio::test]
async fn decomposition_fallback_asks_every_tool() {
    let provider = ScriptedProvider::new(&[
        "I cannot produce JSON for that, sorry.",
        "partial answer",
        "partial answer",
        "Synthesized from both datasheets.",
    ]);
    let engine = router(&provider);

    let question = "Compare the output capabilities of both instruments.";
    let response = engine.query(question).await.unwrap();

    assert_eq!(response.answer, "Synthesized from both datasheets.");
    assert_eq!(response.sub_answers.len(), 2);
    let mut names: Vec<&str> = response
        .sub_answers
        .iter()
        .map(|sub| sub.tool_name.as_str())
        .collect();
    names.sort();
    assert_eq!(names, vec!["pxie-4139", "pxie-4147"]);
    for sub in &response.sub_answers {
        assert_eq!(sub.question, question);
        assert!(!sub.sources.is_empty());
    }
}

#[tokio::test]
async fn unknown_tools_are_dropped_from_decomposition() {
    let provider = ScriptedProvider::new(&[
        r#"[{"tool_name": "pxie-4139", "sub_question": "What is the voltage range?"},
            {"tool_name": "pxie-9999", "sub_question": "Does this exist?"}]"#,
        "up to 60 V",
        "Final answer.",
    ]);
    let engine = router(&provider);

    let response = engine.query("What is the voltage range?").await.unwrap();

    assert_eq!(response.sub_answers.len(), 1);
    assert_eq!(response.sub_answers[0].tool_name, "pxie-4139");
    assert_eq!(response.sub_answers[0].question, "What is the voltage range?");
    assert_eq!(response.sub_answers[0].answer, "up to 60 V");
    assert_eq!(response.answer, "Final answer.");
}

#[tokio::test]
async fn provider_failure_leaves_the_user_turn() {
    let provider = ScriptedProvider::failing_chat();
    let engine = router(&provider);
    let transcripts = TranscriptStore::new();

    let err = run_chat_turn(&engine, &transcripts, "s1", "What is the accuracy?")
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Internal(_)));
    let turns = transcripts.turns("s1");
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[0].content, "What is the accuracy?");
}

#[tokio::test]
async fn missing_credential_surfaces_as_service_unavailable() {
    let provider = ScriptedProvider::without_credential();
    let engine = router(&provider);
    let transcripts = TranscriptStore::new();

    let err = run_chat_turn(&engine, &transcripts, "s1", "What is the accuracy?")
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::ServiceUnavailable(_)));
    assert_eq!(transcripts.turns("s1").len(), 1);
}
