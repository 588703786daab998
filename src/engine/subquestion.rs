use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::provider::LlmProvider;
use crate::llm::types::{ChatMessage, ChatRequest};

use super::query::SourceNode;
use super::tool::QueryEngineTool;
use super::EngineError;

const SYNTHESIS_SYSTEM_PROMPT: &str = concat!(
    "You combine partial answers into one final answer. Rely only on the ",
    "sub-answers below; if they conflict or leave gaps, say so. ",
    "Answer in the same language as the question."
);

/// One decomposed sub-question routed to a named tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubQuestion {
    pub tool_name: String,
    pub sub_question: String,
}

/// Answer for one sub-question, with the chunks that grounded it.
#[derive(Debug, Clone, Serialize)]
pub struct SubAnswer {
    pub tool_name: String,
    pub question: String,
    pub answer: String,
    pub sources: Vec<SourceNode>,
}

/// Final router output: the synthesized answer plus the per-tool trace.
#[derive(Debug, Clone, Serialize)]
pub struct RouterResponse {
    pub answer: String,
    pub sub_answers: Vec<SubAnswer>,
}

/// Routes a user question across the named query tools.
///
/// A query runs in three stages: an LLM call decomposes the question into
/// `{tool_name, sub_question}` pairs, the sub-questions run concurrently
/// against their tools, and a final LLM call synthesizes the answer.
pub struct SubQuestionEngine {
    tools: Vec<QueryEngineTool>,
    provider: Arc<dyn LlmProvider>,
    max_sub_questions: usize,
}

impl std::fmt::Debug for SubQuestionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubQuestionEngine")
            .field(
                "tools",
                &self
                    .tools
                    .iter()
                    .map(|tool| &tool.metadata.name)
                    .collect::<Vec<_>>(),
            )
            .field("max_sub_questions", &self.max_sub_questions)
            .finish_non_exhaustive()
    }
}

impl SubQuestionEngine {
    /// Tool names must be unique; the router addresses tools by name.
    pub fn from_tools(
        tools: Vec<QueryEngineTool>,
        provider: Arc<dyn LlmProvider>,
        max_sub_questions: usize,
    ) -> Result<Self, EngineError> {
        let mut seen = HashSet::new();
        for tool in &tools {
            if !seen.insert(tool.metadata.name.clone()) {
                return Err(EngineError::DuplicateTool(tool.metadata.name.clone()));
            }
        }

        Ok(Self {
            tools,
            provider,
            max_sub_questions,
        })
    }

    pub fn tools(&self) -> &[QueryEngineTool] {
        &self.tools
    }

    /// Build every tool's index up front so the first query does not pay
    /// for it.
    pub async fn warm(&self) -> Result<(), EngineError> {
        for tool in &self.tools {
            let count = tool.engine.warm().await?;
            tracing::info!("Index ready for {} ({} chunks)", tool.metadata.name, count);
        }
        Ok(())
    }

    pub async fn query(&self, question: &str) -> Result<RouterResponse, EngineError> {
        let sub_questions = self.generate_sub_questions(question).await?;
        tracing::info!("Running {} sub-questions", sub_questions.len());

        let sub_answers = try_join_all(
            sub_questions
                .iter()
                .map(|sub_question| self.answer_sub_question(sub_question)),
        )
        .await?;

        let answer = self.synthesize(question, &sub_answers).await?;

        Ok(RouterResponse {
            answer,
            sub_answers,
        })
    }

    /// Decompose the question into per-tool sub-questions with one LLM call.
    async fn generate_sub_questions(&self, question: &str) -> Result<Vec<SubQuestion>, EngineError> {
        let messages = vec![
            ChatMessage::system(self.decomposition_prompt()),
            ChatMessage::user(question),
        ];
        let response = self
            .provider
            .chat(ChatRequest::new(messages).with_temperature(0.0))
            .await?;

        let mut sub_questions = parse_sub_questions(&response).unwrap_or_default();

        sub_questions.retain(|sq| {
            if sq.sub_question.trim().is_empty() {
                return false;
            }
            if !self.tools.iter().any(|t| t.metadata.name == sq.tool_name) {
                tracing::warn!("Dropping sub-question for unknown tool '{}'", sq.tool_name);
                return false;
            }
            true
        });
        sub_questions.truncate(self.max_sub_questions);

        if sub_questions.is_empty() {
            // Fallback: ask every tool the original question
            tracing::warn!("Decomposition produced no usable sub-questions; asking every tool");
            return Ok(self
                .tools
                .iter()
                .map(|tool| SubQuestion {
                    tool_name: tool.metadata.name.clone(),
                    sub_question: question.to_string(),
                })
                .collect());
        }

        Ok(sub_questions)
    }

    fn decomposition_prompt(&self) -> String {
        let tool_list = self
            .tools
            .iter()
            .map(|tool| format!("- {}: {}", tool.metadata.name, tool.metadata.description))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            concat!(
                "You are a question decomposition expert. Given a user question and a ",
                "list of tools, split the question into focused sub-questions and ",
                "assign each one to the single tool that can answer it.\n",
                "Available tools:\n{}\n",
                "Return ONLY a JSON array of objects with keys \"tool_name\" and ",
                "\"sub_question\".\n",
                "Do not include any text outside the JSON array."
            ),
            tool_list
        )
    }

    async fn answer_sub_question(&self, sub_question: &SubQuestion) -> Result<SubAnswer, EngineError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.metadata.name == sub_question.tool_name)
            .ok_or_else(|| EngineError::UnknownTool(sub_question.tool_name.clone()))?;

        tracing::debug!(
            "Sub-question for {}: {}",
            sub_question.tool_name,
            sub_question.sub_question
        );
        let response = tool.engine.query(&sub_question.sub_question).await?;

        Ok(SubAnswer {
            tool_name: sub_question.tool_name.clone(),
            question: sub_question.sub_question.clone(),
            answer: response.answer,
            sources: response.sources,
        })
    }

    /// Combine the sub-answers into the final answer with one LLM call.
    async fn synthesize(
        &self,
        question: &str,
        sub_answers: &[SubAnswer],
    ) -> Result<String, EngineError> {
        let trace = sub_answers
            .iter()
            .enumerate()
            .map(|(i, sub_answer)| {
                format!(
                    "[{}] ({}) Q: {}\nA: {}",
                    i + 1,
                    sub_answer.tool_name,
                    sub_answer.question,
                    sub_answer.answer
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let messages = vec![
            ChatMessage::system(SYNTHESIS_SYSTEM_PROMPT),
            ChatMessage::user(format!("Question: {}\n\nSub-answers:\n{}", question, trace)),
        ];

        let answer = self.provider.chat(ChatRequest::new(messages)).await?;
        Ok(answer.trim().to_string())
    }
}

/// Parse a JSON array of sub-questions from LLM output.
fn parse_sub_questions(text: &str) -> Option<Vec<SubQuestion>> {
    let trimmed = text.trim();

    // Try direct parse
    if let Ok(arr) = serde_json::from_str::<Vec<SubQuestion>>(trimmed) {
        return Some(arr);
    }

    // Try extracting a JSON array embedded in surrounding text
    let start = trimmed.find('[')?;
    let end = trimmed.rfind(']')?;
    if end <= start {
        return None;
    }
    let candidate = &trimmed[start..=end];

    if let Ok(arr) = serde_json::from_str::<Vec<SubQuestion>>(candidate) {
        return Some(arr);
    }

    // Salvage well-formed entries from a mixed array
    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        if let Some(arr) = value.as_array() {
            let parsed: Vec<SubQuestion> = arr
                .iter()
                .filter_map(|item| {
                    Some(SubQuestion {
                        tool_name: item.get("tool_name")?.as_str()?.to_string(),
                        sub_question: item.get("sub_question")?.as_str()?.to_string(),
                    })
                })
                .collect();
            if !parsed.is_empty() {
                return Some(parsed);
            }
        }
    }

    None
}
