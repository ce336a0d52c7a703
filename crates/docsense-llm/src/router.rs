//! Pipeline router — scores tool pipelines with a locally served model so
//! the remote completion call only carries the tools worth offering.
//!
//! Each pipeline groups the tools for one workflow (web fetch, PDF
//! ingestion, report writing, …) with a one-line description. The router
//! model is prompted as a relevance scorer per pipeline and must answer
//! with a single float in [0, 1]; pipelines at or above the threshold
//! contribute their tool lists.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::{ChatMessage, ChatRequest, LlmBackend};

pub const DEFAULT_THRESHOLD: f32 = 0.5;

const SCORER_SYSTEM_PROMPT: &str =
    "You are a relevance scorer. Given user questions (including previous rounds) \
     and a tool pipeline, output a single float between 0 and 1 indicating how \
     helpful the pipeline is. 0 = no help, 1 = essential. Only output the number.";

/// One named tool pipeline from `pipelines.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub desc: String,
    pub tools: Vec<String>,
}

pub type PipelineTable = BTreeMap<String, Pipeline>;

pub struct PipelineRouter {
    backend: Arc<dyn LlmBackend>,
    pipelines: PipelineTable,
    threshold: f32,
}

impl PipelineRouter {
    pub fn new(backend: Arc<dyn LlmBackend>, pipelines: PipelineTable, threshold: f32) -> Self {
        Self { backend, pipelines, threshold }
    }

    /// Score every pipeline against the current question and return the
    /// union of tool names from those that cleared the threshold, first
    /// occurrence winning. An empty result means no gating applies.
    pub async fn select_tools(&self, question: &str, recent_questions: &[String]) -> Vec<String> {
        let mut selected = Vec::new();

        for (name, pipeline) in &self.pipelines {
            let score = self.score_pipeline(question, recent_questions, name, &pipeline.desc).await;
            tracing::debug!(pipeline = %name, score, threshold = self.threshold, "router scored pipeline");
            if score >= self.threshold {
                selected.extend(pipeline.tools.iter().cloned());
            }
        }

        dedup_preserving_order(selected)
    }

    async fn score_pipeline(
        &self,
        question: &str,
        recent_questions: &[String],
        name: &str,
        desc: &str,
    ) -> f32 {
        let history = recent_questions
            .iter()
            .map(|q| format!("- {q}"))
            .collect::<Vec<_>>()
            .join("\n");

        let user_prompt = format!(
            "Recent questions:\n{history}\n\n\
             Current question: {question}\n\
             Pipeline: {name}\n\
             Description: {desc}"
        );

        let req = ChatRequest {
            messages: vec![
                ChatMessage::system(SCORER_SYSTEM_PROMPT),
                ChatMessage::user(user_prompt),
            ],
            temperature: Some(0.0),
            max_tokens: Some(5),
            ..Default::default()
        };

        match self.backend.complete(req).await {
            Ok(resp) => parse_score(&resp.content_text()),
            Err(e) => {
                tracing::warn!(pipeline = %name, error = %e, "router scoring failed, treating as 0");
                0.0
            }
        }
    }
}

/// Extract a score from the model output. Anything unparseable scores 0.
fn parse_score(text: &str) -> f32 {
    text.split_whitespace()
        .next()
        .and_then(|tok| tok.parse::<f32>().ok())
        .map(|s| s.clamp(0.0, 1.0))
        .unwrap_or(0.0)
}

/// Drop duplicate tool names, keeping pipeline order of first occurrence.
pub fn dedup_preserving_order(tools: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tools.into_iter().filter(|t| seen.insert(t.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ChatResponse, LlmError};
    use async_trait::async_trait;

    struct FixedScoreBackend(&'static str);

    #[async_trait]
    impl LlmBackend for FixedScoreBackend {
        async fn complete(&self, _req: ChatRequest) -> Result<ChatResponse, LlmError> {
            Ok(ChatResponse {
                message: ChatMessage::assistant(self.0),
                finish_reason: "stop".to_string(),
                model: "router".to_string(),
                prompt_tokens: 0,
                completion_tokens: 0,
            })
        }
        fn model_id(&self) -> &str {
            "router"
        }
        fn is_local(&self) -> bool {
            true
        }
    }

    fn table() -> PipelineTable {
        let mut t = PipelineTable::new();
        t.insert(
            "document".to_string(),
            Pipeline {
                desc: "convert and read documents".to_string(),
                tools: vec!["pdf_to_markdown".to_string(), "load_image".to_string()],
            },
        );
        t.insert(
            "report".to_string(),
            Pipeline {
                desc: "write markdown reports".to_string(),
                tools: vec!["write_markdown".to_string(), "load_image".to_string()],
            },
        );
        t
    }

    #[test]
    fn score_parsing_tolerates_noise() {
        assert_eq!(parse_score("0.83"), 0.83);
        assert_eq!(parse_score(" 0.4\n"), 0.4);
        assert_eq!(parse_score("0.9 is my score"), 0.9);
        assert_eq!(parse_score("very relevant"), 0.0);
        assert_eq!(parse_score(""), 0.0);
        assert_eq!(parse_score("7"), 1.0);
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let tools = vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
            "c".to_string(),
            "b".to_string(),
        ];
        assert_eq!(dedup_preserving_order(tools), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn high_score_selects_all_pipelines_without_duplicates() {
        let router = PipelineRouter::new(Arc::new(FixedScoreBackend("0.9")), table(), 0.5);
        let tools = router.select_tools("summarise this pdf", &[]).await;
        assert_eq!(tools, vec!["pdf_to_markdown", "load_image", "write_markdown"]);
    }

    #[tokio::test]
    async fn unparseable_scores_select_nothing() {
        let router = PipelineRouter::new(Arc::new(FixedScoreBackend("n/a")), table(), 0.5);
        let tools = router.select_tools("hello", &[]).await;
        assert!(tools.is_empty());
    }
}
