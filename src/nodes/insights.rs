//! Insights stage: summarize the result sample into business takeaways.

use tracing::warn;

use crate::constants::ChartType;
use crate::llm::{invoke_with_fallback, ChatModelFactory};
use crate::nodes::prompts::INSIGHTS_PROMPT;
use crate::state::PipelineState;

const SAMPLE_ROWS: usize = 5;
const NO_DATA_INSIGHTS: &str = "No data available for insights.";
const LLM_UNAVAILABLE_INSIGHTS: &str = "LLM unavailable; unable to generate insights.";

/// Ask the LLM for 2-3 insights over the first rows of the result set.
/// Never raises; failures yield a fixed placeholder message.
pub async fn run(state: &mut PipelineState, llm: &dyn ChatModelFactory) {
    let sample: Vec<_> = state
        .bq_results
        .as_ref()
        .map(|results| results.data.iter().take(SAMPLE_ROWS).cloned().collect())
        .unwrap_or_default();

    if sample.is_empty() {
        state.insights = Some(NO_DATA_INSIGHTS.to_string());
        return;
    }

    let data_sample = match serde_json::to_string(&sample) {
        Ok(serialized) => serialized,
        Err(e) => {
            warn!(error = %e, "could not serialize result sample");
            state.insights = Some(NO_DATA_INSIGHTS.to_string());
            return;
        }
    };

    let chart_type = state.chart_type.unwrap_or(ChartType::Bar);
    let prompt = INSIGHTS_PROMPT
        .replace("{analysis_type}", state.analysis_type.as_str())
        .replace("{chart_type}", chart_type.as_str())
        .replace("{data_sample}", &data_sample);

    match invoke_with_fallback(llm, 0.1, &prompt).await {
        Ok(response) => {
            state.insights = Some(response.text.trim().to_string());
        }
        Err(e) if e.is_credentials() => {
            warn!(error = %e, "no LLM provider available for insights");
            state.insights = Some(LLM_UNAVAILABLE_INSIGHTS.to_string());
        }
        Err(e) => {
            warn!(error = %e, "insights LLM call failed");
            state.insights = Some(format!("Insight generation failed: {}", e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AgentError, Result};
    use crate::llm::{ChatModel, ChatResponse};
    use crate::state::QueryResult;
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use std::sync::Mutex;

    struct RecordingModel {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatModel for RecordingModel {
        async fn invoke(&self, prompt: &str) -> Result<ChatResponse> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(ChatResponse {
                text: self.reply.clone(),
            })
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    struct RecordingFactory {
        model: std::sync::Arc<RecordingModel>,
    }

    struct SharedModel(std::sync::Arc<RecordingModel>);

    #[async_trait]
    impl ChatModel for SharedModel {
        async fn invoke(&self, prompt: &str) -> Result<ChatResponse> {
            self.0.invoke(prompt).await
        }

        fn model_name(&self) -> &str {
            self.0.model_name()
        }
    }

    impl RecordingFactory {
        fn new(reply: &str) -> Self {
            Self {
                model: std::sync::Arc::new(RecordingModel {
                    reply: reply.to_string(),
                    prompts: Mutex::new(Vec::new()),
                }),
            }
        }

        fn last_prompt(&self) -> String {
            self.model.prompts.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    impl ChatModelFactory for RecordingFactory {
        fn create(
            &self,
            _temperature: f32,
            _provider: Option<crate::constants::LlmProvider>,
        ) -> Result<Box<dyn ChatModel>> {
            Ok(Box::new(SharedModel(self.model.clone())))
        }

        fn create_for_sql(&self) -> Result<Box<dyn ChatModel>> {
            self.create(0.0, None)
        }
    }

    struct UnavailableFactory;

    impl ChatModelFactory for UnavailableFactory {
        fn create(
            &self,
            _temperature: f32,
            _provider: Option<crate::constants::LlmProvider>,
        ) -> Result<Box<dyn ChatModel>> {
            Err(AgentError::CredentialsMissing("no key".to_string()))
        }

        fn create_for_sql(&self) -> Result<Box<dyn ChatModel>> {
            Err(AgentError::CredentialsMissing("no key".to_string()))
        }
    }

    fn state_with_rows(count: usize) -> PipelineState {
        let mut state = PipelineState::new("monthly revenue");
        let data: Vec<Map<String, Value>> = (0..count)
            .map(|i| {
                let mut row = Map::new();
                row.insert("month".to_string(), json!(format!("2024-{:02}", i + 1)));
                row.insert("revenue".to_string(), json!(100 + i));
                row
            })
            .collect();
        state.bq_results = Some(QueryResult {
            shape: (data.len(), 2),
            columns: vec!["month".to_string(), "revenue".to_string()],
            data,
        });
        state
    }

    #[tokio::test]
    async fn generates_insights_from_sample() {
        let factory = RecordingFactory::new("Revenue grew steadily.\nJanuary was the low point.");
        let mut state = state_with_rows(3);

        run(&mut state, &factory).await;

        assert_eq!(
            state.insights.as_deref(),
            Some("Revenue grew steadily.\nJanuary was the low point.")
        );
        let prompt = factory.last_prompt();
        assert!(prompt.contains("product_trends"));
        assert!(prompt.contains("2024-01"));
    }

    #[tokio::test]
    async fn sample_is_capped_at_five_rows() {
        let factory = RecordingFactory::new("ok");
        let mut state = state_with_rows(8);

        run(&mut state, &factory).await;

        let prompt = factory.last_prompt();
        assert!(prompt.contains("2024-05"));
        assert!(!prompt.contains("2024-06"));
    }

    #[tokio::test]
    async fn empty_results_yield_fixed_message_without_llm_call() {
        let factory = RecordingFactory::new("should not be called");
        let mut state = state_with_rows(0);

        run(&mut state, &factory).await;

        assert_eq!(state.insights.as_deref(), Some(NO_DATA_INSIGHTS));
        assert!(factory.last_prompt().is_empty());
    }

    #[tokio::test]
    async fn missing_results_yield_fixed_message() {
        let factory = RecordingFactory::new("should not be called");
        let mut state = PipelineState::new("q");

        run(&mut state, &factory).await;

        assert_eq!(state.insights.as_deref(), Some(NO_DATA_INSIGHTS));
    }

    #[tokio::test]
    async fn llm_failure_yields_unavailable_message() {
        let mut state = state_with_rows(2);

        run(&mut state, &UnavailableFactory).await;

        assert_eq!(state.insights.as_deref(), Some(LLM_UNAVAILABLE_INSIGHTS));
    }

    struct FlakyModel;

    #[async_trait]
    impl ChatModel for FlakyModel {
        async fn invoke(&self, _prompt: &str) -> Result<ChatResponse> {
            Err(AgentError::Llm("rate limited".to_string()))
        }

        fn model_name(&self) -> &str {
            "flaky"
        }
    }

    struct FlakyFactory;

    impl ChatModelFactory for FlakyFactory {
        fn create(
            &self,
            _temperature: f32,
            _provider: Option<crate::constants::LlmProvider>,
        ) -> Result<Box<dyn ChatModel>> {
            Ok(Box::new(FlakyModel))
        }

        fn create_for_sql(&self) -> Result<Box<dyn ChatModel>> {
            Ok(Box::new(FlakyModel))
        }
    }

    #[tokio::test]
    async fn transient_llm_error_is_included_in_fallback_text() {
        let mut state = state_with_rows(2);

        run(&mut state, &FlakyFactory).await;

        let insights = state.insights.unwrap();
        assert!(insights.starts_with("Insight generation failed:"));
        assert!(insights.contains("rate limited"));
    }
}
