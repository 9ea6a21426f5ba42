//! Reasoning stage: classify the user query into an analysis intent.

use serde_json::Value;
use tracing::{debug, warn};

use crate::constants::{AnalysisType, DEFAULT_ANALYSIS_TYPE};
use crate::llm::{invoke_with_fallback, ChatModelFactory};
use crate::nodes::prompts::REASONING_PROMPT;
use crate::state::PipelineState;

const MISSING_QUERY_PLAN: &str = "User query missing; defaulting to product trends.";
const LLM_UNAVAILABLE_PLAN: &str = "LLM unavailable; defaulting to product trends analysis.";

/// Classify the analysis type based on the user query. Never raises; every
/// failure path degrades to the default analysis type with an explanatory
/// plan.
pub async fn run(state: &mut PipelineState, llm: &dyn ChatModelFactory) {
    let user_query = state.user_query.trim().to_string();
    if user_query.is_empty() {
        state.analysis_type = DEFAULT_ANALYSIS_TYPE;
        state.analysis_plan = MISSING_QUERY_PLAN.to_string();
        return;
    }

    let prompt = format!("{}\n\nUser query: \"{}\"", REASONING_PROMPT, user_query);

    let response = match invoke_with_fallback(llm, 0.0, &prompt).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "reasoning LLM call failed");
            state.analysis_type = DEFAULT_ANALYSIS_TYPE;
            state.analysis_plan = LLM_UNAVAILABLE_PLAN.to_string();
            return;
        }
    };

    let (analysis_type, plan) = parse_response(&response.text);
    state.analysis_type = analysis_type;
    state.analysis_plan = plan;
}

/// Parse the classifier output, tolerating fenced code blocks and falling
/// back to the default type on anything unparseable.
fn parse_response(content: &str) -> (AnalysisType, String) {
    let cleaned = strip_code_fence(content.trim());

    let parsed: Value = match serde_json::from_str(&cleaned) {
        Ok(value) => value,
        Err(_) => {
            debug!("reasoning response was not valid JSON");
            let truncated: String = cleaned.chars().take(200).collect();
            let plan = if truncated.is_empty() {
                "No reasoning provided.".to_string()
            } else {
                truncated
            };
            return (DEFAULT_ANALYSIS_TYPE, plan);
        }
    };

    let raw_type = parsed["analysis_type"].as_str().unwrap_or_default();
    let analysis_type = AnalysisType::parse(raw_type).unwrap_or_else(|| {
        warn!(raw_type, "unsupported analysis type, falling back to default");
        DEFAULT_ANALYSIS_TYPE
    });

    let plan = match parsed["reasoning"].as_str() {
        Some(reasoning) if !reasoning.is_empty() => reasoning.to_string(),
        _ => "No reasoning provided.".to_string(),
    };

    (analysis_type, plan)
}

fn strip_code_fence(content: &str) -> String {
    if content.starts_with("```") && content.ends_with("```") {
        let lines: Vec<&str> = content.lines().collect();
        if lines.len() >= 3 {
            return lines[1..lines.len() - 1].join("\n").trim().to_string();
        }
    }
    content.to_string()
}
