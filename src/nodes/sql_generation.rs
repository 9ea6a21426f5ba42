//! SQL generation stage: LLM generates SQL using schema context, with a
//! retry prompt carrying the previous failure.

use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Instant;

use regex::Regex;
use tracing::{info, warn};

use crate::constants::MIN_SQL_LENGTH;
use crate::error::Result;
use crate::llm::ChatModelFactory;
use crate::nodes::prompts::{SQL_GENERATION_PROMPT, SQL_GENERATION_RETRY_PROMPT};
use crate::state::{PipelineState, SqlGenerationStep, TableSchema};

static SQL_FENCE: OnceLock<Regex> = OnceLock::new();
static ANY_FENCE: OnceLock<Regex> = OnceLock::new();

/// Generate a SQL query with schema context. Attempt 1 uses the standard
/// prompt; later attempts include the failed SQL and its error. Any failure
/// leaves `sql_query` empty and never propagates.
pub async fn run(state: &mut PipelineState, llm: &dyn ChatModelFactory) {
    if state.user_query.trim().is_empty() {
        warn!("no user query provided to SQL generation stage");
        state.sql_query.clear();
        return;
    }

    if let Err(e) = generate(state, llm).await {
        warn!(error = %e, attempt = state.sql_generation_attempt, "SQL generation failed");
        state.sql_query.clear();
    }
}

async fn generate(state: &mut PipelineState, llm: &dyn ChatModelFactory) -> Result<()> {
    let start = Instant::now();
    let attempt = state.sql_generation_attempt;
    let schema_context = schema_to_context(&state.schema_info);

    let prompt = if attempt == 1 {
        SQL_GENERATION_PROMPT
            .replace("{schema_context}", &schema_context)
            .replace("{user_query}", state.user_query.trim())
    } else {
        SQL_GENERATION_RETRY_PROMPT
            .replace("{schema_context}", &schema_context)
            .replace("{attempt_number}", &attempt.to_string())
            .replace("{failed_sql}", &state.sql_query)
            .replace(
                "{error_message}",
                state.last_execution_error.as_deref().unwrap_or("Unknown error"),
            )
    };

    let model = llm.create_for_sql()?;
    let response = model.invoke(&prompt).await?;
    let generated_sql = extract_sql(&response.text);

    if generated_sql.trim().len() < MIN_SQL_LENGTH {
        warn!(length = generated_sql.len(), "generated SQL too short");
        state.sql_query.clear();
        return Ok(());
    }

    state.sql_query = generated_sql.clone();
    state.chart_type = Some(state.analysis_type.chart_type());

    let latency_ms = start.elapsed().as_millis() as u64;
    let reasoning = format!(
        "Attempt {}: {}",
        attempt,
        state.last_execution_error.as_deref().unwrap_or("First attempt")
    );
    state.sql_generation_history.push(SqlGenerationStep {
        attempt_number: attempt,
        sql: generated_sql.clone(),
        reasoning,
        timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
        duration_ms: latency_ms,
        model: model.model_name().to_string(),
    });

    state.metrics.sql_generation_time_ms = Some(latency_ms);

    info!(
        attempt,
        sql_length = generated_sql.len(),
        latency_ms,
        "SQL generated"
    );

    Ok(())
}

/// Render the schema map as a readable text block, one heading per table
/// and one bullet per column.
pub fn schema_to_context(schema_info: &BTreeMap<String, TableSchema>) -> String {
    if schema_info.is_empty() {
        return "(No schema available)".to_string();
    }

    let mut lines = Vec::new();
    for (table_name, table) in schema_info {
        lines.push(format!("## {}", table_name));
        for (col_name, col_type) in &table.columns {
            lines.push(format!("- {}: {}", col_name, col_type));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Extract SQL from a fenced ```sql block, then any fenced block, then fall
/// back to the raw response text.
pub fn extract_sql(response_text: &str) -> String {
    let sql_fence = SQL_FENCE
        .get_or_init(|| Regex::new(r"(?s)```sql\s*(.*?)\s*```").expect("invalid regex"));
    if let Some(capture) = sql_fence.captures(response_text) {
        return capture[1].trim().to_string();
    }

    let any_fence =
        ANY_FENCE.get_or_init(|| Regex::new(r"(?s)```\s*(.*?)\s*```").expect("invalid regex"));
    if let Some(capture) = any_fence.captures(response_text) {
        return capture[1].trim().to_string();
    }

    response_text.trim().to_string()
}
