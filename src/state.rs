//! Shared pipeline state threaded through every stage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{AnalysisType, ChartType, DEFAULT_ANALYSIS_TYPE};

/// Tabular results from the warehouse, as stored in state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    /// One mapping per row, column name to value.
    pub data: Vec<Map<String, Value>>,
    /// (rows, columns)
    pub shape: (usize, usize),
    pub columns: Vec<String>,
}

/// Cumulative metrics collected during a run. Each stage fills in its own
/// fields and leaves the rest untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_completeness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_returned: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_match: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_retrieval_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_generation_time_ms: Option<u64>,
}

/// One SQL generation attempt, immutable once appended to the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlGenerationStep {
    pub attempt_number: u32,
    pub sql: String,
    /// Short note referencing the prior error, or "First attempt".
    pub reasoning: String,
    /// Unix timestamp (seconds) of generation.
    pub timestamp: f64,
    /// LLM latency for this attempt.
    pub duration_ms: u64,
    pub model: String,
}

/// Schema metadata for a single table, retrieved once per run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    /// column_name -> column_type, ordered for stable prompt rendering.
    pub columns: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The single mutable record passed by reference through all stages.
///
/// Created fresh per user question and discarded (or handed back to the
/// caller) when the pipeline terminates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    // Input
    pub user_query: String,

    // Analysis decision
    pub analysis_type: AnalysisType,
    pub analysis_plan: String,

    // Schema context
    pub schema_info: BTreeMap<String, TableSchema>,
    pub available_tables: Vec<String>,

    // SQL generation
    pub sql_query: String,
    pub sql_generation_history: Vec<SqlGenerationStep>,
    pub sql_generation_attempt: u32,
    pub last_execution_error: Option<String>,

    // Execution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bq_results: Option<QueryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<ChartType>,

    // Output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_json: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_image_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<String>,

    // Quality
    pub validation_passed: bool,
    pub metrics: Metrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl PipelineState {
    pub fn new(user_query: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            analysis_type: DEFAULT_ANALYSIS_TYPE,
            analysis_plan: String::new(),
            schema_info: BTreeMap::new(),
            available_tables: Vec::new(),
            sql_query: String::new(),
            sql_generation_history: Vec::new(),
            sql_generation_attempt: 1,
            last_execution_error: None,
            bq_results: None,
            chart_type: None,
            chart_json: None,
            chart_image_path: None,
            insights: None,
            validation_passed: false,
            metrics: Metrics::default(),
            error_message: None,
        }
    }
}
