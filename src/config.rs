//! Environment-driven application settings.
//!
//! Loaded once at startup (after `dotenv`) and shared read-only via `Arc`.

use std::env;
use std::path::PathBuf;

use crate::constants::{
    LlmProvider, DEFAULT_GOOGLE_MODEL, DEFAULT_MAX_BYTES_BILLED, DEFAULT_OPENAI_MODEL,
};

#[derive(Debug, Clone)]
pub struct Settings {
    pub google_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub google_project_id: Option<String>,
    pub default_llm_provider: LlmProvider,
    pub google_model_name: String,
    pub openai_model_name: String,
    pub bigquery_maximum_bytes_billed: i64,
    pub bigquery_location: Option<String>,
    pub bigquery_access_token: Option<String>,
    pub plot_output_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            google_api_key: non_empty(env::var("GOOGLE_API_KEY").ok()),
            openai_api_key: non_empty(env::var("OPENAI_API_KEY").ok()),
            google_project_id: non_empty(env::var("GOOGLE_CLOUD_PROJECT_ID").ok()),
            default_llm_provider: env::var("DEFAULT_LLM_PROVIDER")
                .ok()
                .and_then(|raw| LlmProvider::parse(&raw))
                .unwrap_or_default(),
            google_model_name: env::var("GOOGLE_MODEL_NAME")
                .unwrap_or_else(|_| DEFAULT_GOOGLE_MODEL.to_string()),
            openai_model_name: env::var("OPENAI_MODEL_NAME")
                .unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string()),
            bigquery_maximum_bytes_billed: env::var("BIGQUERY_MAX_BYTES")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(DEFAULT_MAX_BYTES_BILLED),
            bigquery_location: non_empty(env::var("BIGQUERY_LOCATION").ok()),
            bigquery_access_token: non_empty(env::var("BIGQUERY_ACCESS_TOKEN").ok()),
            plot_output_dir: env::var("PLOT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data-plotly")),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            google_api_key: None,
            openai_api_key: None,
            google_project_id: None,
            default_llm_provider: LlmProvider::Google,
            google_model_name: DEFAULT_GOOGLE_MODEL.to_string(),
            openai_model_name: DEFAULT_OPENAI_MODEL.to_string(),
            bigquery_maximum_bytes_billed: DEFAULT_MAX_BYTES_BILLED,
            bigquery_location: None,
            bigquery_access_token: None,
            plot_output_dir: PathBuf::from("./data-plotly"),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
