//! Thin BigQuery REST client and the warehouse seam used by the pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::Settings;
use crate::constants::DATASET_ID;
use crate::error::{AgentError, Result};
use crate::state::TableSchema;

/// Tabular query result as returned by the warehouse.
#[derive(Debug, Clone, Default)]
pub struct DataTable {
    pub columns: Vec<String>,
    /// One mapping per row, column name to value.
    pub rows: Vec<Map<String, Value>>,
}

impl DataTable {
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }
}

#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn execute_query(&self, sql: &str) -> Result<DataTable>;

    async fn get_table_metadata(&self, table_name: &str) -> Result<TableSchema>;
}

/// Factory seam for obtaining a warehouse client. Construction fails with a
/// credentials error when authentication material is missing.
pub trait RunnerFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn QueryRunner>>;
}

/// A lean BigQuery client for executing SQL queries over the REST API.
pub struct BigQueryRunner {
    client: reqwest::Client,
    project_id: String,
    access_token: String,
    dataset_id: String,
    maximum_bytes_billed: i64,
    location: Option<String>,
}

impl BigQueryRunner {
    pub fn new(settings: &Settings) -> Result<Self> {
        let project_id = settings.google_project_id.clone().ok_or_else(|| {
            AgentError::CredentialsMissing(
                "BigQuery credentials missing. Set GOOGLE_CLOUD_PROJECT_ID and \
                 BIGQUERY_ACCESS_TOKEN (gcloud auth print-access-token) to authenticate."
                    .to_string(),
            )
        })?;
        let access_token = settings.bigquery_access_token.clone().ok_or_else(|| {
            AgentError::CredentialsMissing(
                "BigQuery credentials missing. Set GOOGLE_CLOUD_PROJECT_ID and \
                 BIGQUERY_ACCESS_TOKEN (gcloud auth print-access-token) to authenticate."
                    .to_string(),
            )
        })?;

        debug!(project = %project_id, dataset = DATASET_ID, "initialized BigQueryRunner");

        Ok(Self {
            client: reqwest::Client::new(),
            project_id,
            access_token,
            dataset_id: DATASET_ID.to_string(),
            maximum_bytes_billed: settings.bigquery_maximum_bytes_billed,
            location: settings.bigquery_location.clone(),
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| AgentError::Warehouse(format!("BigQuery request failed: {}", e)))?;
        Self::decode(response).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| AgentError::Warehouse(format!("BigQuery request failed: {}", e)))?;
        Self::decode(response).await
    }

    async fn decode(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| AgentError::Warehouse(format!("Failed to parse BigQuery response: {}", e)))?;

        if !status.is_success() {
            let message = payload["error"]["message"]
                .as_str()
                .unwrap_or("unknown BigQuery error")
                .to_string();
            return Err(AgentError::Warehouse(message));
        }
        Ok(payload)
    }
}

#[async_trait]
impl QueryRunner for BigQueryRunner {
    async fn execute_query(&self, sql: &str) -> Result<DataTable> {
        let url = format!(
            "https://bigquery.googleapis.com/bigquery/v2/projects/{}/queries",
            self.project_id
        );

        let mut body = serde_json::json!({
            "query": sql,
            "useLegacySql": false,
            "maximumBytesBilled": self.maximum_bytes_billed.to_string(),
        });
        if let Some(location) = &self.location {
            body["location"] = Value::String(location.clone());
        }

        info!(maximum_bytes_billed = self.maximum_bytes_billed, "executing BigQuery query");
        let payload = self.post_json(&url, &body).await?;

        if payload["jobComplete"] == Value::Bool(false) {
            return Err(AgentError::Warehouse(
                "BigQuery job did not complete within the request deadline".to_string(),
            ));
        }

        let columns: Vec<String> = payload["schema"]["fields"]
            .as_array()
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(|f| f["name"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let mut rows = Vec::new();
        if let Some(raw_rows) = payload["rows"].as_array() {
            for raw in raw_rows {
                let mut row = Map::new();
                if let Some(cells) = raw["f"].as_array() {
                    for (column, cell) in columns.iter().zip(cells) {
                        row.insert(column.clone(), cell["v"].clone());
                    }
                }
                rows.push(row);
            }
        }

        info!(rows = rows.len(), columns = columns.len(), "query completed");
        Ok(DataTable { columns, rows })
    }

    async fn get_table_metadata(&self, table_name: &str) -> Result<TableSchema> {
        // dataset_id is "<project>.<dataset>"
        let (dataset_project, dataset) = self
            .dataset_id
            .split_once('.')
            .ok_or_else(|| AgentError::Config(format!("invalid dataset id: {}", self.dataset_id)))?;

        let url = format!(
            "https://bigquery.googleapis.com/bigquery/v2/projects/{}/datasets/{}/tables/{}",
            dataset_project, dataset, table_name
        );
        let payload = self.get_json(&url).await?;

        let mut columns = BTreeMap::new();
        if let Some(fields) = payload["schema"]["fields"].as_array() {
            for field in fields {
                if let (Some(name), Some(ty)) = (field["name"].as_str(), field["type"].as_str()) {
                    columns.insert(name.to_string(), ty.to_string());
                }
            }
        }

        let row_count = payload["numRows"].as_str().and_then(|raw| raw.parse().ok());
        let description = payload["description"]
            .as_str()
            .map(str::to_string)
            .or_else(|| Some(format!("Table: {}", table_name)));

        Ok(TableSchema {
            name: table_name.to_string(),
            columns,
            row_count,
            description,
        })
    }
}

/// Default factory building [`BigQueryRunner`] from settings.
pub struct BigQueryRunnerFactory {
    settings: Arc<Settings>,
}

impl BigQueryRunnerFactory {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }
}

impl RunnerFactory for BigQueryRunnerFactory {
    fn create(&self) -> Result<Box<dyn QueryRunner>> {
        Ok(Box::new(BigQueryRunner::new(&self.settings)?))
    }
}
