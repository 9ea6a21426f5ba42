//! Execution stage: run the SQL and apply the validation gate.

use std::time::Instant;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::bigquery::{DataTable, RunnerFactory};
use crate::constants::COMPLETENESS_THRESHOLD;
use crate::state::{PipelineState, QueryResult};

const INSUFFICIENT_DATA: &str = "Query returned insufficient data for visualization";

/// Execute the generated SQL against the warehouse, record execution
/// metrics, and decide whether the results are good enough to visualize.
/// Never raises; failures land in `error_message`/`last_execution_error`.
pub async fn run(state: &mut PipelineState, warehouse: &dyn RunnerFactory) {
    state.validation_passed = false;

    if state.sql_query.trim().is_empty() {
        warn!("no SQL query available for execution");
        let message = "SQL query not set".to_string();
        state.error_message = Some(message.clone());
        state.last_execution_error = Some(message);
        return;
    }

    let runner = match warehouse.create() {
        Ok(runner) => runner,
        Err(e) => {
            warn!(error = %e, "warehouse client unavailable");
            let message = e.to_string();
            state.metrics.latency_sec = Some(0.0);
            state.error_message = Some(message.clone());
            state.last_execution_error = Some(message);
            return;
        }
    };

    let start = Instant::now();
    let table = match runner.execute_query(&state.sql_query).await {
        Ok(table) => table,
        Err(e) => {
            let latency = start.elapsed().as_secs_f64();
            warn!(error = %e, latency_sec = latency, "query execution failed");
            let message = e.to_string();
            state.metrics.latency_sec = Some(latency);
            state.error_message = Some(message.clone());
            state.last_execution_error = Some(message);
            return;
        }
    };

    let latency = start.elapsed().as_secs_f64();
    let (rows_returned, _) = table.shape();
    let data_completeness = completeness(&table);

    state.metrics.latency_sec = Some(latency);
    state.metrics.rows_returned = Some(rows_returned);
    state.metrics.data_completeness = Some(data_completeness);

    state.bq_results = Some(QueryResult {
        shape: table.shape(),
        columns: table.columns,
        data: table.rows,
    });

    state.validation_passed = rows_returned > 0 && data_completeness >= COMPLETENESS_THRESHOLD;

    if state.validation_passed {
        state.error_message = None;
        state.last_execution_error = None;
        info!(
            rows_returned,
            data_completeness,
            latency_sec = latency,
            "query results passed validation"
        );
    } else {
        let message = state
            .error_message
            .get_or_insert_with(|| INSUFFICIENT_DATA.to_string())
            .clone();
        state.last_execution_error = Some(message);
        warn!(
            rows_returned,
            data_completeness, "query results failed validation"
        );
    }
}

/// Fraction of non-null cells, rounded to four decimals. Empty results are
/// 0.0 exactly.
fn completeness(table: &DataTable) -> f64 {
    let (rows, columns) = table.shape();
    let total_cells = rows * columns;
    if total_cells == 0 {
        return 0.0;
    }

    let non_null = table
        .rows
        .iter()
        .flat_map(Map::values)
        .filter(|value| !matches!(value, Value::Null))
        .count();

    let ratio = non_null as f64 / total_cells as f64;
    (ratio * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bigquery::QueryRunner;
    use crate::error::{AgentError, Result};
    use crate::state::TableSchema;
    use async_trait::async_trait;
    use serde_json::json;

    struct CannedRunner {
        table: DataTable,
    }

    #[async_trait]
    impl QueryRunner for CannedRunner {
        async fn execute_query(&self, _sql: &str) -> Result<DataTable> {
            Ok(self.table.clone())
        }

        async fn get_table_metadata(&self, _table_name: &str) -> Result<TableSchema> {
            unreachable!("execution does not fetch metadata")
        }
    }

    struct CannedFactory {
        table: DataTable,
    }

    impl RunnerFactory for CannedFactory {
        fn create(&self) -> Result<Box<dyn QueryRunner>> {
            Ok(Box::new(CannedRunner {
                table: self.table.clone(),
            }))
        }
    }

    struct FailingRunner;

    #[async_trait]
    impl QueryRunner for FailingRunner {
        async fn execute_query(&self, _sql: &str) -> Result<DataTable> {
            Err(AgentError::Warehouse("Unrecognized name: broken".to_string()))
        }

        async fn get_table_metadata(&self, _table_name: &str) -> Result<TableSchema> {
            unreachable!()
        }
    }

    struct FailingFactory;

    impl RunnerFactory for FailingFactory {
        fn create(&self) -> Result<Box<dyn QueryRunner>> {
            Ok(Box::new(FailingRunner))
        }
    }

    struct NoCredentialsFactory;

    impl RunnerFactory for NoCredentialsFactory {
        fn create(&self) -> Result<Box<dyn QueryRunner>> {
            Err(AgentError::CredentialsMissing(
                "BigQuery credentials missing. Set GOOGLE_CLOUD_PROJECT_ID and \
                 BIGQUERY_ACCESS_TOKEN (gcloud auth print-access-token) to authenticate."
                    .to_string(),
            ))
        }
    }

    fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> DataTable {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let rows = rows
            .into_iter()
            .map(|cells| {
                columns
                    .iter()
                    .cloned()
                    .zip(cells)
                    .collect::<Map<String, Value>>()
            })
            .collect();
        DataTable { columns, rows }
    }

    fn executable_state() -> PipelineState {
        let mut state = PipelineState::new("monthly revenue");
        state.sql_query = "SELECT month, revenue FROM t".to_string();
        state
    }

    #[tokio::test]
    async fn complete_results_pass_the_gate() {
        let factory = CannedFactory {
            table: table(
                &["month", "revenue"],
                vec![
                    vec![json!("2024-01"), json!(100.0)],
                    vec![json!("2024-02"), json!(120.0)],
                ],
            ),
        };
        let mut state = executable_state();
        state.error_message = Some("stale".to_string());
        state.last_execution_error = Some("stale".to_string());

        run(&mut state, &factory).await;

        assert!(state.validation_passed);
        assert!(state.error_message.is_none());
        assert!(state.last_execution_error.is_none());
        assert_eq!(state.metrics.rows_returned, Some(2));
        assert_eq!(state.metrics.data_completeness, Some(1.0));
        let results = state.bq_results.unwrap();
        assert_eq!(results.shape, (2, 2));
        assert_eq!(results.columns, vec!["month", "revenue"]);
    }

    #[tokio::test]
    async fn empty_results_fail_the_gate() {
        let factory = CannedFactory {
            table: table(&["month", "revenue"], vec![]),
        };
        let mut state = executable_state();

        run(&mut state, &factory).await;

        assert!(!state.validation_passed);
        assert_eq!(state.metrics.rows_returned, Some(0));
        assert_eq!(state.metrics.data_completeness, Some(0.0));
        assert_eq!(state.error_message.as_deref(), Some(INSUFFICIENT_DATA));
        assert_eq!(state.last_execution_error.as_deref(), Some(INSUFFICIENT_DATA));
    }

    #[tokio::test]
    async fn completeness_exactly_at_threshold_passes() {
        // 20 cells, 4 nulls: completeness 0.8
        let mut rows = Vec::new();
        for i in 0..10 {
            let second = if i < 4 { Value::Null } else { json!(i) };
            rows.push(vec![json!(i), second]);
        }
        let factory = CannedFactory {
            table: table(&["a", "b"], rows),
        };
        let mut state = executable_state();

        run(&mut state, &factory).await;

        assert_eq!(state.metrics.data_completeness, Some(0.8));
        assert!(state.validation_passed);
    }

    #[tokio::test]
    async fn completeness_below_threshold_fails() {
        // 4 cells, 1 null: completeness 0.75
        let factory = CannedFactory {
            table: table(
                &["a", "b"],
                vec![
                    vec![json!(1), Value::Null],
                    vec![json!(2), json!(3)],
                ],
            ),
        };
        let mut state = executable_state();

        run(&mut state, &factory).await;

        assert_eq!(state.metrics.data_completeness, Some(0.75));
        assert!(!state.validation_passed);
        assert_eq!(state.error_message.as_deref(), Some(INSUFFICIENT_DATA));
    }

    #[tokio::test]
    async fn completeness_is_rounded_to_four_decimals() {
        // 5000 rows x 2 cols = 10000 cells, 2001 nulls: 0.7999
        let mut rows = Vec::new();
        for i in 0..5000 {
            let second = if i < 2001 { Value::Null } else { json!(i) };
            rows.push(vec![json!(i), second]);
        }
        let factory = CannedFactory {
            table: table(&["a", "b"], rows),
        };
        let mut state = executable_state();

        run(&mut state, &factory).await;

        assert_eq!(state.metrics.data_completeness, Some(0.7999));
        assert!(!state.validation_passed);
    }

    #[tokio::test]
    async fn missing_sql_short_circuits() {
        let factory = CannedFactory {
            table: table(&["a"], vec![vec![json!(1)]]),
        };
        let mut state = PipelineState::new("q");

        run(&mut state, &factory).await;

        assert!(!state.validation_passed);
        assert_eq!(state.error_message.as_deref(), Some("SQL query not set"));
        assert_eq!(state.last_execution_error.as_deref(), Some("SQL query not set"));
        assert!(state.metrics.latency_sec.is_none());
    }

    #[tokio::test]
    async fn missing_credentials_surface_auth_guidance() {
        let mut state = executable_state();

        run(&mut state, &NoCredentialsFactory).await;

        assert!(!state.validation_passed);
        assert_eq!(state.metrics.latency_sec, Some(0.0));
        assert!(state
            .error_message
            .as_deref()
            .unwrap()
            .contains("BIGQUERY_ACCESS_TOKEN"));
    }

    #[tokio::test]
    async fn execution_error_is_recorded_for_retry() {
        let mut state = executable_state();

        run(&mut state, &FailingFactory).await;

        assert!(!state.validation_passed);
        assert!(state.metrics.latency_sec.is_some());
        assert!(state
            .last_execution_error
            .as_deref()
            .unwrap()
            .contains("Unrecognized name: broken"));
        assert!(state.bq_results.is_none());
    }
}
