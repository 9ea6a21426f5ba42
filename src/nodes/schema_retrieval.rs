//! Schema retrieval stage: fetch table metadata for the classified intent.

use std::time::Instant;

use tracing::{info, warn};

use crate::bigquery::RunnerFactory;
use crate::state::PipelineState;

/// Retrieve column/row-count metadata for the tables relevant to the
/// analysis type. Individual table failures are skipped; a client that
/// cannot be constructed yields an entirely empty schema. Never raises.
pub async fn run(state: &mut PipelineState, warehouse: &dyn RunnerFactory) {
    let relevant_tables = state.analysis_type.relevant_tables();
    let start = Instant::now();

    state.schema_info.clear();
    state.available_tables.clear();

    match warehouse.create() {
        Ok(runner) => {
            for table_name in relevant_tables {
                match runner.get_table_metadata(table_name).await {
                    Ok(schema) => {
                        info!(
                            table = table_name,
                            columns = schema.columns.len(),
                            row_count = ?schema.row_count,
                            "schema retrieved for table"
                        );
                        state.available_tables.push(table_name.to_string());
                        state.schema_info.insert(table_name.to_string(), schema);
                    }
                    Err(e) => {
                        warn!(table = table_name, error = %e, "failed to retrieve schema for table");
                    }
                }
            }
        }
        Err(e) => {
            warn!(error = %e, analysis_type = %state.analysis_type, "schema retrieval failed");
        }
    }

    let latency_ms = start.elapsed().as_millis() as u64;
    state.metrics.schema_retrieval_time_ms = Some(latency_ms);

    info!(
        tables = state.available_tables.len(),
        latency_ms,
        "schema retrieval complete"
    );
}
