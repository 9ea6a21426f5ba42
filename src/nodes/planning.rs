//! Static planning stage: template-based SQL selection, no LLM involved.
//!
//! Used by the static-planning graph mode as a deterministic alternative to
//! the SQL generation stage.

use tracing::info;

use crate::state::PipelineState;

/// Select a canned SQL query and chart type for the classified analysis
/// type. Infallible.
pub fn run(state: &mut PipelineState) {
    state.sql_query = state.analysis_type.sql_template().to_string();
    state.chart_type = Some(state.analysis_type.chart_type());

    info!(
        analysis_type = %state.analysis_type,
        chart_type = ?state.chart_type,
        "static plan selected"
    );
}
