//! Visualization stage: build a chart spec from validated results and
//! snapshot it to disk.

use tracing::{debug, info, warn};

use crate::chart::build_figure;
use crate::config::Settings;
use crate::constants::ChartType;
use crate::state::PipelineState;

/// Build the chart for validated results. Skips quietly when there is
/// nothing to plot; a failed disk snapshot is logged but does not fail the
/// stage.
pub fn run(state: &mut PipelineState, settings: &Settings) {
    if !state.validation_passed {
        debug!("skipping visualization: results did not pass validation");
        state.chart_json = None;
        return;
    }

    let Some(results) = &state.bq_results else {
        debug!("skipping visualization: no query results in state");
        state.chart_json = None;
        return;
    };
    if results.data.is_empty() || results.columns.is_empty() {
        debug!("skipping visualization: empty result set");
        state.chart_json = None;
        return;
    }

    let chart_type = state.chart_type.unwrap_or(ChartType::Bar);
    let figure = build_figure(chart_type, &results.columns, &results.data);

    match figure.to_json() {
        Ok(spec) => {
            info!(%chart_type, rows = results.data.len(), "chart spec built");
            state.chart_json = Some(spec);
        }
        Err(e) => {
            warn!(error = %e, "failed to serialize chart spec");
            state.chart_json = None;
            state.error_message = Some(format!("Visualization error: {}", e));
            return;
        }
    }

    if let Err(e) = std::fs::create_dir_all(&settings.plot_output_dir) {
        warn!(error = %e, dir = %settings.plot_output_dir.display(), "could not create chart output directory");
        return;
    }

    let filename = format!(
        "{}_{}.html",
        state.analysis_type,
        chrono::Utc::now().timestamp()
    );
    let path = settings.plot_output_dir.join(filename);
    match figure.write_html(&path) {
        Ok(()) => {
            info!(path = %path.display(), "chart snapshot written");
            state.chart_image_path = Some(path.display().to_string());
        }
        Err(e) => {
            warn!(error = %e, path = %path.display(), "failed to write chart snapshot");
        }
    }
}
