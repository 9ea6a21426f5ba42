//! Baseline queries and rough-equivalence evaluation of agent output.

use serde_json::Value;

use crate::bigquery::{DataTable, QueryRunner};
use crate::constants::{AnalysisType, BASELINE_ROW_DELTA_TOLERANCE};
use crate::error::Result;
use crate::state::{Metrics, QueryResult};

/// Hand-written reference query for each analysis type.
pub fn baseline_query(analysis_type: AnalysisType) -> &'static str {
    match analysis_type {
        AnalysisType::ProductTrends => {
            r#"SELECT
    DATE_TRUNC(o.created_at, MONTH) AS month,
    SUM(oi.sale_price * oi.quantity) AS revenue
FROM `bigquery-public-data.thelook_ecommerce.order_items` AS oi
INNER JOIN `bigquery-public-data.thelook_ecommerce.orders` AS o
    ON oi.order_id = o.order_id
WHERE o.created_at >= DATE_SUB(CURRENT_DATE(), INTERVAL 12 MONTH)
GROUP BY month
ORDER BY month ASC"#
        }
        AnalysisType::CustomerSegmentation => {
            r#"SELECT
    u.country,
    COUNT(DISTINCT u.id) AS customer_count
FROM `bigquery-public-data.thelook_ecommerce.users` AS u
GROUP BY u.country
ORDER BY customer_count DESC"#
        }
        AnalysisType::GeoAnalysis => {
            r#"SELECT
    u.country,
    COUNT(o.order_id) AS order_count
FROM `bigquery-public-data.thelook_ecommerce.orders` AS o
INNER JOIN `bigquery-public-data.thelook_ecommerce.users` AS u
    ON o.user_id = u.id
GROUP BY u.country
ORDER BY order_count DESC"#
        }
    }
}

/// Execute the baseline query for an analysis type.
pub async fn run_baseline(
    analysis_type: AnalysisType,
    runner: &dyn QueryRunner,
) -> Result<DataTable> {
    runner.execute_query(baseline_query(analysis_type)).await
}

/// Condensed evaluation record for one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct MvpMetrics {
    pub latency_sec: f64,
    pub data_completeness: f64,
    pub rows_returned: usize,
    pub matches_baseline: bool,
}

/// Compare the agent's result to a baseline run.
pub fn evaluate_result(
    agent_output: &QueryResult,
    metrics: &Metrics,
    baseline_output: &DataTable,
) -> MvpMetrics {
    MvpMetrics {
        latency_sec: metrics.latency_sec.unwrap_or(0.0),
        data_completeness: metrics.data_completeness.unwrap_or(1.0),
        rows_returned: agent_output.data.len(),
        matches_baseline: rough_match(agent_output, baseline_output),
    }
}

/// Approximate equivalence: row counts within tolerance, at least one
/// shared column, and the first rows agreeing on the first two shared
/// columns after numeric rounding.
fn rough_match(agent: &QueryResult, baseline: &DataTable) -> bool {
    if agent.data.is_empty() || baseline.rows.is_empty() {
        return false;
    }

    let row_delta = agent.data.len().abs_diff(baseline.rows.len());
    if row_delta > BASELINE_ROW_DELTA_TOLERANCE {
        return false;
    }

    let mut shared: Vec<&String> = agent
        .columns
        .iter()
        .filter(|column| baseline.columns.contains(column))
        .collect();
    if shared.is_empty() {
        return false;
    }
    shared.sort();
    shared.truncate(2);

    let sample_len = agent.data.len().min(baseline.rows.len()).min(5);
    for i in 0..sample_len {
        for column in &shared {
            let agent_cell = agent.data[i].get(column.as_str()).unwrap_or(&Value::Null);
            let baseline_cell = baseline.rows[i].get(column.as_str()).unwrap_or(&Value::Null);
            if !cells_match(agent_cell, baseline_cell) {
                return false;
            }
        }
    }

    true
}

/// Numeric cells compare after rounding to three decimals; everything else
/// compares exactly.
fn cells_match(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => round3(x) == round3(y),
        _ => a == b,
    }
}

fn round3(value: f64) -> f64 {
    (value * 1_000.0).round() / 1_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn result(columns: &[&str], rows: Vec<Vec<Value>>) -> QueryResult {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let data: Vec<Map<String, Value>> = rows
            .into_iter()
            .map(|cells| columns.iter().cloned().zip(cells).collect())
            .collect();
        QueryResult {
            shape: (data.len(), columns.len()),
            columns,
            data,
        }
    }

    fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> DataTable {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let rows = rows
            .into_iter()
            .map(|cells| columns.iter().cloned().zip(cells).collect())
            .collect();
        DataTable { columns, rows }
    }

    #[test]
    fn every_analysis_type_has_a_baseline() {
        for analysis in [
            AnalysisType::ProductTrends,
            AnalysisType::CustomerSegmentation,
            AnalysisType::GeoAnalysis,
        ] {
            assert!(baseline_query(analysis).contains("thelook_ecommerce"));
        }
    }

    #[test]
    fn identical_samples_match() {
        let agent = result(
            &["country", "customer_count"],
            vec![
                vec![json!("US"), json!(100)],
                vec![json!("DE"), json!(50)],
            ],
        );
        let baseline = table(
            &["country", "customer_count"],
            vec![
                vec![json!("US"), json!(100)],
                vec![json!("DE"), json!(50)],
            ],
        );

        let metrics = Metrics {
            latency_sec: Some(1.5),
            data_completeness: Some(1.0),
            ..Metrics::default()
        };
        let evaluated = evaluate_result(&agent, &metrics, &baseline);

        assert!(evaluated.matches_baseline);
        assert_eq!(evaluated.rows_returned, 2);
        assert_eq!(evaluated.latency_sec, 1.5);
    }

    #[test]
    fn row_count_gap_beyond_tolerance_fails() {
        let agent = result(&["country"], vec![vec![json!("US")]]);
        let baseline = table(
            &["country"],
            vec![
                vec![json!("US")],
                vec![json!("DE")],
                vec![json!("FR")],
                vec![json!("BR")],
            ],
        );

        assert!(!rough_match(&agent, &baseline));
    }

    #[test]
    fn row_count_gap_within_tolerance_can_match() {
        let agent = result(&["country"], vec![vec![json!("US")]]);
        let baseline = table(&["country"], vec![vec![json!("US")], vec![json!("DE")]]);

        assert!(rough_match(&agent, &baseline));
    }

    #[test]
    fn no_shared_columns_fails() {
        let agent = result(&["region"], vec![vec![json!("US")]]);
        let baseline = table(&["country"], vec![vec![json!("US")]]);

        assert!(!rough_match(&agent, &baseline));
    }

    #[test]
    fn numeric_cells_round_before_comparing() {
        let agent = result(&["revenue"], vec![vec![json!(10.0004)]]);
        let baseline = table(&["revenue"], vec![vec![json!(10.0)]]);

        assert!(rough_match(&agent, &baseline));

        let agent = result(&["revenue"], vec![vec![json!(10.002)]]);
        assert!(!rough_match(&agent, &baseline));
    }

    #[test]
    fn empty_outputs_never_match() {
        let empty = result(&["country"], vec![]);
        let baseline = table(&["country"], vec![vec![json!("US")]]);

        assert!(!rough_match(&empty, &baseline));

        let evaluated = evaluate_result(&empty, &Metrics::default(), &baseline);
        assert!(!evaluated.matches_baseline);
        assert_eq!(evaluated.rows_returned, 0);
        assert_eq!(evaluated.data_completeness, 1.0);
    }
}
