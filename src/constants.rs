//! Project-wide constants and enumerations.

use serde::{Deserialize, Serialize};

/// Supported analysis intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    #[default]
    ProductTrends,
    CustomerSegmentation,
    GeoAnalysis,
}

/// Supported visualization chart types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    Line,
    Bar,
    Scatter,
}

/// LLM providers available to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[default]
    Google,
    Openai,
}

pub const DEFAULT_ANALYSIS_TYPE: AnalysisType = AnalysisType::ProductTrends;

/// Minimum rows-present and non-null fraction a result needs to pass the
/// validation gate.
pub const COMPLETENESS_THRESHOLD: f64 = 0.8;

/// Maximum row-count difference tolerated when matching against a baseline.
pub const BASELINE_ROW_DELTA_TOLERANCE: usize = 2;

/// Generated SQL shorter than this (after trimming) is rejected outright.
pub const MIN_SQL_LENGTH: usize = 10;

pub const DEFAULT_GOOGLE_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
/// Higher-capability variant preferred for SQL generation.
pub const SQL_GENERATION_GOOGLE_MODEL: &str = "gemini-1.5-pro";
pub const DEFAULT_MAX_BYTES_BILLED: i64 = 1_000_000_000;

pub const DATASET_ID: &str = "bigquery-public-data.thelook_ecommerce";

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::ProductTrends => "product_trends",
            AnalysisType::CustomerSegmentation => "customer_segmentation",
            AnalysisType::GeoAnalysis => "geo_analysis",
        }
    }

    /// Parse a classifier label. Returns `None` for unsupported values so
    /// the caller can fall back to the default.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "product_trends" => Some(AnalysisType::ProductTrends),
            "customer_segmentation" => Some(AnalysisType::CustomerSegmentation),
            "geo_analysis" => Some(AnalysisType::GeoAnalysis),
            _ => None,
        }
    }

    /// Static chart-type mapping. Total over the enum.
    pub fn chart_type(&self) -> ChartType {
        match self {
            AnalysisType::ProductTrends => ChartType::Line,
            AnalysisType::CustomerSegmentation => ChartType::Bar,
            AnalysisType::GeoAnalysis => ChartType::Bar,
        }
    }

    /// Tables worth fetching metadata for, per analysis type.
    pub fn relevant_tables(&self) -> &'static [&'static str] {
        match self {
            AnalysisType::ProductTrends => &["orders", "order_items", "products"],
            AnalysisType::CustomerSegmentation => &["users", "orders", "order_items"],
            AnalysisType::GeoAnalysis => &["users", "orders", "order_items"],
        }
    }

    /// Static SQL template used by the legacy planning node.
    pub fn sql_template(&self) -> &'static str {
        match self {
            AnalysisType::ProductTrends => {
                r#"SELECT
    DATE_TRUNC(DATE(o.created_at), MONTH) AS month,
    COUNT(DISTINCT oi.product_id) AS unique_products,
    COUNT(oi.id) AS total_items,
    SUM(oi.sale_price) AS revenue
FROM `bigquery-public-data.thelook_ecommerce.order_items` AS oi
INNER JOIN `bigquery-public-data.thelook_ecommerce.orders` AS o
    ON oi.order_id = o.order_id
WHERE DATE(o.created_at) >= DATE_SUB(CURRENT_DATE(), INTERVAL 12 MONTH)
GROUP BY month
ORDER BY month ASC"#
            }
            AnalysisType::CustomerSegmentation => {
                r#"SELECT
    u.country,
    COUNT(DISTINCT u.id) AS customer_count,
    SUM(oi.sale_price) AS total_revenue
FROM `bigquery-public-data.thelook_ecommerce.users` AS u
LEFT JOIN `bigquery-public-data.thelook_ecommerce.orders` AS o
    ON u.id = o.user_id
LEFT JOIN `bigquery-public-data.thelook_ecommerce.order_items` AS oi
    ON oi.order_id = o.order_id
WHERE DATE(o.created_at) >= DATE_SUB(CURRENT_DATE(), INTERVAL 12 MONTH)
GROUP BY u.country
ORDER BY customer_count DESC
LIMIT 20"#
            }
            AnalysisType::GeoAnalysis => {
                r#"SELECT
    u.country,
    u.state,
    COUNT(o.order_id) AS order_count,
    SUM(oi.sale_price) AS revenue
FROM `bigquery-public-data.thelook_ecommerce.orders` AS o
INNER JOIN `bigquery-public-data.thelook_ecommerce.users` AS u
    ON o.user_id = u.id
INNER JOIN `bigquery-public-data.thelook_ecommerce.order_items` AS oi
    ON oi.order_id = o.order_id
WHERE DATE(o.created_at) >= DATE_SUB(CURRENT_DATE(), INTERVAL 12 MONTH)
GROUP BY u.country, u.state
ORDER BY revenue DESC
LIMIT 50"#
            }
        }
    }
}

impl std::fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Line => "line",
            ChartType::Bar => "bar",
            ChartType::Scatter => "scatter",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "line" => Some(ChartType::Line),
            "bar" => Some(ChartType::Bar),
            "scatter" => Some(ChartType::Scatter),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChartType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LlmProvider {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "google" => Some(LlmProvider::Google),
            "openai" => Some(LlmProvider::Openai),
            _ => None,
        }
    }
}
