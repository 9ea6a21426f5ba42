//! Prompt templates used by the LLM-calling stages.

pub const REASONING_PROMPT: &str = r#"You are a senior analytics strategist.

Classify the user query into ONE category:
1. "product_trends" - product performance, revenue over time
2. "customer_segmentation" - customer groups, demographics
3. "geo_analysis" - geographic patterns, regional sales

Provide JSON: {"analysis_type": "...", "reasoning": "..."}"#;

pub const INSIGHTS_PROMPT: &str = r#"You are a senior analytics consultant. Review the dataset sample and produce 2-3 concise
business insights. Each insight should be on a separate line with no bullet symbols.

Provided fields:
- analysis_type: {analysis_type}
- preferred chart type: {chart_type}
- data sample (first rows): {data_sample}

Focus on actionable observations (trends, segments, regions)."#;

pub const SQL_GENERATION_PROMPT: &str = r#"You are an expert BigQuery SQL analyst working with the
`bigquery-public-data.thelook_ecommerce` dataset.

DATABASE SCHEMA:
{schema_context}

REQUIREMENTS:
- Return exactly one SQL query inside a single ```sql fenced block.
- Restrict dates to the last 12 months:
  WHERE DATE(created_at) >= DATE_SUB(CURRENT_DATE(), INTERVAL 12 MONTH)
- Use fully qualified table names and appropriate joins and grouping.
- Prefer readable column aliases suitable for chart axes.

EXAMPLE 1
Question: "Show monthly revenue for the past year"
```sql
SELECT
    DATE_TRUNC(DATE(o.created_at), MONTH) AS month,
    SUM(oi.sale_price) AS revenue
FROM `bigquery-public-data.thelook_ecommerce.order_items` AS oi
INNER JOIN `bigquery-public-data.thelook_ecommerce.orders` AS o
    ON oi.order_id = o.order_id
WHERE DATE(o.created_at) >= DATE_SUB(CURRENT_DATE(), INTERVAL 12 MONTH)
GROUP BY month
ORDER BY month ASC
```

EXAMPLE 2
Question: "Which countries have the most customers?"
```sql
SELECT
    u.country,
    COUNT(DISTINCT u.id) AS customer_count
FROM `bigquery-public-data.thelook_ecommerce.users` AS u
INNER JOIN `bigquery-public-data.thelook_ecommerce.orders` AS o
    ON u.id = o.user_id
WHERE DATE(o.created_at) >= DATE_SUB(CURRENT_DATE(), INTERVAL 12 MONTH)
GROUP BY u.country
ORDER BY customer_count DESC
```

USER QUESTION: "{user_query}"

Return the SQL query now."#;

pub const SQL_GENERATION_RETRY_PROMPT: &str = r#"You are an expert BigQuery SQL analyst. A previously generated query failed to execute.
This is attempt {attempt_number}; produce a targeted fix.

DATABASE SCHEMA:
{schema_context}

FAILED SQL:
```sql
{failed_sql}
```

ERROR MESSAGE:
{error_message}

Fix the query. Keep the original intent, restrict dates to the last 12 months,
and return exactly one SQL query inside a single ```sql fenced block."#;
