pub mod baselines;
pub mod bigquery;
pub mod chart;
pub mod config;
pub mod constants;
pub mod error;
pub mod graph;
pub mod llm;
pub mod nodes;
pub mod state;
