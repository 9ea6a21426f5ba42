//! Pipeline stages, each a free function mutating [`crate::state::PipelineState`].

pub mod execution;
pub mod insights;
pub mod planning;
pub mod prompts;
pub mod reasoning;
pub mod schema_retrieval;
pub mod sql_generation;
pub mod visualization;
