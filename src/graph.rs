//! Pipeline orchestration: a small explicit state machine over the stages.
//!
//! The driver runs one pass per user question. It never loops on failure;
//! retrying is a caller decision via [`AgentGraph::retry`].

use std::sync::Arc;

use tracing::{debug, info};

use crate::bigquery::RunnerFactory;
use crate::config::Settings;
use crate::llm::ChatModelFactory;
use crate::nodes;
use crate::state::PipelineState;

/// Stage identifiers for the pipeline state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Reasoning,
    Planning,
    SchemaRetrieval,
    SqlGeneration,
    Execution,
    Visualization,
    Insights,
    End,
    ErrorEnd,
}

/// External services the stages depend on, injected once at construction.
pub struct AgentServices {
    pub llm: Arc<dyn ChatModelFactory>,
    pub warehouse: Arc<dyn RunnerFactory>,
    pub settings: Arc<Settings>,
}

/// The analysis pipeline. One instance can run many questions.
pub struct AgentGraph {
    services: AgentServices,
    static_planning: bool,
}

impl AgentGraph {
    pub fn new(services: AgentServices) -> Self {
        Self {
            services,
            static_planning: false,
        }
    }

    /// Route planning through static SQL templates instead of schema
    /// retrieval and LLM generation.
    pub fn with_static_planning(mut self, enabled: bool) -> Self {
        self.static_planning = enabled;
        self
    }

    /// Run the full pipeline for one user question.
    pub async fn run(&self, user_query: &str) -> PipelineState {
        let state = PipelineState::new(user_query);
        info!(user_query, static_planning = self.static_planning, "pipeline started");
        self.drive(Node::Reasoning, state).await
    }

    /// Re-enter the pipeline at SQL generation after a failed attempt. The
    /// caller owns the retry budget; each call bumps the attempt counter.
    pub async fn retry(&self, mut state: PipelineState) -> PipelineState {
        state.sql_generation_attempt += 1;
        state.validation_passed = false;
        info!(attempt = state.sql_generation_attempt, "retrying SQL generation");
        let entry = if self.static_planning {
            Node::Planning
        } else {
            Node::SqlGeneration
        };
        self.drive(entry, state).await
    }

    async fn drive(&self, start: Node, mut state: PipelineState) -> PipelineState {
        let mut node = start;
        loop {
            debug!(?node, "entering stage");
            match node {
                Node::Reasoning => {
                    nodes::reasoning::run(&mut state, self.services.llm.as_ref()).await
                }
                Node::Planning => nodes::planning::run(&mut state),
                Node::SchemaRetrieval => {
                    nodes::schema_retrieval::run(&mut state, self.services.warehouse.as_ref()).await
                }
                Node::SqlGeneration => {
                    nodes::sql_generation::run(&mut state, self.services.llm.as_ref()).await
                }
                Node::Execution => {
                    nodes::execution::run(&mut state, self.services.warehouse.as_ref()).await
                }
                Node::Visualization => {
                    nodes::visualization::run(&mut state, &self.services.settings)
                }
                Node::Insights => {
                    nodes::insights::run(&mut state, self.services.llm.as_ref()).await
                }
                Node::End | Node::ErrorEnd => break,
            }
            node = self.next(node, &state);
        }

        info!(
            validation_passed = state.validation_passed,
            error = ?state.error_message,
            "pipeline finished"
        );
        state
    }

    /// Static routing, except at Execution where the validation gate
    /// branches.
    fn next(&self, node: Node, state: &PipelineState) -> Node {
        match node {
            Node::Reasoning => {
                if self.static_planning {
                    Node::Planning
                } else {
                    Node::SchemaRetrieval
                }
            }
            Node::Planning => Node::Execution,
            Node::SchemaRetrieval => Node::SqlGeneration,
            Node::SqlGeneration => Node::Execution,
            Node::Execution => {
                if state.validation_passed {
                    Node::Visualization
                } else {
                    Node::ErrorEnd
                }
            }
            Node::Visualization => Node::Insights,
            Node::Insights => Node::End,
            Node::End | Node::ErrorEnd => node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PipelineState;

    fn graph(static_planning: bool) -> AgentGraph {
        struct NoLlm;
        impl ChatModelFactory for NoLlm {
            fn create(
                &self,
                _temperature: f32,
                _provider: Option<crate::constants::LlmProvider>,
            ) -> crate::error::Result<Box<dyn crate::llm::ChatModel>> {
                Err(crate::error::AgentError::CredentialsMissing("no key".to_string()))
            }

            fn create_for_sql(&self) -> crate::error::Result<Box<dyn crate::llm::ChatModel>> {
                Err(crate::error::AgentError::CredentialsMissing("no key".to_string()))
            }
        }

        struct NoWarehouse;
        impl RunnerFactory for NoWarehouse {
            fn create(&self) -> crate::error::Result<Box<dyn crate::bigquery::QueryRunner>> {
                Err(crate::error::AgentError::CredentialsMissing("no creds".to_string()))
            }
        }

        AgentGraph::new(AgentServices {
            llm: Arc::new(NoLlm),
            warehouse: Arc::new(NoWarehouse),
            settings: Arc::new(Settings::default()),
        })
        .with_static_planning(static_planning)
    }

    #[test]
    fn routing_follows_the_llm_path() {
        let graph = graph(false);
        let state = PipelineState::new("q");

        assert_eq!(graph.next(Node::Reasoning, &state), Node::SchemaRetrieval);
        assert_eq!(graph.next(Node::SchemaRetrieval, &state), Node::SqlGeneration);
        assert_eq!(graph.next(Node::SqlGeneration, &state), Node::Execution);
        assert_eq!(graph.next(Node::Visualization, &state), Node::Insights);
        assert_eq!(graph.next(Node::Insights, &state), Node::End);
    }

    #[test]
    fn routing_follows_the_static_path() {
        let graph = graph(true);
        let state = PipelineState::new("q");

        assert_eq!(graph.next(Node::Reasoning, &state), Node::Planning);
        assert_eq!(graph.next(Node::Planning, &state), Node::Execution);
    }

    #[test]
    fn execution_branches_on_validation() {
        let graph = graph(false);
        let mut state = PipelineState::new("q");

        assert_eq!(graph.next(Node::Execution, &state), Node::ErrorEnd);
        state.validation_passed = true;
        assert_eq!(graph.next(Node::Execution, &state), Node::Visualization);
    }

    #[tokio::test]
    async fn retry_bumps_the_attempt_counter() {
        let graph = graph(false);
        let mut state = PipelineState::new("q");
        state.sql_query = "SELECT broken FROM orders".to_string();
        state.last_execution_error = Some("boom".to_string());

        let state = graph.retry(state).await;

        assert_eq!(state.sql_generation_attempt, 2);
        assert!(!state.validation_passed);
    }
}
