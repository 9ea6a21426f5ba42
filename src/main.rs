use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use insight_agent::bigquery::BigQueryRunnerFactory;
use insight_agent::config::Settings;
use insight_agent::graph::{AgentGraph, AgentServices};
use insight_agent::llm::LlmClientFactory;
use insight_agent::state::PipelineState;

#[derive(Parser)]
#[command(name = "insight-agent")]
#[command(about = "Natural-language analytics over the thelook_ecommerce dataset")]
struct Args {
    /// The analysis question in natural language. Omit for interactive mode.
    query: Option<String>,

    /// Use static SQL templates instead of LLM SQL generation
    #[arg(long)]
    static_plan: bool,

    /// Directory for chart snapshots (default: PLOT_OUTPUT_DIR or ./data-plotly)
    #[arg(long)]
    plot_dir: Option<PathBuf>,

    /// Write the chart JSON spec to this path as well
    #[arg(long)]
    save_chart: Option<PathBuf>,

    /// Retry SQL generation this many times when validation fails
    #[arg(long, default_value_t = 0)]
    max_retries: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let mut settings = Settings::from_env();
    if let Some(dir) = args.plot_dir {
        settings.plot_output_dir = dir;
    }
    let settings = Arc::new(settings);

    let services = AgentServices {
        llm: Arc::new(LlmClientFactory::new(settings.clone())),
        warehouse: Arc::new(BigQueryRunnerFactory::new(settings.clone())),
        settings,
    };
    let graph = AgentGraph::new(services).with_static_planning(args.static_plan);

    match args.query {
        Some(query) => {
            let state = run_with_retries(&graph, &query, args.max_retries).await;
            print_summary(&state);
            if let (Some(path), Some(spec)) = (&args.save_chart, &state.chart_json) {
                std::fs::write(path, spec)?;
                println!("Chart spec saved to {}", path.display());
            }
        }
        None => interactive_loop(&graph, args.max_retries).await?,
    }

    Ok(())
}

async fn run_with_retries(graph: &AgentGraph, query: &str, max_retries: u32) -> PipelineState {
    let mut state = graph.run(query).await;
    let mut retries = 0;
    while !state.validation_passed && retries < max_retries {
        retries += 1;
        info!(retries, "validation failed, retrying");
        state = graph.retry(state).await;
    }
    state
}

async fn interactive_loop(graph: &AgentGraph, max_retries: u32) -> Result<()> {
    println!("insight-agent interactive mode. Type 'exit' or 'quit' to leave.");
    println!("Example questions:");
    println!("  - Show product revenue trends for the last year");
    println!("  - Segment customers by country");
    println!("  - Which regions drive the most sales?");
    let stdin = io::stdin();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") {
            break;
        }

        let state = run_with_retries(graph, query, max_retries).await;
        print_summary(&state);
    }

    Ok(())
}

fn print_summary(state: &PipelineState) {
    println!("\n=== Analysis ===");
    println!("Type: {}", state.analysis_type);
    if !state.analysis_plan.is_empty() {
        println!("Plan: {}", state.analysis_plan);
    }

    if !state.sql_query.is_empty() {
        println!("\n=== SQL ===\n{}", state.sql_query);
    }

    println!("\n=== Metrics ===");
    if let Some(latency) = state.metrics.latency_sec {
        println!("Query latency: {:.2}s", latency);
    }
    if let Some(rows) = state.metrics.rows_returned {
        println!("Rows returned: {}", rows);
    }
    if let Some(completeness) = state.metrics.data_completeness {
        println!("Data completeness: {:.4}", completeness);
    }
    println!("Validation passed: {}", state.validation_passed);

    if let Some(path) = &state.chart_image_path {
        println!("\nChart written to {}", path);
    }

    if let Some(insights) = &state.insights {
        println!("\n=== Insights ===\n{}", insights);
    }

    if let Some(error) = &state.error_message {
        println!("\nError: {}", error);
    }
}
