pub mod graph;
pub mod runner;
pub mod steps;
pub mod tables;
pub mod transform;
pub mod warehouse;

use std::sync::Arc;

use common::Result;
use common::config::Settings;
use tracing::info;

use warehouse::Warehouse;

/// Runs one full pipeline pass: raw loads, staging normalization, and the
/// derived reporting tables, in task-graph dependency order.
pub async fn run_pipeline(config_path: &str) -> Result<()> {
    let settings = Settings::new(config_path)?;
    let graph = graph::build_pipeline_graph()?;
    let warehouse = Arc::new(Warehouse::new());

    info!(
        pipeline = %settings.pipeline.name,
        schedule = %settings.pipeline.schedule,
        tasks = graph.len(),
        "Starting pipeline run"
    );

    runner::run_graph(&graph, warehouse, Arc::new(settings)).await?;
    info!("Pipeline run complete");
    Ok(())
}

/// The validated execution order, for operators inspecting the plan.
pub fn pipeline_plan() -> Result<Vec<String>> {
    let graph = graph::build_pipeline_graph()?;
    graph.topological_order()
}
