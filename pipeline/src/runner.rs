//! Dependency-order execution of the task graph.
//!
//! A stand-in for the external scheduler: readiness tracking by remaining
//! predecessor counts, a bounded number of nodes in flight, fail fast on the
//! first node error. Retry policy stays with the real scheduler.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use common::config::Settings;
use common::{Error, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::graph::{TaskGraph, TaskKind};
use crate::steps;
use crate::warehouse::Warehouse;

/// Executes every node of the graph in dependency order. A node never starts
/// before all of its predecessors have completed successfully.
pub async fn run_graph(
    graph: &TaskGraph,
    warehouse: Arc<Warehouse>,
    settings: Arc<Settings>,
) -> Result<()> {
    graph.validate()?;

    let mut remaining: HashMap<String, usize> = HashMap::with_capacity(graph.len());
    let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
    for node in graph.nodes() {
        remaining.insert(node.id.clone(), node.deps.len());
        for dep in &node.deps {
            dependents.entry(dep.clone()).or_default().push(node.id.clone());
        }
    }

    let semaphore = Arc::new(Semaphore::new(settings.pipeline.max_concurrent.max(1)));
    let mut ready: VecDeque<String> = remaining
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| id.clone())
        .collect();
    let mut in_flight: JoinSet<Result<String>> = JoinSet::new();
    let mut completed = 0usize;

    loop {
        while let Some(id) = ready.pop_front() {
            let node = graph
                .node(&id)
                .ok_or_else(|| Error::Graph(format!("unknown task '{id}'")))?;
            let kind = node.kind.clone();
            let warehouse = Arc::clone(&warehouse);
            let settings = Arc::clone(&settings);
            let semaphore = Arc::clone(&semaphore);
            in_flight.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Graph(format!("scheduler semaphore closed: {e}")))?;
                debug!(task = %id, "Task started");
                run_task(&warehouse, &settings, &kind).await?;
                info!(task = %id, "Task finished");
                Ok(id)
            });
        }

        let Some(joined) = in_flight.join_next().await else {
            break;
        };
        // The first failed node aborts the whole run; anything still in
        // flight is dropped with the JoinSet.
        let finished = joined??;
        completed += 1;

        if let Some(children) = dependents.get(&finished) {
            for child in children {
                if let Some(count) = remaining.get_mut(child) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(child.clone());
                    }
                }
            }
        }
    }

    if completed != graph.len() {
        return Err(Error::Graph(format!(
            "run stalled: {completed} of {} tasks completed",
            graph.len()
        )));
    }
    Ok(())
}

async fn run_task(warehouse: &Warehouse, settings: &Settings, kind: &TaskKind) -> Result<()> {
    match kind {
        TaskKind::NoOp => Ok(()),
        TaskKind::CreateSchema { schema } => steps::create_schema(warehouse, schema).await,
        TaskKind::Extract { file, schema } => {
            steps::extract_csv(warehouse, &settings.data.dir, file, schema).await
        }
        TaskKind::Transform { file, schema } => {
            steps::transform_table(warehouse, file, schema).await
        }
        TaskKind::Derive { table, schema } => {
            steps::build_derived_table(warehouse, table, schema).await
        }
    }
}
