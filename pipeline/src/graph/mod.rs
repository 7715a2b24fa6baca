//! Task graph definition: every node and dependency edge of one pipeline
//! run, declared once and validated before anything executes.
//!
//! Node identifiers are an operator-facing contract
//! (`extract_to_postgres_<dataset>`, `transform_<dataset>`, `create_<table>`)
//! and must stay stable across releases.

use std::collections::{BTreeMap, BTreeSet};

use common::{Error, Result};

use crate::tables::{self, ANALYTICS_SCHEMA, RAW_SCHEMA, STAGING_SCHEMA};

pub const START_NODE: &str = "start";
pub const FINISH_NODE: &str = "finish";
pub const STAGING_SCHEMA_NODE: &str = "create_staging_schema";
pub const ANALYTICS_SCHEMA_NODE: &str = "create_analytics_schema";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// Synchronization point with no work of its own.
    NoOp,
    CreateSchema { schema: String },
    Extract { file: String, schema: String },
    Transform { file: String, schema: String },
    Derive { table: String, schema: String },
}

#[derive(Debug, Clone)]
pub struct TaskNode {
    pub id: String,
    pub kind: TaskKind,
    /// Identifiers of every node that must complete before this one starts.
    pub deps: Vec<String>,
}

/// Explicit adjacency structure: node id to declared predecessors.
#[derive(Debug, Default)]
pub struct TaskGraph {
    nodes: BTreeMap<String, TaskNode>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
        }
    }

    pub fn add_node(&mut self, node: TaskNode) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(Error::Graph(format!("duplicate task id '{}'", node.id)));
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    pub fn node(&self, id: &str) -> Option<&TaskNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Checks that every declared dependency exists and the graph is acyclic.
    pub fn validate(&self) -> Result<()> {
        for node in self.nodes.values() {
            for dep in &node.deps {
                if !self.nodes.contains_key(dep) {
                    return Err(Error::Graph(format!(
                        "task '{}' depends on unknown task '{dep}'",
                        node.id
                    )));
                }
            }
        }
        self.topological_order().map(|_| ())
    }

    /// Returns all task ids ordered so that each appears after every one of
    /// its dependencies. Cycles surface as `Error::Graph`.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let mut ordered = Vec::with_capacity(self.nodes.len());
        let mut visited = BTreeSet::new();
        let mut visiting = BTreeSet::new();

        for id in self.nodes.keys() {
            self.dfs_visit(id, &mut ordered, &mut visited, &mut visiting)?;
        }

        Ok(ordered)
    }

    fn dfs_visit(
        &self,
        id: &str,
        ordered: &mut Vec<String>,
        visited: &mut BTreeSet<String>,
        visiting: &mut BTreeSet<String>,
    ) -> Result<()> {
        if visiting.contains(id) {
            return Err(Error::Graph(format!("dependency cycle through task '{id}'")));
        }
        if visited.contains(id) {
            return Ok(());
        }

        visiting.insert(id.to_string());

        if let Some(node) = self.nodes.get(id) {
            for dep in &node.deps {
                self.dfs_visit(dep, ordered, visited, visiting)?;
            }
        }

        visiting.remove(id);
        visited.insert(id.to_string());
        ordered.push(id.to_string());

        Ok(())
    }
}

pub fn extract_node_id(stem: &str) -> String {
    format!("extract_to_postgres_{stem}")
}

pub fn transform_node_id(stem: &str) -> String {
    format!("transform_{stem}")
}

pub fn derive_node_id(table: &str) -> String {
    format!("create_{table}")
}

/// Resolves a table name to the node that produces it. Dataset stems win:
/// a derived table may share a name with a dataset (the analytics
/// `fmcsa_companies` does), and upstream references always mean the
/// transform output in that case.
fn producer_node_id(table: &str) -> Result<String> {
    if tables::is_dataset_stem(table) {
        return Ok(transform_node_id(table));
    }
    if tables::derived_table(table).is_some() {
        return Ok(derive_node_id(table));
    }
    Err(Error::UnknownTable(format!(
        "'{table}' is neither a dataset nor a derived table"
    )))
}

/// Builds the full pipeline graph: raw extracts, staging normalization,
/// derived tables, schema gates, and the start/finish synchronization nodes.
pub fn build_pipeline_graph() -> Result<TaskGraph> {
    let mut graph = TaskGraph::new();

    graph.add_node(TaskNode {
        id: START_NODE.to_string(),
        kind: TaskKind::NoOp,
        deps: vec![],
    })?;

    let stems: Vec<&str> = tables::DATASETS.iter().map(|f| tables::dataset_stem(f)).collect();

    for (file, stem) in tables::DATASETS.iter().zip(&stems) {
        graph.add_node(TaskNode {
            id: extract_node_id(stem),
            kind: TaskKind::Extract {
                file: (*file).to_string(),
                schema: RAW_SCHEMA.to_string(),
            },
            deps: vec![START_NODE.to_string()],
        })?;
    }

    // Staging writes may only begin once every raw load has landed.
    graph.add_node(TaskNode {
        id: STAGING_SCHEMA_NODE.to_string(),
        kind: TaskKind::CreateSchema {
            schema: STAGING_SCHEMA.to_string(),
        },
        deps: stems.iter().map(|stem| extract_node_id(stem)).collect(),
    })?;

    for (file, stem) in tables::DATASETS.iter().zip(&stems) {
        graph.add_node(TaskNode {
            id: transform_node_id(stem),
            kind: TaskKind::Transform {
                file: (*file).to_string(),
                schema: STAGING_SCHEMA.to_string(),
            },
            deps: vec![extract_node_id(stem), STAGING_SCHEMA_NODE.to_string()],
        })?;
    }

    for table in tables::derived_tables() {
        let mut deps: Vec<String> = table
            .reads
            .iter()
            .map(|read| producer_node_id(read))
            .collect::<Result<_>>()?;
        if table.schema == ANALYTICS_SCHEMA {
            deps.push(ANALYTICS_SCHEMA_NODE.to_string());
        }
        graph.add_node(TaskNode {
            id: derive_node_id(table.name),
            kind: TaskKind::Derive {
                table: table.name.to_string(),
                schema: table.schema.to_string(),
            },
            deps,
        })?;
    }

    // The analytics schema gate waits for every staging-level output that
    // feeds the analytics layer, computed from the derived-table spec.
    let mut analytics_inputs = BTreeSet::new();
    for table in tables::derived_tables().iter().filter(|t| t.schema == ANALYTICS_SCHEMA) {
        for read in table.reads {
            analytics_inputs.insert(producer_node_id(read)?);
        }
    }
    graph.add_node(TaskNode {
        id: ANALYTICS_SCHEMA_NODE.to_string(),
        kind: TaskKind::CreateSchema {
            schema: ANALYTICS_SCHEMA.to_string(),
        },
        deps: analytics_inputs.into_iter().collect(),
    })?;

    graph.add_node(TaskNode {
        id: FINISH_NODE.to_string(),
        kind: TaskKind::NoOp,
        deps: tables::derived_tables()
            .iter()
            .filter(|t| t.schema == ANALYTICS_SCHEMA)
            .map(|t| derive_node_id(t.name))
            .collect(),
    })?;

    graph.validate()?;
    Ok(graph)
}
