//! One operation per task-graph node kind: glue between the normalization
//! rules and the warehouse gateway.

use std::path::Path;

use common::{Error, Result};
use tracing::info;

use crate::tables::{self, RAW_SCHEMA};
use crate::transform;
use crate::warehouse::Warehouse;

fn require_non_empty(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidArgument(format!("No {what} was provided")));
    }
    Ok(())
}

pub async fn create_schema(warehouse: &Warehouse, schema_name: &str) -> Result<()> {
    require_non_empty(schema_name, "schema name")?;
    warehouse.create_schema_if_not_exists(schema_name).await
}

/// Loads one raw CSV verbatim into `<schema>.<stem>`.
pub async fn extract_csv(
    warehouse: &Warehouse,
    data_dir: &str,
    file_name: &str,
    schema_name: &str,
) -> Result<()> {
    require_non_empty(file_name, "file name")?;
    require_non_empty(schema_name, "schema name")?;

    let table_name = tables::dataset_stem(file_name);
    let path = Path::new(data_dir).join(file_name);
    let batches = warehouse.load_csv(&path).await?;
    warehouse.replace_table(batches, table_name, schema_name).await?;
    info!(table = %table_name, schema = %schema_name, "Loaded raw CSV");
    Ok(())
}

/// Reads the raw table, applies the column-to-rule binding, and writes the
/// normalized result into the staging layer.
pub async fn transform_table(
    warehouse: &Warehouse,
    file_name: &str,
    schema_name: &str,
) -> Result<()> {
    require_non_empty(file_name, "file name")?;
    require_non_empty(schema_name, "schema name")?;

    let table_name = tables::dataset_stem(file_name);
    let raw = warehouse.read_table(table_name, RAW_SCHEMA).await?;
    let normalized = transform::normalize_batches(&raw)?;
    warehouse
        .replace_table(vec![normalized], table_name, schema_name)
        .await?;
    info!(table = %table_name, schema = %schema_name, "Normalized table");
    Ok(())
}

/// Runs the fixed query for one derived table and replace-writes the result.
pub async fn build_derived_table(
    warehouse: &Warehouse,
    table_name: &str,
    schema_name: &str,
) -> Result<()> {
    require_non_empty(table_name, "table name")?;
    require_non_empty(schema_name, "schema name")?;

    let spec = tables::derived_table(table_name).ok_or_else(|| {
        Error::UnknownTable(format!("no query registered for '{table_name}'"))
    })?;
    let rows = warehouse.read_query(spec.sql).await.map_err(|e| {
        if e.is_empty_result() {
            Error::EmptyResult(format!(
                "query for {schema_name}.{table_name} returned no results!"
            ))
        } else {
            e
        }
    })?;
    warehouse.replace_table(rows, table_name, schema_name).await?;
    info!(table = %table_name, schema = %schema_name, "Built derived table");
    Ok(())
}
