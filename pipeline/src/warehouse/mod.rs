//! The only component that touches the relational backend.
//!
//! Tables live as Arrow `MemTable`s inside a DataFusion `SessionContext`;
//! schemas are catalog schema providers. Each call is its own unit of work:
//! no retry, no transaction spanning multiple calls.

use std::path::Path;
use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use common::{Error, Result};
use datafusion::catalog::{CatalogProvider, MemorySchemaProvider, SchemaProvider};
use datafusion::common::TableReference;
use datafusion::datasource::MemTable;
use datafusion::prelude::{CsvReadOptions, SessionContext};
use tracing::{debug, info};

/// CSV escape character used by all raw dataset files.
const CSV_ESCAPE: u8 = b'\\';

/// Storage gateway around a DataFusion session. Constructed once and passed
/// by `Arc` to every step; never a process-wide singleton.
pub struct Warehouse {
    ctx: SessionContext,
}

impl Default for Warehouse {
    fn default() -> Self {
        Self::new()
    }
}

impl Warehouse {
    pub fn new() -> Self {
        Self {
            ctx: SessionContext::new(),
        }
    }

    pub fn with_context(ctx: SessionContext) -> Self {
        Self { ctx }
    }

    pub fn session_context(&self) -> &SessionContext {
        &self.ctx
    }

    fn default_catalog(&self) -> Result<Arc<dyn CatalogProvider>> {
        let name = self
            .ctx
            .state()
            .config()
            .options()
            .catalog
            .default_catalog
            .clone();
        self.ctx
            .catalog(&name)
            .ok_or_else(|| Error::Storage(format!("default catalog '{name}' is missing")))
    }

    fn schema_provider(&self, schema_name: &str) -> Result<Arc<dyn SchemaProvider>> {
        self.default_catalog()?
            .schema(schema_name)
            .ok_or_else(|| Error::Storage(format!("schema '{schema_name}' does not exist")))
    }

    /// Idempotent schema creation; no error if the schema is already present.
    pub async fn create_schema_if_not_exists(&self, schema_name: &str) -> Result<()> {
        let catalog = self.default_catalog()?;
        if catalog.schema(schema_name).is_some() {
            debug!(schema = %schema_name, "Schema already exists");
            return Ok(());
        }
        catalog.register_schema(schema_name, Arc::new(MemorySchemaProvider::new()))?;
        info!(schema = %schema_name, "Created schema");
        Ok(())
    }

    /// Drops and recreates the named table from the given batches. A zero-row
    /// write is fatal and leaves any existing registration untouched.
    pub async fn replace_table(
        &self,
        batches: Vec<RecordBatch>,
        table_name: &str,
        schema_name: &str,
    ) -> Result<()> {
        let rows: usize = batches.iter().map(RecordBatch::num_rows).sum();
        if rows == 0 {
            return Err(Error::EmptyResult(format!(
                "{schema_name}.{table_name} is empty!"
            )));
        }

        let schema = batches[0].schema();
        let provider = self.schema_provider(schema_name)?;
        let table = MemTable::try_new(schema, vec![batches])?;

        if provider.table_exist(table_name) {
            provider.deregister_table(table_name)?;
        }
        provider.register_table(table_name.to_string(), Arc::new(table))?;
        debug!(table = %table_name, schema = %schema_name, rows, "Replaced table");
        Ok(())
    }

    /// Reads a full table; a zero-row table is fatal.
    pub async fn read_table(&self, table_name: &str, schema_name: &str) -> Result<Vec<RecordBatch>> {
        let table_ref = TableReference::partial(schema_name.to_string(), table_name.to_string());
        let df = self.ctx.table(table_ref).await?;
        let batches = df.collect().await?;
        if batches.iter().map(RecordBatch::num_rows).sum::<usize>() == 0 {
            return Err(Error::EmptyResult(format!(
                "{schema_name}.{table_name} is empty!"
            )));
        }
        Ok(batches)
    }

    /// Executes a literal SQL string; a zero-row result is fatal.
    pub async fn read_query(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        let df = self.ctx.sql(sql).await?;
        let batches = df.collect().await?;
        if batches.iter().map(RecordBatch::num_rows).sum::<usize>() == 0 {
            return Err(Error::EmptyResult("Query returned no results!".to_string()));
        }
        Ok(batches)
    }

    /// Loads a raw CSV file with the dataset escape convention, inferring the
    /// schema from the header and values.
    pub async fn load_csv(&self, path: &Path) -> Result<Vec<RecordBatch>> {
        let path_str = path
            .to_str()
            .ok_or_else(|| Error::InvalidArgument(format!("non UTF-8 path: {}", path.display())))?;
        let options = CsvReadOptions::new().escape(CSV_ESCAPE);
        let df = self.ctx.read_csv(path_str, options).await?;
        Ok(df.collect().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::io::Write;

    fn sample_batch(ids: &[i64], names: &[&str]) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(ids.to_vec())),
                Arc::new(StringArray::from(names.to_vec())),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn schema_creation_is_idempotent() {
        let warehouse = Warehouse::new();
        warehouse.create_schema_if_not_exists("staging").await.unwrap();
        warehouse.create_schema_if_not_exists("staging").await.unwrap();
    }

    #[tokio::test]
    async fn replace_with_zero_rows_fails() {
        let warehouse = Warehouse::new();
        let err = warehouse
            .replace_table(vec![], "t", "public")
            .await
            .unwrap_err();
        assert!(err.is_empty_result());
    }

    #[tokio::test]
    async fn write_then_read_returns_the_written_rows() {
        let warehouse = Warehouse::new();
        warehouse
            .replace_table(vec![sample_batch(&[1, 2], &["a", "b"])], "t", "public")
            .await
            .unwrap();

        let batches = warehouse.read_table("t", "public").await.unwrap();
        let rows: usize = batches.iter().map(RecordBatch::num_rows).sum();
        assert_eq!(rows, 2);
    }

    #[tokio::test]
    async fn replace_fully_supersedes_previous_contents() {
        let warehouse = Warehouse::new();
        warehouse
            .replace_table(vec![sample_batch(&[1, 2], &["a", "b"])], "t", "public")
            .await
            .unwrap();
        warehouse
            .replace_table(vec![sample_batch(&[9], &["z"])], "t", "public")
            .await
            .unwrap();

        let batches = warehouse
            .read_query("select id from public.t")
            .await
            .unwrap();
        let rows: usize = batches.iter().map(RecordBatch::num_rows).sum();
        assert_eq!(rows, 1);
        let ids = batches[0]
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(ids.value(0), 9);
    }

    #[tokio::test]
    async fn write_into_missing_schema_fails() {
        let warehouse = Warehouse::new();
        let err = warehouse
            .replace_table(vec![sample_batch(&[1], &["a"])], "t", "nowhere")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn empty_query_result_is_fatal() {
        let warehouse = Warehouse::new();
        warehouse
            .replace_table(vec![sample_batch(&[1], &["a"])], "t", "public")
            .await
            .unwrap();
        let err = warehouse
            .read_query("select * from public.t where id < 0")
            .await
            .unwrap_err();
        assert!(err.is_empty_result());
    }

    #[tokio::test]
    async fn csv_load_honors_the_escape_character() {
        let mut file = tempfile::NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "id,comment").unwrap();
        writeln!(file, "1,\"a \\\"quoted\\\" word\"").unwrap();
        file.flush().unwrap();

        let warehouse = Warehouse::new();
        let batches = warehouse.load_csv(file.path()).await.unwrap();
        let comments = batches[0]
            .column_by_name("comment")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(comments.value(0), "a \"quoted\" word");
    }
}
