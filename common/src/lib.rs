use arrow::error::ArrowError;
use datafusion::error::DataFusionError;
use thiserror::Error;

pub mod config;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("DataFusion error: {0}")]
    DataFusion(#[from] DataFusionError),

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Graph error: {0}")]
    Graph(String),
}

impl Error {
    /// True when the failure is the zero-row condition a step treats as fatal.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, Error::EmptyResult(_))
    }
}
