use config::{Config, ConfigError};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub data: DataConfig,
    #[serde(default = "default_pipeline_config")]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    /// Directory holding the raw dataset CSV files.
    pub dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_pipeline_name")]
    pub name: String,
    /// Cron expression the external scheduler runs this pipeline on.
    /// Informational here; the runner executes a single run.
    #[serde(default = "default_schedule")]
    pub schedule: String,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_pipeline_config() -> PipelineConfig {
    PipelineConfig {
        name: default_pipeline_name(),
        schedule: default_schedule(),
        max_concurrent: default_max_concurrent(),
    }
}

fn default_pipeline_name() -> String {
    "carrier_review_etl".to_string()
}

fn default_schedule() -> String {
    "20 0 * * *".to_string()
}

fn default_max_concurrent() -> usize {
    3
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        // Build the configuration
        let config = builder.build()?;

        // Try to deserialize the entire configuration
        let settings: Settings = config.try_deserialize()?;

        debug!(
            data_dir = %settings.data.dir,
            max_concurrent = settings.pipeline.max_concurrent,
            "Loaded pipeline settings"
        );

        Ok(settings)
    }
}
