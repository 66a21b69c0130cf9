//! Configuración del pipeline.
//!
//! Se resuelve una sola vez desde el entorno (cargando antes `.env` si existe)
//! y queda inmutable; los componentes la reciben por referencia a través del
//! ensamblador y nunca leen variables de entorno por su cuenta.
use std::env;

use once_cell::sync::Lazy;
use tab_adapters::services::{ExtractionOptions, JobResources};
use tab_adapters::steps::HyperparametersGenParams;
use tab_core::join_uri;
use tab_domain::hyperparams::parse_hidden_units;
use thiserror::Error;

pub const DIRECT_RUNNER: &str = "DirectRunner";
pub const DATAFLOW_RUNNER: &str = "DataflowRunner";
const SETUP_FILE: &str = "./setup.py";

// `.env` se carga como mucho una vez por proceso.
static DOTENV: Lazy<bool> = Lazy::new(|| dotenvy::dotenv().is_ok());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required setting `{0}` is not set")]
    Missing(&'static str),
    #[error("invalid value `{value}` for `{key}`")]
    Invalid { key: &'static str, value: String },
}

/// Configuración inmutable de los pipelines de entrenamiento y predicción.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub project: String,
    pub region: String,
    pub gcs_location: String,
    /// Raíz de las ubicaciones de artifacts.
    pub artifact_store_uri: String,
    /// Destino versionado del pusher; el publisher toma de aquí la última versión.
    pub model_registry_uri: String,
    pub dataset_display_name: String,
    pub model_display_name: String,
    /// Endpoint de serving online al que se despliega el modelo publicado.
    pub endpoint_display_name: String,
    pub pipeline_name: String,
    pub train_limit: u64,
    pub test_limit: u64,
    pub serve_limit: u64,
    pub accuracy_threshold: f64,
    pub beam_runner: String,
    pub serving_runtime: String,
    pub batch_prediction_dataset: String,
    pub batch_prediction_table: String,
    pub batch_job_resources: JobResources,
    pub datastore_kind: String,
    pub enable_cache: bool,
    pub upload_model: bool,
    pub hyperparameters: HyperparametersGenParams,
}

struct Lookup<F>(F);

impl<F> Lookup<F> where F: Fn(&str) -> Option<String>
{
    // Un valor vacío cuenta como ausente.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn or(&self, key: &str, default: impl Into<String>) -> String {
        self.get(key).unwrap_or_else(|| default.into())
    }

    fn parsed<T: std::str::FromStr>(&self, key: &'static str) -> Result<Option<T>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value.parse().map(Some).map_err(|_| ConfigError::Invalid { key, value }),
        }
    }

    fn flag(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => parse_flag(&value).ok_or(ConfigError::Invalid { key, value }),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

impl PipelineConfig {
    /// Lee la configuración del entorno del proceso (tras cargar `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        Lazy::force(&DOTENV);
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resuelve la configuración con una función de búsqueda arbitraria.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
        where F: Fn(&str) -> Option<String>
    {
        let env = Lookup(lookup);
        let project = env.required("PROJECT")?;
        let region = env.or("REGION", "us-central1");
        let gcs_location = env.required("GCS_LOCATION")?;
        let artifact_store_uri = env.or("ARTIFACT_STORE_URI", join_uri(&gcs_location, "tfx_artifacts"));
        let model_registry_uri = env.or("MODEL_REGISTRY_URI", join_uri(&gcs_location, "model_registry"));
        let dataset_display_name = env.or("DATASET_DISPLAY_NAME", "chicago-taxi-tips");
        let model_display_name = env.or("MODEL_DISPLAY_NAME", format!("{dataset_display_name}-classifier"));
        let endpoint_display_name = env.or("ENDPOINT_DISPLAY_NAME", format!("{model_display_name}-endpoint"));
        let pipeline_name = env.or("PIPELINE_NAME", format!("{model_display_name}-train-pipeline"));

        let accuracy_threshold = env.parsed::<f64>("ACCURACY_THRESHOLD")?.unwrap_or(0.8);
        if !(0.0..=1.0).contains(&accuracy_threshold) {
            return Err(ConfigError::Invalid { key: "ACCURACY_THRESHOLD",
                                              value: accuracy_threshold.to_string() });
        }

        let beam_runner = env.or("BEAM_RUNNER", DIRECT_RUNNER);
        if beam_runner != DIRECT_RUNNER && beam_runner != DATAFLOW_RUNNER {
            return Err(ConfigError::Invalid { key: "BEAM_RUNNER",
                                              value: beam_runner });
        }

        let hidden_units = env.get("HIDDEN_UNITS");
        if let Some(raw) = &hidden_units {
            parse_hidden_units(raw).map_err(|_| ConfigError::Invalid { key: "HIDDEN_UNITS",
                                                                       value: raw.clone() })?;
        }
        let hyperparameters = HyperparametersGenParams { num_epochs: env.parsed("NUM_EPOCHS")?,
                                                         batch_size: env.parsed("BATCH_SIZE")?,
                                                         learning_rate: env.parsed("LEARNING_RATE")?,
                                                         hidden_units };

        let batch_job_resources = JobResources { machine_type: env.or("BATCH_MACHINE_TYPE", "n1-standard-2"),
                                                 starting_replica_count: env.parsed("BATCH_STARTING_REPLICAS")?
                                                                            .unwrap_or(1),
                                                 max_replica_count: env.parsed("BATCH_MAX_REPLICAS")?.unwrap_or(10),
                                                 accelerator_type: env.get("BATCH_ACCELERATOR_TYPE"),
                                                 accelerator_count: env.parsed("BATCH_ACCELERATOR_COUNT")? };

        Ok(Self { project,
                  region,
                  artifact_store_uri,
                  model_registry_uri,
                  train_limit: env.parsed("TRAIN_LIMIT")?.unwrap_or(0),
                  test_limit: env.parsed("TEST_LIMIT")?.unwrap_or(0),
                  serve_limit: env.parsed("SERVE_LIMIT")?.unwrap_or(0),
                  accuracy_threshold,
                  beam_runner,
                  serving_runtime: env.or("SERVING_RUNTIME", "tf2-cpu.2-4"),
                  batch_prediction_dataset: env.or("BATCH_PREDICTION_BQ_DATASET_NAME", "playground_us"),
                  batch_prediction_table: env.or("BATCH_PREDICTION_BQ_TABLE_NAME", "chicago_taxitrips_prep"),
                  batch_job_resources,
                  datastore_kind: env.or("DATASTORE_PREDICTION_KIND", format!("{model_display_name}-predictions")),
                  enable_cache: env.flag("ENABLE_CACHE", false)?,
                  upload_model: env.flag("UPLOAD_MODEL", true)?,
                  hyperparameters,
                  gcs_location,
                  dataset_display_name,
                  model_display_name,
                  endpoint_display_name,
                  pipeline_name })
    }

    pub fn is_dataflow(&self) -> bool {
        self.beam_runner == DATAFLOW_RUNNER
    }

    pub fn temp_location(&self) -> String {
        join_uri(&self.gcs_location, "temp")
    }

    pub fn serving_image_uri(&self) -> String {
        format!("gcr.io/cloud-aiplatform/prediction/{}:latest", self.serving_runtime)
    }

    /// Opciones del job de extracción según el runner elegido. Dataflow
    /// necesita además región, staging y el fichero de setup.
    pub fn extraction_options(&self) -> ExtractionOptions {
        let dataflow = self.is_dataflow();
        ExtractionOptions { runner: self.beam_runner.clone(),
                            project: self.project.clone(),
                            region: dataflow.then(|| self.region.clone()),
                            temp_location: self.temp_location(),
                            staging_location: dataflow.then(|| self.temp_location()),
                            setup_file: dataflow.then(|| SETUP_FILE.to_string()) }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<PipelineConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        PipelineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    const BASE: [(&str, &str); 2] = [("PROJECT", "proj"), ("GCS_LOCATION", "gs://bucket/demo/")];

    #[test]
    fn defaults_derive_from_names() {
        let cfg = config_from(&BASE).unwrap();
        assert_eq!(cfg.region, "us-central1");
        assert_eq!(cfg.artifact_store_uri, "gs://bucket/demo/tfx_artifacts");
        assert_eq!(cfg.model_registry_uri, "gs://bucket/demo/model_registry");
        assert_eq!(cfg.model_display_name, "chicago-taxi-tips-classifier");
        assert_eq!(cfg.endpoint_display_name, "chicago-taxi-tips-classifier-endpoint");
        assert_eq!(cfg.pipeline_name, "chicago-taxi-tips-classifier-train-pipeline");
        assert_eq!(cfg.datastore_kind, "chicago-taxi-tips-classifier-predictions");
        assert_eq!(cfg.serving_image_uri(), "gcr.io/cloud-aiplatform/prediction/tf2-cpu.2-4:latest");
        assert_eq!(cfg.batch_job_resources.max_replica_count, 10);
        assert!(!cfg.enable_cache);
        assert!(cfg.upload_model);
        assert_eq!(cfg.accuracy_threshold, 0.8);
    }

    #[test]
    fn endpoint_name_follows_model_name_unless_set() {
        let mut pairs = BASE.to_vec();
        pairs.push(("MODEL_DISPLAY_NAME", "tips-v2"));
        let cfg = config_from(&pairs).unwrap();
        assert_eq!(cfg.endpoint_display_name, "tips-v2-endpoint");

        pairs.push(("ENDPOINT_DISPLAY_NAME", "taxi-online"));
        let cfg = config_from(&pairs).unwrap();
        assert_eq!(cfg.endpoint_display_name, "taxi-online");
        assert_eq!(cfg.model_display_name, "tips-v2");
    }

    #[test]
    fn missing_project_fails_fast() {
        let err = config_from(&[("GCS_LOCATION", "gs://b")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("PROJECT"));
        let err = config_from(&[("PROJECT", "p"), ("GCS_LOCATION", "  ")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("GCS_LOCATION"));
    }

    #[test]
    fn flags_accept_words_and_digits() {
        let mut pairs = BASE.to_vec();
        pairs.extend([("ENABLE_CACHE", "TRUE"), ("UPLOAD_MODEL", "0")]);
        let cfg = config_from(&pairs).unwrap();
        assert!(cfg.enable_cache);
        assert!(!cfg.upload_model);

        let mut pairs = BASE.to_vec();
        pairs.push(("ENABLE_CACHE", "yes"));
        assert_eq!(config_from(&pairs).unwrap_err(),
                   ConfigError::Invalid { key: "ENABLE_CACHE",
                                          value: "yes".into() });
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let mut pairs = BASE.to_vec();
        pairs.push(("TRAIN_LIMIT", "-5"));
        assert!(matches!(config_from(&pairs), Err(ConfigError::Invalid { key: "TRAIN_LIMIT", .. })));

        let mut pairs = BASE.to_vec();
        pairs.push(("HIDDEN_UNITS", "64,,32"));
        assert!(matches!(config_from(&pairs), Err(ConfigError::Invalid { key: "HIDDEN_UNITS", .. })));

        let mut pairs = BASE.to_vec();
        pairs.push(("ACCURACY_THRESHOLD", "1.5"));
        assert!(matches!(config_from(&pairs), Err(ConfigError::Invalid { key: "ACCURACY_THRESHOLD", .. })));
    }

    #[test]
    fn dataflow_runner_adds_region_and_setup() {
        let direct = config_from(&BASE).unwrap().extraction_options();
        assert_eq!(direct.region, None);
        assert_eq!(direct.temp_location, "gs://bucket/demo/temp");

        let mut pairs = BASE.to_vec();
        pairs.push(("BEAM_RUNNER", "DataflowRunner"));
        let dataflow = config_from(&pairs).unwrap().extraction_options();
        assert_eq!(dataflow.runner, "DataflowRunner");
        assert_eq!(dataflow.region.as_deref(), Some("us-central1"));
        assert_eq!(dataflow.setup_file.as_deref(), Some("./setup.py"));

        let mut pairs = BASE.to_vec();
        pairs.push(("BEAM_RUNNER", "SparkRunner"));
        assert!(config_from(&pairs).is_err());
    }
}
