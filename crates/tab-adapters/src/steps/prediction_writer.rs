//! PredictionWriterStep (Sink)
//!
//! Entrega los resultados del scoring al store operacional. El job de
//! scoring deja un único subdirectorio bajo la ubicación del artifact; cada
//! shard `prediction.results-*` se envía al sink en una sola llamada.

use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tab_core::{join_uri, ArtifactKind, CoreEngineError, ExecutionContext, ObjectStore, PortSpec, StepKind, StepOutcome,
               TypedStep};

use crate::services::PredictionSink;

pub const STEP_ID: &str = "prediction_writer";
pub const INPUT_RESULTS: &str = "prediction_results";
pub const RESULTS_SHARD_PATTERN: &str = "prediction.results-*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionWriterParams {
    pub datastore_kind: String,
    pub predictions_format: String,
}

#[derive(Debug)]
pub struct PredictionWriterStep {
    params: PredictionWriterParams,
    store: Arc<dyn ObjectStore>,
    sink: Arc<dyn PredictionSink>,
}

impl PredictionWriterStep {
    pub fn new(params: PredictionWriterParams, store: Arc<dyn ObjectStore>, sink: Arc<dyn PredictionSink>) -> Self {
        Self { params, store, sink }
    }
}

/// Un documento JSON por línea no vacía.
fn parse_records(shard: &str, raw: &str) -> Result<Vec<Value>, CoreEngineError> {
    raw.lines()
       .filter(|l| !l.trim().is_empty())
       .map(|l| {
           serde_json::from_str(l).map_err(|e| CoreEngineError::Storage(format!("bad record in {shard}: {e}")))
       })
       .collect()
}

impl TypedStep for PredictionWriterStep {
    type Params = PredictionWriterParams;

    fn id(&self) -> &str {
        STEP_ID
    }

    fn kind(&self) -> StepKind {
        StepKind::Sink
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(INPUT_RESULTS, ArtifactKind::PredictionResults)]
    }

    fn params(&self) -> &PredictionWriterParams {
        &self.params
    }

    fn run_typed(&self, ctx: &ExecutionContext, p: PredictionWriterParams) -> Result<StepOutcome, CoreEngineError> {
        let results = ctx.input(INPUT_RESULTS)?;
        let job_dir = self.store
                          .list_subdirs(results.uri())?
                          .into_iter()
                          .next()
                          .ok_or_else(|| CoreEngineError::Storage(format!("no results directory under {}", results.uri())))?;
        let pattern = join_uri(&join_uri(results.uri(), &job_dir), RESULTS_SHARD_PATTERN);
        let shards = self.store.glob(&pattern)?;
        info!("Storing predictions ({}) to kind {}: {} shards", p.predictions_format, p.datastore_kind, shards.len());
        for shard in &shards {
            let records = parse_records(shard, &self.store.read_string(shard)?)?;
            self.sink.write(&p.datastore_kind, &records)?;
        }
        info!("Predictions are stored.");
        Ok(StepOutcome::default())
    }
}
