mod common;

use std::sync::Arc;

use common::{StubBatch, StubRunner, StubSink};
use tab_adapters::services::{ExtractionOptions, JobResources, OutputFormat};
use tab_adapters::steps::{batch_prediction, extraction, prediction_writer, BatchPredictionParams, BatchPredictionStep,
                          DataExtractionParams, DataExtractionStep, PredictionWriterParams, PredictionWriterStep};
use tab_adapters::{JobHandle, JobState};
use tab_core::{CoreEngineError, FlowDefinition, FlowDefinitionBuilder, FlowEngine, FlowEventKind, LocalObjectStore,
               ObjectStore};
use uuid::Uuid;

fn extraction_params() -> DataExtractionParams {
    DataExtractionParams { query: "SELECT 1".into(),
                           output_format: OutputFormat::Jsonl,
                           options: ExtractionOptions { runner: "DirectRunner".into(),
                                                        project: "proj".into(),
                                                        region: None,
                                                        temp_location: "/tmp/beam".into(),
                                                        staging_location: None,
                                                        setup_file: None } }
}

fn batch_params() -> BatchPredictionParams {
    BatchPredictionParams { project: "proj".into(),
                            region: "us-central1".into(),
                            model_display_name: "taxi-classifier".into(),
                            instances_format: "jsonl".into(),
                            predictions_format: "jsonl".into(),
                            job_resources: JobResources { machine_type: "n1-standard-2".into(),
                                                          starting_replica_count: 1,
                                                          max_replica_count: 10,
                                                          accelerator_type: None,
                                                          accelerator_count: None },
                            poll_interval_secs: 0 }
}

fn definition(runner: Arc<StubRunner>, batch: Arc<StubBatch>, sink: Arc<StubSink>) -> FlowDefinition {
    let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new());
    FlowDefinitionBuilder::new().step(DataExtractionStep::new("data_extraction", extraction_params(), runner))
                                .step(BatchPredictionStep::new(batch_params(), batch))
                                .wire(batch_prediction::INPUT_DATASET, "data_extraction", extraction::OUTPUT)
                                .step(PredictionWriterStep::new(PredictionWriterParams { datastore_kind:
                                                                                             "taxi-predictions".into(),
                                                                                         predictions_format:
                                                                                             "jsonl".into() },
                                                                store,
                                                                sink))
                                .wire(prediction_writer::INPUT_RESULTS,
                                      batch_prediction::STEP_ID,
                                      batch_prediction::OUTPUT)
                                .build()
                                .unwrap()
}

#[test]
fn extraction_scoring_and_writer_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    let runner = Arc::new(StubRunner { shards: 2,
                                       ..Default::default() });
    let batch = Arc::new(StubBatch::succeeding(2, 3));
    let sink = Arc::new(StubSink::default());
    let def = definition(runner.clone(), batch.clone(), sink.clone());

    let mut engine = FlowEngine::new().pipeline_root(root.path().to_string_lossy()).build();
    let flow_id = Uuid::new_v4();
    engine.run_flow(flow_id, &def).unwrap();

    let job = &runner.jobs.borrow()[0];
    assert_eq!(job.job_name, format!("data_extraction-{flow_id}"));
    assert!(job.output_prefix.ends_with("/serving-data-"));

    let submitted = &batch.submits.borrow()[0];
    assert_eq!(submitted.job_name, format!("taxi-classifier-serving-{flow_id}"));
    assert!(submitted.source_uri_glob.ends_with("/serving-data-*.jsonl"));
    assert_eq!(batch.polls.get(), 3);

    let results = engine.output_artifact(flow_id, &def, batch_prediction::STEP_ID, batch_prediction::OUTPUT)
                        .unwrap();
    assert_eq!(results.string_property(batch_prediction::JOB_PROPERTY), Some("batchPredictionJobs/1"));
    let dataset = engine.output_artifact(flow_id, &def, "data_extraction", extraction::OUTPUT).unwrap();
    assert_eq!(dataset.string_property(extraction::EXTRACTION_JOB_PROPERTY),
               Some(format!("dataflow/data_extraction-{flow_id}").as_str()));

    let writes = sink.writes.borrow();
    assert_eq!(writes.len(), 3);
    assert!(writes.iter().all(|(kind, records)| kind == "taxi-predictions" && records.len() == 1));
    assert!(engine.flow_fingerprint(flow_id).is_some());
}

#[test]
fn in_flight_job_with_same_name_is_reused() {
    let root = tempfile::tempdir().unwrap();
    let flow_id = Uuid::new_v4();
    let batch = Arc::new(StubBatch::succeeding(1, 1));
    let existing = JobHandle { resource_name: "batchPredictionJobs/77".into(),
                               display_name: format!("taxi-classifier-serving-{flow_id}") };
    *batch.existing.borrow_mut() = Some((existing, JobState::Running));
    // el job reutilizado ya dejó sus resultados
    LocalObjectStore::new().write_string(&format!("{}/batch_prediction/prediction_results/{flow_id}-3/prediction-x/prediction.results-00000-of-00001",
                                                  root.path().display()),
                                         "{}\n")
                           .unwrap();
    let sink = Arc::new(StubSink::default());
    let def = definition(Arc::new(StubRunner { shards: 1,
                                               ..Default::default() }),
                         batch.clone(),
                         sink.clone());
    let mut engine = FlowEngine::new().pipeline_root(root.path().to_string_lossy()).build();
    engine.run_flow(flow_id, &def).unwrap();

    assert!(batch.submits.borrow().is_empty());
    let results = engine.output_artifact(flow_id, &def, batch_prediction::STEP_ID, batch_prediction::OUTPUT)
                        .unwrap();
    assert_eq!(results.string_property(batch_prediction::JOB_PROPERTY), Some("batchPredictionJobs/77"));
    assert_eq!(sink.writes.borrow().len(), 1);
}

#[test]
fn failed_job_stops_the_flow_before_the_writer() {
    let root = tempfile::tempdir().unwrap();
    let mut batch = StubBatch::succeeding(0, 1);
    batch.final_state = JobState::Failed("quota exceeded".into());
    let sink = Arc::new(StubSink::default());
    let def = definition(Arc::new(StubRunner { shards: 1,
                                               ..Default::default() }),
                         Arc::new(batch),
                         sink.clone());
    let mut engine = FlowEngine::new().pipeline_root(root.path().to_string_lossy()).build();
    let flow_id = Uuid::new_v4();
    let err = engine.run_flow(flow_id, &def).unwrap_err();

    assert!(matches!(&err, CoreEngineError::External(msg) if msg.contains("quota exceeded")));
    assert!(sink.writes.borrow().is_empty());
    let failed = engine.events_for(flow_id)
                       .into_iter()
                       .any(|e| matches!(e.kind, FlowEventKind::StepFailed { ref step_id, .. } if step_id == "batch_prediction"));
    assert!(failed);
}
