mod common;

use common::{config, prediction_services};
use tab_adapters::steps::batch_prediction;
use tabflow::{engine_for, prediction_pipeline, RunSummary, StepState};
use uuid::Uuid;

#[test]
fn serving_run_scores_and_writes_every_shard() {
    let root = tempfile::tempdir().unwrap();
    let cfg = config(&root.path().to_string_lossy(), &[("SERVE_LIMIT", "500")]);
    let p = prediction_services();
    let def = prediction_pipeline(&cfg, &p.services).unwrap();
    assert_eq!(def.step_ids(), vec!["data_extraction", "batch_prediction", "prediction_writer"]);

    let mut engine = engine_for(&cfg).build();
    let flow_id = Uuid::new_v4();
    engine.run_flow(flow_id, &def).unwrap();

    let query = &p.runner.jobs.borrow()[0].query;
    assert!(query.contains("FROM playground_us.chicago_taxitrips_prep"));
    assert!(!query.contains("ML_use"));
    assert!(query.ends_with("LIMIT 500"));

    let request = &p.batch.submits.borrow()[0];
    assert_eq!(request.model_display_name, "chicago-taxi-tips-classifier");
    assert_eq!(request.resources.machine_type, "n1-standard-2");
    assert_eq!(p.batch.polls.get(), 2);

    let results = engine.output_artifact(flow_id, &def, batch_prediction::STEP_ID, batch_prediction::OUTPUT)
                        .unwrap();
    assert_eq!(results.string_property(batch_prediction::JOB_PROPERTY), Some("batchPredictionJobs/9"));

    let writes = p.sink.writes.borrow();
    assert_eq!(writes.len(), 3);
    assert!(writes.iter()
                  .all(|(kind, n)| kind == "chicago-taxi-tips-classifier-predictions" && *n == 2));
}

#[test]
fn cache_reuses_outputs_across_runs() {
    let root = tempfile::tempdir().unwrap();
    let cfg = config(&root.path().to_string_lossy(), &[("ENABLE_CACHE", "1")]);
    let p = prediction_services();
    let def = prediction_pipeline(&cfg, &p.services).unwrap();
    let mut engine = engine_for(&cfg).build();
    assert!(engine.cache_enabled());

    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    engine.run_flow(first, &def).unwrap();
    engine.run_flow(second, &def).unwrap();

    assert_eq!(p.runner.jobs.borrow().len(), 1);
    assert_eq!(p.batch.submits.borrow().len(), 1);
    assert_eq!(p.sink.writes.borrow().len(), 3);
    let summary = RunSummary::from_events(second, &engine.events_for(second));
    assert!(summary.steps.values().all(|s| s.state == StepState::Cached));
    assert_eq!(engine.flow_fingerprint(first), engine.flow_fingerprint(second));
}
