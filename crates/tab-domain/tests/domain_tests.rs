use std::cell::Cell;
use std::rc::Rc;

use chrono::{TimeZone, Utc};
use tab_domain::features::{self, FEATURE_NAMES, TARGET_FEATURE_NAME};
use tab_domain::hyperparams::{parse_hidden_units, PartialHyperParameters};
use tab_domain::query::{self, training_source_query, ML_USE_TRAIN};
use tab_domain::{DatasetCatalog, DatasetRecord, DomainError, ExplanationConfig, HyperParameters};

#[test]
fn transformed_name_round_trip_is_idempotent() {
    let names = FEATURE_NAMES.iter().copied().chain([TARGET_FEATURE_NAME]);
    for name in names {
        let xf = features::transformed_name(name);
        assert_eq!(features::transformed_name(features::original_name(&xf)), xf);
        assert_eq!(features::original_name(&xf), name);
    }
    assert_eq!(features::vocabulary_name("payment_type"), "payment_type_vocab");
}

#[test]
fn train_query_filters_split_and_selects_target() {
    let q = query::source_query("playground_us", "chicago_taxitrips_prep", Some("TRAIN"), None);
    assert!(q.contains("WHERE ML_use = 'TRAIN'"));
    assert!(q.contains("tip_bin"));
    assert!(!q.contains("LIMIT"));

    let serving = query::serving_source_query("playground_us", "chicago_taxitrips_prep", Some(0));
    assert!(!serving.contains("WHERE"));
    assert!(!serving.contains("tip_bin"));
    assert!(!serving.contains("LIMIT"));
}

#[test]
fn empty_split_tag_renders_a_serving_query() {
    let q = query::source_query("ds", "t", Some(""), None);
    assert_eq!(q, query::serving_source_query("ds", "t", None));
    assert!(!q.contains("WHERE"));
    assert!(!q.contains("tip_bin"));
}

#[test]
fn limit_is_appended_only_when_positive() {
    let q = query::source_query("ds", "t", None, Some(50));
    assert!(q.trim_end().ends_with("LIMIT 50"));
    assert!(!query::source_query("ds", "t", None, None).contains("LIMIT"));
}

#[test]
fn projections_follow_contract_order() {
    let q = query::source_query("ds", "t", None, None);
    let positions: Vec<usize> = FEATURE_NAMES.iter()
                                             .map(|n| q.find(&format!(") {n}")).unwrap())
                                             .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn explanation_config_shape() {
    let cfg = features::generate_explanation_config();
    let inputs: Vec<&str> = cfg.inputs.keys().map(String::as_str).collect();
    assert_eq!(inputs, FEATURE_NAMES.to_vec());
    assert_eq!(cfg.inputs["trip_miles"]["modality"], "numeric");
    assert_eq!(cfg.inputs["payment_type"]["encoding"], "IDENTITY");
    assert_eq!(cfg.outputs["scores"]["output_tensor_name"], "scores");
    assert_eq!(cfg.params["sampled_shapley_attribution"]["path_count"], 10);

    let raw = cfg.to_value().to_string();
    assert_eq!(ExplanationConfig::from_json(&raw).unwrap(), cfg);
    assert!(ExplanationConfig::from_json(r#"{"inputs": {}}"#).is_err());
}

#[test]
fn hidden_units_and_defaults() {
    assert_eq!(parse_hidden_units("64,32").unwrap(), vec![64, 32]);
    let partial = PartialHyperParameters { num_epochs: Some(3),
                                           ..Default::default() };
    let hp = HyperParameters::update_with_defaults(partial).unwrap();
    assert_eq!(hp.num_epochs, 3);
    assert_eq!(hp.batch_size, 512);
    assert_eq!(hp.learning_rate, 0.0001);
    assert_eq!(hp.hidden_units, vec![64, 32]);
}

struct StubCatalog {
    records: Vec<DatasetRecord>,
    calls: Rc<Cell<u32>>,
}

impl DatasetCatalog for StubCatalog {
    fn list(&self, display_name: &str) -> Result<Vec<DatasetRecord>, DomainError> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.records.iter().filter(|r| r.display_name == display_name).cloned().collect())
    }
}

fn record(uri: &str, day: u32) -> DatasetRecord {
    DatasetRecord { display_name: "chicago-taxi-tips".into(),
                    resource_name: format!("datasets/{day}"),
                    source_uri: uri.into(),
                    update_time: Utc.with_ymd_and_hms(2021, 3, day, 0, 0, 0).unwrap() }
}

#[test]
fn training_query_uses_most_recent_dataset() {
    let calls = Rc::new(Cell::new(0));
    let catalog = StubCatalog { records: vec![record("bq://p.old_ds.old_tbl", 1), record("bq://p.new_ds.new_tbl", 2)],
                                calls: calls.clone() };
    let q = training_source_query(&catalog, "chicago-taxi-tips", ML_USE_TRAIN, Some(10)).unwrap();
    assert!(q.contains("FROM new_ds.new_tbl"));
    assert!(q.contains("LIMIT 10"));
    assert_eq!(calls.get(), 1);

    let missing = training_source_query(&catalog, "other", ML_USE_TRAIN, None);
    assert!(matches!(missing, Err(DomainError::NotFound(_))));
}
