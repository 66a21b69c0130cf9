//! Contrato de features del clasificador de propinas.
//!
//! Es la única fuente de verdad para nombres de columnas, su rol en el
//! modelo, el tipo con el que se guardan en el warehouse y los nombres de
//! los tensores transformados. La query de origen, el transform y la
//! configuración de explicaciones se derivan de aquí.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const FEATURE_NAMES: [&str; 11] = ["trip_month",
                                       "trip_day",
                                       "trip_day_of_week",
                                       "trip_hour",
                                       "trip_seconds",
                                       "trip_miles",
                                       "payment_type",
                                       "pickup_grid",
                                       "dropoff_grid",
                                       "euclidean",
                                       "loc_cross"];

pub const TARGET_FEATURE_NAME: &str = "tip_bin";

pub const TARGET_LABELS: [&str; 2] = ["tip<20%", "tip>=20%"];

pub const NUMERICAL_FEATURE_NAMES: [&str; 3] = ["trip_seconds", "trip_miles", "euclidean"];

/// Categóricas con embedding: nombre -> ancho del embedding.
pub const EMBEDDING_CATEGORICAL_FEATURES: [(&str, usize); 6] = [("trip_month", 2),
                                                                ("trip_day", 4),
                                                                ("trip_hour", 3),
                                                                ("pickup_grid", 3),
                                                                ("dropoff_grid", 3),
                                                                ("loc_cross", 10)];

/// Categóricas codificadas one-hot; el tamaño sale del vocabulario.
pub const ONEHOT_CATEGORICAL_FEATURE_NAMES: [&str; 2] = ["payment_type", "trip_day_of_week"];

/// Buckets OOV que añade el vocabulario de cada categórica.
pub const NUM_OOV_BUCKETS: u32 = 1;

const TRANSFORMED_SUFFIX: &str = "_xf";

/// Tipo de almacenamiento de la columna cruda. Decide el centinela de nulos
/// en la query (`'NA'` para strings, `-1` para el resto), que no coincide con
/// el rol en el modelo: los campos de fecha son enteros pero categóricos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Integer,
    Float,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureRole {
    Numeric,
    EmbeddedCategorical { width: usize },
    OneHotCategorical,
}

static COLUMN_TYPES: Lazy<IndexMap<&'static str, ColumnType>> = Lazy::new(|| {
    IndexMap::from([("trip_month", ColumnType::Integer),
                    ("trip_day", ColumnType::Integer),
                    ("trip_day_of_week", ColumnType::Integer),
                    ("trip_hour", ColumnType::Integer),
                    ("trip_seconds", ColumnType::Integer),
                    ("trip_miles", ColumnType::Float),
                    ("payment_type", ColumnType::String),
                    ("pickup_grid", ColumnType::String),
                    ("dropoff_grid", ColumnType::String),
                    ("euclidean", ColumnType::Float),
                    ("loc_cross", ColumnType::String)])
});

pub fn transformed_name(key: &str) -> String {
    format!("{key}{TRANSFORMED_SUFFIX}")
}

/// Quita un único sufijo `_xf` final; el resto del nombre no se toca.
pub fn original_name(key: &str) -> &str {
    key.strip_suffix(TRANSFORMED_SUFFIX).unwrap_or(key)
}

pub fn vocabulary_name(key: &str) -> String {
    format!("{key}_vocab")
}

/// Categóricas con embedding seguidas de las one-hot.
pub fn categorical_feature_names() -> Vec<&'static str> {
    EMBEDDING_CATEGORICAL_FEATURES.iter()
                                  .map(|(name, _)| *name)
                                  .chain(ONEHOT_CATEGORICAL_FEATURE_NAMES)
                                  .collect()
}

pub fn feature_role(name: &str) -> Option<FeatureRole> {
    if NUMERICAL_FEATURE_NAMES.contains(&name) {
        return Some(FeatureRole::Numeric);
    }
    if let Some((_, width)) = EMBEDDING_CATEGORICAL_FEATURES.iter().find(|(n, _)| *n == name) {
        return Some(FeatureRole::EmbeddedCategorical { width: *width });
    }
    ONEHOT_CATEGORICAL_FEATURE_NAMES.contains(&name)
                                    .then_some(FeatureRole::OneHotCategorical)
}

pub fn column_type(name: &str) -> Option<ColumnType> {
    COLUMN_TYPES.get(name).copied()
}

/// Operación que el transform aplica a una feature cruda.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransformOp {
    ZScore,
    Vocabulary { num_oov_buckets: u32, vocab_filename: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTransform {
    pub input: String,
    pub output: String,
    pub op: TransformOp,
}

/// Plan del transform: numéricas escaladas a z-score, categóricas
/// convertidas a índice de vocabulario. El target pasa sin transformar.
pub fn transform_plan() -> Vec<FeatureTransform> {
    FEATURE_NAMES.iter()
                 .filter_map(|name| {
                     let op = match feature_role(name)? {
                         FeatureRole::Numeric => TransformOp::ZScore,
                         _ => TransformOp::Vocabulary { num_oov_buckets: NUM_OOV_BUCKETS,
                                                        vocab_filename: name.to_string() },
                     };
                     Some(FeatureTransform { input: name.to_string(),
                                             output: transformed_name(name),
                                             op })
                 })
                 .collect()
}

/// Metadatos de explicación que acompañan al modelo en el registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationConfig {
    pub inputs: IndexMap<String, Value>,
    pub outputs: IndexMap<String, Value>,
    pub params: Value,
}

impl ExplanationConfig {
    /// Parsea un documento JSON; exige las tres claves.
    pub fn from_json(raw: &str) -> Result<Self, crate::DomainError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_value(&self) -> Value {
        json!({
            "inputs": self.inputs,
            "outputs": self.outputs,
            "params": self.params,
        })
    }
}

/// Una entrada por feature en orden de contrato, salida `scores` y
/// atribución sampled-shapley con 10 caminos.
pub fn generate_explanation_config() -> ExplanationConfig {
    let inputs = FEATURE_NAMES.iter()
                              .map(|name| {
                                  let entry = match feature_role(name) {
                                      Some(FeatureRole::Numeric) => json!({
                                          "input_tensor_name": name,
                                          "modality": "numeric",
                                      }),
                                      _ => json!({
                                          "input_tensor_name": name,
                                          "encoding": "IDENTITY",
                                          "modality": "categorical",
                                      }),
                                  };
                                  (name.to_string(), entry)
                              })
                              .collect();
    let outputs = IndexMap::from([("scores".to_string(), json!({"output_tensor_name": "scores"}))]);
    ExplanationConfig { inputs,
                        outputs,
                        params: json!({"sampled_shapley_attribution": {"path_count": 10}}) }
}
