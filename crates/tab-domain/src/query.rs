//! Construcción de la query SQL que extrae las filas del warehouse.
//!
//! Los nombres de dataset/tabla y la etiqueta de split se interpolan tal
//! cual: vienen de configuración de confianza y no se validan contra
//! inyección.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::features::{column_type, ColumnType, FEATURE_NAMES, TARGET_FEATURE_NAME};
use crate::DomainError;

/// Split que se entrena (`ML_use = 'TRAIN'`).
pub const ML_USE_TRAIN: &str = "TRAIN";
/// Split de evaluación.
pub const ML_USE_TEST: &str = "TEST";

/// Tabla de origen en el warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTable {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl SourceTable {
    /// Parsea `bq://project.dataset.table`.
    pub fn parse_uri(uri: &str) -> Result<Self, DomainError> {
        let rest = uri.strip_prefix("bq://")
                      .ok_or_else(|| DomainError::Validation(format!("unsupported source uri `{uri}`")))?;
        let parts: Vec<&str> = rest.split('.').collect();
        match parts.as_slice() {
            [project, dataset, table] if !project.is_empty() && !dataset.is_empty() && !table.is_empty() => {
                Ok(Self { project: project.to_string(),
                          dataset: dataset.to_string(),
                          table: table.to_string() })
            }
            _ => Err(DomainError::Validation(format!("expected bq://project.dataset.table, got `{uri}`"))),
        }
    }
}

/// Dataset registrado en el catálogo de la plataforma.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub display_name: String,
    pub resource_name: String,
    pub source_uri: String,
    pub update_time: DateTime<Utc>,
}

/// Catálogo de datasets; `list` devuelve los registros con ese display name
/// ordenados por `update_time` ascendente.
pub trait DatasetCatalog {
    fn list(&self, display_name: &str) -> Result<Vec<DatasetRecord>, DomainError>;
}

fn projection(name: &str) -> String {
    let sentinel = match column_type(name) {
        Some(ColumnType::String) => "'NA'",
        _ => "-1",
    };
    format!("IF({name} IS NULL, {sentinel}, {name}) {name}")
}

/// Query de extracción: una proyección por feature cruda, en orden de
/// contrato. Con `ml_use` añade el target y filtra por split; un tag vacío
/// cuenta como ausente y un `limit` de 0 equivale a sin límite.
pub fn source_query(dataset: &str, table: &str, ml_use: Option<&str>, limit: Option<u64>) -> String {
    let columns: Vec<String> = FEATURE_NAMES.iter().map(|name| projection(name)).collect();
    let mut query = format!("SELECT\n    {}", columns.join(",\n    "));
    match ml_use.filter(|tag| !tag.is_empty()) {
        Some(tag) => {
            query.push_str(&format!(",\n    {TARGET_FEATURE_NAME}\nFROM {dataset}.{table}\nWHERE ML_use = '{tag}'\n"));
        }
        None => query.push_str(&format!("\nFROM {dataset}.{table}\n")),
    }
    if let Some(n) = limit.filter(|n| *n > 0) {
        query.push_str(&format!("LIMIT {n}"));
    }
    query
}

/// Query de scoring: sin target ni filtro de split.
pub fn serving_source_query(dataset: &str, table: &str, limit: Option<u64>) -> String {
    source_query(dataset, table, None, limit)
}

/// Query de entrenamiento a partir del dataset más recientemente actualizado
/// con ese display name en el catálogo.
pub fn training_source_query(catalog: &dyn DatasetCatalog,
                             dataset_display_name: &str,
                             ml_use: &str,
                             limit: Option<u64>)
                             -> Result<String, DomainError> {
    let records = catalog.list(dataset_display_name)?;
    let latest = records.last()
                        .ok_or_else(|| DomainError::NotFound(format!("dataset `{dataset_display_name}`")))?;
    let source = SourceTable::parse_uri(&latest.source_uri)?;
    debug!("training query for {ml_use} from {}.{}", source.dataset, source.table);
    Ok(source_query(&source.dataset, &source.table, Some(ml_use), limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_follows_storage_type() {
        let q = source_query("ds", "tbl", None, None);
        assert!(q.contains("IF(trip_month IS NULL, -1, trip_month) trip_month"));
        assert!(q.contains("IF(payment_type IS NULL, 'NA', payment_type) payment_type"));
        assert!(q.contains("IF(euclidean IS NULL, -1, euclidean) euclidean"));
        assert!(q.contains("FROM ds.tbl"));
    }

    #[test]
    fn parse_uri_requires_three_parts() {
        let t = SourceTable::parse_uri("bq://proj.playground_us.chicago_taxitrips_prep").unwrap();
        assert_eq!(t.dataset, "playground_us");
        assert_eq!(t.table, "chicago_taxitrips_prep");
        assert!(SourceTable::parse_uri("bq://proj.table").is_err());
        assert!(SourceTable::parse_uri("gs://proj.ds.table").is_err());
    }
}
