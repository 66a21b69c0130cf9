//! Artifact del flujo.
//!
//! Un `Artifact` es la unidad de datos intercambiada entre steps:
//! - `kind` se fija al crearlo y no cambia nunca.
//! - `uri` es el prefijo de almacenamiento asignado por el engine; el step
//!   productor escribe debajo de él una única vez y después es sólo lectura.
//! - `properties` son metadatos fuera de banda (ids de jobs, flags, nombres de
//!   recursos del registry).
//! - `hash` lo calcula `OutputArtifact::finalize` sobre el JSON canónico de
//!   `{kind, uri, properties}`.
//!
//! Mientras el step productor corre trabaja con un `OutputArtifact` mutable;
//! al terminar el engine lo congela en un `Artifact` que no expone mutadores.
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::hashing::hash_value;

/// Tipos de artifact que circulan por los pipelines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKind {
    Dataset,
    HyperParameters,
    TransformGraph,
    Model,
    ModelBlessing,
    PushedModel,
    UploadedModel,
    PredictionResults,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Valor de una propiedad custom (sólo enteros y strings).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PropertyValue {
    Int(i64),
    String(String),
}

/// Artifact congelado, producido por exactamente una ejecución de step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artifact {
    kind: ArtifactKind,
    uri: String,
    properties: BTreeMap<String, PropertyValue>,
    hash: String,
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }

    pub fn int_property(&self, key: &str) -> Option<i64> {
        match self.properties.get(key) {
            Some(PropertyValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn string_property(&self, key: &str) -> Option<&str> {
        match self.properties.get(key) {
            Some(PropertyValue::String(v)) => Some(v.as_str()),
            _ => None,
        }
    }
}

/// Artifact en construcción. Sólo el step que lo recibe del
/// `ExecutionContext` puede anotarle propiedades; el engine lo congela.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    name: String,
    kind: ArtifactKind,
    uri: String,
    properties: BTreeMap<String, PropertyValue>,
}

impl OutputArtifact {
    pub fn new(name: impl Into<String>, kind: ArtifactKind, uri: impl Into<String>) -> Self {
        Self { name: name.into(),
               kind,
               uri: uri.into(),
               properties: BTreeMap::new() }
    }

    /// Nombre del output declarado por el step.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn set_int_property(&mut self, key: impl Into<String>, value: i64) {
        self.properties.insert(key.into(), PropertyValue::Int(value));
    }

    pub fn set_string_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), PropertyValue::String(value.into()));
    }

    pub fn int_property(&self, key: &str) -> Option<i64> {
        match self.properties.get(key) {
            Some(PropertyValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Congela el artifact calculando su hash.
    pub fn finalize(self) -> Artifact {
        let hash = hash_value(&json!({
            "kind": self.kind,
            "uri": self.uri,
            "properties": self.properties,
        }));
        Artifact { kind: self.kind,
                   uri: self.uri,
                   properties: self.properties,
                   hash }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_hash_depends_on_properties() {
        let mut a = OutputArtifact::new("out", ArtifactKind::Dataset, "/tmp/a");
        let b = a.clone();
        a.set_string_property("job", "jobs/1");
        let a = a.finalize();
        let b = b.finalize();
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.string_property("job"), Some("jobs/1"));
        assert_eq!(a.int_property("job"), None);
    }

    #[test]
    fn property_values_roundtrip_untagged() {
        let mut a = OutputArtifact::new("out", ArtifactKind::UploadedModel, "/tmp/m");
        a.set_int_property("uploaded", 1);
        a.set_string_property("model_uri", "models/42");
        let frozen = a.finalize();
        let json = serde_json::to_value(&frozen).unwrap();
        assert_eq!(json["properties"]["uploaded"], 1);
        let back: Artifact = serde_json::from_value(json).unwrap();
        assert_eq!(back, frozen);
    }
}
