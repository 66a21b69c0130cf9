//! Payloads tipados guardados dentro de la ubicación de un artifact.
//!
//! Algunos artifacts (p. ej. `HyperParameters`) son un único documento JSON
//! con nombre fijo bajo el `uri` del artifact. `ArtifactPayload` describe ese
//! documento con un tipo concreto, añade `schema_version` al escribir y
//! verifica kind + versión + validación al leer.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::{Artifact, ArtifactKind, OutputArtifact};
use crate::storage::{join_uri, ObjectStore};

/// Errores posibles al decodificar un payload tipado.
#[derive(Debug, Error)]
pub enum ArtifactDecodeError {
    #[error("artifact kind mismatch: expected {expected}, found {found}")]
    KindMismatch { expected: ArtifactKind, found: ArtifactKind },
    #[error("schema version mismatch: expected {expected}, found {found:?}")]
    VersionMismatch { expected: u32, found: Option<u32> },
    #[error("payload deserialize: {0}")]
    Deserialize(String),
    #[error("payload validation: {0}")]
    Validation(String),
    #[error("payload storage: {0}")]
    Storage(String),
}

impl From<ArtifactDecodeError> for crate::errors::CoreEngineError {
    fn from(e: ArtifactDecodeError) -> Self {
        match e {
            ArtifactDecodeError::Storage(msg) => Self::Storage(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

pub trait ArtifactPayload: Sized + Serialize + DeserializeOwned {
    /// Kind del artifact que contiene el documento.
    const KIND: ArtifactKind;
    /// Nombre del fichero dentro del `uri` del artifact.
    const FILE_NAME: &'static str;
    /// Versión de esquema (incrementar en cambios incompatibles).
    const SCHEMA_VERSION: u32 = 1;

    /// Validación semántica ligera (sin efectos secundarios).
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// Escribe el documento bajo el output y devuelve su ruta completa.
    fn write_to(&self, store: &dyn ObjectStore, output: &OutputArtifact) -> Result<String, ArtifactDecodeError> {
        if output.kind() != Self::KIND {
            return Err(ArtifactDecodeError::KindMismatch { expected: Self::KIND,
                                                           found: output.kind() });
        }
        self.validate().map_err(ArtifactDecodeError::Validation)?;
        let mut value = serde_json::to_value(self).map_err(|e| ArtifactDecodeError::Deserialize(e.to_string()))?;
        if let Value::Object(map) = &mut value {
            map.entry("schema_version".to_string())
               .or_insert(Value::from(Self::SCHEMA_VERSION));
        }
        let path = join_uri(output.uri(), Self::FILE_NAME);
        store.write_string(&path, &value.to_string())
             .map_err(|e| ArtifactDecodeError::Storage(e.to_string()))?;
        Ok(path)
    }

    /// Lee y valida el documento de un artifact congelado.
    fn read_from(store: &dyn ObjectStore, artifact: &Artifact) -> Result<Self, ArtifactDecodeError> {
        if artifact.kind() != Self::KIND {
            return Err(ArtifactDecodeError::KindMismatch { expected: Self::KIND,
                                                           found: artifact.kind() });
        }
        let raw = store.read_string(&join_uri(artifact.uri(), Self::FILE_NAME))
                       .map_err(|e| ArtifactDecodeError::Storage(e.to_string()))?;
        let value: Value = serde_json::from_str(&raw).map_err(|e| ArtifactDecodeError::Deserialize(e.to_string()))?;
        let found = value.get("schema_version").and_then(|v| v.as_u64()).map(|v| v as u32);
        if found != Some(Self::SCHEMA_VERSION) {
            return Err(ArtifactDecodeError::VersionMismatch { expected: Self::SCHEMA_VERSION,
                                                              found });
        }
        let decoded: Self = serde_json::from_value(value).map_err(|e| ArtifactDecodeError::Deserialize(e.to_string()))?;
        decoded.validate().map_err(ArtifactDecodeError::Validation)?;
        Ok(decoded)
    }
}
