//! Payloads tipados guardados dentro de artifacts.

use serde::{Deserialize, Serialize};
use tab_core::{ArtifactKind, ArtifactPayload};
use tab_domain::HyperParameters;

/// Fichero de hiperparámetros dentro del artifact `HyperParameters`.
pub const HYPERPARAMETERS_FILE: &str = "hyperparameters.json";
/// Marcadores que el evaluator deja en la ubicación del `ModelBlessing`.
pub const BLESSED_MARKER: &str = "BLESSED";
pub const NOT_BLESSED_MARKER: &str = "NOT_BLESSED";

/// Propiedad entera `blessed` (1/0) del artifact `ModelBlessing`.
pub const BLESSED_PROPERTY: &str = "blessed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperParametersArtifact {
    #[serde(flatten)]
    pub values: HyperParameters,
}

impl ArtifactPayload for HyperParametersArtifact {
    const KIND: ArtifactKind = ArtifactKind::HyperParameters;
    const FILE_NAME: &'static str = HYPERPARAMETERS_FILE;

    fn validate(&self) -> Result<(), String> {
        self.values.validate().map_err(|e| e.to_string())
    }
}

/// Lee la decisión de un artifact `ModelBlessing`. Sin propiedad se
/// considera no bendecido.
pub fn is_blessed(blessing: &tab_core::Artifact) -> bool {
    blessing.int_property(BLESSED_PROPERTY) == Some(1)
}
