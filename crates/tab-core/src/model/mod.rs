//! Modelos neutrales (Artifact, propiedades, contexto de ejecución,
//! fingerprint, payloads tipados).

pub mod artifact;
pub mod context;
pub mod fingerprint;
pub mod typed_artifact;

pub use artifact::{Artifact, ArtifactKind, OutputArtifact, PropertyValue};
pub use context::ExecutionContext;
pub use fingerprint::StepFingerprintInput;
pub use typed_artifact::{ArtifactDecodeError, ArtifactPayload};
