use serde::Serialize;
use serde_json::Value;

/// Insumos para calcular la clave de cache de un step.
/// NO es el fingerprint final (string hash) sino el modelo previo a canonicalizar.
#[derive(Serialize)]
pub struct StepFingerprintInput<'a> {
    pub engine_version: &'a str,
    pub step_id: &'a str,
    pub input_hashes: &'a [String], // ordenadas lexicográficamente antes de crear esta estructura
    pub params: &'a Value,          // canonicalizable
    pub definition_hash: &'a str,
}

impl StepFingerprintInput<'_> {
    pub fn hash(&self) -> String {
        let value = serde_json::to_value(self).unwrap_or(Value::Null);
        crate::hashing::hash_value(&value)
    }
}
