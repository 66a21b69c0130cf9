//! Merge de parámetros JSON.
//!
//! Merge "shallow": las claves de `b` reemplazan a las de `a`. Los params de
//! los componentes son structs planos, así que no hace falta deep-merge.

use serde_json::Value;

/// Keys from `b` override keys from `a` when both are objects.
/// Cuando alguno de los dos valores no es objeto, `b` tiene precedencia.
pub fn merge_json(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Object(ma), Value::Object(mb)) => {
            let mut out = ma.clone();
            for (k, v) in mb.iter() {
                out.insert(k.clone(), v.clone());
            }
            Value::Object(out)
        }
        // null no pisa nada
        (_, Value::Null) => a.clone(),
        (_, other) => other.clone(),
    }
}
