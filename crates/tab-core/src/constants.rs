//! Constantes del motor core.
//!
//! Valores estáticos que participan en el cálculo de fingerprints y claves de
//! cache. Cambiar `ENGINE_VERSION` invalida todas las entradas de cache
//! previas aunque la definición y los datos no cambien.

/// Versión lógica del motor. Forma parte de cada fingerprint de step.
pub const ENGINE_VERSION: &str = "T1.0";
