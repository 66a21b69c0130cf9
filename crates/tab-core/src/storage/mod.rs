//! Almacenamiento de artifacts.
//!
//! Cada artifact vive bajo un prefijo (`uri`). Los productores escriben uno o
//! más shards debajo y los consumidores los descubren listando el directorio o
//! con un patrón glob, nunca por un nombre de fichero fijo. `ObjectStore` es
//! la costura para soportar otros backends; `LocalObjectStore` cubre rutas
//! locales y `file://`.

mod local;

pub use local::LocalObjectStore;

use crate::errors::CoreEngineError;

pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Escribe `contents` en `uri`, creando los directorios intermedios.
    fn write_string(&self, uri: &str, contents: &str) -> Result<(), CoreEngineError>;

    fn read_string(&self, uri: &str) -> Result<String, CoreEngineError>;

    fn exists(&self, uri: &str) -> bool;

    /// Nombres de los subdirectorios directos de `uri`, ordenados.
    fn list_subdirs(&self, uri: &str) -> Result<Vec<String>, CoreEngineError>;

    /// Rutas que cumplen `pattern`, ordenadas.
    fn glob(&self, pattern: &str) -> Result<Vec<String>, CoreEngineError>;

    /// Copia recursivamente `from` en `to`; devuelve el número de ficheros.
    fn copy_tree(&self, from: &str, to: &str) -> Result<usize, CoreEngineError>;
}

/// Une un prefijo y un segmento con un único `/`.
pub fn join_uri(base: &str, part: &str) -> String {
    if base.is_empty() {
        return part.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), part.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::join_uri;

    #[test]
    fn join_uri_normalizes_slashes() {
        assert_eq!(join_uri("gs://bucket/root/", "/step"), "gs://bucket/root/step");
        assert_eq!(join_uri("/tmp/a", "b"), "/tmp/a/b");
        assert_eq!(join_uri("", "b"), "b");
    }
}
