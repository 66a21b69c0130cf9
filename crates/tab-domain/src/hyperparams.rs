//! Conjunto de hiperparámetros del entrenamiento.

use serde::{Deserialize, Serialize};

use crate::DomainError;

pub const DEFAULT_HIDDEN_UNITS: [u32; 2] = [64, 32];
pub const DEFAULT_LEARNING_RATE: f64 = 0.0001;
pub const DEFAULT_BATCH_SIZE: u32 = 512;
pub const DEFAULT_NUM_EPOCHS: u32 = 10;

/// Hiperparámetros resueltos. Se serializa una vez en el artifact
/// `HyperParameters` y no cambia después.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperParameters {
    pub num_epochs: u32,
    pub batch_size: u32,
    pub learning_rate: f64,
    pub hidden_units: Vec<u32>,
}

impl Default for HyperParameters {
    fn default() -> Self {
        Self { num_epochs: DEFAULT_NUM_EPOCHS,
               batch_size: DEFAULT_BATCH_SIZE,
               learning_rate: DEFAULT_LEARNING_RATE,
               hidden_units: DEFAULT_HIDDEN_UNITS.to_vec() }
    }
}

/// Valores parciales; lo ausente se completa con los defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialHyperParameters {
    pub num_epochs: Option<u32>,
    pub batch_size: Option<u32>,
    pub learning_rate: Option<f64>,
    pub hidden_units: Option<Vec<u32>>,
}

impl HyperParameters {
    pub fn update_with_defaults(partial: PartialHyperParameters) -> Result<Self, DomainError> {
        let defaults = Self::default();
        let resolved = Self { num_epochs: partial.num_epochs.unwrap_or(defaults.num_epochs),
                              batch_size: partial.batch_size.unwrap_or(defaults.batch_size),
                              learning_rate: partial.learning_rate.unwrap_or(defaults.learning_rate),
                              hidden_units: partial.hidden_units.unwrap_or(defaults.hidden_units) };
        resolved.validate()?;
        Ok(resolved)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.num_epochs == 0 || self.batch_size == 0 {
            return Err(DomainError::Validation("num_epochs and batch_size must be positive".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(DomainError::Validation(format!("invalid learning_rate {}", self.learning_rate)));
        }
        if self.hidden_units.is_empty() {
            return Err(DomainError::Validation("hidden_units must not be empty".into()));
        }
        Ok(())
    }
}

/// Parsea `"64,32"` en `[64, 32]`. Entradas vacías o no numéricas son error.
pub fn parse_hidden_units(raw: &str) -> Result<Vec<u32>, DomainError> {
    raw.split(',')
       .map(|part| {
           let part = part.trim();
           part.parse::<u32>()
               .map_err(|_| DomainError::Validation(format!("invalid hidden_units entry `{part}` in `{raw}`")))
       })
       .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hidden_units_rejects_garbage() {
        assert_eq!(parse_hidden_units(" 128, 64 ,32").unwrap(), vec![128, 64, 32]);
        assert!(parse_hidden_units("64,,32").is_err());
        assert!(parse_hidden_units("64,abc").is_err());
        assert!(parse_hidden_units("").is_err());
    }

    #[test]
    fn validate_rejects_zero_epochs() {
        let partial = PartialHyperParameters { num_epochs: Some(0),
                                               ..Default::default() };
        assert!(HyperParameters::update_with_defaults(partial).is_err());
    }
}
