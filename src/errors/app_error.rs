use pilot_core::EngineError;
use thiserror::Error;

/// Errores de la aplicación (binario y librería raíz).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Error de configuración: {0}")]
    Config(String),
    #[error("Uso inválido: {0}")]
    Usage(String),
    #[error("Error del motor: {0}")]
    Engine(#[from] EngineError),
}
