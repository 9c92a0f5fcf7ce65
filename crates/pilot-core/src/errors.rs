//! Errores del core.
//!
//! `EngineError` cubre violaciones de precondición (errores de programación
//! del llamador) y fallas inesperadas que escapan de un step. Los fallos de
//! negocio NO son errores: se reportan como `StepStatus::Failed` + mensaje.

use thiserror::Error;

use crate::step::StepId;

/// Falla levantada por la implementación de un step, acción o provider.
///
/// Un step bien portado convierte sus errores de dominio en
/// `StepCheck::Failed` / `ApplyOutcome::Failed`; lo que llega aquí aborta la
/// corrida.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("operation canceled")]
    Canceled,
    #[error("{0}")]
    Message(String),
}

impl StepError {
    pub fn msg(message: impl Into<String>) -> Self {
        StepError::Message(message.into())
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown step id {0}")]
    UnknownStep(StepId),
    #[error("step '{0}' is a group and cannot be applied directly")]
    NotALeaf(String),
    #[error("command for step '{step}' was built against revision {built}, current is {current}")]
    StaleCommand { step: String, built: u64, current: u64 },
    #[error("duplicate step key '{0}'")]
    DuplicateStep(String),
    #[error("dependency cycle between step providers: {0:?}")]
    DependencyCycle(Vec<String>),
    #[error("policy chose command #{index} but only {available} were offered")]
    InvalidChoice { index: usize, available: usize },
    #[error("run exceeded the iteration limit ({0})")]
    IterationLimit(usize),
    #[error("step '{step}' ({title}) raised a fault: {source}")]
    StepFault {
        step: String,
        title: String,
        #[source]
        source: StepError,
    },
    #[error("step provider '{provider}' raised a fault: {source}")]
    ProviderFault {
        provider: String,
        #[source]
        source: StepError,
    },
}
