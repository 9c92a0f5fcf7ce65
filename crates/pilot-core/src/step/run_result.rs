use serde::{Deserialize, Serialize};

use super::status::{Risk, StepStatus};

/// Respuesta de `MigrationStep::check`: qué encontró el step al inspeccionar
/// el contexto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepCheck {
    /// Hay trabajo por hacer; el riesgo queda conocido desde aquí.
    Applicable { risk: Risk, message: Option<String> },
    /// Nada que cambiar en este proyecto.
    NotApplicable { message: Option<String> },
    /// El proyecto ya está en el estado deseado.
    AlreadyDone { message: Option<String> },
    /// El step determinó que no puede aplicarse de forma segura.
    Failed { message: String },
}

impl StepCheck {
    pub fn applicable(risk: Risk) -> Self {
        StepCheck::Applicable { risk, message: None }
    }

    pub fn not_applicable() -> Self {
        StepCheck::NotApplicable { message: None }
    }
}

/// Respuesta de `MigrationStep::apply`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied { message: Option<String> },
    Failed { message: String },
}

/// Respuesta de una acción personalizada (`StepAction::run`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// La acción modificó el contexto; el step se reinicializa.
    Changed { message: Option<String> },
    Unchanged { message: Option<String> },
    /// La acción no pudo completarse; el step queda como estaba.
    Failed { message: String },
}

impl ActionOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, ActionOutcome::Changed { .. })
    }
}

/// Resultado de inicializar un step (cacheado en el nodo).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeResult {
    pub status: StepStatus,
    pub message: Option<String>,
    pub risk: Option<Risk>,
}

/// Resultado de aplicar un step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyResult {
    pub status: StepStatus,
    pub message: Option<String>,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Complete
    }
}
