//! Tipos de evento de una corrida y estructura `MigrationEvent`.
//!
//! Rol en la corrida:
//! - El `Orchestrator` emite un evento por cada transición observable a un
//!   `EventStore` append-only.
//! - Los eventos sirven de auditoría de decisiones del operador; no se usan
//!   para reconstruir estado (el árbol vive en memoria durante la corrida).
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::step::{Risk, StepStatus};

/// Fase en la que se canceló una operación suspendida.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepPhase {
    Initialize,
    Apply,
    Action,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MigrationEventKind {
    /// Primer evento de un `run_id`: fija el fingerprint del plan.
    RunStarted { plan_hash: String, step_count: usize },
    StepInitialized {
        step_id: String,
        status: StepStatus,
        risk: Option<Risk>,
        message: Option<String>,
    },
    StepApplied {
        step_id: String,
        status: StepStatus,
        message: Option<String>,
    },
    StepSkipped { step_id: String },
    /// El step (o su tipo) no admite skip; se reporta, nunca se ignora.
    SkipRefused { step_id: String },
    ActionExecuted {
        step_id: String,
        action: String,
        changed: bool,
        message: Option<String>,
    },
    ActionFailed {
        step_id: String,
        action: String,
        message: String,
    },
    StepCanceled { step_id: String, phase: StepPhase },
    /// Cambió el estado derivado de un grupo tras la transición de un hijo.
    StatusRolledUp {
        step_id: String,
        from: StepStatus,
        to: StepStatus,
    },
    /// La corrida se detuvo en un step sin resolver (falla o decisión humana).
    RunHalted { step_id: String, message: String },
    RunCompleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationEvent {
    pub seq: u64, // asignado por el store (orden append)
    pub run_id: Uuid,
    pub kind: MigrationEventKind,
    pub ts: DateTime<Utc>,
}
