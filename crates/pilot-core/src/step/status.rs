use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Estado de un step durante una corrida de migración.
///
/// Las transiciones válidas son:
/// - `Unknown` -> `Initialized` | `Incomplete` | `Complete` | `Failed` (initialize)
/// - `Initialized` | `Incomplete` -> `Complete` | `Failed` (apply)
/// - `Unknown` | `Initialized` | `Incomplete` | `Failed` -> `Skipped` (skip)
///
/// Ninguna transición vuelve a `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepStatus {
    /// Aún no inicializado.
    Unknown,
    /// Inicializado, no hay nada que cambiar; apply es un no-op exitoso.
    Initialized,
    /// Saltado por el operador (o por un skip del padre).
    Skipped,
    /// Inicializado y aplicable, pendiente de apply.
    Incomplete,
    /// Aplicado (o ya resuelto en el proyecto).
    Complete,
    /// Falló; bloquea a sus ancestros hasta que se salte.
    Failed,
}

impl StepStatus {
    /// `Complete`, `Skipped` y `Failed` no admiten más trabajo del step.
    pub fn is_terminal(self) -> bool {
        matches!(self, StepStatus::Complete | StepStatus::Skipped | StepStatus::Failed)
    }

    /// Resuelto desde el punto de vista del padre.
    pub fn is_done(self) -> bool {
        matches!(self, StepStatus::Complete | StepStatus::Skipped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Unknown => "unknown",
            StepStatus::Initialized => "initialized",
            StepStatus::Skipped => "skipped",
            StepStatus::Incomplete => "incomplete",
            StepStatus::Complete => "complete",
            StepStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estimación cualitativa de qué tan probable es que un step rompa el build.
///
/// El orden es significativo: `Unspecified` se ordena por encima de `High`
/// para que un riesgo desconocido se trate como el peor riesgo conocido.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Risk {
    None,
    Low,
    Medium,
    High,
    Unspecified,
}

impl Risk {
    pub fn as_str(self) -> &'static str {
        match self {
            Risk::None => "none",
            Risk::Low => "low",
            Risk::Medium => "medium",
            Risk::High => "high",
            Risk::Unspecified => "unspecified",
        }
    }
}

impl fmt::Display for Risk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Risk {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Risk::None),
            "low" => Ok(Risk::Low),
            "medium" => Ok(Risk::Medium),
            "high" => Ok(Risk::High),
            "unspecified" => Ok(Risk::Unspecified),
            other => Err(format!("unknown risk level '{other}'")),
        }
    }
}
