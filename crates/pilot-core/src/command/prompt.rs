use std::fmt;

use super::Command;
use crate::errors::EngineError;
use crate::step::{Risk, StepId, StepStatus};

/// Lo que se muestra al operador en cada iteración: el step actual y los
/// comandos válidos para él.
pub struct StepPrompt<C> {
    pub step: StepId,
    pub key: String,
    pub title: String,
    pub description: Option<String>,
    pub status: StepStatus,
    pub risk: Option<Risk>,
    pub message: Option<String>,
    pub commands: Vec<Command<C>>,
}

impl<C> StepPrompt<C> {
    /// Índice del primer comando con la etiqueta dada (`apply`, `skip`, acción).
    pub fn position(&self, label: &str) -> Option<usize> {
        self.commands.iter().position(|c| c.label() == label)
    }

    pub fn has_apply(&self) -> bool {
        self.commands.iter().any(Command::is_apply)
    }

    pub fn has_skip(&self) -> bool {
        self.commands.iter().any(Command::is_skip)
    }

    /// Extrae el comando elegido; los demás se descartan con el prompt.
    pub fn take(mut self, index: usize) -> Result<Command<C>, EngineError> {
        let available = self.commands.len();
        if index >= available {
            return Err(EngineError::InvalidChoice { index, available });
        }
        Ok(self.commands.swap_remove(index))
    }
}

impl<C> fmt::Debug for StepPrompt<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepPrompt")
         .field("key", &self.key)
         .field("status", &self.status)
         .field("risk", &self.risk)
         .field("commands", &self.commands)
         .finish()
    }
}
