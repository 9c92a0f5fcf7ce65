//! Comandos: solicitudes de un solo uso para avanzar un step.
//!
//! Un `Command` queda ligado al step objetivo y a la revisión del árbol en la
//! que se construyó. El orquestador los crea de nuevo en cada iteración y
//! rechaza los que vienen de una revisión anterior.

mod prompt;

use std::fmt;
use std::sync::Arc;

use crate::step::{ApplyResult, StepAction, StepId};

pub use prompt::StepPrompt;

pub enum CommandKind<C> {
    ApplyNext,
    SkipNext,
    /// Acción expuesta por el step (capacidad nombrada).
    Action(Arc<dyn StepAction<C>>),
}

pub struct Command<C> {
    step: StepId,
    step_key: String,
    revision: u64,
    description: String,
    kind: CommandKind<C>,
}

impl<C> Command<C> {
    pub(crate) fn apply_next(step: StepId, step_key: &str, title: &str, revision: u64) -> Self {
        Self { step,
               step_key: step_key.to_string(),
               revision,
               description: format!("Apply next step ({title})"),
               kind: CommandKind::ApplyNext }
    }

    pub(crate) fn skip_next(step: StepId, step_key: &str, title: &str, revision: u64) -> Self {
        Self { step,
               step_key: step_key.to_string(),
               revision,
               description: format!("Skip next step ({title})"),
               kind: CommandKind::SkipNext }
    }

    pub(crate) fn action(step: StepId, step_key: &str, revision: u64, action: Arc<dyn StepAction<C>>) -> Self {
        Self { step,
               step_key: step_key.to_string(),
               revision,
               description: action.description(),
               kind: CommandKind::Action(action) }
    }

    pub fn step(&self) -> StepId {
        self.step
    }

    pub fn step_key(&self) -> &str {
        &self.step_key
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> &CommandKind<C> {
        &self.kind
    }

    pub(crate) fn into_kind(self) -> CommandKind<C> {
        self.kind
    }

    /// Etiqueta corta: `apply`, `skip` o el nombre de la acción.
    pub fn label(&self) -> &str {
        match &self.kind {
            CommandKind::ApplyNext => "apply",
            CommandKind::SkipNext => "skip",
            CommandKind::Action(action) => action.name(),
        }
    }

    pub fn is_apply(&self) -> bool {
        matches!(self.kind, CommandKind::ApplyNext)
    }

    pub fn is_skip(&self) -> bool {
        matches!(self.kind, CommandKind::SkipNext)
    }
}

impl<C> fmt::Debug for Command<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
         .field("step", &self.step_key)
         .field("label", &self.label())
         .field("revision", &self.revision)
         .finish()
    }
}

/// Resultado de ejecutar un comando.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied(ApplyResult),
    Skipped,
    /// El step no admite skip; el llamador debe mostrarlo.
    SkipRefused,
    ActionCompleted { changed: bool, message: Option<String> },
    /// La acción falló; el step queda reintentable.
    ActionFailed { message: String },
    Canceled,
}

impl CommandOutcome {
    /// Si el comando cambió algo en el árbol o el contexto.
    pub fn advanced(&self) -> bool {
        match self {
            CommandOutcome::Applied(_) | CommandOutcome::Skipped => true,
            CommandOutcome::ActionCompleted { changed, .. } => *changed,
            CommandOutcome::SkipRefused | CommandOutcome::ActionFailed { .. } | CommandOutcome::Canceled => false,
        }
    }
}
