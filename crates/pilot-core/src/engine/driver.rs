//! Bucle de conducción: pide a una policy el comando de cada iteración hasta
//! que la corrida termina, se detiene o se cancela.

use log::{info, warn};
use serde::Serialize;
use uuid::Uuid;

use super::core::{NextStep, Orchestrator};
use crate::cancel::CancellationToken;
use crate::command::{CommandOutcome, StepPrompt};
use crate::errors::EngineError;
use crate::event::EventStore;
use crate::step::StepStatus;

/// Decisión de una policy frente a un prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    /// Índice dentro de `StepPrompt::commands`.
    Command(usize),
    /// Detener la corrida dejando el step sin resolver.
    Stop(String),
}

/// Quién decide: un operador humano, una regla automática o un guion de test.
pub trait CommandPolicy<C> {
    fn choose(&mut self, prompt: &StepPrompt<C>) -> Choice;

    /// Notificación del resultado del comando elegido.
    fn observe(&mut self, _step: &str, _outcome: &CommandOutcome) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    Completed,
    /// La corrida terminó detenida sobre un step `Failed`.
    Failed { step: String, message: String },
    Stopped { step: String, reason: String },
    Canceled { step: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    pub iterations: usize,
    pub applied: usize,
    pub skipped: usize,
    pub actions: usize,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }
}

impl<C, E> Orchestrator<C, E>
    where C: Send + Sync,
          E: EventStore
{
    /// Conduce la corrida completa con `policy`.
    ///
    /// Cada iteración localiza el próximo step, arma sus comandos y ejecuta
    /// el que la policy elija. Termina cuando no quedan steps, cuando la
    /// policy se detiene o al cancelarse.
    pub async fn run_with(&mut self,
                          policy: &mut dyn CommandPolicy<C>,
                          ctx: &mut C,
                          cancel: &CancellationToken)
                          -> Result<RunReport, EngineError> {
        let max = self.config().max_iterations;
        let mut report = RunReport { run_id: self.run_id(),
                                     outcome: RunOutcome::Completed,
                                     iterations: 0,
                                     applied: 0,
                                     skipped: 0,
                                     actions: 0 };

        while report.iterations < max {
            report.iterations += 1;
            let prompt = match self.next(&*ctx, cancel).await? {
                NextStep::Complete => {
                    info!("run {} finished after {} iterations", report.run_id, report.iterations);
                    return Ok(report);
                }
                NextStep::Canceled { step } => {
                    let key = self.tree().node(step)?.key().to_string();
                    report.outcome = RunOutcome::Canceled { step: key };
                    return Ok(report);
                }
                NextStep::Ready(prompt) | NextStep::Blocked(prompt) => prompt,
            };

            let step = prompt.step;
            let key = prompt.key.clone();
            let index = match policy.choose(&prompt) {
                Choice::Command(index) => index,
                Choice::Stop(reason) => {
                    report.outcome = if prompt.status == StepStatus::Failed {
                        let message = prompt.message.clone().unwrap_or(reason);
                        self.halt(step, &message);
                        RunOutcome::Failed { step: key, message }
                    } else {
                        self.halt(step, &reason);
                        RunOutcome::Stopped { step: key, reason }
                    };
                    return Ok(report);
                }
            };

            let command = prompt.take(index)?;
            let outcome = self.execute(command, ctx, cancel).await?;
            policy.observe(&key, &outcome);
            match &outcome {
                CommandOutcome::Applied(_) => report.applied += 1,
                CommandOutcome::Skipped => report.skipped += 1,
                CommandOutcome::SkipRefused => warn!("step '{key}' refused to be skipped"),
                CommandOutcome::ActionCompleted { .. } | CommandOutcome::ActionFailed { .. } => report.actions += 1,
                CommandOutcome::Canceled => {
                    report.outcome = RunOutcome::Canceled { step: key };
                    return Ok(report);
                }
            }
        }
        if self.next_step().is_none() {
            // El último comando cerró la corrida justo en el límite.
            self.next(&*ctx, cancel).await?;
            info!("run {} finished after {} iterations", report.run_id, report.iterations);
            return Ok(report);
        }
        Err(EngineError::IterationLimit(max))
    }
}
