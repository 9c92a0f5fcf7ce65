use std::sync::Arc;

use async_trait::async_trait;

use super::run_result::{ActionOutcome, ApplyOutcome, StepCheck};
use crate::cancel::CancellationToken;
use crate::errors::StepError;

/// Comportamiento de un step hoja.
///
/// El engine nunca inspecciona el contexto `C`: sólo lo pasa. `check` recibe
/// una referencia compartida porque el contexto sólo se muta en `apply` (y en
/// acciones personalizadas).
#[async_trait]
pub trait MigrationStep<C>: Send + Sync {
    /// Clave estable y única dentro del árbol.
    fn id(&self) -> &str;

    fn title(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }

    /// Algunos steps no pueden saltarse (p.ej. el que fija el target).
    fn can_skip(&self) -> bool {
        true
    }

    /// Determina aplicabilidad y riesgo. Puede correr varias veces mientras
    /// el step no sea terminal, así que no debe tener efectos.
    async fn check(&self, ctx: &C, cancel: &CancellationToken) -> Result<StepCheck, StepError>;

    /// Aplica la transformación. Sólo se llama tras un `check` aplicable.
    async fn apply(&self, ctx: &mut C, cancel: &CancellationToken) -> Result<ApplyOutcome, StepError>;

    /// Acciones adicionales que el step ofrece al operador.
    fn actions(&self) -> Vec<Arc<dyn StepAction<C>>> {
        Vec::new()
    }
}

/// Capacidad nombrada que un step expone además de apply/skip.
#[async_trait]
pub trait StepAction<C>: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> String;

    async fn run(&self, ctx: &mut C, cancel: &CancellationToken) -> Result<ActionOutcome, StepError>;
}
