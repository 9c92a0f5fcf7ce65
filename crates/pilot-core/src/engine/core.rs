//! Core Orchestrator implementation

use log::{debug, info, warn};
use serde_json::json;
use uuid::Uuid;

use crate::cancel::CancellationToken;
use crate::command::{Command, CommandKind, CommandOutcome, StepPrompt};
use crate::constants::{DEFAULT_MAX_ITERATIONS, ENGINE_VERSION};
use crate::errors::{EngineError, StepError};
use crate::event::{EventStore, InMemoryEventStore, MigrationEvent, MigrationEventKind, StepPhase};
use crate::hashing::hash_value;
use crate::step::{ActionOutcome, Attempt, StepId, StepStatus, StepTree};

/// Configuración del orquestador.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Tope de iteraciones de `run_with`; protege contra policies que nunca
    /// avanzan (p.ej. insistir en un skip rechazado).
    pub max_iterations: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { max_iterations: DEFAULT_MAX_ITERATIONS }
    }
}

/// Resultado de localizar el próximo step.
pub enum NextStep<C> {
    /// No queda nada por resolver: la corrida terminó.
    Complete,
    /// Step accionable con sus comandos válidos.
    Ready(StepPrompt<C>),
    /// Step `Failed`: la corrida no avanza hasta que se salte.
    Blocked(StepPrompt<C>),
    /// Se canceló la inicialización del step; su estado no cambió.
    Canceled { step: StepId },
}

impl<C> NextStep<C> {
    pub fn is_complete(&self) -> bool {
        matches!(self, NextStep::Complete)
    }

    pub fn prompt(&self) -> Option<&StepPrompt<C>> {
        match self {
            NextStep::Ready(p) | NextStep::Blocked(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_prompt(self) -> Option<StepPrompt<C>> {
        match self {
            NextStep::Ready(p) | NextStep::Blocked(p) => Some(p),
            _ => None,
        }
    }
}

/// Orquestador de una corrida de migración.
///
/// Selecciona el próximo step accionable, lo inicializa bajo demanda, expone
/// los comandos válidos y ejecuta el elegido. Todas las operaciones
/// suspendidas toman `&mut self`: nunca hay dos operaciones en vuelo.
pub struct Orchestrator<C, E = InMemoryEventStore>
    where E: EventStore
{
    tree: StepTree<C>,
    event_store: E,
    run_id: Uuid,
    revision: u64,
    config: OrchestratorConfig,
    started: bool,
    completed: bool,
}

impl<C: Send + Sync> Orchestrator<C, InMemoryEventStore> {
    /// Crea un orquestador con store de eventos en memoria.
    pub fn new(tree: StepTree<C>) -> Self {
        Self::with_store(tree, InMemoryEventStore::default())
    }
}

impl<C, E> Orchestrator<C, E>
    where C: Send + Sync,
          E: EventStore
{
    pub fn with_store(tree: StepTree<C>, event_store: E) -> Self {
        Self { tree,
               event_store,
               run_id: Uuid::new_v4(),
               revision: 0,
               config: OrchestratorConfig::default(),
               started: false,
               completed: false }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn tree(&self) -> &StepTree<C> {
        &self.tree
    }

    pub fn into_tree(self) -> StepTree<C> {
        self.tree
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Revisión actual del árbol; cada comando ejecutado la incrementa.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn event_store(&self) -> &E {
        &self.event_store
    }

    pub fn events(&self) -> Vec<MigrationEvent> {
        self.event_store.list(self.run_id)
    }

    /// Estado efectivo de un step por clave.
    pub fn status_of(&self, key: &str) -> Option<StepStatus> {
        self.tree.find(key).and_then(|id| self.tree.status(id).ok())
    }

    /// Estado de la raíz (rollup del árbol completo).
    pub fn overall_status(&self) -> StepStatus {
        self.tree.status(self.tree.root()).unwrap_or(StepStatus::Unknown)
    }

    /// Fingerprint del plan: claves en orden de declaración con su padre.
    pub fn plan_hash(&self) -> String {
        let nodes: Vec<serde_json::Value> =
            self.tree
                .walk()
                .into_iter()
                .filter_map(|id| self.tree.node(id).ok())
                .map(|node| {
                    let parent = node.parent().and_then(|p| self.tree.node(p).ok()).map(|p| p.key().to_string());
                    json!({ "key": node.key(), "parent": parent, "leaf": node.is_leaf() })
                })
                .collect();
        hash_value(&json!({ "engine_version": ENGINE_VERSION, "nodes": nodes }))
    }

    fn ensure_started(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        let step_count = self.tree.leaves(self.tree.root()).len();
        let plan_hash = self.plan_hash();
        info!("run {} started: {step_count} steps, plan {plan_hash}", self.run_id);
        self.append(MigrationEventKind::RunStarted { plan_hash, step_count });
    }

    fn append(&mut self, kind: MigrationEventKind) {
        self.event_store.append_kind(self.run_id, kind);
    }

    fn key_of(&self, id: StepId) -> String {
        self.tree.node(id).map(|n| n.key().to_string()).unwrap_or_default()
    }

    fn ancestor_statuses(&self, id: StepId) -> Vec<(StepId, StepStatus)> {
        self.tree
            .ancestors(id)
            .into_iter()
            .map(|a| (a, self.tree.status(a).unwrap_or(StepStatus::Unknown)))
            .collect()
    }

    /// Emite `StatusRolledUp` para cada ancestro cuyo estado derivado cambió.
    fn emit_rollups(&mut self, before: Vec<(StepId, StepStatus)>) {
        for (id, from) in before {
            let to = self.tree.status(id).unwrap_or(StepStatus::Unknown);
            if to != from {
                let step_id = self.key_of(id);
                debug!("group '{step_id}' rolled up {from} -> {to}");
                self.append(MigrationEventKind::StatusRolledUp { step_id, from, to });
            }
        }
    }

    /// Id del próximo step sin resolver (determinista, sin efectos).
    pub fn next_step(&self) -> Option<StepId> {
        self.tree.next_step()
    }

    /// Localiza el próximo step, lo inicializa si hace falta y devuelve los
    /// comandos válidos.
    ///
    /// Sólo se inicializa el step localizado: la aplicabilidad de los
    /// siguientes puede depender de lo que éste haga.
    pub async fn next(&mut self, ctx: &C, cancel: &CancellationToken) -> Result<NextStep<C>, EngineError> {
        self.ensure_started();
        loop {
            let Some(id) = self.tree.next_step() else {
                if !self.completed {
                    self.completed = true;
                    info!("run {} completed", self.run_id);
                    self.append(MigrationEventKind::RunCompleted);
                }
                return Ok(NextStep::Complete);
            };

            let status = self.tree.status(id)?;
            if status == StepStatus::Unknown || self.tree.is_stale(id)? {
                let before = self.ancestor_statuses(id);
                match self.tree.initialize(id, ctx, cancel).await? {
                    Attempt::Canceled => {
                        let step_id = self.key_of(id);
                        self.append(MigrationEventKind::StepCanceled { step_id,
                                                                       phase: StepPhase::Initialize });
                        return Ok(NextStep::Canceled { step: id });
                    }
                    Attempt::Completed(res) => {
                        self.revision += 1;
                        let step_id = self.key_of(id);
                        self.append(MigrationEventKind::StepInitialized { step_id,
                                                                          status: res.status,
                                                                          risk: res.risk,
                                                                          message: res.message.clone() });
                        self.emit_rollups(before);
                        if res.status.is_done() {
                            // Ya resuelto en el proyecto: pasar al siguiente.
                            continue;
                        }
                    }
                }
            }

            let prompt = self.prompt(id)?;
            return Ok(if prompt.status == StepStatus::Failed {
                          NextStep::Blocked(prompt)
                      } else {
                          NextStep::Ready(prompt)
                      });
        }
    }

    /// Construye el prompt con los comandos válidos para `id`.
    fn prompt(&self, id: StepId) -> Result<StepPrompt<C>, EngineError> {
        let node = self.tree.node(id)?;
        let status = self.tree.status(id)?;
        let mut commands = Vec::new();
        if status != StepStatus::Failed {
            commands.push(Command::apply_next(id, node.key(), node.title(), self.revision));
        }
        if self.tree.can_skip(id)? {
            commands.push(Command::skip_next(id, node.key(), node.title(), self.revision));
        }
        if status != StepStatus::Failed && node.is_leaf() {
            for action in self.tree.step(id)?.actions() {
                commands.push(Command::action(id, node.key(), self.revision, action));
            }
        }
        Ok(StepPrompt { step: id,
                        key: node.key().to_string(),
                        title: node.title().to_string(),
                        description: node.description().map(str::to_string),
                        status,
                        risk: self.tree.risk(id)?,
                        message: self.tree.message(id)?.map(str::to_string),
                        commands })
    }

    /// Ejecuta un comando construido en la revisión actual.
    pub async fn execute(&mut self,
                         command: Command<C>,
                         ctx: &mut C,
                         cancel: &CancellationToken)
                         -> Result<CommandOutcome, EngineError> {
        self.ensure_started();
        if command.revision() != self.revision {
            return Err(EngineError::StaleCommand { step: command.step_key().to_string(),
                                                   built: command.revision(),
                                                   current: self.revision });
        }
        let id = command.step();
        let step_id = command.step_key().to_string();
        let before = self.ancestor_statuses(id);

        let outcome = match command.into_kind() {
            CommandKind::ApplyNext => match self.tree.apply(id, ctx, cancel).await? {
                Attempt::Canceled => {
                    self.append(MigrationEventKind::StepCanceled { step_id,
                                                                   phase: StepPhase::Apply });
                    CommandOutcome::Canceled
                }
                Attempt::Completed(res) => {
                    self.append(MigrationEventKind::StepApplied { step_id,
                                                                  status: res.status,
                                                                  message: res.message.clone() });
                    CommandOutcome::Applied(res)
                }
            },
            CommandKind::SkipNext => {
                if self.tree.skip(id)? {
                    self.append(MigrationEventKind::StepSkipped { step_id });
                    CommandOutcome::Skipped
                } else {
                    warn!("skip refused for '{step_id}'");
                    self.append(MigrationEventKind::SkipRefused { step_id });
                    CommandOutcome::SkipRefused
                }
            }
            CommandKind::Action(action) => {
                let name = action.name().to_string();
                let result = if cancel.is_cancelled() {
                    None
                } else {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        res = action.run(ctx, cancel) => Some(res),
                    }
                };
                match result {
                    None | Some(Err(StepError::Canceled)) => {
                        warn!("action '{name}' on '{step_id}' canceled");
                        self.append(MigrationEventKind::StepCanceled { step_id,
                                                                       phase: StepPhase::Action });
                        CommandOutcome::Canceled
                    }
                    Some(Err(source)) => {
                        let title = self.tree.node(id)?.title().to_string();
                        return Err(EngineError::StepFault { step: step_id, title, source });
                    }
                    Some(Ok(ActionOutcome::Failed { message })) => {
                        warn!("action '{name}' on '{step_id}' failed: {message}");
                        self.append(MigrationEventKind::ActionFailed { step_id,
                                                                       action: name,
                                                                       message: message.clone() });
                        CommandOutcome::ActionFailed { message }
                    }
                    Some(Ok(outcome)) => {
                        let changed = outcome.changed();
                        let message = match outcome {
                            ActionOutcome::Changed { message } | ActionOutcome::Unchanged { message } => message,
                            ActionOutcome::Failed { .. } => None,
                        };
                        if changed {
                            // La acción alteró el contexto: re-derivar aplicabilidad.
                            self.tree.mark_stale(id)?;
                        }
                        info!("action '{name}' on '{step_id}' done (changed: {changed})");
                        self.append(MigrationEventKind::ActionExecuted { step_id,
                                                                         action: name,
                                                                         changed,
                                                                         message: message.clone() });
                        CommandOutcome::ActionCompleted { changed, message }
                    }
                }
            }
        };

        // Los comandos son de un solo uso: cualquier prompt previo queda vencido.
        self.revision += 1;
        self.emit_rollups(before);
        Ok(outcome)
    }

    /// Reporta que la corrida se detuvo en `id` sin resolverlo.
    pub(crate) fn halt(&mut self, id: StepId, message: &str) {
        let step_id = self.key_of(id);
        warn!("run {} halted at '{step_id}': {message}", self.run_id);
        self.append(MigrationEventKind::RunHalted { step_id,
                                                    message: message.to_string() });
    }

    /// Variante compacta de eventos de la corrida (útil en tests y logs).
    pub fn event_variants(&self) -> Vec<&'static str> {
        self.events()
            .iter()
            .map(|e| match e.kind {
                MigrationEventKind::RunStarted { .. } => "R",
                MigrationEventKind::StepInitialized { .. } => "I",
                MigrationEventKind::StepApplied { .. } => "A",
                MigrationEventKind::StepSkipped { .. } => "S",
                MigrationEventKind::SkipRefused { .. } => "N",
                MigrationEventKind::ActionExecuted { .. } => "X",
                MigrationEventKind::ActionFailed { .. } => "F",
                MigrationEventKind::StepCanceled { .. } => "K",
                MigrationEventKind::StatusRolledUp { .. } => "U",
                MigrationEventKind::RunHalted { .. } => "H",
                MigrationEventKind::RunCompleted => "C",
            })
            .collect()
    }
}
