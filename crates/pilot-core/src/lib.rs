//! pilot-core: orquestador de migraciones paso a paso.
//!
//! Un árbol de steps (hojas con comportamiento, grupos con estado derivado)
//! se recorre en profundidad; en cada iteración el orquestador inicializa
//! sólo el próximo step sin resolver y expone los comandos válidos para él.
pub mod cancel;
pub mod command;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod step;

pub use cancel::CancellationToken;
pub use command::{Command, CommandKind, CommandOutcome, StepPrompt};
pub use engine::{Choice, CommandPolicy, NextStep, Orchestrator, OrchestratorConfig, RunOutcome, RunReport, StepProvider,
                 TreeBuilder};
pub use errors::{EngineError, StepError};
pub use event::{EventStore, InMemoryEventStore, MigrationEvent, MigrationEventKind, StepPhase};
pub use step::{ActionOutcome, ApplyOutcome, ApplyResult, Attempt, InitializeResult, MigrationStep, NodeKind, Risk,
               StepAction, StepCheck, StepId, StepNode, StepSpec, StepStatus, StepTree};
