//! Steps de migración.
//!
//! Un step es una unidad de trabajo con su propio ciclo de vida: se
//! inicializa (deriva aplicabilidad y riesgo), se aplica o se salta. Este
//! módulo define:
//! - `MigrationStep` / `StepAction`: interfaces que implementan los analyzers.
//! - `StepStatus` y `Risk`.
//! - Resultados (`InitializeResult`, `ApplyResult`) y respuestas de los steps.
//! - `StepTree`: árbol en arena con rollup de estados.

pub mod definition;
mod run_result;
mod status;
pub mod tree;

pub use definition::{MigrationStep, StepAction};
pub use run_result::{ActionOutcome, ApplyOutcome, ApplyResult, InitializeResult, StepCheck};
pub use status::{Risk, StepStatus};
pub use tree::{rollup, Attempt, NodeKind, StepId, StepNode, StepSpec, StepTree};
