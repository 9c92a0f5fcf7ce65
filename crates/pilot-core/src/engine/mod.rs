//! Orquestación de la corrida: construcción del árbol, selección del próximo
//! step, ejecución de comandos y bucle de conducción.

pub mod builder;
pub mod core;
pub mod driver;

pub use builder::{StepProvider, TreeBuilder};
pub use self::core::{NextStep, Orchestrator, OrchestratorConfig};
pub use driver::{Choice, CommandPolicy, RunOutcome, RunReport};
