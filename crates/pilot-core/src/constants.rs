//! Constantes del motor core.

/// Versión lógica del motor. Forma parte del `plan_hash` para que dos
/// versiones incompatibles del engine no compartan fingerprint de plan.
pub const ENGINE_VERSION: &str = "P1.0";

/// Límite por defecto de iteraciones del loop de comandos.
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;
