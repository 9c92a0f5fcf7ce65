//! upgrade-pilot
//!
//! Librería del binario `upgrade-pilot`:
//! - `config`: configuración desde el entorno (.env).
//! - `errors`: errores de la aplicación.
//! - `cli`: argumentos de línea de comandos.
//! - `console`: política interactiva y render del árbol.
//! - `demo`: proyecto en memoria y providers de la migración de ejemplo.

pub mod cli;
pub mod config;
pub mod console;
pub mod demo;
pub mod errors;
