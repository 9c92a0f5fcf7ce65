//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) y expone una estructura inmutable (`CONFIG`).
use once_cell::sync::Lazy;
use std::env;

use pilot_core::constants::DEFAULT_MAX_ITERATIONS;
use pilot_core::{OrchestratorConfig, Risk};
use pilot_policies::AutoApplyParams;

use crate::errors::AppError;

/// Configuración global de la aplicación.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Parámetros de la corrida.
    pub pilot: PilotConfig,
    /// Filtro de logging (sintaxis `EnvFilter`), usado si `RUST_LOG` no está.
    pub log_filter: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PilotConfig {
    /// Riesgo máximo que el modo automático aplica sin preguntar.
    pub max_risk: Risk,
    /// Saltar steps fallidos en modo automático.
    pub skip_failed: bool,
    pub max_iterations: usize,
}

/// Filtro de logging por defecto.
pub const DEFAULT_LOG_FILTER: &str = "info";

impl Default for AppConfig {
    fn default() -> Self {
        Self { pilot: PilotConfig { max_risk: Risk::Medium,
                                    skip_failed: false,
                                    max_iterations: DEFAULT_MAX_ITERATIONS },
               log_filter: DEFAULT_LOG_FILTER.to_string() }
    }
}

impl AppConfig {
    /// Lee la configuración desde el entorno del proceso.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Lee la configuración desde una fuente arbitraria de variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
        where F: Fn(&str) -> Option<String>
    {
        let mut cfg = Self::default();
        if let Some(raw) = lookup("UPGRADE_PILOT_MAX_RISK") {
            cfg.pilot.max_risk = raw.parse()
                                    .map_err(|e| AppError::Config(format!("UPGRADE_PILOT_MAX_RISK: {e}")))?;
        }
        if let Some(raw) = lookup("UPGRADE_PILOT_SKIP_FAILED") {
            cfg.pilot.skip_failed = parse_bool(&raw).ok_or_else(|| {
                                                        AppError::Config(format!("UPGRADE_PILOT_SKIP_FAILED: expected true/false, got '{raw}'"))
                                                    })?;
        }
        if let Some(raw) = lookup("UPGRADE_PILOT_MAX_ITERATIONS") {
            cfg.pilot.max_iterations = match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(AppError::Config(format!("UPGRADE_PILOT_MAX_ITERATIONS: expected a positive integer, got '{raw}'"))),
            };
        }
        cfg.log_filter = log_filter_from_lookup(&lookup);
        Ok(cfg)
    }
}

impl PilotConfig {
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig { max_iterations: self.max_iterations }
    }

    pub fn auto_params(&self) -> AutoApplyParams {
        AutoApplyParams { max_risk: self.max_risk,
                          skip_failed: self.skip_failed }
    }
}

/// Filtro de logging leído aparte del resto, para poder instalar el
/// subscriber antes de validar la configuración.
pub fn log_filter_from_env() -> String {
    let _ = dotenvy::dotenv();
    log_filter_from_lookup(|key| env::var(key).ok())
}

fn log_filter_from_lookup<F>(lookup: F) -> String
    where F: Fn(&str) -> Option<String>
{
    lookup("UPGRADE_PILOT_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Instancia global perezosa de configuración, evaluada una sola vez.
/// Si el entorno es inválido se registra el error y se usan los defaults;
/// el subscriber de logging debe estar instalado antes del primer acceso.
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    let _ = dotenvy::dotenv();
    AppConfig::from_env().unwrap_or_else(|e| {
                             log::warn!("{e}; using default configuration");
                             AppConfig::default()
                         })
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        let cfg = AppConfig::from_lookup(lookup(&[])).expect("config");
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.pilot.orchestrator_config(), OrchestratorConfig::default());
    }

    #[test]
    fn variables_override_defaults() {
        let cfg = AppConfig::from_lookup(lookup(&[("UPGRADE_PILOT_MAX_RISK", "High"),
                                                  ("UPGRADE_PILOT_SKIP_FAILED", "yes"),
                                                  ("UPGRADE_PILOT_MAX_ITERATIONS", "50"),
                                                  ("UPGRADE_PILOT_LOG", "pilot_core=debug")])).expect("config");
        assert_eq!(cfg.pilot.max_risk, Risk::High);
        assert!(cfg.pilot.skip_failed);
        assert_eq!(cfg.pilot.orchestrator_config().max_iterations, 50);
        assert_eq!(cfg.log_filter, "pilot_core=debug");
        assert_eq!(cfg.pilot.auto_params(),
                   AutoApplyParams { max_risk: Risk::High,
                                     skip_failed: true });
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for pairs in [[("UPGRADE_PILOT_MAX_RISK", "extreme")],
                      [("UPGRADE_PILOT_SKIP_FAILED", "maybe")],
                      [("UPGRADE_PILOT_MAX_ITERATIONS", "0")]]
        {
            let err = AppConfig::from_lookup(lookup(&pairs)).expect_err("invalid");
            assert!(matches!(err, AppError::Config(_)), "{err}");
        }
    }

    #[test]
    fn log_filter_survives_invalid_settings() {
        let pairs = [("UPGRADE_PILOT_MAX_RISK", "hgih"), ("UPGRADE_PILOT_LOG", "upgrade_pilot=debug")];
        assert!(AppConfig::from_lookup(lookup(&pairs)).is_err());
        assert_eq!(log_filter_from_lookup(lookup(&pairs)), "upgrade_pilot=debug");
        assert_eq!(log_filter_from_lookup(lookup(&[])), DEFAULT_LOG_FILTER);
    }
}
