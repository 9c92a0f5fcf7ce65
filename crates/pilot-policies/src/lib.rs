//! pilot-policies: políticas que deciden el comando de cada iteración.
//!
//! Provee una política automática con tope de riesgo (`AutoApplyPolicy`) y
//! una que reproduce una sesión grabada (`ScriptedPolicy`). Cada decisión
//! queda registrada con su rationale para auditoría.

use std::collections::VecDeque;

use log::debug;
use pilot_core::hashing::{hash_str, to_canonical_json};
use pilot_core::{Choice, CommandOutcome, CommandPolicy, Risk, StepPrompt, StepStatus};
use serde::{Deserialize, Serialize};

/// Parámetros de la política automática.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutoApplyParams {
    /// Riesgo máximo que se aplica sin intervención humana.
    pub max_risk: Risk,
    /// Saltar steps fallidos en vez de detener la corrida.
    pub skip_failed: bool,
}

impl Default for AutoApplyParams {
    fn default() -> Self {
        Self { max_risk: Risk::Medium,
               skip_failed: false }
    }
}

/// Hash canónico de parámetros.
pub fn params_hash(params: &AutoApplyParams) -> String {
    let v = serde_json::json!({ "max_risk": params.max_risk.as_str(), "skip_failed": params.skip_failed });
    hash_str(&to_canonical_json(&v))
}

/// Registro de una decisión tomada por una política.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Decision {
    pub policy_id: String,
    pub step: String,
    /// Etiqueta del comando elegido (`apply`, `skip`, acción) o `stop`.
    pub choice: String,
    pub reason: String,
    /// `params_hash` de la política al decidir (vacío si no tiene parámetros).
    pub params_hash: String,
}

/// Aplica automáticamente los steps cuyo riesgo no supera `max_risk`.
///
/// - steps `Initialized` (nada que cambiar): siempre se aplican.
/// - riesgo desconocido o mayor al tope: se detiene con el motivo.
/// - step bloqueado (`Failed`): lo salta si `skip_failed`, si no se detiene.
pub struct AutoApplyPolicy {
    params: AutoApplyParams,
    params_hash: String,
    decisions: Vec<Decision>,
}

impl AutoApplyPolicy {
    pub fn new(params: AutoApplyParams) -> Self {
        let hash = params_hash(&params);
        Self { params,
               params_hash: hash,
               decisions: Vec::new() }
    }

    pub fn id(&self) -> &'static str {
        "auto_apply"
    }

    pub fn params(&self) -> &AutoApplyParams {
        &self.params
    }

    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }

    fn record<C>(&mut self, prompt: &StepPrompt<C>, choice: &Choice, reason: String) {
        let label = match choice {
            Choice::Command(i) => prompt.commands.get(*i).map(|c| c.label().to_string()).unwrap_or_default(),
            Choice::Stop(_) => "stop".to_string(),
        };
        debug!("{} chose '{label}' for '{}': {reason}", self.id(), prompt.key);
        self.decisions.push(Decision { policy_id: self.id().to_string(),
                                       step: prompt.key.clone(),
                                       choice: label,
                                       reason,
                                       params_hash: self.params_hash.clone() });
    }

    fn decide<C>(&self, prompt: &StepPrompt<C>) -> (Choice, String) {
        if prompt.status == StepStatus::Failed {
            let failure = prompt.message.clone().unwrap_or_else(|| "step failed".to_string());
            return match prompt.position("skip") {
                Some(i) if self.params.skip_failed => (Choice::Command(i), format!("skipping failed step: {failure}")),
                _ => (Choice::Stop(failure.clone()), failure),
            };
        }
        let Some(apply) = prompt.position("apply") else {
            return (Choice::Stop("no apply command offered".to_string()), "no apply command offered".to_string());
        };
        if prompt.status == StepStatus::Initialized {
            return (Choice::Command(apply), "nothing to change".to_string());
        }
        match prompt.risk {
            Some(risk) if risk <= self.params.max_risk => {
                (Choice::Command(apply), format!("risk {risk} within {}", self.params.max_risk))
            }
            Some(risk) => {
                let reason = format!("risk {risk} exceeds {}; needs a human decision", self.params.max_risk);
                (Choice::Stop(reason.clone()), reason)
            }
            None => {
                let reason = "risk unknown; needs a human decision".to_string();
                (Choice::Stop(reason.clone()), reason)
            }
        }
    }
}

impl Default for AutoApplyPolicy {
    fn default() -> Self {
        Self::new(AutoApplyParams::default())
    }
}

impl<C> CommandPolicy<C> for AutoApplyPolicy {
    fn choose(&mut self, prompt: &StepPrompt<C>) -> Choice {
        let (choice, reason) = self.decide(prompt);
        self.record(prompt, &choice, reason);
        choice
    }
}

/// Entrada de una sesión grabada.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptEntry {
    Apply,
    Skip,
    /// Acción personalizada por nombre.
    Action(String),
    Stop,
}

impl ScriptEntry {
    /// `apply`, `skip`, `stop` o cualquier otro texto como nombre de acción.
    pub fn parse(text: &str) -> Self {
        match text.trim() {
            "apply" => ScriptEntry::Apply,
            "skip" => ScriptEntry::Skip,
            "stop" => ScriptEntry::Stop,
            other => ScriptEntry::Action(other.to_string()),
        }
    }

    fn label(&self) -> &str {
        match self {
            ScriptEntry::Apply => "apply",
            ScriptEntry::Skip => "skip",
            ScriptEntry::Action(name) => name,
            ScriptEntry::Stop => "stop",
        }
    }
}

/// Reproduce una sesión de operador entrada por entrada.
///
/// Si la entrada no corresponde a ningún comando ofrecido, o el guion se
/// agotó, la corrida se detiene con el motivo.
#[derive(Debug, Default)]
pub struct ScriptedPolicy {
    script: VecDeque<ScriptEntry>,
    outcomes: Vec<(String, CommandOutcome)>,
}

impl ScriptedPolicy {
    pub fn new(entries: impl IntoIterator<Item = ScriptEntry>) -> Self {
        Self { script: entries.into_iter().collect(),
               outcomes: Vec::new() }
    }

    /// Construye el guion desde texto separado por comas o espacios
    /// (`"apply, skip, pin, apply"`).
    pub fn from_text(text: &str) -> Self {
        Self::new(text.split(|c: char| c == ',' || c.is_whitespace())
                      .filter(|s| !s.is_empty())
                      .map(ScriptEntry::parse))
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    /// Resultados observados, en orden.
    pub fn outcomes(&self) -> &[(String, CommandOutcome)] {
        &self.outcomes
    }
}

impl<C> CommandPolicy<C> for ScriptedPolicy {
    fn choose(&mut self, prompt: &StepPrompt<C>) -> Choice {
        let Some(entry) = self.script.pop_front() else {
            return Choice::Stop("script exhausted".to_string());
        };
        if entry == ScriptEntry::Stop {
            return Choice::Stop(format!("script stopped at '{}'", prompt.key));
        }
        match prompt.position(entry.label()) {
            Some(index) => Choice::Command(index),
            None => Choice::Stop(format!("'{}' is not offered for '{}'", entry.label(), prompt.key)),
        }
    }

    fn observe(&mut self, step: &str, outcome: &CommandOutcome) {
        self.outcomes.push((step.to_string(), outcome.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_hash_is_stable_and_param_sensitive() {
        let a = AutoApplyParams::default();
        let b = AutoApplyParams { max_risk: Risk::High,
                                  skip_failed: false };
        assert_eq!(params_hash(&a), params_hash(&a.clone()));
        assert_ne!(params_hash(&a), params_hash(&b));
    }

    #[test]
    fn script_text_parsing() {
        let policy = ScriptedPolicy::from_text("apply, skip pin,stop");
        assert_eq!(policy.script,
                   VecDeque::from(vec![ScriptEntry::Apply,
                                       ScriptEntry::Skip,
                                       ScriptEntry::Action("pin".into()),
                                       ScriptEntry::Stop]));
        assert_eq!(policy.remaining(), 4);
    }
}
