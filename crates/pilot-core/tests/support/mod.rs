//! Steps y contexto falsos compartidos por los tests de integración.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pilot_core::{ActionOutcome, ApplyOutcome, CancellationToken, MigrationStep, Risk, StepAction, StepCheck,
                 StepError};

/// Proyecto en memoria: un registro de lo aplicado y un mapa de flags.
#[derive(Debug, Default)]
pub struct Sandbox {
    pub applied: Vec<String>,
    pub flags: HashMap<String, String>,
}

type CheckFn = Box<dyn Fn(&Sandbox) -> StepCheck + Send + Sync>;

pub enum ApplyBehavior {
    Succeed,
    Fail(String),
    /// La primera llamada cancela el token y queda suspendida; las
    /// siguientes aplican normalmente.
    CancelFirst,
    Fault,
}

pub struct FakeStep {
    id: String,
    check: CheckFn,
    apply: ApplyBehavior,
    skippable: bool,
    actions: Vec<Arc<dyn StepAction<Sandbox>>>,
    pub checks: Arc<AtomicUsize>,
    pub applies: Arc<AtomicUsize>,
}

impl FakeStep {
    pub fn applicable(id: &str, risk: Risk) -> Self {
        Self::with_check(id, move |_| StepCheck::applicable(risk))
    }

    pub fn already_done(id: &str) -> Self {
        Self::with_check(id, |_| StepCheck::AlreadyDone { message: None })
    }

    pub fn with_check<F>(id: &str, check: F) -> Self
        where F: Fn(&Sandbox) -> StepCheck + Send + Sync + 'static
    {
        Self { id: id.to_string(),
               check: Box::new(check),
               apply: ApplyBehavior::Succeed,
               skippable: true,
               actions: Vec::new(),
               checks: Arc::new(AtomicUsize::new(0)),
               applies: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn apply_behavior(mut self, behavior: ApplyBehavior) -> Self {
        self.apply = behavior;
        self
    }

    pub fn not_skippable(mut self) -> Self {
        self.skippable = false;
        self
    }

    pub fn action(mut self, action: impl StepAction<Sandbox> + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }

    /// Contadores (checks, applies) compartidos con el step.
    pub fn counters(&self) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        (self.checks.clone(), self.applies.clone())
    }
}

#[async_trait]
impl MigrationStep<Sandbox> for FakeStep {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.id
    }

    fn can_skip(&self) -> bool {
        self.skippable
    }

    async fn check(&self, ctx: &Sandbox, _cancel: &CancellationToken) -> Result<StepCheck, StepError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        Ok((self.check)(ctx))
    }

    async fn apply(&self, ctx: &mut Sandbox, cancel: &CancellationToken) -> Result<ApplyOutcome, StepError> {
        let attempt = self.applies.fetch_add(1, Ordering::SeqCst);
        match &self.apply {
            ApplyBehavior::Succeed => {}
            ApplyBehavior::Fail(message) => return Ok(ApplyOutcome::Failed { message: message.clone() }),
            ApplyBehavior::CancelFirst if attempt == 0 => {
                cancel.cancel();
                std::future::pending::<()>().await;
            }
            ApplyBehavior::CancelFirst => {}
            ApplyBehavior::Fault => return Err(StepError::msg("disk full")),
        }
        ctx.applied.push(self.id.clone());
        Ok(ApplyOutcome::Applied { message: Some(format!("applied {}", self.id)) })
    }

    fn actions(&self) -> Vec<Arc<dyn StepAction<Sandbox>>> {
        self.actions.clone()
    }
}

/// Acción que fija un flag en el sandbox.
pub struct SetFlag {
    pub name: &'static str,
    pub flag: &'static str,
}

#[async_trait]
impl StepAction<Sandbox> for SetFlag {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> String {
        format!("Set flag '{}'", self.flag)
    }

    async fn run(&self, ctx: &mut Sandbox, _cancel: &CancellationToken) -> Result<ActionOutcome, StepError> {
        let changed = ctx.flags.insert(self.flag.to_string(), "1".to_string()).is_none();
        Ok(if changed {
               ActionOutcome::Changed { message: Some(format!("flag {} set", self.flag)) }
           } else {
               ActionOutcome::Unchanged { message: None }
           })
    }
}

/// Acción que siempre reporta falla.
pub struct BrokenAction;

#[async_trait]
impl StepAction<Sandbox> for BrokenAction {
    fn name(&self) -> &str {
        "broken"
    }

    fn description(&self) -> String {
        "Always fails".to_string()
    }

    async fn run(&self, _ctx: &mut Sandbox, _cancel: &CancellationToken) -> Result<ActionOutcome, StepError> {
        Ok(ActionOutcome::Failed { message: "tool not found".to_string() })
    }
}
