use async_trait::async_trait;
use pilot_core::{ActionOutcome, ApplyOutcome, CancellationToken, CommandOutcome, MigrationStep, Orchestrator, Risk,
                 RunOutcome, StepAction, StepCheck, StepError, StepSpec, StepStatus, StepTree};
use pilot_policies::{params_hash, AutoApplyParams, AutoApplyPolicy, ScriptEntry, ScriptedPolicy};
use std::sync::Arc;

#[derive(Default)]
struct Ledger {
    applied: Vec<String>,
    pinned: bool,
}

struct Step {
    id: &'static str,
    risk: Option<Risk>,
    fails: bool,
}

impl Step {
    fn new(id: &'static str, risk: Risk) -> Self {
        Self { id,
               risk: Some(risk),
               fails: false }
    }

    fn noop(id: &'static str) -> Self {
        Self { id,
               risk: None,
               fails: false }
    }

    fn failing(id: &'static str) -> Self {
        Self { id,
               risk: Some(Risk::Low),
               fails: true }
    }
}

struct Pin;

#[async_trait]
impl StepAction<Ledger> for Pin {
    fn name(&self) -> &str {
        "pin"
    }

    fn description(&self) -> String {
        "Pin the current version".into()
    }

    async fn run(&self, ctx: &mut Ledger, _cancel: &CancellationToken) -> Result<ActionOutcome, StepError> {
        ctx.pinned = true;
        Ok(ActionOutcome::Changed { message: None })
    }
}

#[async_trait]
impl MigrationStep<Ledger> for Step {
    fn id(&self) -> &str {
        self.id
    }

    fn title(&self) -> &str {
        self.id
    }

    async fn check(&self, ctx: &Ledger, _cancel: &CancellationToken) -> Result<StepCheck, StepError> {
        Ok(match self.risk {
            _ if ctx.pinned => StepCheck::not_applicable(),
            Some(risk) => StepCheck::applicable(risk),
            None => StepCheck::not_applicable(),
        })
    }

    async fn apply(&self, ctx: &mut Ledger, _cancel: &CancellationToken) -> Result<ApplyOutcome, StepError> {
        if self.fails {
            return Ok(ApplyOutcome::Failed { message: "compiler error".into() });
        }
        ctx.applied.push(self.id.to_string());
        Ok(ApplyOutcome::Applied { message: None })
    }

    fn actions(&self) -> Vec<Arc<dyn StepAction<Ledger>>> {
        vec![Arc::new(Pin)]
    }
}

fn orchestrator(steps: Vec<Step>) -> Orchestrator<Ledger> {
    let mut tree = StepTree::new("root", "Upgrade");
    let root = tree.root();
    for step in steps {
        tree.insert_spec(root, StepSpec::leaf(step)).expect("insert");
    }
    Orchestrator::new(tree)
}

#[tokio::test]
async fn auto_policy_applies_within_risk_budget() {
    let mut orch = orchestrator(vec![Step::new("a", Risk::Low), Step::noop("b"), Step::new("c", Risk::Medium)]);
    let mut ctx = Ledger::default();
    let mut policy = AutoApplyPolicy::default();

    let report = orch.run_with(&mut policy, &mut ctx, &CancellationToken::new()).await.expect("run");
    assert!(report.is_completed());
    assert_eq!(ctx.applied, vec!["a", "c"]);
    assert_eq!(policy.decisions().len(), 3);
    assert!(policy.decisions().iter().all(|d| d.choice == "apply"));
    let expected = params_hash(&AutoApplyParams::default());
    assert!(policy.decisions().iter().all(|d| d.params_hash == expected));
}

#[tokio::test]
async fn auto_policy_stops_above_risk_budget() {
    let mut orch = orchestrator(vec![Step::new("a", Risk::Low), Step::new("risky", Risk::High)]);
    let mut ctx = Ledger::default();
    let mut policy = AutoApplyPolicy::default();

    let report = orch.run_with(&mut policy, &mut ctx, &CancellationToken::new()).await.expect("run");
    match report.outcome {
        RunOutcome::Stopped { step, reason } => {
            assert_eq!(step, "risky");
            assert!(reason.contains("exceeds"));
        }
        other => panic!("expected a stop, got {other:?}"),
    }
    assert_eq!(orch.status_of("risky"), Some(StepStatus::Incomplete));
}

#[tokio::test]
async fn auto_policy_treats_unspecified_risk_as_too_high() {
    let mut orch = orchestrator(vec![Step::new("mystery", Risk::Unspecified)]);
    let mut ctx = Ledger::default();
    let mut policy = AutoApplyPolicy::new(AutoApplyParams { max_risk: Risk::High,
                                                            skip_failed: false });

    let report = orch.run_with(&mut policy, &mut ctx, &CancellationToken::new()).await.expect("run");
    assert!(matches!(report.outcome, RunOutcome::Stopped { .. }));
}

#[tokio::test]
async fn auto_policy_skips_failures_when_allowed() {
    let steps = || vec![Step::failing("broken"), Step::new("after", Risk::Low)];
    let cancel = CancellationToken::new();

    let mut strict = orchestrator(steps());
    let report = strict.run_with(&mut AutoApplyPolicy::default(), &mut Ledger::default(), &cancel)
                       .await
                       .expect("run");
    assert_eq!(report.outcome,
               RunOutcome::Failed { step: "broken".into(),
                                    message: "compiler error".into() });

    let mut lenient = orchestrator(steps());
    let mut ctx = Ledger::default();
    let mut policy = AutoApplyPolicy::new(AutoApplyParams { max_risk: Risk::Medium,
                                                            skip_failed: true });
    let report = lenient.run_with(&mut policy, &mut ctx, &cancel).await.expect("run");
    assert!(report.is_completed());
    assert_eq!(report.skipped, 1);
    assert_eq!(lenient.status_of("broken"), Some(StepStatus::Skipped));
    assert_eq!(ctx.applied, vec!["after"]);
}

#[tokio::test]
async fn scripted_policy_replays_a_session() {
    let mut orch = orchestrator(vec![Step::new("a", Risk::High), Step::new("b", Risk::High), Step::new("c", Risk::Low)]);
    let mut ctx = Ledger::default();
    let mut policy = ScriptedPolicy::from_text("skip, pin, apply, apply");

    let report = orch.run_with(&mut policy, &mut ctx, &CancellationToken::new()).await.expect("run");
    assert!(report.is_completed());
    assert_eq!(policy.remaining(), 0);
    // `pin` vuelve no aplicables a los steps siguientes.
    assert!(ctx.applied.is_empty());
    let seen: Vec<&str> = policy.outcomes().iter().map(|(step, _)| step.as_str()).collect();
    assert_eq!(seen, vec!["a", "b", "b", "c"]);
    assert_eq!(policy.outcomes()[1].1,
               CommandOutcome::ActionCompleted { changed: true,
                                                 message: None });
}

#[tokio::test]
async fn scripted_policy_stops_on_unknown_or_exhausted_entries() {
    let mut orch = orchestrator(vec![Step::new("a", Risk::Low), Step::new("b", Risk::Low)]);
    let mut ctx = Ledger::default();
    let mut policy = ScriptedPolicy::new(vec![ScriptEntry::Apply]);

    let report = orch.run_with(&mut policy, &mut ctx, &CancellationToken::new()).await.expect("run");
    assert_eq!(report.outcome,
               RunOutcome::Stopped { step: "b".into(),
                                     reason: "script exhausted".into() });

    let mut orch = orchestrator(vec![Step::new("a", Risk::Low)]);
    let mut policy = ScriptedPolicy::new(vec![ScriptEntry::Action("rollback".into())]);
    let report = orch.run_with(&mut policy, &mut Ledger::default(), &CancellationToken::new())
                     .await
                     .expect("run");
    assert!(matches!(report.outcome, RunOutcome::Stopped { ref reason, .. } if reason.contains("rollback")));
}
