mod support;

use std::sync::atomic::Ordering;

use pilot_core::{CancellationToken, CommandOutcome, NextStep, Orchestrator, Risk, StepSpec, StepStatus, StepTree};
use support::{ApplyBehavior, FakeStep, Sandbox};

fn tree_of(steps: Vec<FakeStep>) -> StepTree<Sandbox> {
    let mut tree = StepTree::new("root", "Upgrade");
    let root = tree.root();
    for step in steps {
        tree.insert_spec(root, StepSpec::leaf(step)).expect("insert leaf");
    }
    tree
}

async fn ready(orch: &mut Orchestrator<Sandbox>, ctx: &Sandbox, cancel: &CancellationToken) -> pilot_core::StepPrompt<Sandbox> {
    match orch.next(ctx, cancel).await.expect("next") {
        NextStep::Ready(prompt) => prompt,
        other => panic!("expected a ready step, got complete={} prompt={:?}", other.is_complete(), other.prompt()),
    }
}

#[tokio::test]
async fn completed_child_is_passed_over_and_next_one_applied() {
    let mut orch = Orchestrator::new(tree_of(vec![FakeStep::already_done("c1"), FakeStep::applicable("c2", Risk::Low)]));
    let mut ctx = Sandbox::default();
    let cancel = CancellationToken::new();

    let prompt = ready(&mut orch, &ctx, &cancel).await;
    assert_eq!(prompt.key, "c2");
    assert_eq!(prompt.status, StepStatus::Incomplete);
    assert_eq!(prompt.risk, Some(Risk::Low));
    assert_eq!(orch.status_of("c1"), Some(StepStatus::Complete));

    let apply = prompt.take(0).expect("apply offered first");
    assert!(apply.is_apply());
    let outcome = orch.execute(apply, &mut ctx, &cancel).await.expect("execute");
    assert!(matches!(outcome, CommandOutcome::Applied(ref r) if r.status == StepStatus::Complete));

    assert!(orch.next(&ctx, &cancel).await.expect("next").is_complete());
    assert_eq!(orch.overall_status(), StepStatus::Complete);
    assert_eq!(ctx.applied, vec!["c2".to_string()]);
}

#[tokio::test]
async fn skipped_child_does_not_complete_parent_alone() {
    let mut orch = Orchestrator::new(tree_of(vec![FakeStep::applicable("c1", Risk::Medium),
                                                  FakeStep::applicable("c2", Risk::Low)]));
    let mut ctx = Sandbox::default();
    let cancel = CancellationToken::new();

    let prompt = ready(&mut orch, &ctx, &cancel).await;
    assert_eq!(prompt.key, "c1");
    let skip = prompt.position("skip").expect("skip offered");
    let outcome = orch.execute(prompt.take(skip).expect("skip"), &mut ctx, &cancel).await.expect("execute");
    assert_eq!(outcome, CommandOutcome::Skipped);
    assert_eq!(orch.status_of("c1"), Some(StepStatus::Skipped));
    assert_ne!(orch.overall_status(), StepStatus::Complete);

    let prompt = ready(&mut orch, &ctx, &cancel).await;
    assert_eq!(prompt.key, "c2");
    assert_eq!(prompt.status, StepStatus::Incomplete);
    orch.execute(prompt.take(0).expect("apply"), &mut ctx, &cancel).await.expect("execute");

    assert!(orch.next(&ctx, &cancel).await.expect("next").is_complete());
    assert_eq!(orch.overall_status(), StepStatus::Complete);
    assert!(ctx.applied.iter().all(|id| id != "c1"));
}

#[tokio::test]
async fn failed_child_blocks_until_skipped() {
    let c1 = FakeStep::applicable("c1", Risk::High).apply_behavior(ApplyBehavior::Fail("conflicting versions".into()));
    let mut orch = Orchestrator::new(tree_of(vec![c1, FakeStep::applicable("c2", Risk::Low)]));
    let mut ctx = Sandbox::default();
    let cancel = CancellationToken::new();

    let prompt = ready(&mut orch, &ctx, &cancel).await;
    let outcome = orch.execute(prompt.take(0).expect("apply"), &mut ctx, &cancel).await.expect("execute");
    assert!(matches!(outcome, CommandOutcome::Applied(ref r) if r.status == StepStatus::Failed));
    assert_eq!(orch.status_of("c1"), Some(StepStatus::Failed));
    assert_eq!(orch.overall_status(), StepStatus::Failed);

    let blocked = match orch.next(&ctx, &cancel).await.expect("next") {
        NextStep::Blocked(prompt) => prompt,
        _ => panic!("failed step must block the run"),
    };
    assert_eq!(blocked.key, "c1");
    assert_eq!(blocked.message.as_deref(), Some("conflicting versions"));
    assert!(!blocked.has_apply());
    let skip = blocked.position("skip").expect("skip is the escape hatch");
    orch.execute(blocked.take(skip).expect("skip"), &mut ctx, &cancel).await.expect("execute");

    assert_eq!(orch.status_of("c1"), Some(StepStatus::Skipped));
    assert_ne!(orch.overall_status(), StepStatus::Complete);

    let prompt = ready(&mut orch, &ctx, &cancel).await;
    assert_eq!(prompt.key, "c2");
    orch.execute(prompt.take(0).expect("apply"), &mut ctx, &cancel).await.expect("execute");
    assert_eq!(orch.overall_status(), StepStatus::Complete);
}

#[tokio::test]
async fn cancelled_apply_keeps_status_and_reinitializes_later() {
    let c2 = FakeStep::applicable("c2", Risk::Medium).apply_behavior(ApplyBehavior::CancelFirst);
    let (checks, applies) = c2.counters();
    let mut orch = Orchestrator::new(tree_of(vec![FakeStep::already_done("c1"), c2]));
    let mut ctx = Sandbox::default();

    let cancel = CancellationToken::new();
    let prompt = ready(&mut orch, &ctx, &cancel).await;
    let outcome = orch.execute(prompt.take(0).expect("apply"), &mut ctx, &cancel).await.expect("execute");
    assert_eq!(outcome, CommandOutcome::Canceled);
    assert_eq!(orch.status_of("c2"), Some(StepStatus::Incomplete));
    assert!(ctx.applied.is_empty());
    assert_eq!(checks.load(Ordering::SeqCst), 1);

    // Nueva corrida con un token fresco.
    let cancel = CancellationToken::new();
    let prompt = ready(&mut orch, &ctx, &cancel).await;
    assert_eq!(checks.load(Ordering::SeqCst), 2, "c2 must be re-initialized before retrying apply");
    let outcome = orch.execute(prompt.take(0).expect("apply"), &mut ctx, &cancel).await.expect("execute");
    assert!(matches!(outcome, CommandOutcome::Applied(ref r) if r.is_success()));
    assert_eq!(applies.load(Ordering::SeqCst), 2);
    assert_eq!(orch.overall_status(), StepStatus::Complete);
}

#[tokio::test]
async fn apply_with_an_already_cancelled_token_reinitializes_later() {
    let c2 = FakeStep::applicable("c2", Risk::Low);
    let (checks, applies) = c2.counters();
    let mut orch = Orchestrator::new(tree_of(vec![c2]));
    let mut ctx = Sandbox::default();

    let cancel = CancellationToken::new();
    let prompt = ready(&mut orch, &ctx, &cancel).await;
    cancel.cancel();
    let outcome = orch.execute(prompt.take(0).expect("apply"), &mut ctx, &cancel).await.expect("execute");
    assert_eq!(outcome, CommandOutcome::Canceled);
    assert_eq!(orch.status_of("c2"), Some(StepStatus::Incomplete));
    assert_eq!(applies.load(Ordering::SeqCst), 0);
    assert!(orch.tree().is_stale(orch.tree().find("c2").expect("c2")).expect("stale"));

    let cancel = CancellationToken::new();
    let prompt = ready(&mut orch, &ctx, &cancel).await;
    assert_eq!(checks.load(Ordering::SeqCst), 2);
    let outcome = orch.execute(prompt.take(0).expect("apply"), &mut ctx, &cancel).await.expect("execute");
    assert!(matches!(outcome, CommandOutcome::Applied(ref r) if r.is_success()));
    assert_eq!(orch.overall_status(), StepStatus::Complete);
}
