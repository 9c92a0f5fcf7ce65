use std::process::ExitCode;

use log::{error, info};
use pilot_core::{CancellationToken, CommandPolicy, Orchestrator, RunOutcome};
use pilot_policies::{AutoApplyPolicy, ScriptedPolicy};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use upgrade_pilot::cli::{CliOptions, Mode, USAGE};
use upgrade_pilot::config::{log_filter_from_env, CONFIG};
use upgrade_pilot::console::{render_tree, ConsolePolicy};
use upgrade_pilot::demo::{self, DemoProject};
use upgrade_pilot::errors::AppError;

fn init_logging(default_filter: &str) {
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                                                                          tracing_subscriber::EnvFilter::new(default_filter)
                                                                      }))
                                  .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                                  .init();
}

async fn run(opts: CliOptions) -> Result<RunOutcome, AppError> {
    let mut project = DemoProject::sample();
    let tree = demo::build_tree(&project).await?;
    let mut orch = Orchestrator::new(tree).with_config(opts.pilot.orchestrator_config());
    println!("Upgrading {} ({} -> {})", project.name, project.framework, project.target_framework);
    println!("{}", render_tree(orch.tree()));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let mut policy: Box<dyn CommandPolicy<DemoProject>> = match &opts.mode {
        Mode::Interactive => Box::new(ConsolePolicy::stdio()),
        Mode::Auto => Box::new(AutoApplyPolicy::new(opts.pilot.auto_params())),
        Mode::Script(text) => Box::new(ScriptedPolicy::from_text(text)),
    };
    let report = orch.run_with(policy.as_mut(), &mut project, &cancel).await?;
    info!("run {} finished: {:?}", report.run_id, report.outcome);

    println!();
    println!("{}", render_tree(orch.tree()));
    for change in &project.changes {
        println!("  {} {:<28} {}", change.at.format("%H:%M:%S"), change.step, change.summary);
    }
    println!("applied: {}  skipped: {}  actions: {}  iterations: {}",
             report.applied, report.skipped, report.actions, report.iterations);
    Ok(report.outcome)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging(&log_filter_from_env());
    let config = CONFIG.clone();

    let opts = match CliOptions::parse(std::env::args().skip(1), config.pilot.clone()) {
        Ok(opts) if opts.help => {
            println!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("{e}\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    match run(opts).await {
        Ok(RunOutcome::Completed) => {
            println!("migration complete");
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Failed { step, message }) => {
            println!("migration blocked at '{step}': {message}");
            ExitCode::from(3)
        }
        Ok(RunOutcome::Stopped { step, reason }) => {
            println!("migration stopped at '{step}': {reason}");
            ExitCode::from(4)
        }
        Ok(RunOutcome::Canceled { step }) => {
            println!("migration canceled at '{step}'");
            ExitCode::from(130)
        }
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
