//! Steps de demo sobre `DemoProject`.

use std::sync::Arc;

use async_trait::async_trait;
use pilot_core::{ActionOutcome, ApplyOutcome, CancellationToken, MigrationStep, Risk, StepAction, StepCheck,
                 StepError};

use super::project::{DemoProject, LEGACY_IMPORT, LEGACY_SHIM};

/// Punto de control cooperativo entre unidades de trabajo.
async fn checkpoint(cancel: &CancellationToken) -> Result<(), StepError> {
    tokio::task::yield_now().await;
    if cancel.is_cancelled() {
        return Err(StepError::Canceled);
    }
    Ok(())
}

/// Riesgo de pasar de `from` a `to` según la parte de la versión que cambia.
pub fn version_bump_risk(from: &str, to: &str) -> Risk {
    fn parse(v: &str) -> Option<(u64, u64, u64)> {
        let mut parts = v.trim().split('.').map(|p| p.parse::<u64>().ok());
        let major = parts.next()??;
        let minor = parts.next().unwrap_or(Some(0))?;
        let patch = parts.next().unwrap_or(Some(0))?;
        Some((major, minor, patch))
    }
    match (parse(from), parse(to)) {
        (Some(a), Some(b)) if a.0 != b.0 => Risk::High,
        (Some(a), Some(b)) if a.1 != b.1 => Risk::Low,
        (Some(_), Some(_)) => Risk::None,
        _ => Risk::Unspecified,
    }
}

pub struct RetargetFramework;

#[async_trait]
impl MigrationStep<DemoProject> for RetargetFramework {
    fn id(&self) -> &str {
        "retarget-framework"
    }

    fn title(&self) -> &str {
        "Retarget framework"
    }

    fn description(&self) -> Option<&str> {
        Some("Point the project at the new framework version")
    }

    // Todo lo demás asume el framework nuevo.
    fn can_skip(&self) -> bool {
        false
    }

    async fn check(&self, ctx: &DemoProject, _cancel: &CancellationToken) -> Result<StepCheck, StepError> {
        if ctx.framework == ctx.target_framework {
            return Ok(StepCheck::AlreadyDone { message: Some(format!("already on {}", ctx.framework)) });
        }
        Ok(StepCheck::Applicable { risk: Risk::Medium,
                                   message: Some(format!("{} -> {}", ctx.framework, ctx.target_framework)) })
    }

    async fn apply(&self, ctx: &mut DemoProject, cancel: &CancellationToken) -> Result<ApplyOutcome, StepError> {
        checkpoint(cancel).await?;
        let from = std::mem::replace(&mut ctx.framework, ctx.target_framework.clone());
        let summary = format!("retargeted {from} -> {}", ctx.framework);
        ctx.record(self.id(), summary.clone());
        Ok(ApplyOutcome::Applied { message: Some(summary) })
    }
}

/// Actualiza un paquete a su última versión.
pub struct UpdatePackage {
    key: String,
    title: String,
    package: String,
}

impl UpdatePackage {
    pub fn new(package: &str) -> Self {
        Self { key: format!("update-packages/{package}"),
               title: format!("Update {package}"),
               package: package.to_string() }
    }
}

#[async_trait]
impl MigrationStep<DemoProject> for UpdatePackage {
    fn id(&self) -> &str {
        &self.key
    }

    fn title(&self) -> &str {
        &self.title
    }

    async fn check(&self, ctx: &DemoProject, _cancel: &CancellationToken) -> Result<StepCheck, StepError> {
        let Some(pkg) = ctx.packages.get(&self.package) else {
            return Ok(StepCheck::NotApplicable { message: Some(format!("{} is no longer referenced", self.package)) });
        };
        if ctx.pinned.contains(&self.package) {
            return Ok(StepCheck::NotApplicable { message: Some(format!("{} pinned at {}", self.package, pkg.current)) });
        }
        if !pkg.is_outdated() {
            return Ok(StepCheck::AlreadyDone { message: Some(format!("{} is up to date", self.package)) });
        }
        Ok(StepCheck::Applicable { risk: version_bump_risk(&pkg.current, &pkg.latest),
                                   message: Some(format!("{} -> {}", pkg.current, pkg.latest)) })
    }

    async fn apply(&self, ctx: &mut DemoProject, cancel: &CancellationToken) -> Result<ApplyOutcome, StepError> {
        checkpoint(cancel).await?;
        let framework = ctx.framework.clone();
        let Some(pkg) = ctx.packages.get_mut(&self.package) else {
            return Ok(ApplyOutcome::Failed { message: format!("{} is no longer referenced", self.package) });
        };
        if let Some(required) = pkg.requires_framework.as_deref() {
            if required != framework {
                return Ok(ApplyOutcome::Failed { message: format!("{} {} requires framework {required} (project targets {framework})",
                                                                  self.package, pkg.latest) });
            }
        }
        let summary = format!("{} {} -> {}", self.package, pkg.current, pkg.latest);
        pkg.current = pkg.latest.clone();
        ctx.record(&self.key, summary.clone());
        Ok(ApplyOutcome::Applied { message: Some(summary) })
    }

    fn actions(&self) -> Vec<Arc<dyn StepAction<DemoProject>>> {
        vec![Arc::new(Pin { name: "pin",
                            target: self.package.clone() })]
    }
}

/// Acción `pin`: conserva un paquete (o shim) en su versión actual.
pub struct Pin {
    name: &'static str,
    target: String,
}

#[async_trait]
impl StepAction<DemoProject> for Pin {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> String {
        format!("Pin {} at its current version", self.target)
    }

    async fn run(&self, ctx: &mut DemoProject, _cancel: &CancellationToken) -> Result<ActionOutcome, StepError> {
        if !ctx.pinned.insert(self.target.clone()) {
            return Ok(ActionOutcome::Unchanged { message: Some(format!("{} already pinned", self.target)) });
        }
        ctx.record("pin", format!("pinned {}", self.target));
        Ok(ActionOutcome::Changed { message: Some(format!("{} pinned", self.target)) })
    }
}

/// Renombra claves de configuración obsoletas.
pub struct RewriteConfig;

#[async_trait]
impl MigrationStep<DemoProject> for RewriteConfig {
    fn id(&self) -> &str {
        "rewrite-config"
    }

    fn title(&self) -> &str {
        "Rewrite configuration keys"
    }

    async fn check(&self, ctx: &DemoProject, _cancel: &CancellationToken) -> Result<StepCheck, StepError> {
        let pending = ctx.pending_renames();
        if pending.is_empty() {
            return Ok(StepCheck::not_applicable());
        }
        let keys: Vec<&str> = pending.iter().map(|(old, _)| *old).collect();
        Ok(StepCheck::Applicable { risk: Risk::Medium,
                                   message: Some(format!("rename {}", keys.join(", "))) })
    }

    async fn apply(&self, ctx: &mut DemoProject, cancel: &CancellationToken) -> Result<ApplyOutcome, StepError> {
        let renames: Vec<(String, String)> = ctx.pending_renames()
                                                .into_iter()
                                                .map(|(old, new)| (old.to_string(), new.to_string()))
                                                .collect();
        for (old, new) in &renames {
            if let (Some(existing), Some(value)) = (ctx.settings.get(new), ctx.settings.get(old)) {
                if existing != value {
                    return Ok(ApplyOutcome::Failed { message: format!("cannot rename {old}: {new} already set to '{existing}'") });
                }
            }
        }
        for (old, new) in renames {
            checkpoint(cancel).await?;
            if let Some(value) = ctx.settings.remove(&old) {
                ctx.settings.insert(new.clone(), value);
                ctx.record(self.id(), format!("{old} -> {new}"));
            }
        }
        Ok(ApplyOutcome::Applied { message: None })
    }
}

/// Elimina importaciones de APIs legacy.
pub struct RemoveLegacyImports;

#[async_trait]
impl MigrationStep<DemoProject> for RemoveLegacyImports {
    fn id(&self) -> &str {
        "remove-legacy-imports"
    }

    fn title(&self) -> &str {
        "Remove legacy imports"
    }

    fn description(&self) -> Option<&str> {
        Some("Drop `use legacy::` imports; pin the compatibility shim to keep them instead")
    }

    async fn check(&self, ctx: &DemoProject, _cancel: &CancellationToken) -> Result<StepCheck, StepError> {
        if ctx.pinned.contains(LEGACY_SHIM) {
            return Ok(StepCheck::NotApplicable { message: Some(format!("{LEGACY_SHIM} pinned; legacy imports kept")) });
        }
        let files = ctx.legacy_files();
        if files.is_empty() {
            return Ok(StepCheck::AlreadyDone { message: None });
        }
        Ok(StepCheck::Applicable { risk: Risk::High,
                                   message: Some(format!("{} file(s) import legacy APIs", files.len())) })
    }

    async fn apply(&self, ctx: &mut DemoProject, cancel: &CancellationToken) -> Result<ApplyOutcome, StepError> {
        let files: Vec<String> = ctx.legacy_files().into_iter().map(str::to_string).collect();
        for path in files {
            checkpoint(cancel).await?;
            if let Some(body) = ctx.sources.get_mut(&path) {
                let kept: Vec<&str> = body.lines()
                                          .filter(|l| !l.trim_start().starts_with(LEGACY_IMPORT))
                                          .collect();
                *body = kept.join("\n") + "\n";
            }
            ctx.record(self.id(), format!("cleaned {path}"));
        }
        Ok(ApplyOutcome::Applied { message: None })
    }

    fn actions(&self) -> Vec<Arc<dyn StepAction<DemoProject>>> {
        vec![Arc::new(Pin { name: "pin",
                            target: LEGACY_SHIM.to_string() })]
    }
}
