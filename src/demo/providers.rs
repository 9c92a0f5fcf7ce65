//! Providers de demo: cada uno aporta su parte del árbol.

use async_trait::async_trait;
use pilot_core::{StepError, StepProvider, StepSpec};

use super::project::DemoProject;
use super::steps::{RemoveLegacyImports, RetargetFramework, RewriteConfig, UpdatePackage};

pub struct RetargetProvider;

#[async_trait]
impl StepProvider<DemoProject> for RetargetProvider {
    fn id(&self) -> &str {
        "retarget-framework"
    }

    fn build(&self) -> StepSpec<DemoProject> {
        StepSpec::leaf(RetargetFramework)
    }
}

/// Un substep por paquete referenciado al momento de armar el árbol.
pub struct PackagesProvider {
    packages: Vec<String>,
}

impl PackagesProvider {
    pub fn for_project(project: &DemoProject) -> Self {
        Self { packages: project.packages.keys().cloned().collect() }
    }
}

#[async_trait]
impl StepProvider<DemoProject> for PackagesProvider {
    fn id(&self) -> &str {
        "update-packages"
    }

    fn depends_on(&self) -> Vec<String> {
        vec!["retarget-framework".to_string()]
    }

    async fn is_applicable(&self, ctx: &DemoProject) -> Result<bool, StepError> {
        Ok(ctx.outdated_packages().next().is_some())
    }

    fn build(&self) -> StepSpec<DemoProject> {
        let children = self.packages
                           .iter()
                           .map(|name| StepSpec::leaf(UpdatePackage::new(name)))
                           .collect();
        StepSpec::group("update-packages", "Update packages", children)
            .with_description("Move every referenced package to its latest version")
    }
}

pub struct ConfigProvider;

#[async_trait]
impl StepProvider<DemoProject> for ConfigProvider {
    fn id(&self) -> &str {
        "rewrite-config"
    }

    fn depends_on(&self) -> Vec<String> {
        vec!["update-packages".to_string()]
    }

    async fn is_applicable(&self, ctx: &DemoProject) -> Result<bool, StepError> {
        Ok(!ctx.setting_renames.is_empty())
    }

    fn build(&self) -> StepSpec<DemoProject> {
        StepSpec::leaf(RewriteConfig)
    }
}

pub struct LegacyImportsProvider;

#[async_trait]
impl StepProvider<DemoProject> for LegacyImportsProvider {
    fn id(&self) -> &str {
        "remove-legacy-imports"
    }

    // La limpieza de código va al final, después de config.
    fn depends_on(&self) -> Vec<String> {
        vec!["rewrite-config".to_string(), "update-packages".to_string()]
    }

    fn build(&self) -> StepSpec<DemoProject> {
        StepSpec::leaf(RemoveLegacyImports)
    }
}
