//! Migración de demostración: un proyecto en memoria y los providers que
//! arman su árbol de steps.

mod project;
mod providers;
mod steps;

use pilot_core::{EngineError, StepTree, TreeBuilder};

pub use project::{Change, DemoProject, PackageRef, LEGACY_IMPORT, LEGACY_SHIM};
pub use providers::{ConfigProvider, LegacyImportsProvider, PackagesProvider, RetargetProvider};
pub use steps::{version_bump_risk, Pin, RemoveLegacyImports, RetargetFramework, RewriteConfig, UpdatePackage};

/// Builder con todos los providers de demo. El orden del árbol sale de las
/// dependencias declaradas, no del orden de registro.
pub fn tree_builder(project: &DemoProject) -> TreeBuilder<DemoProject> {
    TreeBuilder::new(project.name.clone(), format!("Upgrade {}", project.name)).provider(LegacyImportsProvider)
                                                                               .provider(ConfigProvider)
                                                                               .provider(PackagesProvider::for_project(project))
                                                                               .provider(RetargetProvider)
}

pub async fn build_tree(project: &DemoProject) -> Result<StepTree<DemoProject>, EngineError> {
    tree_builder(project).build(project).await
}
