//! Proyecto de ejemplo en memoria sobre el que corren los steps de demo.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Dependencia declarada por el proyecto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    pub current: String,
    pub latest: String,
    /// Framework mínimo que exige `latest`, si exige alguno.
    pub requires_framework: Option<String>,
}

impl PackageRef {
    pub fn new(current: &str, latest: &str) -> Self {
        Self { current: current.to_string(),
               latest: latest.to_string(),
               requires_framework: None }
    }

    pub fn requiring(mut self, framework: &str) -> Self {
        self.requires_framework = Some(framework.to_string());
        self
    }

    pub fn is_outdated(&self) -> bool {
        self.current != self.latest
    }
}

/// Cambio aplicado al proyecto, en orden.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    pub step: String,
    pub summary: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoProject {
    pub name: String,
    pub framework: String,
    pub target_framework: String,
    pub packages: BTreeMap<String, PackageRef>,
    pub settings: BTreeMap<String, String>,
    /// Renombres de claves de configuración que exige el framework nuevo.
    pub setting_renames: BTreeMap<String, String>,
    pub sources: BTreeMap<String, String>,
    /// Paquetes (o shims) que el operador decidió conservar.
    pub pinned: BTreeSet<String>,
    pub changes: Vec<Change>,
}

/// Prefijo de las importaciones a remover.
pub const LEGACY_IMPORT: &str = "use legacy::";
/// Shim que, fijado, mantiene válidas las importaciones legacy.
pub const LEGACY_SHIM: &str = "legacy-compat";

impl DemoProject {
    /// Proyecto vacío que ya apunta al framework objetivo.
    pub fn new(name: &str, framework: &str) -> Self {
        Self { name: name.to_string(),
               framework: framework.to_string(),
               target_framework: framework.to_string(),
               packages: BTreeMap::new(),
               settings: BTreeMap::new(),
               setting_renames: BTreeMap::new(),
               sources: BTreeMap::new(),
               pinned: BTreeSet::new(),
               changes: Vec::new() }
    }

    /// Proyecto de muestra: framework viejo, paquetes desactualizados (uno
    /// de ellos imposible de actualizar), configuración con claves legacy y
    /// un archivo que importa APIs legacy.
    pub fn sample() -> Self {
        let mut p = Self::new("inventory-service", "v6");
        p.target_framework = "v8".to_string();
        p.packages.insert("http-client".into(), PackageRef::new("2.1.0", "3.0.0"));
        p.packages.insert("json-codec".into(), PackageRef::new("1.4.0", "1.5.2"));
        p.packages.insert("log-facade".into(), PackageRef::new("0.9.1", "0.9.1"));
        p.packages.insert("orm-lite".into(), PackageRef::new("4.2.0", "5.0.0").requiring("v9"));
        p.settings.insert("auth.legacy_mode".into(), "basic".into());
        p.settings.insert("cache.ttl_secs".into(), "60".into());
        p.settings.insert("server.port".into(), "8080".into());
        p.setting_renames.insert("auth.legacy_mode".into(), "auth.mode".into());
        p.setting_renames.insert("cache.ttl_secs".into(), "cache.ttl".into());
        p.sources.insert("src/app.code".into(),
                         "use legacy::auth;\nuse core::http;\n\nfn main() { http::serve(auth::basic()); }\n".into());
        p.sources.insert("src/db.code".into(), "use core::db;\n\nfn connect() { db::open(); }\n".into());
        p
    }

    pub fn record(&mut self, step: &str, summary: impl Into<String>) {
        self.changes.push(Change { step: step.to_string(),
                                   summary: summary.into(),
                                   at: Utc::now() });
    }

    pub fn outdated_packages(&self) -> impl Iterator<Item = (&String, &PackageRef)> {
        self.packages.iter().filter(|(_, p)| p.is_outdated())
    }

    /// Archivos con al menos una importación legacy.
    pub fn legacy_files(&self) -> Vec<&str> {
        self.sources
            .iter()
            .filter(|(_, body)| body.lines().any(|l| l.trim_start().starts_with(LEGACY_IMPORT)))
            .map(|(path, _)| path.as_str())
            .collect()
    }

    /// Renombres todavía pendientes (clave vieja presente).
    pub fn pending_renames(&self) -> Vec<(&str, &str)> {
        self.setting_renames
            .iter()
            .filter(|(old, _)| self.settings.contains_key(*old))
            .map(|(old, new)| (old.as_str(), new.as_str()))
            .collect()
    }
}
