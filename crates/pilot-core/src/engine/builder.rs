//! Construcción del árbol a partir de providers.
//!
//! Cada `StepProvider` aporta un subárbol (`StepSpec`) y declara su orden
//! relativo a otros providers. El builder ordena topológicamente (estable
//! respecto al orden de registro), filtra los que no aplican al proyecto y
//! arma el `StepTree`.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use log::{debug, info};

use crate::errors::{EngineError, StepError};
use crate::step::{StepSpec, StepTree};

#[async_trait]
pub trait StepProvider<C: Sync>: Send + Sync {
    fn id(&self) -> &str;

    /// Providers que deben quedar antes que éste.
    fn depends_on(&self) -> Vec<String> {
        Vec::new()
    }

    /// Providers que deben quedar después que éste.
    fn dependency_of(&self) -> Vec<String> {
        Vec::new()
    }

    /// Si el provider aporta algo a este proyecto.
    async fn is_applicable(&self, _ctx: &C) -> Result<bool, StepError> {
        Ok(true)
    }

    fn build(&self) -> StepSpec<C>;
}

/// Builder del árbol de una corrida.
///
/// ```ignore
/// let tree = TreeBuilder::new("upgrade", "Upgrade project")
///     .provider(RetargetProvider)
///     .provider(PackagesProvider)
///     .build(&project)
///     .await?;
/// ```
pub struct TreeBuilder<C: Sync> {
    root_key: String,
    root_title: String,
    providers: Vec<Box<dyn StepProvider<C>>>,
}

impl<C: Send + Sync> TreeBuilder<C> {
    pub fn new(root_key: impl Into<String>, root_title: impl Into<String>) -> Self {
        Self { root_key: root_key.into(),
               root_title: root_title.into(),
               providers: Vec::new() }
    }

    pub fn provider<P>(mut self, provider: P) -> Self
        where P: StepProvider<C> + 'static
    {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn add_provider(&mut self, provider: Box<dyn StepProvider<C>>) {
        self.providers.push(provider);
    }

    /// Ids de providers en el orden en que aportarán sus steps.
    pub fn ordered_ids(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.order()?
               .into_iter()
               .map(|i| self.providers[i].id().to_string())
               .collect())
    }

    /// Orden topológico (Kahn) desempatando por orden de registro.
    fn order(&self) -> Result<Vec<usize>, EngineError> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        for (i, p) in self.providers.iter().enumerate() {
            if index.insert(p.id(), i).is_some() {
                return Err(EngineError::DuplicateStep(p.id().to_string()));
            }
        }

        let n = self.providers.len();
        let mut edges: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        for (i, p) in self.providers.iter().enumerate() {
            for before in p.depends_on() {
                match index.get(before.as_str()) {
                    Some(&j) => {
                        edges[j].insert(i);
                    }
                    None => debug!("provider '{}' depends on unknown '{before}'", p.id()),
                }
            }
            for after in p.dependency_of() {
                match index.get(after.as_str()) {
                    Some(&j) => {
                        edges[i].insert(j);
                    }
                    None => debug!("provider '{}' is a dependency of unknown '{after}'", p.id()),
                }
            }
        }

        let mut indegree = vec![0usize; n];
        for targets in &edges {
            for &t in targets {
                indegree[t] += 1;
            }
        }
        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut out = Vec::with_capacity(n);
        while let Some(i) = ready.pop_first() {
            out.push(i);
            for &t in &edges[i] {
                indegree[t] -= 1;
                if indegree[t] == 0 {
                    ready.insert(t);
                }
            }
        }
        if out.len() < n {
            let cycle = (0..n).filter(|i| indegree[*i] > 0)
                              .map(|i| self.providers[i].id().to_string())
                              .collect();
            return Err(EngineError::DependencyCycle(cycle));
        }
        Ok(out)
    }

    /// Ordena, filtra por aplicabilidad y arma el árbol.
    pub async fn build(self, ctx: &C) -> Result<StepTree<C>, EngineError> {
        let order = self.order()?;
        let mut tree = StepTree::new(self.root_key.clone(), self.root_title.clone());
        let root = tree.root();
        for i in order {
            let provider = &self.providers[i];
            let applicable = provider.is_applicable(ctx)
                                     .await
                                     .map_err(|source| EngineError::ProviderFault { provider: provider.id().to_string(),
                                                                                    source })?;
            if !applicable {
                debug!("provider '{}' not applicable; skipped", provider.id());
                continue;
            }
            tree.insert_spec(root, provider.build())?;
        }
        info!("step tree built: {} nodes", tree.len());
        Ok(tree)
    }
}
