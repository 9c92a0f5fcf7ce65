//! Árbol de steps en arena.
//!
//! Los nodos viven en un `Vec` y se referencian por `StepId`; el padre es un
//! índice, nunca una referencia con ownership. Un nodo es una hoja (con su
//! `MigrationStep` y el estado cacheado) o un grupo cuyo estado se deriva de
//! sus hijos en cada consulta (rollup perezoso).

use std::collections::HashMap;
use std::fmt;

use log::{debug, info, warn};

use super::definition::MigrationStep;
use super::run_result::{ApplyOutcome, ApplyResult, InitializeResult, StepCheck};
use super::status::{Risk, StepStatus};
use crate::cancel::CancellationToken;
use crate::errors::{EngineError, StepError};

/// Identificador opaco de un nodo dentro de un `StepTree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId(usize);

impl StepId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Resultado de una operación suspendida que puede ser cancelada.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    Completed(T),
    /// Cancelada: el estado del step no cambió.
    Canceled,
}

/// Especificación de un subárbol, tal como la entregan los providers.
pub enum StepSpec<C> {
    Leaf(Box<dyn MigrationStep<C>>),
    Group {
        key: String,
        title: String,
        description: Option<String>,
        children: Vec<StepSpec<C>>,
    },
}

impl<C: Send + Sync> StepSpec<C> {
    pub fn leaf<S>(step: S) -> Self
        where S: MigrationStep<C> + 'static
    {
        StepSpec::Leaf(Box::new(step))
    }

    pub fn group(key: impl Into<String>, title: impl Into<String>, children: Vec<StepSpec<C>>) -> Self {
        StepSpec::Group { key: key.into(),
                          title: title.into(),
                          description: None,
                          children }
    }

    pub fn with_description(self, text: impl Into<String>) -> Self {
        match self {
            StepSpec::Group { key, title, children, .. } => StepSpec::Group { key,
                                                                             title,
                                                                             description: Some(text.into()),
                                                                             children },
            leaf => leaf,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            StepSpec::Leaf(step) => step.id(),
            StepSpec::Group { key, .. } => key,
        }
    }
}

/// Estado cacheado de una hoja.
pub struct Leaf<C> {
    step: Box<dyn MigrationStep<C>>,
    status: StepStatus,
    message: Option<String>,
    risk: Option<Risk>,
    /// La aplicabilidad debe re-derivarse antes de la próxima decisión.
    stale: bool,
}

pub enum NodeKind<C> {
    Leaf(Leaf<C>),
    Group { skipped: bool },
}

pub struct StepNode<C> {
    key: String,
    title: String,
    description: Option<String>,
    parent: Option<StepId>,
    children: Vec<StepId>,
    kind: NodeKind<C>,
}

impl<C> StepNode<C> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn parent(&self) -> Option<StepId> {
        self.parent
    }

    pub fn children(&self) -> &[StepId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    pub fn kind(&self) -> &NodeKind<C> {
        &self.kind
    }
}

impl<C> fmt::Debug for StepNode<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepNode")
         .field("key", &self.key)
         .field("parent", &self.parent)
         .field("children", &self.children)
         .field("leaf", &self.is_leaf())
         .finish()
    }
}

/// Estado de un grupo a partir de los estados de sus hijos.
///
/// - algún hijo `Failed` => `Failed`
/// - todos `Skipped` => `Skipped`
/// - todos resueltos (`Complete`/`Skipped`) => `Complete` (vacío incluido)
/// - todos `Unknown` => `Unknown`
/// - todos `Initialized` => `Initialized`
/// - en otro caso => `Incomplete`
pub fn rollup<I>(children: I) -> StepStatus
    where I: IntoIterator<Item = StepStatus>
{
    let mut any = false;
    let mut all_skipped = true;
    let mut all_done = true;
    let mut all_unknown = true;
    let mut all_initialized = true;
    for status in children {
        any = true;
        if status == StepStatus::Failed {
            return StepStatus::Failed;
        }
        all_skipped &= status == StepStatus::Skipped;
        all_done &= status.is_done();
        all_unknown &= status == StepStatus::Unknown;
        all_initialized &= status == StepStatus::Initialized;
    }
    if !any {
        return StepStatus::Complete;
    }
    if all_skipped {
        StepStatus::Skipped
    } else if all_done {
        StepStatus::Complete
    } else if all_unknown {
        StepStatus::Unknown
    } else if all_initialized {
        StepStatus::Initialized
    } else {
        StepStatus::Incomplete
    }
}

/// Árbol de steps de una corrida. Se crea una vez, se muta sólo mediante
/// initialize/apply/skip y se descarta al terminar.
pub struct StepTree<C> {
    nodes: Vec<StepNode<C>>,
    by_key: HashMap<String, StepId>,
}

impl<C: Send + Sync> StepTree<C> {
    /// Crea un árbol con un grupo raíz vacío.
    pub fn new(root_key: impl Into<String>, root_title: impl Into<String>) -> Self {
        let key = root_key.into();
        let mut by_key = HashMap::new();
        by_key.insert(key.clone(), StepId(0));
        Self { nodes: vec![StepNode { key,
                                      title: root_title.into(),
                                      description: None,
                                      parent: None,
                                      children: Vec::new(),
                                      kind: NodeKind::Group { skipped: false } }],
               by_key }
    }

    pub fn root(&self) -> StepId {
        StepId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    pub fn node(&self, id: StepId) -> Result<&StepNode<C>, EngineError> {
        self.nodes.get(id.0).ok_or(EngineError::UnknownStep(id))
    }

    fn node_mut(&mut self, id: StepId) -> Result<&mut StepNode<C>, EngineError> {
        self.nodes.get_mut(id.0).ok_or(EngineError::UnknownStep(id))
    }

    pub fn find(&self, key: &str) -> Option<StepId> {
        self.by_key.get(key).copied()
    }

    /// Añade una hoja al final de los hijos de `parent`.
    pub fn add_leaf(&mut self, parent: StepId, step: Box<dyn MigrationStep<C>>) -> Result<StepId, EngineError> {
        let key = step.id().to_string();
        let title = step.title().to_string();
        let description = step.description().map(str::to_string);
        self.push_node(parent,
                       key,
                       title,
                       description,
                       NodeKind::Leaf(Leaf { step,
                                             status: StepStatus::Unknown,
                                             message: None,
                                             risk: None,
                                             stale: false }))
    }

    /// Añade un grupo (sin comportamiento propio) bajo `parent`.
    pub fn add_group(&mut self,
                     parent: StepId,
                     key: impl Into<String>,
                     title: impl Into<String>,
                     description: Option<String>)
                     -> Result<StepId, EngineError> {
        self.push_node(parent, key.into(), title.into(), description, NodeKind::Group { skipped: false })
    }

    /// Inserta recursivamente un `StepSpec` bajo `parent`. Los grupos que
    /// quedan sin hijos no se insertan (devuelve `None`).
    pub fn insert_spec(&mut self, parent: StepId, spec: StepSpec<C>) -> Result<Option<StepId>, EngineError> {
        match spec {
            StepSpec::Leaf(step) => self.add_leaf(parent, step).map(Some),
            StepSpec::Group { key,
                              title,
                              description,
                              children, } => {
                if children.is_empty() {
                    debug!("dropping empty group '{key}'");
                    return Ok(None);
                }
                let id = self.add_group(parent, key, title, description)?;
                for child in children {
                    self.insert_spec(id, child)?;
                }
                if self.nodes[id.0].children.is_empty() {
                    self.detach_last(parent, id);
                    return Ok(None);
                }
                Ok(Some(id))
            }
        }
    }

    fn push_node(&mut self,
                 parent: StepId,
                 key: String,
                 title: String,
                 description: Option<String>,
                 kind: NodeKind<C>)
                 -> Result<StepId, EngineError> {
        match self.node(parent)?.kind {
            NodeKind::Group { .. } => {}
            NodeKind::Leaf(_) => return Err(EngineError::NotALeaf(self.nodes[parent.0].key.clone())),
        }
        if self.by_key.contains_key(&key) {
            return Err(EngineError::DuplicateStep(key));
        }
        let id = StepId(self.nodes.len());
        self.by_key.insert(key.clone(), id);
        self.nodes.push(StepNode { key,
                                   title,
                                   description,
                                   parent: Some(parent),
                                   children: Vec::new(),
                                   kind });
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    /// Deshace la inserción de un grupo que quedó vacío (último nodo añadido).
    fn detach_last(&mut self, parent: StepId, id: StepId) {
        self.nodes[parent.0].children.retain(|c| *c != id);
        if id.0 + 1 == self.nodes.len() {
            let node = self.nodes.pop();
            if let Some(node) = node {
                self.by_key.remove(&node.key);
            }
        }
    }

    /// Estado efectivo; en grupos se calcula por rollup.
    pub fn status(&self, id: StepId) -> Result<StepStatus, EngineError> {
        let node = self.node(id)?;
        Ok(match &node.kind {
            NodeKind::Leaf(leaf) => leaf.status,
            NodeKind::Group { skipped: true } => StepStatus::Skipped,
            NodeKind::Group { skipped: false } => {
                rollup(node.children.iter().map(|c| self.status_unchecked(*c)))
            }
        })
    }

    fn status_unchecked(&self, id: StepId) -> StepStatus {
        self.status(id).unwrap_or(StepStatus::Unknown)
    }

    /// Riesgo conocido; en grupos es el máximo de los riesgos conocidos.
    pub fn risk(&self, id: StepId) -> Result<Option<Risk>, EngineError> {
        let node = self.node(id)?;
        Ok(match &node.kind {
            NodeKind::Leaf(leaf) => leaf.risk,
            NodeKind::Group { .. } => node.children
                                          .iter()
                                          .filter_map(|c| self.risk(*c).ok().flatten())
                                          .max(),
        })
    }

    pub fn message(&self, id: StepId) -> Result<Option<&str>, EngineError> {
        Ok(match &self.node(id)?.kind {
            NodeKind::Leaf(leaf) => leaf.message.as_deref(),
            NodeKind::Group { .. } => None,
        })
    }

    pub fn is_stale(&self, id: StepId) -> Result<bool, EngineError> {
        Ok(match &self.node(id)?.kind {
            NodeKind::Leaf(leaf) => leaf.stale,
            NodeKind::Group { .. } => false,
        })
    }

    pub fn can_skip(&self, id: StepId) -> Result<bool, EngineError> {
        Ok(match &self.node(id)?.kind {
            NodeKind::Leaf(leaf) => leaf.step.can_skip(),
            NodeKind::Group { .. } => self.leaves(id).iter().all(|leaf| self.leaf_can_skip(*leaf)),
        })
    }

    fn leaf_can_skip(&self, id: StepId) -> bool {
        match &self.nodes[id.0].kind {
            NodeKind::Leaf(leaf) => leaf.status.is_done() || leaf.step.can_skip(),
            NodeKind::Group { .. } => true,
        }
    }

    /// Comportamiento de una hoja (para exponer sus acciones).
    pub fn step(&self, id: StepId) -> Result<&dyn MigrationStep<C>, EngineError> {
        match &self.node(id)?.kind {
            NodeKind::Leaf(leaf) => Ok(leaf.step.as_ref()),
            NodeKind::Group { .. } => Err(EngineError::NotALeaf(self.nodes[id.0].key.clone())),
        }
    }

    /// Ancestros de `id`, del padre hacia la raíz.
    pub fn ancestors(&self, id: StepId) -> Vec<StepId> {
        let mut out = Vec::new();
        let mut cursor = self.nodes.get(id.0).and_then(|n| n.parent);
        while let Some(p) = cursor {
            out.push(p);
            cursor = self.nodes[p.0].parent;
        }
        out
    }

    /// Todos los nodos en orden de declaración (profundidad primero).
    pub fn walk(&self) -> Vec<StepId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev());
        }
        out
    }

    /// Hojas del subárbol de `id` en orden de declaración.
    pub fn leaves(&self, id: StepId) -> Vec<StepId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current.0) else { continue };
            if node.is_leaf() {
                out.push(current);
            } else {
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    /// Primera hoja no resuelta en profundidad y orden de declaración.
    ///
    /// Las hojas `Failed` cuentan como no resueltas: bloquean el avance hasta
    /// que se salten. Los grupos saltados no se recorren.
    pub fn next_step(&self) -> Option<StepId> {
        self.first_unresolved(self.root())
    }

    fn first_unresolved(&self, id: StepId) -> Option<StepId> {
        let node = &self.nodes[id.0];
        match &node.kind {
            NodeKind::Leaf(leaf) if leaf.status.is_done() => None,
            NodeKind::Leaf(_) => Some(id),
            NodeKind::Group { skipped: true } => None,
            NodeKind::Group { skipped: false } => node.children.iter().find_map(|c| self.first_unresolved(*c)),
        }
    }

    /// Marca el subárbol para re-inicialización. Los steps terminales no se
    /// tocan.
    pub fn mark_stale(&mut self, id: StepId) -> Result<(), EngineError> {
        self.node(id)?;
        for leaf_id in self.leaves(id) {
            if let NodeKind::Leaf(leaf) = &mut self.nodes[leaf_id.0].kind {
                if !leaf.status.is_terminal() {
                    leaf.stale = true;
                }
            }
        }
        Ok(())
    }

    /// Inicializa un step: deriva aplicabilidad y riesgo.
    ///
    /// Idempotente en steps terminales (devuelve lo cacheado sin volver a
    /// ejecutar el check). En un grupo sólo reporta su estado derivado.
    pub async fn initialize(&mut self,
                            id: StepId,
                            ctx: &C,
                            cancel: &CancellationToken)
                            -> Result<Attempt<InitializeResult>, EngineError> {
        if !self.node(id)?.is_leaf() {
            return Ok(Attempt::Completed(InitializeResult { status: self.status(id)?,
                                                            message: None,
                                                            risk: self.risk(id)? }));
        }
        let node = self.node_mut(id)?;
        let key = node.key.clone();
        let title = node.title.clone();
        let NodeKind::Leaf(leaf) = &mut node.kind else {
            return Err(EngineError::NotALeaf(key));
        };
        if leaf.status.is_terminal() {
            debug!("initialize '{key}': cached terminal status {}", leaf.status);
            return Ok(Attempt::Completed(cached_init(leaf)));
        }
        if cancel.is_cancelled() {
            leaf.stale = true;
            return Ok(Attempt::Canceled);
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            res = leaf.step.check(ctx, cancel) => Some(res),
        };
        let check = match outcome {
            None | Some(Err(StepError::Canceled)) => {
                warn!("initialize '{key}' canceled; status stays {}", leaf.status);
                leaf.stale = true;
                return Ok(Attempt::Canceled);
            }
            Some(Err(source)) => {
                return Err(EngineError::StepFault { step: key, title, source });
            }
            Some(Ok(check)) => check,
        };

        let (status, message, risk) = match check {
            StepCheck::Applicable { risk, message } => (StepStatus::Incomplete, message, Some(risk)),
            StepCheck::NotApplicable { message } => (StepStatus::Initialized, message, Some(Risk::None)),
            StepCheck::AlreadyDone { message } => (StepStatus::Complete, message, Some(Risk::None)),
            StepCheck::Failed { message } => (StepStatus::Failed, Some(message), None),
        };
        leaf.status = status;
        leaf.message = message;
        leaf.risk = risk;
        leaf.stale = false;
        info!("step '{key}' initialized: {status}");
        Ok(Attempt::Completed(cached_init(leaf)))
    }

    /// Aplica una hoja inicializada.
    ///
    /// Antes de inicializar (o con la aplicabilidad vencida) devuelve un
    /// resultado `Failed` con el mensaje de precondición y no toca el estado.
    pub async fn apply(&mut self,
                       id: StepId,
                       ctx: &mut C,
                       cancel: &CancellationToken)
                       -> Result<Attempt<ApplyResult>, EngineError> {
        let node = self.node_mut(id)?;
        let key = node.key.clone();
        let title = node.title.clone();
        let NodeKind::Leaf(leaf) = &mut node.kind else {
            return Err(EngineError::NotALeaf(key));
        };

        let current = leaf.status;
        match current {
            StepStatus::Unknown => {
                warn!("apply '{key}' requested before initialize");
                return Ok(Attempt::Completed(ApplyResult { status: StepStatus::Failed,
                                                           message: Some(format!("step '{key}' has not been initialized")) }));
            }
            _ if leaf.stale => {
                warn!("apply '{key}' requested with stale applicability");
                return Ok(Attempt::Completed(ApplyResult { status: StepStatus::Failed,
                                                           message: Some(format!("step '{key}' must be re-initialized before apply")) }));
            }
            s if s.is_terminal() => {
                return Ok(Attempt::Completed(ApplyResult { status: s,
                                                           message: leaf.message.clone() }));
            }
            StepStatus::Initialized => {
                leaf.status = StepStatus::Complete;
                leaf.message = Some(format!("nothing to apply for '{key}'"));
                info!("step '{key}' not applicable; completed as no-op");
                return Ok(Attempt::Completed(ApplyResult { status: leaf.status,
                                                           message: leaf.message.clone() }));
            }
            _ => {}
        }
        if cancel.is_cancelled() {
            warn!("apply '{key}' canceled before start; status stays {}", leaf.status);
            leaf.stale = true;
            return Ok(Attempt::Canceled);
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            res = leaf.step.apply(ctx, cancel) => Some(res),
        };
        match outcome {
            None | Some(Err(StepError::Canceled)) => {
                warn!("apply '{key}' canceled; status stays {}", leaf.status);
                leaf.stale = true;
                Ok(Attempt::Canceled)
            }
            Some(Err(source)) => Err(EngineError::StepFault { step: key, title, source }),
            Some(Ok(ApplyOutcome::Applied { message })) => {
                leaf.status = StepStatus::Complete;
                leaf.message = message;
                info!("step '{key}' applied");
                Ok(Attempt::Completed(ApplyResult { status: leaf.status,
                                                    message: leaf.message.clone() }))
            }
            Some(Ok(ApplyOutcome::Failed { message })) => {
                leaf.status = StepStatus::Failed;
                leaf.message = Some(message);
                warn!("step '{key}' failed: {}", leaf.message.as_deref().unwrap_or_default());
                Ok(Attempt::Completed(ApplyResult { status: leaf.status,
                                                    message: leaf.message.clone() }))
            }
        }
    }

    /// Salta un step (hoja o grupo completo).
    ///
    /// Devuelve `false` si ya está resuelto o si el tipo de step no permite
    /// saltarse; el llamador debe reportar el rechazo.
    pub fn skip(&mut self, id: StepId) -> Result<bool, EngineError> {
        let status = self.status(id)?;
        if status.is_done() {
            return Ok(false);
        }
        if !self.can_skip(id)? {
            warn!("step '{}' does not allow skipping", self.nodes[id.0].key);
            return Ok(false);
        }
        for leaf_id in self.leaves(id) {
            if let NodeKind::Leaf(leaf) = &mut self.nodes[leaf_id.0].kind {
                if !leaf.status.is_done() {
                    leaf.status = StepStatus::Skipped;
                    leaf.stale = false;
                }
            }
        }
        if let NodeKind::Group { skipped } = &mut self.nodes[id.0].kind {
            *skipped = true;
        }
        info!("step '{}' skipped", self.nodes[id.0].key);
        Ok(true)
    }
}

fn cached_init<C>(leaf: &Leaf<C>) -> InitializeResult {
    InitializeResult { status: leaf.status,
                       message: leaf.message.clone(),
                       risk: leaf.risk }
}
