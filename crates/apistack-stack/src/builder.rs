//! Declaration-ordered stack builder.
//!
//! Every node (asset, derived value, resource, output) is declared through
//! [`StackBuilder`]. A declaration may only reference nodes that were
//! declared before it; references found in resource properties, explicit
//! `DependsOn` entries, and ordering-only edges all become edges in the
//! [`DependencyGraph`].
//!
//! Constructs are higher-level declarations that expand into one or more
//! nodes. Adding a construct returns a typed [`Handle`], and constructs that
//! need another construct take its handle, so the order in which they can be
//! written is checked at compile time.

use std::fmt;

use apistack_bundling::AssetSpec;
use apistack_core::{CoreError, DependencyGraph, LogicalId, NodeKind};
use apistack_template::{Output, ResourceDecl, Template};
use tracing::debug;

use crate::checkpoint::Checkpoint;
use crate::error::StackResult;

/// Something that can be declared on a [`StackBuilder`].
pub trait Construct: Sized {
    /// Values other constructs need from this one once declared.
    type Attrs: Clone + fmt::Debug;

    /// Declare the construct's nodes under `id`.
    ///
    /// Returns the logical id the handle points at, which may differ from
    /// `id` when a construct overrides it, and the construct's attributes.
    fn declare(self, id: LogicalId, stack: &mut StackBuilder) -> StackResult<(LogicalId, Self::Attrs)>;
}

/// A reference to a declared construct.
pub struct Handle<C: Construct> {
    id: LogicalId,
    attrs: C::Attrs,
}

impl<C: Construct> Handle<C> {
    pub(crate) fn new(id: LogicalId, attrs: C::Attrs) -> Self {
        Self { id, attrs }
    }

    /// Logical id of the construct's primary node.
    #[must_use]
    pub fn id(&self) -> &LogicalId {
        &self.id
    }

    /// The construct's attributes.
    #[must_use]
    pub fn attrs(&self) -> &C::Attrs {
        &self.attrs
    }
}

impl<C: Construct> Clone for Handle<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            attrs: self.attrs.clone(),
        }
    }
}

impl<C: Construct> fmt::Debug for Handle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("attrs", &self.attrs)
            .finish()
    }
}

/// Collects declarations in order and checks every reference as it goes.
#[derive(Debug)]
pub struct StackBuilder {
    name: String,
    graph: DependencyGraph,
    template: Template,
    assets: Vec<AssetSpec>,
    checkpoints: Vec<Checkpoint>,
}

impl StackBuilder {
    /// Start an empty stack.
    #[must_use]
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            name: name.into(),
            graph: DependencyGraph::new(),
            template: Template::new(description),
            assets: Vec::new(),
            checkpoints: Vec::new(),
        }
    }

    /// Stack name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare a construct.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a valid logical id, or if the
    /// construct's declarations are rejected.
    pub fn add<C: Construct>(&mut self, id: &str, construct: C) -> StackResult<Handle<C>> {
        let id = LogicalId::new(id)?;
        let (primary, attrs) = construct.declare(id, self)?;
        Ok(Handle::new(primary, attrs))
    }

    /// Declare a resource.
    ///
    /// # Errors
    ///
    /// See [`StackBuilder::declare_resource_after`].
    pub fn declare_resource(&mut self, id: LogicalId, decl: ResourceDecl) -> StackResult<()> {
        self.declare_resource_after(id, decl, &[])
    }

    /// Declare a resource that must also come after the given nodes.
    ///
    /// `after` adds ordering edges for dependencies that are not visible in
    /// the resource's properties (e.g. an asset named through its hash).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateLogicalId`] if `id` is taken, or
    /// [`CoreError::UndeclaredReference`] if the resource references a node
    /// that has not been declared yet.
    pub fn declare_resource_after(
        &mut self,
        id: LogicalId,
        decl: ResourceDecl,
        after: &[&LogicalId],
    ) -> StackResult<()> {
        let mut dependencies = decl.references();
        dependencies.extend(after.iter().map(|d| (*d).clone()));
        debug!(logical_id = %id, resource_type = decl.resource_type(), "declaring resource");

        self.declare_node(&id, NodeKind::Resource, dependencies.iter())?;
        self.template.push_resource(id, decl);
        Ok(())
    }

    /// Declare a build-time asset.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateLogicalId`] if the asset id is taken.
    pub fn declare_asset(&mut self, asset: AssetSpec) -> StackResult<()> {
        debug!(logical_id = %asset.id(), hash = asset.hash(), "declaring asset");
        self.declare_node(asset.id(), NodeKind::Asset, std::iter::empty())?;
        self.assets.push(asset);
        Ok(())
    }

    /// Declare a value derived from other nodes that is not itself a
    /// resource.
    ///
    /// # Errors
    ///
    /// See [`StackBuilder::declare_resource_after`].
    pub fn declare_derived(&mut self, id: LogicalId, from: &[&LogicalId]) -> StackResult<()> {
        self.declare_node(&id, NodeKind::Derived, from.iter().copied())
    }

    /// Declare a stack output.
    ///
    /// # Errors
    ///
    /// See [`StackBuilder::declare_resource_after`].
    pub fn declare_output(&mut self, id: &str, output: Output) -> StackResult<()> {
        let id = LogicalId::new(id)?;
        let references = output.value.references();
        self.declare_node(&id, NodeKind::Output, references.iter())?;
        self.template.push_output(id, output);
        Ok(())
    }

    /// Record and emit a checkpoint.
    pub fn checkpoint(&mut self, checkpoint: Checkpoint) {
        checkpoint.emit(&self.name);
        self.checkpoints.push(checkpoint);
    }

    /// Whether a node with this id has been declared.
    #[must_use]
    pub fn contains(&self, id: &LogicalId) -> bool {
        self.graph.contains(id)
    }

    /// Finish declaration and verify the graph is acyclic.
    ///
    /// # Errors
    ///
    /// Returns [`apistack_core::CoreError::DependencyCycle`] wrapped in
    /// [`crate::StackError::Core`] if the graph has a cycle.
    pub fn finish(self) -> StackResult<DeclaredStack> {
        self.graph.topological_order()?;
        Ok(DeclaredStack {
            name: self.name,
            graph: self.graph,
            template: self.template,
            assets: self.assets,
            checkpoints: self.checkpoints,
        })
    }

    fn declare_node<'a>(
        &mut self,
        id: &LogicalId,
        kind: NodeKind,
        dependencies: impl Iterator<Item = &'a LogicalId>,
    ) -> StackResult<()> {
        if self.graph.contains(id) {
            return Err(CoreError::DuplicateLogicalId(id.to_string()).into());
        }

        let dependencies: Vec<&LogicalId> = dependencies.collect();
        if let Some(missing) = dependencies.iter().find(|d| !self.graph.contains(d)) {
            return Err(CoreError::UndeclaredReference {
                from: id.to_string(),
                to: missing.to_string(),
            }
            .into());
        }

        self.graph.add_node(id.clone(), kind)?;
        for dependency in dependencies {
            self.graph.add_dependency(id, dependency)?;
        }
        Ok(())
    }
}

/// A fully declared stack.
#[derive(Debug)]
pub struct DeclaredStack {
    /// Stack name.
    pub name: String,
    /// Dependency graph over every declared node.
    pub graph: DependencyGraph,
    /// The CloudFormation template.
    pub template: Template,
    /// Declared assets in declaration order.
    pub assets: Vec<AssetSpec>,
    /// Checkpoints reached, in order.
    pub checkpoints: Vec<Checkpoint>,
}

impl DeclaredStack {
    /// Logical ids in evaluation order.
    ///
    /// # Errors
    ///
    /// Not expected after [`StackBuilder::finish`], which already checked
    /// for cycles.
    pub fn plan(&self) -> StackResult<Vec<LogicalId>> {
        Ok(self
            .graph
            .topological_order()?
            .into_iter()
            .map(|node| node.id.clone())
            .collect())
    }
}
