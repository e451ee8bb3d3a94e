//! Arena-backed step trees.
//!
//! A [`StepTree`] is assembled once per conversation type and shared
//! read-only afterwards. Nodes live in a flat arena and refer to each other
//! by [`NodeId`]; the parent link is an index, never an owning edge.
//! Attaching a subtree copies its nodes into the arena, so two branches built
//! from the same fragment never alias each other.

use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::{address::Address, step::StepDefinition};

/// Handle to a node within one [`StepTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Tree construction and traversal error.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Step '{parent}' already has a child named '{name}'")]
    DuplicateStep { parent: String, name: String },
    #[error("Step '{current}' has no child named '{name}' (children: {valid:?})")]
    UnknownStep {
        current: String,
        name: String,
        valid: Vec<String>,
    },
    #[error("No node with address {0}")]
    UnknownAddress(Address),
    #[error("Fork requires at least one branch")]
    EmptyFork,
}

/// One branch handed to [`StepTree::fork`].
pub enum Branch {
    /// A single step.
    Step(Arc<dyn StepDefinition>),
    /// A whole tree, attached by copy.
    Subtree(StepTree),
}

impl From<Arc<dyn StepDefinition>> for Branch {
    fn from(step: Arc<dyn StepDefinition>) -> Self {
        Self::Step(step)
    }
}

impl From<StepTree> for Branch {
    fn from(tree: StepTree) -> Self {
        Self::Subtree(tree)
    }
}

impl From<&StepTree> for Branch {
    fn from(tree: &StepTree) -> Self {
        Self::Subtree(tree.clone())
    }
}

#[derive(Clone)]
struct Node {
    step: Arc<dyn StepDefinition>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    address: Address,
}

/// Tree of steps with deterministic addressing.
#[derive(Clone)]
pub struct StepTree {
    nodes: Vec<Node>,
}

impl StepTree {
    /// Create a tree holding only `root`.
    #[must_use]
    pub fn new(root: Arc<dyn StepDefinition>) -> Self {
        Self {
            nodes: vec![Node {
                step: root,
                parent: None,
                children: Vec::new(),
                address: Address::root(),
            }],
        }
    }

    /// Create a tree from a concrete step.
    #[must_use]
    pub fn from_step(root: impl StepDefinition + 'static) -> Self {
        Self::new(Arc::new(root))
    }

    /// The root node.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a tree holds at least its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node ids in arena order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Link `step` as a successor of `parent`, returning the new node.
    ///
    /// # Errors
    /// Returns [`TreeError::DuplicateStep`] if `parent` already has a child
    /// with the same name.
    pub fn append_child(
        &mut self,
        parent: NodeId,
        step: Arc<dyn StepDefinition>,
    ) -> Result<NodeId, TreeError> {
        self.ensure_unique(parent, step.name())?;
        Ok(self.push(parent, step))
    }

    /// Copy `subtree` under `parent`, returning the copy of its root.
    ///
    /// Addresses of every copied node are recomputed for the new position.
    ///
    /// # Errors
    /// Returns [`TreeError::DuplicateStep`] if `parent` already has a child
    /// named like the subtree's root.
    pub fn append_subtree(
        &mut self,
        parent: NodeId,
        subtree: &Self,
    ) -> Result<NodeId, TreeError> {
        let src_root = subtree.root();
        self.ensure_unique(parent, subtree.name(src_root))?;

        let copied_root = self.push(parent, Arc::clone(subtree.step(src_root)));
        let mut stack: Vec<(NodeId, NodeId)> = subtree.nodes[src_root.0]
            .children
            .iter()
            .rev()
            .map(|&child| (child, copied_root))
            .collect();

        while let Some((src, dst_parent)) = stack.pop() {
            let copied = self.push(dst_parent, Arc::clone(subtree.step(src)));
            stack.extend(
                subtree.nodes[src.0]
                    .children
                    .iter()
                    .rev()
                    .map(|&child| (child, copied)),
            );
        }

        tracing::trace!(
            parent = %self.address(parent),
            root = subtree.name(src_root),
            nodes = subtree.len(),
            "Copied subtree"
        );
        Ok(copied_root)
    }

    /// Attach several alternative branches under `parent`.
    ///
    /// Each branch becomes an independent copy. Returns `parent` so that
    /// building can continue from the fork point.
    ///
    /// # Errors
    /// Returns [`TreeError::EmptyFork`] for no branches, or
    /// [`TreeError::DuplicateStep`] if two branches share a root name.
    pub fn fork<I, B>(&mut self, parent: NodeId, branches: I) -> Result<NodeId, TreeError>
    where
        I: IntoIterator<Item = B>,
        B: Into<Branch>,
    {
        let mut attached = 0usize;
        for branch in branches {
            match branch.into() {
                Branch::Step(step) => {
                    self.append_child(parent, step)?;
                }
                Branch::Subtree(tree) => {
                    self.append_subtree(parent, &tree)?;
                }
            }
            attached += 1;
        }
        if attached == 0 {
            return Err(TreeError::EmptyFork);
        }
        Ok(parent)
    }

    /// Walk parent links from `node` to the node without a parent.
    #[must_use]
    pub fn root_of(&self, node: NodeId) -> NodeId {
        let mut current = node;
        while let Some(parent) = self.nodes[current.0].parent {
            current = parent;
        }
        current
    }

    /// Step held by `node`.
    #[must_use]
    pub fn step(&self, node: NodeId) -> &Arc<dyn StepDefinition> {
        &self.nodes[node.0].step
    }

    /// Name of the step held by `node`.
    #[must_use]
    pub fn name(&self, node: NodeId) -> &str {
        self.nodes[node.0].step.name()
    }

    /// Address of `node`.
    #[must_use]
    pub fn address(&self, node: NodeId) -> &Address {
        &self.nodes[node.0].address
    }

    /// Parent of `node`, absent for the root.
    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    /// Children of `node` in insertion order.
    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// First child of `node`, the default successor.
    #[must_use]
    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].children.first().copied()
    }

    /// Child of `node` whose step is named `name`.
    ///
    /// # Errors
    /// Returns [`TreeError::UnknownStep`] if there is no such child.
    pub fn child(&self, node: NodeId, name: &str) -> Result<NodeId, TreeError> {
        self.children(node)
            .iter()
            .copied()
            .find(|&c| self.name(c) == name)
            .ok_or_else(|| TreeError::UnknownStep {
                current: self.name(node).to_string(),
                name: name.to_string(),
                valid: self
                    .children(node)
                    .iter()
                    .map(|&c| self.name(c).to_string())
                    .collect(),
            })
    }

    /// Depth-first search for `address` in the subtree under `start`.
    #[must_use]
    pub fn find_node(&self, start: NodeId, address: &Address) -> Option<NodeId> {
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            if self.address(node) == address {
                return Some(node);
            }
            stack.extend(self.children(node).iter().rev());
        }
        None
    }

    /// Depth-first search for `address` from the root.
    #[must_use]
    pub fn find(&self, address: &Address) -> Option<NodeId> {
        self.find_node(self.root(), address)
    }

    fn ensure_unique(&self, parent: NodeId, name: &str) -> Result<(), TreeError> {
        if self.children(parent).iter().any(|&c| self.name(c) == name) {
            return Err(TreeError::DuplicateStep {
                parent: self.name(parent).to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn push(&mut self, parent: NodeId, step: Arc<dyn StepDefinition>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let address = self.nodes[parent.0].address.child(step.name());
        self.nodes.push(Node {
            step,
            parent: Some(parent),
            children: Vec::new(),
            address,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, node: NodeId, depth: usize) -> fmt::Result {
        writeln!(f, "{:indent$}{}", "", self.name(node), indent = depth * 2)?;
        for &child in self.children(node) {
            self.fmt_node(f, child, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Debug for StepTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "StepTree")?;
        self.fmt_node(f, self.root(), 1)
    }
}
