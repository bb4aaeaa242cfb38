//! Index-addressed node storage.
//!
//! Expression and rule trees are stored flat. A node refers to its children
//! by [`NodeId`]; the parent of each node lives in a separate table so nodes
//! themselves never hold back-references.

use std::fmt;
use std::marker::PhantomData;

/// Typed index of a node in an [`Arena`].
pub struct NodeId<N> {
    index: u32,
    _node: PhantomData<fn() -> N>,
}

impl<N> NodeId<N> {
    pub fn index(self) -> usize {
        self.index as usize
    }

    fn from_index(index: usize) -> Self {
        NodeId {
            index: index as u32,
            _node: PhantomData,
        }
    }
}

// Manual impls: derives would require `N: Clone` etc.
impl<N> Clone for NodeId<N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<N> Copy for NodeId<N> {}

impl<N> PartialEq for NodeId<N> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<N> Eq for NodeId<N> {}

impl<N> std::hash::Hash for NodeId<N> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<N> fmt::Debug for NodeId<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// Flat node storage with a parallel parent table.
#[derive(Debug, Clone)]
pub struct Arena<N> {
    nodes: Vec<N>,
    parents: Vec<Option<NodeId<N>>>,
}

impl<N> Default for Arena<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> Arena<N> {
    pub fn new() -> Self {
        Arena {
            nodes: Vec::new(),
            parents: Vec::new(),
        }
    }

    /// Append a node with no parent yet.
    pub fn alloc(&mut self, node: N) -> NodeId<N> {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(node);
        self.parents.push(None);
        id
    }

    /// Record `parent` as the parent of `child`.
    pub fn set_parent(&mut self, child: NodeId<N>, parent: NodeId<N>) {
        if let Some(slot) = self.parents.get_mut(child.index()) {
            *slot = Some(parent);
        }
    }

    pub fn get(&self, id: NodeId<N>) -> Option<&N> {
        self.nodes.get(id.index())
    }

    pub fn parent(&self, id: NodeId<N>) -> Option<NodeId<N>> {
        self.parents.get(id.index()).copied().flatten()
    }

    /// `id` followed by its parent, grandparent, ... up to the root.
    pub fn ancestors(&self, id: NodeId<N>) -> Vec<NodeId<N>> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            // Guard against a malformed table forming a cycle.
            if chain.len() > self.nodes.len() {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId<N>, &N)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId::from_index(i), n))
    }
}
