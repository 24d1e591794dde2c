//! The frozen alias tree and its queries.
//!
//! An [`AliasTree`] is produced by [`AliasTreeBuilder`](crate::analysis::AliasTreeBuilder)
//! and never changes afterwards. Nodes live in an arena indexed by [`AliasNodeId`], stored in
//! pre-order from the top node, and refer to their parent and children by handle.
//!
//! # Shape
//!
//! - the top node (whole memory) is the root and the only node without a parent
//! - estimate nodes hold clusters of memory locations; every node covers all locations in
//!   its subtree and siblings never alias each other
//! - an unknown node holds instructions with an undescribed footprint; its relation to its
//!   parent and to its children is only assumed

use std::{collections::HashMap, fmt};

use strum::{Display, EnumIter};

use crate::{
    analysis::memory::{EstimateNode, MemoryLocation, UnknownNode},
    ir::ValueId,
};

/// Handle of a node of an [`AliasTree`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AliasNodeId(usize);

impl AliasNodeId {
    /// Creates a handle from an arena index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for AliasNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for AliasNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Kind of a node without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum NodeKindTag {
    /// The root.
    Top,
    /// A cluster of memory locations.
    Estimate,
    /// Instructions with an undescribed footprint.
    Unknown,
}

/// Precision of the edge between a node and its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Relation {
    /// The parent provably covers the node.
    Proven,
    /// Containment is assumed; the edge involves an unknown node.
    Assumed,
}

/// What a node stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasNodeKind {
    /// The whole reachable memory.
    Top,
    /// Clusters of memory locations.
    Estimate(EstimateNode),
    /// Instructions with an undescribed footprint.
    Unknown(UnknownNode),
}

impl AliasNodeKind {
    /// The kind without payload.
    #[must_use]
    pub const fn tag(&self) -> NodeKindTag {
        match self {
            Self::Top => NodeKindTag::Top,
            Self::Estimate(_) => NodeKindTag::Estimate,
            Self::Unknown(_) => NodeKindTag::Unknown,
        }
    }
}

/// A node of an [`AliasTree`].
#[derive(Debug, Clone)]
pub struct AliasNode {
    pub(crate) id: AliasNodeId,
    pub(crate) kind: AliasNodeKind,
    pub(crate) parent: Option<AliasNodeId>,
    pub(crate) children: Vec<AliasNodeId>,
    pub(crate) relation: Relation,
}

impl AliasNode {
    /// The node's handle.
    #[must_use]
    pub fn id(&self) -> AliasNodeId {
        self.id
    }

    /// The node's kind and payload.
    #[must_use]
    pub fn kind(&self) -> &AliasNodeKind {
        &self.kind
    }

    /// The kind without payload.
    #[must_use]
    pub fn tag(&self) -> NodeKindTag {
        self.kind.tag()
    }

    /// The parent, `None` for the top node.
    #[must_use]
    pub fn parent(&self) -> Option<AliasNodeId> {
        self.parent
    }

    /// The children, in insertion order.
    #[must_use]
    pub fn children(&self) -> &[AliasNodeId] {
        &self.children
    }

    /// Precision of the edge to the parent.
    #[must_use]
    pub fn relation(&self) -> Relation {
        self.relation
    }

    /// Returns `true` for the top node.
    #[must_use]
    pub fn is_top(&self) -> bool {
        matches!(self.kind, AliasNodeKind::Top)
    }

    /// The estimate payload, if this is an estimate node.
    #[must_use]
    pub fn as_estimate(&self) -> Option<&EstimateNode> {
        match &self.kind {
            AliasNodeKind::Estimate(node) => Some(node),
            _ => None,
        }
    }

    /// The unknown payload, if this is an unknown node.
    #[must_use]
    pub fn as_unknown(&self) -> Option<&UnknownNode> {
        match &self.kind {
            AliasNodeKind::Unknown(node) => Some(node),
            _ => None,
        }
    }
}

/// Memory hierarchy of one function.
///
/// Built atomically by [`AliasTree::build`] or an
/// [`AliasTreeBuilder`](crate::analysis::AliasTreeBuilder); immutable afterwards and safe to
/// share between threads.
#[derive(Debug, Clone)]
pub struct AliasTree {
    pub(crate) function: String,
    pub(crate) nodes: Vec<AliasNode>,
    pub(crate) locations: HashMap<MemoryLocation, AliasNodeId>,
    pub(crate) pointers: HashMap<ValueId, Vec<AliasNodeId>>,
    pub(crate) instructions: HashMap<ValueId, Vec<AliasNodeId>>,
}

impl AliasTree {
    /// Name of the analysed function.
    #[must_use]
    pub fn function_name(&self) -> &str {
        &self.function
    }

    /// The top node.
    #[must_use]
    pub fn top(&self) -> AliasNodeId {
        AliasNodeId::new(0)
    }

    /// Returns the node for `id`.
    #[must_use]
    pub fn node(&self, id: AliasNodeId) -> Option<&AliasNode> {
        self.nodes.get(id.index())
    }

    /// Iterates over all nodes in pre-order from the top node.
    pub fn nodes(&self) -> impl Iterator<Item = &AliasNode> {
        self.nodes.iter()
    }

    /// Number of nodes, including the top node.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Children of `id`; empty for leaves and unknown handles.
    #[must_use]
    pub fn children(&self, id: AliasNodeId) -> &[AliasNodeId] {
        self.node(id).map_or(&[][..], AliasNode::children)
    }

    /// Parent of `id`.
    #[must_use]
    pub fn parent(&self, id: AliasNodeId) -> Option<AliasNodeId> {
        self.node(id).and_then(AliasNode::parent)
    }

    /// The node holding `location`.
    #[must_use]
    pub fn find_location(&self, location: &MemoryLocation) -> Option<AliasNodeId> {
        self.locations.get(location).copied()
    }

    /// The nodes whose clusters contain the pointer `ptr`.
    #[must_use]
    pub fn find_pointer(&self, ptr: ValueId) -> &[AliasNodeId] {
        self.pointers.get(&ptr).map_or(&[][..], Vec::as_slice)
    }

    /// The nodes holding the memory accessed by the instruction `inst`.
    #[must_use]
    pub fn find_instruction(&self, inst: ValueId) -> &[AliasNodeId] {
        self.instructions.get(&inst).map_or(&[][..], Vec::as_slice)
    }

    /// Iterates over the estimate nodes.
    pub fn estimate_nodes(&self) -> impl Iterator<Item = &AliasNode> {
        self.nodes.iter().filter(|n| n.as_estimate().is_some())
    }

    /// Iterates over the unknown nodes.
    pub fn unknown_nodes(&self) -> impl Iterator<Item = &AliasNode> {
        self.nodes.iter().filter(|n| n.as_unknown().is_some())
    }

    /// Returns `true` if `ancestor` is `node` or lies on its path to the top node.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: AliasNodeId, node: AliasNodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Returns `true` if memory of `a` may overlap memory of `b`.
    ///
    /// Nodes on a common root path may alias; nodes in disjoint subtrees never do.
    #[must_use]
    pub fn nodes_may_alias(&self, a: AliasNodeId, b: AliasNodeId) -> bool {
        self.is_ancestor(a, b) || self.is_ancestor(b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::memory::{AccessFlags, EstimateMemory};

    /// top -> estimate(%v0) -> estimate(%v1), top -> unknown
    fn sample() -> AliasTree {
        let outer = MemoryLocation::unknown_size(ValueId::new(0));
        let inner = MemoryLocation::precise(ValueId::new(1), 4);
        let node = |id, kind, parent: Option<usize>, children: Vec<usize>, relation| AliasNode {
            id: AliasNodeId::new(id),
            kind,
            parent: parent.map(AliasNodeId::new),
            children: children.into_iter().map(AliasNodeId::new).collect(),
            relation,
        };
        let estimate = |loc| {
            AliasNodeKind::Estimate(EstimateNode {
                clusters: vec![EstimateMemory::new(loc, AccessFlags::READ)],
            })
        };
        AliasTree {
            function: "f".into(),
            nodes: vec![
                node(0, AliasNodeKind::Top, None, vec![1, 3], Relation::Proven),
                node(1, estimate(outer), Some(0), vec![2], Relation::Proven),
                node(2, estimate(inner), Some(1), vec![], Relation::Proven),
                node(
                    3,
                    AliasNodeKind::Unknown(UnknownNode::default()),
                    Some(0),
                    vec![],
                    Relation::Assumed,
                ),
            ],
            locations: HashMap::from([(outer, AliasNodeId::new(1)), (inner, AliasNodeId::new(2))]),
            pointers: HashMap::new(),
            instructions: HashMap::new(),
        }
    }

    #[test]
    fn test_ancestry() {
        let tree = sample();
        let (top, outer, inner, unknown) = (
            AliasNodeId::new(0),
            AliasNodeId::new(1),
            AliasNodeId::new(2),
            AliasNodeId::new(3),
        );
        assert!(tree.is_ancestor(top, inner));
        assert!(tree.is_ancestor(outer, inner));
        assert!(!tree.is_ancestor(inner, outer));
        assert!(tree.nodes_may_alias(inner, outer));
        assert!(!tree.nodes_may_alias(inner, unknown));
        assert!(tree.nodes_may_alias(top, unknown));
    }

    #[test]
    fn test_lookup() {
        let tree = sample();
        assert_eq!(
            tree.find_location(&MemoryLocation::precise(ValueId::new(1), 4)),
            Some(AliasNodeId::new(2))
        );
        assert_eq!(tree.find_location(&MemoryLocation::precise(ValueId::new(1), 8)), None);
        assert!(tree.find_pointer(ValueId::new(7)).is_empty());
        assert!(tree.children(AliasNodeId::new(42)).is_empty());
        assert_eq!(tree.estimate_nodes().count(), 2);
        assert_eq!(tree.unknown_nodes().count(), 1);
        assert_eq!(tree.node(tree.top()).map(AliasNode::tag), Some(NodeKindTag::Top));
    }
}
