//! Construction of alias trees.
//!
//! The builder keeps a mutable arena of nodes while accesses are inserted and compacts it
//! into a frozen [`AliasTree`] in [`AliasTreeBuilder::finish`].
//!
//! # Insertion
//!
//! A location that is the same bytes as a member of an existing cluster, with the same
//! alias info, joins that cluster. Otherwise the location descends from the top node into
//! the child that provably contains it, as deep as possible. A level where any other child
//! may overlap the location stops the descent. At the final level:
//!
//! - children the location contains move below the location's node
//! - children the location may overlap, containers included, are merged into one node, and
//!   the clusters overlapping the location fuse with it into one ambiguous cluster
//! - with no overlap, the location gets a new node
//!
//! Instructions with an undescribed footprint are attached when the tree is finished. They
//! all share one unknown node directly below the top node, which adopts every top-level
//! subtree an opaque instruction may access.

use std::collections::HashMap;

use crate::{
    analysis::memory::{
        memory_accesses, AccessFlags, AliasAnalysis, AliasNode, AliasNodeId, AliasNodeKind,
        AliasTree, BasicAliasAnalysis, EstimateMemory, EstimateNode, MemoryAccess,
        MemoryLocation, Relation, UnknownNode,
    },
    config::AliasTreeConfig,
    ir::{Function, ValueId},
};

const TOP: usize = 0;

#[derive(Debug)]
struct BuildNode {
    kind: AliasNodeKind,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Incremental alias tree construction over an alias oracle.
pub struct AliasTreeBuilder<'a, A: AliasAnalysis + ?Sized> {
    function: String,
    aa: &'a A,
    nodes: Vec<BuildNode>,
    accessed: Vec<(ValueId, MemoryLocation)>,
    unknown: Vec<(ValueId, AccessFlags)>,
}

impl<'a, A: AliasAnalysis + ?Sized> AliasTreeBuilder<'a, A> {
    /// Starts an empty tree (only the top node) for the function `function`.
    #[must_use]
    pub fn new(function: impl Into<String>, aa: &'a A) -> Self {
        Self {
            function: function.into(),
            aa,
            nodes: vec![BuildNode {
                kind: AliasNodeKind::Top,
                parent: None,
                children: Vec::new(),
            }],
            accessed: Vec::new(),
            unknown: Vec::new(),
        }
    }

    fn members(&self, node: usize) -> impl Iterator<Item = &MemoryLocation> {
        match &self.nodes[node].kind {
            AliasNodeKind::Estimate(estimate) => Some(estimate.locations()),
            _ => None,
        }
        .into_iter()
        .flatten()
    }

    fn subtree(&self, node: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.nodes[n].children.iter().copied());
        }
        out
    }

    fn node_contains(&self, node: usize, location: &MemoryLocation) -> bool {
        self.members(node).any(|m| self.aa.contains(m, location))
    }

    fn node_contained_in(&self, node: usize, location: &MemoryLocation) -> bool {
        let mut members = self.members(node).peekable();
        members.peek().is_some() && members.all(|m| self.aa.contains(location, m))
    }

    fn subtree_may_alias(&self, node: usize, location: &MemoryLocation) -> bool {
        self.subtree(node)
            .into_iter()
            .any(|n| self.members(n).any(|m| self.aa.alias(m, location).may_alias()))
    }

    fn reparent(&mut self, node: usize, parent: usize) {
        if let Some(old) = self.nodes[node].parent {
            self.nodes[old].children.retain(|&c| c != node);
        }
        self.nodes[node].parent = Some(parent);
        self.nodes[parent].children.push(node);
    }

    fn push_node(&mut self, kind: AliasNodeKind, parent: usize) -> usize {
        let id = self.nodes.len();
        self.nodes.push(BuildNode {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    /// Moves clusters and children of the sibling `other` into `target`.
    fn merge_into(&mut self, target: usize, other: usize) {
        let kind = std::mem::replace(
            &mut self.nodes[other].kind,
            AliasNodeKind::Estimate(EstimateNode::default()),
        );
        if let (AliasNodeKind::Estimate(from), AliasNodeKind::Estimate(into)) =
            (kind, &mut self.nodes[target].kind)
        {
            into.clusters.extend(from.clusters);
        }
        for child in std::mem::take(&mut self.nodes[other].children) {
            self.nodes[child].parent = None;
            self.reparent(child, target);
        }
        if let Some(parent) = self.nodes[other].parent.take() {
            self.nodes[parent].children.retain(|&c| c != other);
        }
    }

    /// Fuses `location` with the clusters of `node` it may overlap.
    fn fuse_location(&mut self, node: usize, location: MemoryLocation, access: AccessFlags) {
        let aa = self.aa;
        let AliasNodeKind::Estimate(estimate) = &mut self.nodes[node].kind else {
            return;
        };
        let (hit, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut estimate.clusters)
            .into_iter()
            .partition(|c| c.locations().iter().any(|m| aa.alias(m, &location).may_alias()));
        let mut fused = EstimateMemory::new(location, access);
        let mut clusters = hit.into_iter();
        if let Some(mut first) = clusters.next() {
            for cluster in clusters {
                first.fuse(cluster);
            }
            first.fuse(fused);
            fused = first;
        }
        estimate.clusters.push(fused);
        estimate.clusters.extend(rest);
    }

    fn join_equivalent(&mut self, location: MemoryLocation, access: AccessFlags) -> bool {
        let aa = self.aa;
        for node in &mut self.nodes {
            let AliasNodeKind::Estimate(estimate) = &mut node.kind else {
                continue;
            };
            for cluster in &mut estimate.clusters {
                if cluster.contains_location(&location)
                    || cluster.locations().iter().any(|m| {
                        m.aa_info == location.aa_info && aa.alias(m, &location).must_alias()
                    })
                {
                    cluster.add_equivalent(location, access);
                    return true;
                }
            }
        }
        false
    }

    /// Inserts the location accessed by `inst`.
    pub fn add_location(&mut self, inst: ValueId, location: MemoryLocation, access: AccessFlags) {
        if !self.accessed.contains(&(inst, location)) {
            self.accessed.push((inst, location));
        }
        if self.join_equivalent(location, access) {
            return;
        }

        let mut current = TOP;
        loop {
            let mut containers = 0;
            let mut contained = Vec::new();
            let mut overlapping = Vec::new();
            for child in self.nodes[current].children.clone() {
                if self.node_contains(child, &location) {
                    containers += 1;
                    overlapping.push(child);
                } else if self.node_contained_in(child, &location) {
                    contained.push(child);
                } else if self.subtree_may_alias(child, &location) {
                    overlapping.push(child);
                }
            }
            // Descend only into a container with no other related sibling.
            if containers == 1 && overlapping.len() == 1 && contained.is_empty() {
                current = overlapping[0];
                continue;
            }

            let target = match overlapping.split_first() {
                None => self.push_node(
                    AliasNodeKind::Estimate(EstimateNode {
                        clusters: vec![EstimateMemory::new(location, access)],
                    }),
                    current,
                ),
                Some((&target, others)) => {
                    for &other in others {
                        self.merge_into(target, other);
                    }
                    self.fuse_location(target, location, access);
                    target
                }
            };
            for child in contained {
                self.reparent(child, target);
            }
            log::trace!(
                "{}: location {} placed in node {} below {}",
                self.function,
                location,
                target,
                current
            );
            return;
        }
    }

    /// Records an instruction whose footprint cannot be described.
    pub fn add_unknown(&mut self, inst: ValueId, access: AccessFlags) {
        self.unknown.push((inst, access));
    }

    fn attach_unknown(&mut self) -> Option<usize> {
        if self.unknown.is_empty() {
            return None;
        }
        let mut payload = UnknownNode::default();
        for &(inst, access) in &self.unknown {
            payload.add(inst, access);
        }
        let accessible: Vec<usize> = self.nodes[TOP]
            .children
            .iter()
            .copied()
            .filter(|&child| {
                self.subtree(child)
                    .into_iter()
                    .any(|n| self.members(n).any(|m| self.aa.unknown_may_access(m)))
            })
            .collect();
        let unknown = self.push_node(AliasNodeKind::Unknown(payload), TOP);
        for child in accessible {
            self.reparent(child, unknown);
        }
        Some(unknown)
    }

    /// Freezes the tree.
    #[must_use]
    pub fn finish(mut self) -> AliasTree {
        let unknown = self.attach_unknown();

        // Pre-order compaction from the top node drops merged-away nodes.
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![TOP];
        while let Some(n) = stack.pop() {
            order.push(n);
            stack.extend(self.nodes[n].children.iter().rev().copied());
        }
        let mut remap = vec![None; self.nodes.len()];
        for (new, &old) in order.iter().enumerate() {
            remap[old] = Some(AliasNodeId::new(new));
        }
        // Nodes reachable from the top node always have a slot.
        let map = |old: usize| {
            debug_assert!(remap[old].is_some(), "node {old} unreachable from the top node");
            remap[old]
        };

        let is_unknown = |n: usize| matches!(self.nodes[n].kind, AliasNodeKind::Unknown(_));
        let relations: Vec<Relation> = order
            .iter()
            .map(|&old| {
                let parent_unknown = self.nodes[old].parent.is_some_and(is_unknown);
                if is_unknown(old) || parent_unknown {
                    Relation::Assumed
                } else {
                    Relation::Proven
                }
            })
            .collect();

        let mut slots: Vec<Option<BuildNode>> = self.nodes.into_iter().map(Some).collect();
        let mut nodes = Vec::with_capacity(order.len());
        for (new, (&old, relation)) in order.iter().zip(relations).enumerate() {
            let Some(node) = slots[old].take() else {
                continue;
            };
            nodes.push(AliasNode {
                id: AliasNodeId::new(new),
                kind: node.kind,
                parent: node.parent.and_then(map),
                children: node.children.into_iter().filter_map(map).collect(),
                relation,
            });
        }

        let mut locations = HashMap::new();
        let mut pointers: HashMap<ValueId, Vec<AliasNodeId>> = HashMap::new();
        for node in &nodes {
            let Some(estimate) = node.as_estimate() else {
                continue;
            };
            for location in estimate.locations() {
                locations.insert(*location, node.id);
            }
            for ptr in estimate.pointers() {
                let entry = pointers.entry(ptr).or_default();
                if !entry.contains(&node.id) {
                    entry.push(node.id);
                }
            }
        }

        let mut instructions: HashMap<ValueId, Vec<AliasNodeId>> = HashMap::new();
        for (inst, location) in &self.accessed {
            if let Some(&id) = locations.get(location) {
                let entry = instructions.entry(*inst).or_default();
                if !entry.contains(&id) {
                    entry.push(id);
                }
            }
        }
        if let Some(unknown) = unknown.and_then(map) {
            for (inst, _) in &self.unknown {
                let entry = instructions.entry(*inst).or_default();
                if !entry.contains(&unknown) {
                    entry.push(unknown);
                }
            }
        }

        log::debug!(
            "alias tree of {}: {} nodes, {} locations",
            self.function,
            nodes.len(),
            locations.len()
        );
        AliasTree {
            function: self.function,
            nodes,
            locations,
            pointers,
            instructions,
        }
    }
}

impl AliasTree {
    /// Builds the alias tree of `function` with the default alias oracle.
    ///
    /// Locations are inserted in program order, then the instructions with an undescribed
    /// footprint are attached.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use memscope::analysis::AliasTree;
    /// use memscope::config::AliasTreeConfig;
    /// use memscope::ir::{FunctionBuilder, Type};
    ///
    /// let mut b = FunctionBuilder::new("f");
    /// let p = b.argument("p", Type::Ptr);
    /// let q = b.argument("q", Type::Ptr);
    /// let v = b.load(p, 4)?;
    /// b.store(q, v, 4)?;
    /// let function = b.finish()?;
    ///
    /// let tree = AliasTree::build(&function, &AliasTreeConfig::default());
    /// // p and q may overlap, so they share one ambiguous node below the top node.
    /// assert_eq!(tree.node_count(), 2);
    /// assert_eq!(tree.find_pointer(p), tree.find_pointer(q));
    /// # Ok::<(), memscope::Error>(())
    /// ```
    #[must_use]
    pub fn build(function: &Function, config: &AliasTreeConfig) -> AliasTree {
        let aa = BasicAliasAnalysis::new(function, config.use_tbaa);
        let mut builder = AliasTreeBuilder::new(function.name(), &aa);
        for access in memory_accesses(function, config) {
            match access {
                MemoryAccess::Location {
                    inst,
                    location,
                    access,
                } => builder.add_location(inst, location, access),
                MemoryAccess::Unknown { inst, access } => builder.add_unknown(inst, access),
            }
        }
        builder.finish()
    }
}
