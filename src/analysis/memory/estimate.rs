//! Payloads of alias tree nodes.
//!
//! An [`EstimateMemory`] is a cluster of memory locations that the tree treats as one
//! piece of memory. A cluster is *unambiguous* while all its locations are the same bytes
//! (equal size, must-alias pointers); once locations that only partially or possibly overlap
//! are fused into it, it becomes *ambiguous* and its size grows to cover all members.

use crate::{
    analysis::memory::{AccessFlags, AliasInfo, LocationSize, MemoryLocation},
    ir::ValueId,
};

/// A cluster of related memory locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimateMemory {
    pointers: Vec<ValueId>,
    size: LocationSize,
    aa_info: AliasInfo,
    ambiguous: bool,
    access: AccessFlags,
    locations: Vec<MemoryLocation>,
}

impl EstimateMemory {
    /// Creates a cluster holding a single location.
    #[must_use]
    pub fn new(location: MemoryLocation, access: AccessFlags) -> Self {
        Self {
            pointers: vec![location.ptr],
            size: location.size,
            aa_info: location.aa_info,
            ambiguous: false,
            access,
            locations: vec![location],
        }
    }

    /// The representative pointer (the first one added).
    #[must_use]
    pub fn front(&self) -> ValueId {
        self.pointers[0]
    }

    /// All pointers reaching the cluster, in insertion order.
    #[must_use]
    pub fn pointers(&self) -> &[ValueId] {
        &self.pointers
    }

    /// Size covering all member locations.
    #[must_use]
    pub fn size(&self) -> LocationSize {
        self.size
    }

    /// Alias metadata shared by all members; empty once members disagree.
    #[must_use]
    pub fn aa_info(&self) -> AliasInfo {
        self.aa_info
    }

    /// Returns `true` if the cluster fuses locations that are not the same bytes.
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        self.ambiguous
    }

    /// Mod/ref summary of all member accesses.
    #[must_use]
    pub fn access(&self) -> AccessFlags {
        self.access
    }

    /// Member locations, in insertion order.
    #[must_use]
    pub fn locations(&self) -> &[MemoryLocation] {
        &self.locations
    }

    /// Returns `true` if `location` is a member.
    #[must_use]
    pub fn contains_location(&self, location: &MemoryLocation) -> bool {
        self.locations.contains(location)
    }

    /// Adds a location that is the same bytes as the cluster's.
    pub(crate) fn add_equivalent(&mut self, location: MemoryLocation, access: AccessFlags) {
        self.access |= access;
        if !self.pointers.contains(&location.ptr) {
            self.pointers.push(location.ptr);
        }
        if !self.locations.contains(&location) {
            self.locations.push(location);
        }
        if self.aa_info != location.aa_info {
            self.aa_info = AliasInfo::default();
        }
    }

    /// Fuses `other` into this cluster; the result is ambiguous.
    pub(crate) fn fuse(&mut self, other: EstimateMemory) {
        self.ambiguous = true;
        self.size = self.size.union(other.size);
        self.access |= other.access;
        if self.aa_info != other.aa_info {
            self.aa_info = AliasInfo::default();
        }
        for ptr in other.pointers {
            if !self.pointers.contains(&ptr) {
                self.pointers.push(ptr);
            }
        }
        for location in other.locations {
            if !self.locations.contains(&location) {
                self.locations.push(location);
            }
        }
    }
}

/// Payload of an estimate node: the clusters of memory it stands for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EstimateNode {
    pub(crate) clusters: Vec<EstimateMemory>,
}

impl EstimateNode {
    /// The node's clusters.
    #[must_use]
    pub fn clusters(&self) -> &[EstimateMemory] {
        &self.clusters
    }

    /// Returns `true` if any cluster is ambiguous.
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        self.clusters.iter().any(EstimateMemory::is_ambiguous)
    }

    /// Mod/ref summary of all clusters.
    #[must_use]
    pub fn access(&self) -> AccessFlags {
        self.clusters
            .iter()
            .fold(AccessFlags::empty(), |acc, c| acc | c.access())
    }

    /// All member locations of all clusters.
    pub fn locations(&self) -> impl Iterator<Item = &MemoryLocation> {
        self.clusters.iter().flat_map(|c| c.locations().iter())
    }

    /// All pointers of all clusters.
    pub fn pointers(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.clusters.iter().flat_map(|c| c.pointers().iter().copied())
    }
}

/// Payload of an unknown node: instructions with an undescribed memory footprint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnknownNode {
    pub(crate) instructions: Vec<ValueId>,
    pub(crate) access: AccessFlags,
}

impl UnknownNode {
    /// The node's instructions, in insertion order.
    #[must_use]
    pub fn instructions(&self) -> &[ValueId] {
        &self.instructions
    }

    /// Mod/ref summary of all instructions.
    #[must_use]
    pub fn access(&self) -> AccessFlags {
        self.access
    }

    pub(crate) fn add(&mut self, inst: ValueId, access: AccessFlags) {
        self.access |= access;
        if !self.instructions.contains(&inst) {
            self.instructions.push(inst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equivalent_pointers_stay_unambiguous() {
        let loc = MemoryLocation::precise(ValueId::new(0), 4);
        let mut em = EstimateMemory::new(loc, AccessFlags::READ);
        em.add_equivalent(MemoryLocation::precise(ValueId::new(1), 4), AccessFlags::WRITE);
        em.add_equivalent(loc, AccessFlags::READ);

        assert!(!em.is_ambiguous());
        assert_eq!(em.pointers(), &[ValueId::new(0), ValueId::new(1)]);
        assert_eq!(em.locations().len(), 2);
        assert_eq!(em.access(), AccessFlags::READ | AccessFlags::WRITE);
        assert_eq!(em.front(), ValueId::new(0));
    }

    #[test]
    fn test_fuse_makes_ambiguous() {
        let mut em = EstimateMemory::new(MemoryLocation::precise(ValueId::new(0), 4), AccessFlags::READ);
        em.fuse(EstimateMemory::new(
            MemoryLocation::precise(ValueId::new(1), 8),
            AccessFlags::WRITE,
        ));
        assert!(em.is_ambiguous());
        assert_eq!(em.size(), LocationSize::Precise(8));

        let node = EstimateNode { clusters: vec![em] };
        assert!(node.is_ambiguous());
        assert_eq!(node.pointers().count(), 2);
    }
}
