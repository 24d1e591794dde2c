//! Memory locations and the per-instruction access classification.
//!
//! A [`MemoryLocation`] names the bytes one instruction touches: the address it uses, how
//! many bytes follow it and the alias metadata attached to the access. Every instruction
//! with a memory footprint is classified by [`memory_accesses`] either as one or more
//! locations or as an unknown access whose footprint cannot be described.

use std::fmt;

use bitflags::bitflags;

use crate::{
    config::AliasTreeConfig,
    ir::{CallEffect, Function, Opcode, TbaaTag, ValueId},
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Mod/ref summary of a memory access
    pub struct AccessFlags : u8 {
        /// Memory is read
        const READ = 0x01;
        /// Memory is written
        const WRITE = 0x02;
    }
}

impl fmt::Display for AccessFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.contains(Self::READ), self.contains(Self::WRITE)) {
            (true, true) => write!(f, "ref/mod"),
            (true, false) => write!(f, "ref"),
            (false, true) => write!(f, "mod"),
            (false, false) => write!(f, "none"),
        }
    }
}

/// Number of bytes accessed starting at a location's address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LocationSize {
    /// Exactly this many bytes.
    Precise(u64),
    /// Any number of bytes.
    Unknown,
}

impl LocationSize {
    /// Returns `true` for a precise size.
    #[must_use]
    pub const fn is_precise(self) -> bool {
        matches!(self, Self::Precise(_))
    }

    /// Returns the size in bytes, if precise.
    #[must_use]
    pub const fn value(self) -> Option<u64> {
        match self {
            Self::Precise(n) => Some(n),
            Self::Unknown => None,
        }
    }

    /// The smallest size covering both `self` and `other`.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        match (self, other) {
            (Self::Precise(a), Self::Precise(b)) => Self::Precise(a.max(b)),
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for LocationSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Precise(n) => write!(f, "{n}"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Alias metadata attached to an access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AliasInfo {
    /// Type-based alias tag.
    pub tbaa: Option<TbaaTag>,
}

/// A `(pointer, size, alias metadata)` description of accessed memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryLocation {
    /// Address of the first byte.
    pub ptr: ValueId,
    /// Number of bytes accessed.
    pub size: LocationSize,
    /// Alias metadata.
    pub aa_info: AliasInfo,
}

impl MemoryLocation {
    /// Creates a location without alias metadata.
    #[must_use]
    pub const fn new(ptr: ValueId, size: LocationSize) -> Self {
        Self {
            ptr,
            size,
            aa_info: AliasInfo { tbaa: None },
        }
    }

    /// `bytes` bytes at `ptr`.
    #[must_use]
    pub const fn precise(ptr: ValueId, bytes: u64) -> Self {
        Self::new(ptr, LocationSize::Precise(bytes))
    }

    /// An unknown number of bytes at `ptr`.
    #[must_use]
    pub const fn unknown_size(ptr: ValueId) -> Self {
        Self::new(ptr, LocationSize::Unknown)
    }

    /// Attaches a type-based alias tag.
    #[must_use]
    pub fn with_tbaa(mut self, tag: Option<TbaaTag>) -> Self {
        self.aa_info.tbaa = tag;
        self
    }
}

impl fmt::Display for MemoryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.ptr, self.size)
    }
}

/// How one instruction accesses memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryAccess {
    /// The instruction accesses a described location.
    Location {
        /// The accessing instruction.
        inst: ValueId,
        /// The accessed bytes.
        location: MemoryLocation,
        /// Read and/or write.
        access: AccessFlags,
    },
    /// The instruction may access memory that cannot be described.
    Unknown {
        /// The accessing instruction.
        inst: ValueId,
        /// Read and/or write.
        access: AccessFlags,
    },
}

impl MemoryAccess {
    /// The accessing instruction.
    #[must_use]
    pub const fn instruction(&self) -> ValueId {
        match self {
            Self::Location { inst, .. } | Self::Unknown { inst, .. } => *inst,
        }
    }
}

/// Classifies the memory behaviour of every instruction of `function`, in program order.
///
/// - loads and stores access one precise location
/// - calls that only touch argument memory access an unknown-size location per pointer
///   argument (or are unknown, see [`AliasTreeConfig::argmem_calls_as_locations`])
/// - calls that may read or write arbitrary memory are unknown accesses
/// - calls without memory effects and allocator calls have no footprint
#[must_use]
pub fn memory_accesses(function: &Function, config: &AliasTreeConfig) -> Vec<MemoryAccess> {
    let mut out = Vec::new();
    let tag = |tbaa: Option<TbaaTag>| if config.use_tbaa { tbaa } else { None };

    for (inst, instruction) in function.instructions() {
        match &instruction.op {
            Opcode::Load { ptr, size, tbaa } => out.push(MemoryAccess::Location {
                inst,
                location: MemoryLocation::precise(*ptr, *size).with_tbaa(tag(*tbaa)),
                access: AccessFlags::READ,
            }),
            Opcode::Store { ptr, size, tbaa, .. } => out.push(MemoryAccess::Location {
                inst,
                location: MemoryLocation::precise(*ptr, *size).with_tbaa(tag(*tbaa)),
                access: AccessFlags::WRITE,
            }),
            Opcode::Call { args, effect, .. } => match effect {
                CallEffect::None | CallEffect::Allocator => {}
                CallEffect::ArgMemOnly if config.argmem_calls_as_locations => {
                    for &arg in args.iter().filter(|&&arg| function.is_pointer(arg)) {
                        out.push(MemoryAccess::Location {
                            inst,
                            location: MemoryLocation::unknown_size(arg),
                            access: AccessFlags::READ | AccessFlags::WRITE,
                        });
                    }
                }
                CallEffect::ReadOnly => out.push(MemoryAccess::Unknown {
                    inst,
                    access: AccessFlags::READ,
                }),
                CallEffect::ArgMemOnly | CallEffect::Unknown => out.push(MemoryAccess::Unknown {
                    inst,
                    access: AccessFlags::READ | AccessFlags::WRITE,
                }),
            },
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CallTarget, FunctionBuilder, Type};

    #[test]
    fn test_location_size_union() {
        assert_eq!(
            LocationSize::Precise(4).union(LocationSize::Precise(8)),
            LocationSize::Precise(8)
        );
        assert_eq!(
            LocationSize::Precise(4).union(LocationSize::Unknown),
            LocationSize::Unknown
        );
    }

    #[test]
    fn test_access_flags_display() {
        assert_eq!((AccessFlags::READ | AccessFlags::WRITE).to_string(), "ref/mod");
        assert_eq!(AccessFlags::WRITE.to_string(), "mod");
    }

    #[test]
    fn test_classification() {
        let mut b = FunctionBuilder::new("f");
        let a = b.argument("a", Type::Ptr);
        let n = b.argument("n", Type::Int(64));
        let fp = b.argument("fp", Type::Ptr);
        let memset = b.function_symbol("memset");
        let malloc = b.function_symbol("malloc");
        let v = b.load_tagged(a, 4, TbaaTag(1)).unwrap();
        b.store(a, v, 4).unwrap();
        b.call(CallTarget::Direct(memset), &[a, n], CallEffect::ArgMemOnly, Type::Void)
            .unwrap();
        b.call(CallTarget::Direct(malloc), &[n], CallEffect::Allocator, Type::Ptr)
            .unwrap();
        let opaque = b
            .call(CallTarget::Indirect(fp), &[], CallEffect::Unknown, Type::Void)
            .unwrap();
        let f = b.finish().unwrap();

        let accesses = memory_accesses(&f, &AliasTreeConfig::default());
        assert_eq!(accesses.len(), 4);
        assert!(matches!(
            accesses[0],
            MemoryAccess::Location { location, access, .. }
                if access == AccessFlags::READ && location.aa_info.tbaa == Some(TbaaTag(1))
        ));
        assert!(matches!(
            accesses[2],
            MemoryAccess::Location { location, .. } if location == MemoryLocation::unknown_size(a)
        ));
        assert_eq!(accesses[3].instruction(), opaque);

        let conservative = memory_accesses(&f, &AliasTreeConfig::conservative());
        assert_eq!(conservative.len(), 4);
        assert!(matches!(
            conservative[0],
            MemoryAccess::Location { location, .. } if location.aa_info.tbaa.is_none()
        ));
        assert!(matches!(conservative[2], MemoryAccess::Unknown { .. }));
    }
}
