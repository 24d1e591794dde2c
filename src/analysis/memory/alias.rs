//! Pairwise alias oracle over memory locations.
//!
//! The alias tree only needs three questions answered about locations: how two locations
//! relate ([`AliasAnalysis::alias`]), whether one location covers another
//! ([`AliasAnalysis::contains`]) and whether an opaque instruction may reach a location
//! ([`AliasAnalysis::unknown_may_access`]). [`BasicAliasAnalysis`] answers them from the
//! function alone, by stripping addresses to their underlying objects.

use std::collections::HashSet;

use strum::{Display, EnumIter};

use crate::{
    analysis::memory::{LocationSize, MemoryLocation},
    ir::{CallEffect, Function, Opcode, ValueId, ValueKind},
};

/// Relation between two memory locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum AliasResult {
    /// The locations never overlap.
    NoAlias,
    /// The locations may overlap.
    MayAlias,
    /// The locations overlap but do not start at the same address or have different sizes.
    PartialAlias,
    /// The locations are the same bytes.
    MustAlias,
}

impl AliasResult {
    /// Returns `true` unless the locations are proven disjoint.
    #[must_use]
    pub const fn may_alias(self) -> bool {
        !matches!(self, AliasResult::NoAlias)
    }

    /// Returns `true` if the locations are proven identical.
    #[must_use]
    pub const fn must_alias(self) -> bool {
        matches!(self, AliasResult::MustAlias)
    }
}

/// Alias queries the alias tree builder relies on.
pub trait AliasAnalysis {
    /// Relation between `a` and `b`.
    fn alias(&self, a: &MemoryLocation, b: &MemoryLocation) -> AliasResult;

    /// Returns `true` if every byte of `inner` is proven to lie inside `outer` and every
    /// location that may alias `inner` also may alias `outer`.
    fn contains(&self, outer: &MemoryLocation, inner: &MemoryLocation) -> bool;

    /// Returns `true` if an instruction with an undescribed footprint may access `location`.
    fn unknown_may_access(&self, location: &MemoryLocation) -> bool;
}

/// Alias oracle based on underlying objects and constant offsets.
///
/// # Rules
///
/// - different type-based alias tags never alias
/// - two distinct identified objects (stack allocations, globals, fresh allocations and
///   `noalias` arguments) never alias
/// - a function-local object whose address never escapes does not alias addresses derived
///   from anything else
/// - locations on the same object with constant offsets are compared as byte ranges
/// - everything else may alias
pub struct BasicAliasAnalysis<'f> {
    function: &'f Function,
    captured: HashSet<ValueId>,
    use_tbaa: bool,
}

impl<'f> BasicAliasAnalysis<'f> {
    /// Creates an oracle for `function`.
    #[must_use]
    pub fn new(function: &'f Function, use_tbaa: bool) -> Self {
        let mut analysis = Self {
            function,
            captured: HashSet::new(),
            use_tbaa,
        };
        analysis.captured = analysis.compute_captures();
        analysis
    }

    /// Collects the local objects whose address escapes: passed to a call, stored to
    /// memory or returned.
    fn compute_captures(&self) -> HashSet<ValueId> {
        let mut escaping = Vec::new();
        for (_, inst) in self.function.instructions() {
            match &inst.op {
                Opcode::Call { args, .. } => escaping.extend(args.iter().copied()),
                Opcode::Store { value, .. } => escaping.push(*value),
                Opcode::Return { value: Some(v) } => escaping.push(*v),
                _ => {}
            }
        }
        escaping
            .into_iter()
            .filter(|&v| self.function.is_pointer(v))
            .map(|v| self.underlying_object(v).0)
            .filter(|&obj| self.is_local(obj))
            .collect()
    }

    /// Strips element-pointer and cast chains from `ptr`.
    ///
    /// Returns the underlying object together with the byte offset of `ptr` from it, or
    /// `None` as offset when a non-constant index was stripped.
    #[must_use]
    pub fn underlying_object(&self, ptr: ValueId) -> (ValueId, Option<i64>) {
        let mut current = ptr;
        let mut offset = Some(0i64);
        while let Some(inst) = self.function.instruction(current) {
            match &inst.op {
                Opcode::Cast { operand } if self.function.is_pointer(*operand) => {
                    current = *operand;
                }
                Opcode::ElementPtr {
                    base,
                    index,
                    stride,
                } => {
                    let delta = self
                        .function
                        .value(*index)
                        .and_then(|v| v.as_constant())
                        .and_then(|c| c.checked_mul(*stride));
                    offset = offset.zip(delta).and_then(|(o, d)| o.checked_add(d));
                    current = *base;
                }
                _ => break,
            }
        }
        (current, offset)
    }

    /// Returns `true` for objects allocated by this function.
    fn is_local(&self, object: ValueId) -> bool {
        match self.function.instruction(object).map(|inst| &inst.op) {
            Some(Opcode::Alloca { .. }) => true,
            Some(Opcode::Call { effect, .. }) => *effect == CallEffect::Allocator,
            _ => false,
        }
    }

    fn is_noalias_argument(&self, object: ValueId) -> bool {
        matches!(
            self.function.value(object).map(|v| &v.kind),
            Some(ValueKind::Argument { noalias: true, .. })
        )
    }

    /// Returns `true` for objects known to be distinct from every other identified object.
    fn is_identified(&self, object: ValueId) -> bool {
        self.is_local(object)
            || self.is_noalias_argument(object)
            || matches!(
                self.function.value(object).map(|v| &v.kind),
                Some(ValueKind::Global { .. })
            )
    }

    /// Returns `true` if the address of the local object `object` escapes.
    #[must_use]
    pub fn is_captured(&self, object: ValueId) -> bool {
        self.captured.contains(&object)
    }

    fn distinct_objects_alias(&self, a: ValueId, b: ValueId) -> AliasResult {
        if self.is_identified(a) && self.is_identified(b) {
            return AliasResult::NoAlias;
        }
        // At most one side is identified here; the other one cannot be derived from it.
        let unreachable =
            |x: ValueId| self.is_noalias_argument(x) || (self.is_local(x) && !self.is_captured(x));
        if unreachable(a) || unreachable(b) {
            AliasResult::NoAlias
        } else {
            AliasResult::MayAlias
        }
    }
}

/// Relation of byte ranges `[a, a + sa)` and `[b, b + sb)`.
fn range_alias(a: i64, sa: LocationSize, b: i64, sb: LocationSize) -> AliasResult {
    match (sa.value(), sb.value()) {
        (Some(sa), Some(sb)) => {
            let end_a = i128::from(a) + i128::from(sa);
            let end_b = i128::from(b) + i128::from(sb);
            if end_a <= i128::from(b) || end_b <= i128::from(a) {
                AliasResult::NoAlias
            } else if a == b && sa == sb {
                AliasResult::MustAlias
            } else {
                AliasResult::PartialAlias
            }
        }
        _ if a == b => AliasResult::PartialAlias,
        _ => AliasResult::MayAlias,
    }
}

impl AliasAnalysis for BasicAliasAnalysis<'_> {
    fn alias(&self, a: &MemoryLocation, b: &MemoryLocation) -> AliasResult {
        if self.use_tbaa {
            if let (Some(ta), Some(tb)) = (a.aa_info.tbaa, b.aa_info.tbaa) {
                if ta != tb {
                    return AliasResult::NoAlias;
                }
            }
        }
        if a.ptr == b.ptr {
            return if a.size == b.size {
                AliasResult::MustAlias
            } else {
                AliasResult::PartialAlias
            };
        }

        let (obj_a, off_a) = self.underlying_object(a.ptr);
        let (obj_b, off_b) = self.underlying_object(b.ptr);
        if obj_a != obj_b {
            return self.distinct_objects_alias(obj_a, obj_b);
        }
        match (off_a, off_b) {
            (Some(x), Some(y)) => range_alias(x, a.size, y, b.size),
            _ => AliasResult::MayAlias,
        }
    }

    fn contains(&self, outer: &MemoryLocation, inner: &MemoryLocation) -> bool {
        // A tagged location only covers accesses with the same tag.
        if self.use_tbaa && outer.aa_info.tbaa.is_some() && outer.aa_info != inner.aa_info {
            return false;
        }
        if outer.ptr == inner.ptr {
            return match (outer.size, inner.size) {
                (LocationSize::Unknown, _) => true,
                (LocationSize::Precise(_), LocationSize::Unknown) => false,
                (LocationSize::Precise(o), LocationSize::Precise(i)) => o >= i,
            };
        }

        let (obj_outer, off_outer) = self.underlying_object(outer.ptr);
        let (obj_inner, off_inner) = self.underlying_object(inner.ptr);
        if obj_outer != obj_inner {
            return false;
        }
        // An unknown-size location at the object itself covers the whole object.
        if outer.ptr == obj_outer && outer.size == LocationSize::Unknown {
            return true;
        }
        match (off_outer, outer.size, off_inner, inner.size) {
            (Some(o), LocationSize::Precise(so), Some(i), LocationSize::Precise(si)) => {
                let end_outer = i128::from(o) + i128::from(so);
                let end_inner = i128::from(i) + i128::from(si);
                o <= i && end_inner <= end_outer
            }
            _ => false,
        }
    }

    fn unknown_may_access(&self, location: &MemoryLocation) -> bool {
        let (object, _) = self.underlying_object(location.ptr);
        !self.is_local(object) || self.is_captured(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CallTarget, FunctionBuilder, TbaaTag, Type};

    #[test]
    fn test_identified_objects_never_alias() {
        let mut b = FunctionBuilder::new("f");
        let g = b.global("g", Some(16));
        let x = b.alloca("x", 16);
        let f = b.finish().unwrap();
        let aa = BasicAliasAnalysis::new(&f, true);

        assert_eq!(
            aa.alias(&MemoryLocation::precise(g, 4), &MemoryLocation::precise(x, 4)),
            AliasResult::NoAlias
        );
    }

    #[test]
    fn test_arguments_may_alias() {
        let mut b = FunctionBuilder::new("f");
        let p = b.argument("p", Type::Ptr);
        let q = b.argument("q", Type::Ptr);
        let r = b.noalias_argument("r");
        let f = b.finish().unwrap();
        let aa = BasicAliasAnalysis::new(&f, true);

        let (lp, lq, lr) = (
            MemoryLocation::precise(p, 4),
            MemoryLocation::precise(q, 4),
            MemoryLocation::precise(r, 4),
        );
        assert_eq!(aa.alias(&lp, &lq), AliasResult::MayAlias);
        assert_eq!(aa.alias(&lp, &lr), AliasResult::NoAlias);
        assert_eq!(aa.alias(&lp, &lp), AliasResult::MustAlias);
    }

    #[test]
    fn test_constant_offsets() {
        let mut b = FunctionBuilder::new("f");
        let a = b.argument("a", Type::Ptr);
        let c0 = b.constant(0);
        let c1 = b.constant(1);
        let p0 = b.element_ptr(a, c0, 4).unwrap();
        let p1 = b.element_ptr(a, c1, 4).unwrap();
        let f = b.finish().unwrap();
        let aa = BasicAliasAnalysis::new(&f, true);

        assert_eq!(aa.underlying_object(p1), (a, Some(4)));
        assert_eq!(
            aa.alias(&MemoryLocation::precise(p0, 4), &MemoryLocation::precise(p1, 4)),
            AliasResult::NoAlias
        );
        assert_eq!(
            aa.alias(&MemoryLocation::precise(p0, 8), &MemoryLocation::precise(p1, 4)),
            AliasResult::PartialAlias
        );
        assert_eq!(
            aa.alias(&MemoryLocation::precise(a, 4), &MemoryLocation::precise(p0, 4)),
            AliasResult::MustAlias
        );
        assert!(aa.contains(&MemoryLocation::precise(p0, 8), &MemoryLocation::precise(p1, 4)));
        assert!(aa.contains(&MemoryLocation::unknown_size(a), &MemoryLocation::precise(p1, 4)));
        assert!(!aa.contains(&MemoryLocation::precise(p1, 4), &MemoryLocation::precise(p0, 8)));
    }

    #[test]
    fn test_tbaa() {
        let mut b = FunctionBuilder::new("f");
        let p = b.argument("p", Type::Ptr);
        let q = b.argument("q", Type::Ptr);
        let f = b.finish().unwrap();

        let lp = MemoryLocation::precise(p, 4).with_tbaa(Some(TbaaTag(1)));
        let lq = MemoryLocation::precise(q, 4).with_tbaa(Some(TbaaTag(2)));
        assert_eq!(
            BasicAliasAnalysis::new(&f, true).alias(&lp, &lq),
            AliasResult::NoAlias
        );
        assert_eq!(
            BasicAliasAnalysis::new(&f, false).alias(&lp, &lq),
            AliasResult::MayAlias
        );
    }

    #[test]
    fn test_tagged_location_covers_same_tag_only() {
        let mut b = FunctionBuilder::new("f");
        let a = b.argument("a", Type::Ptr);
        let f = b.finish().unwrap();
        let aa = BasicAliasAnalysis::new(&f, true);

        let whole = MemoryLocation::precise(a, 8);
        let tagged = whole.with_tbaa(Some(TbaaTag(1)));
        let part = MemoryLocation::precise(a, 4);
        assert!(aa.contains(&whole, &part));
        assert!(aa.contains(&whole, &part.with_tbaa(Some(TbaaTag(2)))));
        assert!(aa.contains(&tagged, &part.with_tbaa(Some(TbaaTag(1)))));
        assert!(!aa.contains(&tagged, &part));
        assert!(!aa.contains(&tagged, &part.with_tbaa(Some(TbaaTag(2)))));
        assert!(BasicAliasAnalysis::new(&f, false).contains(&tagged, &part));
    }

    #[test]
    fn test_captures() {
        let mut b = FunctionBuilder::new("f");
        let p = b.argument("p", Type::Ptr);
        let hidden = b.alloca("hidden", 4);
        let escaped = b.alloca("escaped", 4);
        let sink = b.function_symbol("sink");
        b.call(CallTarget::Direct(sink), &[escaped], CallEffect::Unknown, Type::Void)
            .unwrap();
        let f = b.finish().unwrap();
        let aa = BasicAliasAnalysis::new(&f, true);

        assert!(!aa.is_captured(hidden));
        assert!(aa.is_captured(escaped));
        assert!(!aa.unknown_may_access(&MemoryLocation::precise(hidden, 4)));
        assert!(aa.unknown_may_access(&MemoryLocation::precise(escaped, 4)));
        assert!(aa.unknown_may_access(&MemoryLocation::precise(p, 4)));
        assert_eq!(
            aa.alias(&MemoryLocation::precise(hidden, 4), &MemoryLocation::precise(p, 4)),
            AliasResult::NoAlias
        );
        assert_eq!(
            aa.alias(&MemoryLocation::precise(escaped, 4), &MemoryLocation::precise(p, 4)),
            AliasResult::MayAlias
        );
    }
}
