//! Recovery of array structure from the addresses of loads and stores.
//!
//! Each accessed address is reduced to `base + offset`. The offset's recurrences are peeled
//! one loop at a time; every recurrence becomes `coefficient * {0,+,1}<L>` and every
//! coefficient is a candidate dimension. Once all accesses of a base are known, the
//! candidates are ordered into a chain of dimensions (each outer stride a proper multiple of
//! the next inner one) and every access is rewritten as one subscript per dimension.

use std::collections::{BTreeSet, HashMap};

use crate::{
    analysis::{
        delinearize::{find_coefficients, Array, ArraySet, DelinearizeInfo, Element},
        scev::{ScalarEvolution, Scev},
    },
    config::DelinearizeConfig,
    ir::{CallEffect, Function, Opcode, ValueId, ValueKind},
};

/// What peeling the offset of one element pointer produced.
#[derive(Debug)]
struct Decomposition {
    /// `(coefficient, recurrence)` pairs, innermost loop first.
    terms: Vec<(Scev, Scev)>,
    /// Whatever was left after peeling.
    residual: Scev,
    /// Every recurrence was peeled and the residual is invariant in the function.
    complete: bool,
    /// Access sizes of the instructions using the pointer.
    sizes: Vec<u64>,
}

/// Delinearization of one function.
pub struct Delinearizer<'f> {
    function: &'f Function,
    se: ScalarEvolution<'f>,
    config: DelinearizeConfig,
}

impl<'f> Delinearizer<'f> {
    /// Creates a delinearizer over `function`.
    #[must_use]
    pub fn new(function: &'f Function, config: &DelinearizeConfig) -> Self {
        Self {
            function,
            se: ScalarEvolution::new(function),
            config: *config,
        }
    }

    /// The expression engine used for the function.
    #[must_use]
    pub fn scalar_evolution(&self) -> &ScalarEvolution<'f> {
        &self.se
    }

    /// Collects the arrays accessed by the function.
    ///
    /// Accesses whose base cannot be resolved are skipped. Arrays and elements that cannot
    /// be fully decomposed are kept and flagged invalid.
    #[must_use]
    pub fn run(&self) -> ArraySet {
        let mut set = ArraySet::new();
        let mut decomposed: HashMap<ValueId, Decomposition> = HashMap::new();

        for (inst, instruction) in self.function.instructions() {
            let (ptr, size) = match instruction.op {
                Opcode::Load { ptr, size, .. } | Opcode::Store { ptr, size, .. } => (ptr, size),
                _ => continue,
            };
            let address = self.se.scev(ptr);
            let Some(base) = self.array_base(&address) else {
                log::trace!(
                    "{}: no array base for {}",
                    self.function.name(),
                    self.function.display_value(inst)
                );
                continue;
            };
            set.record_access(inst, ptr);

            if let Some(decomposition) = decomposed.get_mut(&ptr) {
                decomposition.sizes.push(size);
                continue;
            }
            let offset = self.se.sub(&address, &Scev::Unknown(base));
            let mut decomposition = self.decompose(offset);
            decomposition.sizes.push(size);
            if !decomposition.complete {
                log::trace!(
                    "{}: offset of {} is not affine in its loops",
                    self.function.name(),
                    self.function.operand_name(ptr)
                );
            }
            set.get_or_insert(base)
                .push(Element::new(ptr, Vec::new(), false));
            decomposed.insert(ptr, decomposition);
        }

        for array in set.iter_mut() {
            self.shape(array, &decomposed);
        }

        log::debug!(
            "{}: {} arrays, {} valid",
            self.function.name(),
            set.len(),
            set.iter().filter(|a| a.is_valid()).count()
        );
        set
    }

    /// Resolves the base of an address, accepting only pointers that do not change while
    /// the function runs.
    fn array_base(&self, address: &Scev) -> Option<ValueId> {
        let base = self.se.pointer_base(address)?;
        let kind = &self.function.value(base)?.kind;
        let accepted = match kind {
            ValueKind::Argument { .. } | ValueKind::Global { .. } => true,
            ValueKind::Instruction(inst) => match &inst.op {
                Opcode::Alloca { .. }
                | Opcode::Call {
                    effect: CallEffect::Allocator,
                    ..
                } => true,
                Opcode::Load { .. } => inst.parent.is_none(),
                _ => false,
            },
            ValueKind::Function | ValueKind::Constant(_) => false,
        };
        if !accepted {
            log::debug!(
                "{}: {} is not an array base",
                self.function.name(),
                self.function.operand_name(base)
            );
        }
        accepted.then_some(base)
    }

    /// Peels recurrences off `offset` until an invariant remains or peeling fails.
    fn decompose(&self, offset: Scev) -> Decomposition {
        let mut terms = Vec::new();
        let mut rest = offset;
        loop {
            let Scev::AddRec { start, step, lp } = &rest else {
                break;
            };
            let rec = self.se.add_rec(Scev::zero(), step.as_ref().clone(), *lp);
            let Some(term) = find_coefficients(&rec, &self.se)
                .filter(|(coefficient, _)| self.is_dimension_candidate(coefficient))
            else {
                break;
            };
            terms.push(term);
            let next = start.as_ref().clone();
            rest = next;
        }
        let complete = self.se.is_function_invariant(&rest);
        Decomposition {
            terms,
            residual: rest,
            complete,
            sizes: Vec::new(),
        }
    }

    fn is_dimension_candidate(&self, coefficient: &Scev) -> bool {
        !coefficient.contains_add_rec() && self.se.is_function_invariant(coefficient)
    }

    /// Inserts `coefficient` into the chain `dimensions`, outermost first.
    ///
    /// Returns `false` if it is neither a multiple nor a divisor of the dimensions around
    /// its place in the chain.
    fn insert_dimension(&self, dimensions: &mut Vec<Scev>, coefficient: &Scev) -> bool {
        if dimensions.contains(coefficient) {
            return true;
        }
        let pos = dimensions
            .iter()
            .take_while(|d| self.se.is_multiple_of(d, coefficient))
            .count();
        let fits = dimensions[pos..]
            .iter()
            .all(|d| self.se.is_multiple_of(coefficient, d));
        if fits {
            dimensions.insert(pos, coefficient.clone());
        }
        fits
    }

    /// The access size shared by all accesses of an array.
    fn common_access_size(parts: &[&Decomposition]) -> Option<Scev> {
        let mut sizes = parts.iter().flat_map(|d| d.sizes.iter().copied());
        let size = sizes.next()?;
        if !sizes.all(|s| s == size) {
            return None;
        }
        i64::try_from(size)
            .ok()
            .filter(|&s| s > 0)
            .map(Scev::Constant)
    }

    /// Element size of an array whose accesses never vary but use non-zero constant
    /// offsets, if all accesses have the same size.
    fn inferred_element_size(&self, parts: &[&Decomposition]) -> Option<Scev> {
        if !self.config.infer_element_size {
            return None;
        }
        let constant = parts.iter().all(|d| {
            d.complete && d.terms.is_empty() && d.residual.as_constant().is_some()
        });
        if !constant || parts.iter().all(|d| d.residual.is_zero()) {
            return None;
        }
        Self::common_access_size(parts)
    }

    /// Element size below the innermost stride, for arrays with constant offsets that the
    /// innermost stride does not divide (`a[2 * i + 1]` next to `a[2 * i]`).
    ///
    /// The common access size qualifies if it properly divides every dimension.
    fn inferred_inner_size(&self, dimensions: &[Scev], parts: &[&Decomposition]) -> Option<Scev> {
        if !self.config.infer_element_size {
            return None;
        }
        let innermost = dimensions.last()?;
        let misaligned = parts.iter().any(|d| {
            d.complete
                && d.residual.as_constant().is_some_and(|c| c != 0)
                && self.se.divide_exact(&d.residual, innermost).is_none()
        });
        if !misaligned {
            return None;
        }
        let size = Self::common_access_size(parts)?;
        dimensions
            .iter()
            .all(|d| self.se.is_multiple_of(d, &size))
            .then_some(size)
    }

    /// Splits `rest` by `dimension`; constants divide toward zero.
    fn split(&self, rest: &Scev, dimension: &Scev) -> (Scev, Scev) {
        match (rest.as_constant(), dimension.as_constant()) {
            (Some(x), Some(y)) if y != 0 => (
                Scev::Constant(x.wrapping_div(y)),
                Scev::Constant(x.wrapping_rem(y)),
            ),
            _ => self.se.div_rem(rest, dimension),
        }
    }

    /// Subscripts of one element, aligned to `dimensions`, and whether they are exact.
    fn subscripts(&self, dimensions: &[Scev], decomposition: &Decomposition) -> (Vec<Scev>, bool) {
        let mut subscripts = vec![Scev::zero(); dimensions.len()];
        for (coefficient, recurrence) in &decomposition.terms {
            let Some(idx) = dimensions.iter().position(|d| d == coefficient) else {
                return (Self::recurrences(decomposition), false);
            };
            subscripts[idx] = self
                .se
                .add(vec![subscripts[idx].clone(), recurrence.clone()]);
        }
        if !decomposition.complete {
            return (subscripts, false);
        }

        let mut rest = decomposition.residual.clone();
        for (idx, dimension) in dimensions.iter().enumerate() {
            let (quotient, remainder) = self.split(&rest, dimension);
            if !quotient.is_zero() {
                subscripts[idx] = self.se.add(vec![subscripts[idx].clone(), quotient]);
            }
            rest = remainder;
        }
        (subscripts, rest.is_zero())
    }

    /// The peeled recurrences, outermost loop first.
    fn recurrences(decomposition: &Decomposition) -> Vec<Scev> {
        decomposition
            .terms
            .iter()
            .rev()
            .map(|(_, recurrence)| recurrence.clone())
            .collect()
    }

    /// Derives the dimensions of `array` and the subscripts of its elements.
    fn shape(&self, array: &mut Array, decomposed: &HashMap<ValueId, Decomposition>) {
        let parts: Vec<&Decomposition> = array
            .elements()
            .iter()
            .filter_map(|e| decomposed.get(&e.ptr))
            .collect();

        let coefficients: BTreeSet<&Scev> = parts
            .iter()
            .flat_map(|d| d.terms.iter().map(|(coefficient, _)| coefficient))
            .collect();
        let mut dimensions = Vec::new();
        let mut consistent = true;
        for coefficient in coefficients {
            if !self.insert_dimension(&mut dimensions, coefficient) {
                log::warn!(
                    "{}: stride {} of {} does not fit dimensions [{}]",
                    self.function.name(),
                    coefficient.display(self.function),
                    self.function.operand_name(array.base()),
                    dimensions
                        .iter()
                        .map(|d| d.display(self.function).to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                consistent = false;
                break;
            }
        }
        if consistent && dimensions.is_empty() {
            dimensions.extend(self.inferred_element_size(&parts));
        } else if consistent {
            dimensions.extend(self.inferred_inner_size(&dimensions, &parts));
        }

        let shaped: Vec<(Vec<Scev>, bool)> = array
            .elements()
            .iter()
            .map(|e| match decomposed.get(&e.ptr) {
                Some(d) if consistent => self.subscripts(&dimensions, d),
                Some(d) => (Self::recurrences(d), false),
                None => (Vec::new(), false),
            })
            .collect();
        for (idx, (subscripts, is_valid)) in shaped.into_iter().enumerate() {
            if let Some(element) = array.element_mut(idx) {
                element.subscripts = subscripts;
                element.is_valid = is_valid;
            }
        }

        let fits = dimensions.len() <= self.config.max_dimensions;
        if !fits {
            log::debug!(
                "{}: {} has {} dimensions, more than {}",
                self.function.name(),
                self.function.operand_name(array.base()),
                dimensions.len(),
                self.config.max_dimensions
            );
        }
        array.set_dimensions(dimensions);
        let any_valid = array.elements().iter().any(|e| e.is_valid);
        array.set_valid(consistent && fits && any_valid);
    }
}

impl DelinearizeInfo {
    /// Delinearizes every load and store of `function` and builds the lookup index.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use memscope::analysis::DelinearizeInfo;
    /// use memscope::config::DelinearizeConfig;
    /// use memscope::ir::{FunctionBuilder, Type};
    ///
    /// let mut b = FunctionBuilder::new("sum");
    /// let a = b.argument("a", Type::Ptr);
    /// let (zero, one) = (b.constant(0), b.constant(1));
    /// b.begin_loop("i");
    /// let i = b.induction("i", zero, one)?;
    /// let p = b.element_ptr(a, i, 4)?;
    /// b.load(p, 4)?;
    /// b.end_loop()?;
    /// let function = b.finish()?;
    ///
    /// let info = DelinearizeInfo::compute(&function, &DelinearizeConfig::default());
    /// let array = info.find_array(a).unwrap();
    /// assert!(array.is_valid());
    /// assert_eq!(array.dimension_count(), 1);
    /// # Ok::<(), memscope::Error>(())
    /// ```
    #[must_use]
    pub fn compute(function: &Function, config: &DelinearizeConfig) -> Self {
        Self::new(Delinearizer::new(function, config).run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CallTarget, FunctionBuilder, LoopId, Type};

    fn unit(lp: usize) -> Scev {
        Scev::AddRec {
            start: Box::new(Scev::zero()),
            step: Box::new(Scev::one()),
            lp: LoopId::new(lp),
        }
    }

    fn compute(function: &Function) -> DelinearizeInfo {
        DelinearizeInfo::compute(function, &DelinearizeConfig::default())
    }

    #[test]
    fn test_one_dimension() {
        let mut b = FunctionBuilder::new("f");
        let a = b.argument("a", Type::Ptr);
        let (zero, one) = (b.constant(0), b.constant(1));
        b.begin_loop("i");
        let i = b.induction("i", zero, one).unwrap();
        let p = b.element_ptr(a, i, 4).unwrap();
        let load = b.load(p, 4).unwrap();
        b.end_loop().unwrap();
        let f = b.finish().unwrap();

        let info = compute(&f);
        let array = info.find_array(a).unwrap();
        assert!(array.is_valid());
        assert_eq!(array.dimensions(), &[Scev::constant(4)]);
        let (_, element) = info.find_access(load).unwrap();
        assert_eq!(element.ptr, p);
        assert_eq!(element.subscripts, vec![unit(0)]);
        assert!(element.is_valid);
    }

    #[test]
    fn test_two_dimensions_with_symbolic_row() {
        let mut b = FunctionBuilder::new("f");
        let a = b.argument("a", Type::Ptr);
        let n = b.argument("n", Type::Int(64));
        let (zero, one) = (b.constant(0), b.constant(1));
        b.begin_loop("i");
        let i = b.induction("i", zero, one).unwrap();
        b.begin_loop("j");
        let j = b.induction("j", zero, one).unwrap();
        let row = b.mul(i, n).unwrap();
        let idx = b.add(row, j).unwrap();
        let p = b.element_ptr(a, idx, 4).unwrap();
        b.load(p, 4).unwrap();
        b.end_loop().unwrap();
        b.end_loop().unwrap();
        let f = b.finish().unwrap();

        let info = compute(&f);
        let (array, element) = info.find_element(p).unwrap();
        assert!(array.is_valid());
        assert_eq!(
            array.dimensions(),
            &[
                Scev::Mul(vec![Scev::constant(4), Scev::Unknown(n)]),
                Scev::constant(4)
            ]
        );
        assert_eq!(element.subscripts, vec![unit(0), unit(1)]);
    }

    #[test]
    fn test_constant_offset_shifts_subscript() {
        let mut b = FunctionBuilder::new("f");
        let a = b.argument("a", Type::Ptr);
        let (zero, one) = (b.constant(0), b.constant(1));
        b.begin_loop("i");
        let i = b.induction("i", zero, one).unwrap();
        let next = b.add(i, one).unwrap();
        let p = b.element_ptr(a, i, 4).unwrap();
        let q = b.element_ptr(a, next, 4).unwrap();
        let v = b.load(q, 4).unwrap();
        b.store(p, v, 4).unwrap();
        b.end_loop().unwrap();
        let f = b.finish().unwrap();

        let info = compute(&f);
        let (array, element) = info.find_element(q).unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(
            element.subscripts,
            vec![Scev::AddRec {
                start: Box::new(Scev::one()),
                step: Box::new(Scev::one()),
                lp: LoopId::new(0),
            }]
        );
    }

    #[test]
    fn test_element_size_inferred_from_constant_offsets() {
        let mut b = FunctionBuilder::new("f");
        let s = b.alloca("s", 16);
        let two = b.constant(2);
        let zero = b.constant(0);
        let p = b.element_ptr(s, two, 4).unwrap();
        b.store(s, zero, 4).unwrap();
        b.store(p, zero, 4).unwrap();
        let f = b.finish().unwrap();

        let info = compute(&f);
        let array = info.find_array(s).unwrap();
        assert_eq!(array.dimensions(), &[Scev::constant(4)]);
        assert_eq!(
            info.find_element(p).unwrap().1.subscripts,
            vec![Scev::constant(2)]
        );
        assert_eq!(
            info.find_element(s).unwrap().1.subscripts,
            vec![Scev::zero()]
        );

        let strict = DelinearizeInfo::compute(&f, &DelinearizeConfig::strict());
        let array = strict.find_array(s).unwrap();
        assert!(array.dimensions().is_empty());
        assert!(!strict.find_element(p).unwrap().1.is_valid);
        assert!(strict.find_element(s).unwrap().1.is_valid);
        assert!(array.is_valid());
    }

    #[test]
    fn test_even_and_odd_elements() {
        // for (i..) { a[2 * i]; a[2 * i + 1]; }
        let mut b = FunctionBuilder::new("f");
        let a = b.argument("a", Type::Ptr);
        let (zero, one, two) = (b.constant(0), b.constant(1), b.constant(2));
        b.begin_loop("i");
        let i = b.induction("i", zero, one).unwrap();
        let even = b.mul(i, two).unwrap();
        let odd = b.add(even, one).unwrap();
        let p = b.element_ptr(a, even, 4).unwrap();
        let q = b.element_ptr(a, odd, 4).unwrap();
        b.load(p, 4).unwrap();
        b.load(q, 4).unwrap();
        b.end_loop().unwrap();
        let f = b.finish().unwrap();

        let info = compute(&f);
        let array = info.find_array(a).unwrap();
        assert!(array.is_valid());
        assert_eq!(array.dimensions(), &[Scev::constant(8), Scev::constant(4)]);
        let (_, even) = info.find_element(p).unwrap();
        assert!(even.is_valid);
        assert_eq!(even.subscripts, vec![unit(0), Scev::zero()]);
        let (_, odd) = info.find_element(q).unwrap();
        assert!(odd.is_valid);
        assert_eq!(odd.subscripts, vec![unit(0), Scev::one()]);

        let strict = DelinearizeInfo::compute(&f, &DelinearizeConfig::strict());
        assert_eq!(
            strict.find_array(a).unwrap().dimensions(),
            &[Scev::constant(8)]
        );
        assert!(!strict.find_element(q).unwrap().1.is_valid);
    }

    #[test]
    fn test_incomparable_strides_invalidate_array() {
        let mut b = FunctionBuilder::new("f");
        let a = b.argument("a", Type::Ptr);
        let (zero, one) = (b.constant(0), b.constant(1));
        b.begin_loop("i");
        let i = b.induction("i", zero, one).unwrap();
        let p = b.element_ptr(a, i, 4).unwrap();
        let q = b.element_ptr(a, i, 6).unwrap();
        b.load(p, 4).unwrap();
        b.load(q, 4).unwrap();
        b.end_loop().unwrap();
        let f = b.finish().unwrap();

        let info = compute(&f);
        let array = info.find_array(a).unwrap();
        assert!(!array.is_valid());
        let (_, element) = info.find_element(q).unwrap();
        assert!(!element.is_valid);
        assert_eq!(element.subscripts, vec![unit(0)]);
    }

    #[test]
    fn test_indirect_index_is_kept_invalid() {
        let mut b = FunctionBuilder::new("f");
        let a = b.argument("a", Type::Ptr);
        let idx = b.argument("idx", Type::Ptr);
        let (zero, one) = (b.constant(0), b.constant(1));
        b.begin_loop("i");
        let i = b.induction("i", zero, one).unwrap();
        let slot = b.element_ptr(idx, i, 4).unwrap();
        let k = b.load(slot, 4).unwrap();
        let p = b.element_ptr(a, k, 8).unwrap();
        b.load(p, 8).unwrap();
        b.end_loop().unwrap();
        let f = b.finish().unwrap();

        let info = compute(&f);
        assert!(info.find_array(idx).unwrap().is_valid());
        let array = info.find_array(a).unwrap();
        assert!(!array.is_valid());
        assert!(!info.find_element(p).unwrap().1.is_valid);
    }

    #[test]
    fn test_unresolvable_bases_are_skipped() {
        let mut b = FunctionBuilder::new("f");
        let rows = b.argument("rows", Type::Ptr);
        let (zero, one) = (b.constant(0), b.constant(1));
        let make = b.function_symbol("make");
        b.begin_loop("i");
        let i = b.induction("i", zero, one).unwrap();
        let slot = b.element_ptr(rows, i, 8).unwrap();
        let row = b.load_pointer(slot).unwrap();
        let fresh = b
            .call(CallTarget::Direct(make), &[], CallEffect::Unknown, Type::Ptr)
            .unwrap();
        let v = b.load(row, 4).unwrap();
        b.store(fresh, v, 4).unwrap();
        b.end_loop().unwrap();
        let f = b.finish().unwrap();

        let info = compute(&f);
        assert_eq!(info.array_count(), 1);
        assert!(info.find_array(rows).is_some());
        assert!(info.find_array(row).is_none());
        assert!(info.find_array(fresh).is_none());
    }

    #[test]
    fn test_too_many_dimensions() {
        let mut b = FunctionBuilder::new("f");
        let a = b.argument("a", Type::Ptr);
        let (zero, one) = (b.constant(0), b.constant(1));
        let mut ptrs = Vec::new();
        b.begin_loop("i");
        let i = b.induction("i", zero, one).unwrap();
        for stride in [4, 8, 16, 32, 64] {
            ptrs.push(b.element_ptr(a, i, stride).unwrap());
        }
        for &p in &ptrs {
            b.load(p, 4).unwrap();
        }
        b.end_loop().unwrap();
        let f = b.finish().unwrap();

        let config = DelinearizeConfig::strict();
        let info = DelinearizeInfo::compute(&f, &config);
        let array = info.find_array(a).unwrap();
        assert_eq!(array.dimension_count(), 5);
        assert!(!array.is_valid());
        assert!(compute(&f).find_array(a).unwrap().is_valid());
    }
}
