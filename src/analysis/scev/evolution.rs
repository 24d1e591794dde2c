//! Construction and algebra of closed-form expressions.
//!
//! [`ScalarEvolution`] maps function values to [`Scev`] expressions and owns every operation
//! that builds new ones. All constructors fold eagerly, so two computations of the same
//! quantity produce structurally equal trees:
//!
//! - sums and products are flattened, constants are folded and like terms are combined
//! - products distribute over sums
//! - a recurrence absorbs every operand that does not vary in its loop, and recurrences of
//!   nested loops are kept innermost-outermost
//!
//! Results are cached per value, so repeated queries on the same function are cheap.

use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
};

use crate::{
    analysis::scev::Scev,
    ir::{BinaryOp, Function, Instruction, LoopId, Opcode, ValueId, ValueKind},
};

/// Expression builder and query engine for one function.
pub struct ScalarEvolution<'f> {
    function: &'f Function,
    cache: RefCell<HashMap<ValueId, Scev>>,
}

impl<'f> ScalarEvolution<'f> {
    /// Creates an engine over `function`.
    #[must_use]
    pub fn new(function: &'f Function) -> Self {
        Self {
            function,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// The function the expressions refer to.
    #[must_use]
    pub fn function(&self) -> &'f Function {
        self.function
    }

    /// Returns the closed form of `value`.
    ///
    /// Values the engine cannot look through (arguments, globals, loads, call results,
    /// inductions with a loop-variant step) become [`Scev::Unknown`]. Ids that do not belong
    /// to the function yield [`Scev::CouldNotCompute`].
    #[must_use]
    pub fn scev(&self, value: ValueId) -> Scev {
        if let Some(cached) = self.cache.borrow().get(&value) {
            return cached.clone();
        }
        let result = self.compute(value);
        self.cache.borrow_mut().insert(value, result.clone());
        result
    }

    fn compute(&self, value: ValueId) -> Scev {
        let Some(val) = self.function.value(value) else {
            return Scev::CouldNotCompute;
        };
        let inst = match &val.kind {
            ValueKind::Constant(c) => return Scev::Constant(*c),
            ValueKind::Instruction(inst) => inst,
            _ => return Scev::Unknown(value),
        };

        match &inst.op {
            Opcode::Binary { op, lhs, rhs } => {
                let (l, r) = (self.scev(*lhs), self.scev(*rhs));
                match op {
                    BinaryOp::Add => self.add(vec![l, r]),
                    BinaryOp::Sub => self.sub(&l, &r),
                    BinaryOp::Mul => self.mul(vec![l, r]),
                    BinaryOp::Shl => match r.as_constant() {
                        Some(shift @ 0..=62) => self.mul(vec![l, Scev::Constant(1 << shift)]),
                        _ => Scev::Unknown(value),
                    },
                }
            }
            Opcode::Cast { operand } => self.scev(*operand),
            Opcode::ElementPtr {
                base,
                index,
                stride,
            } => {
                let offset = self.mul(vec![self.scev(*index), Scev::Constant(*stride)]);
                self.add(vec![self.scev(*base), offset])
            }
            Opcode::Induction { start, step } => self.induction(value, inst, *start, *step),
            _ => Scev::Unknown(value),
        }
    }

    fn induction(&self, value: ValueId, inst: &Instruction, start: ValueId, step: ValueId) -> Scev {
        let Some(lp) = inst.parent else {
            return Scev::Unknown(value);
        };
        // Self-referencing steps resolve to the opaque value instead of recursing forever.
        self.cache.borrow_mut().insert(value, Scev::Unknown(value));

        let start = self.scev(start);
        let step = self.scev(step);
        if start.has_could_not_compute()
            || step.has_could_not_compute()
            || !self.is_loop_invariant(&start, lp)
            || !self.is_loop_invariant(&step, lp)
        {
            log::trace!(
                "induction {} of {} has no affine closed form",
                value,
                self.function.name()
            );
            return Scev::Unknown(value);
        }
        self.add_rec(start, step, lp)
    }

    /// Builds `{start,+,step}<lp>` in canonical form.
    ///
    /// A zero step yields `start`. A `start` that is itself a recurrence of a more deeply
    /// nested loop is rotated so the innermost loop stays outermost.
    #[must_use]
    pub fn add_rec(&self, start: Scev, step: Scev, lp: LoopId) -> Scev {
        if step.is_zero() {
            return start;
        }
        if let Scev::AddRec {
            start: inner_start,
            step: inner_step,
            lp: inner_lp,
        } = &start
        {
            if self.rank(*inner_lp) > self.rank(lp) {
                let rotated = self.add_rec((**inner_start).clone(), step, lp);
                return self.add_rec(rotated, (**inner_step).clone(), *inner_lp);
            }
        }
        Scev::AddRec {
            start: Box::new(start),
            step: Box::new(step),
            lp,
        }
    }

    /// Ordering key of loops: deeper loops first, ties broken by id.
    fn rank(&self, lp: LoopId) -> (usize, LoopId) {
        (self.function.loop_depth(lp), lp)
    }

    fn deepest_rec_loop(&self, ops: &[Scev]) -> Option<LoopId> {
        ops.iter()
            .filter_map(|op| op.as_add_rec().map(|(_, _, lp)| lp))
            .max_by_key(|lp| self.rank(*lp))
    }

    /// Folded sum of `ops`.
    #[must_use]
    pub fn add(&self, ops: Vec<Scev>) -> Scev {
        let mut flat = Vec::with_capacity(ops.len());
        for op in ops {
            match op {
                Scev::Add(inner) => flat.extend(inner),
                Scev::CouldNotCompute => return Scev::CouldNotCompute,
                other => flat.push(other),
            }
        }

        if let Some(lp) = self.deepest_rec_loop(&flat) {
            let mut starts = Vec::new();
            let mut steps = Vec::new();
            for op in flat {
                match op {
                    Scev::AddRec {
                        start,
                        step,
                        lp: rec_lp,
                    } if rec_lp == lp => {
                        starts.push(*start);
                        steps.push(*step);
                    }
                    other => starts.push(other),
                }
            }
            let start = self.add(starts);
            let step = self.add(steps);
            return self.add_rec(start, step, lp);
        }

        let mut constant = 0i64;
        let mut terms: BTreeMap<Scev, i64> = BTreeMap::new();
        for op in flat {
            let (coefficient, term) = match op {
                Scev::Constant(c) => {
                    constant = constant.wrapping_add(c);
                    continue;
                }
                Scev::Mul(mut factors) => match factors.first().and_then(Scev::as_constant) {
                    Some(c) => {
                        factors.remove(0);
                        (c, rebuild_product(factors))
                    }
                    None => (1, Scev::Mul(factors)),
                },
                other => (1, other),
            };
            let entry = terms.entry(term).or_insert(0);
            *entry = entry.wrapping_add(coefficient);
        }

        let mut result = Vec::with_capacity(terms.len() + 1);
        if constant != 0 {
            result.push(Scev::Constant(constant));
        }
        for (term, coefficient) in terms {
            match coefficient {
                0 => {}
                1 => result.push(term),
                c => result.push(scale(c, term)),
            }
        }
        result.sort();
        match result.len() {
            0 => Scev::zero(),
            1 => result.remove(0),
            _ => Scev::Add(result),
        }
    }

    /// Folded product of `ops`.
    #[must_use]
    pub fn mul(&self, ops: Vec<Scev>) -> Scev {
        let mut constant = 1i64;
        let mut flat = Vec::with_capacity(ops.len());
        let mut pending = ops;
        while let Some(op) = pending.pop() {
            match op {
                Scev::Mul(inner) => pending.extend(inner),
                Scev::Constant(c) => constant = constant.wrapping_mul(c),
                Scev::CouldNotCompute => return Scev::CouldNotCompute,
                other => flat.push(other),
            }
        }
        if constant == 0 {
            return Scev::zero();
        }

        if let Some(lp) = self.deepest_rec_loop(&flat) {
            let same_loop = flat
                .iter()
                .filter(|op| matches!(op, Scev::AddRec { lp: l, .. } if *l == lp))
                .count();
            // A product of two recurrences of the same loop is not affine; it stays a
            // plain product.
            if same_loop == 1 {
                let pos = flat
                    .iter()
                    .position(|op| matches!(op, Scev::AddRec { lp: l, .. } if *l == lp));
                if let Some(Scev::AddRec { start, step, .. }) = pos.map(|p| flat.remove(p)) {
                    flat.push(Scev::Constant(constant));
                    let factor = self.mul(flat);
                    let start = self.mul(vec![*start, factor.clone()]);
                    let step = self.mul(vec![*step, factor]);
                    return self.add_rec(start, step, lp);
                }
            }
        } else if let Some(pos) = flat.iter().position(|op| matches!(op, Scev::Add(_))) {
            let Scev::Add(terms) = flat.remove(pos) else {
                return Scev::CouldNotCompute;
            };
            flat.push(Scev::Constant(constant));
            let distributed = terms
                .into_iter()
                .map(|term| {
                    let mut factors = flat.clone();
                    factors.push(term);
                    self.mul(factors)
                })
                .collect();
            return self.add(distributed);
        }

        flat.sort();
        if constant != 1 {
            flat.insert(0, Scev::Constant(constant));
        }
        match flat.len() {
            0 => Scev::one(),
            1 => flat.remove(0),
            _ => Scev::Mul(flat),
        }
    }

    /// `-a`
    #[must_use]
    pub fn neg(&self, a: &Scev) -> Scev {
        self.mul(vec![Scev::Constant(-1), a.clone()])
    }

    /// `a - b`
    #[must_use]
    pub fn sub(&self, a: &Scev, b: &Scev) -> Scev {
        self.add(vec![a.clone(), self.neg(b)])
    }

    /// Returns `true` if `expr` has the same value in every iteration of `lp`.
    ///
    /// Opaque values defined inside `lp` (or a loop nested in it) and recurrences of `lp` or
    /// its nested loops vary; everything else is invariant.
    #[must_use]
    pub fn is_loop_invariant(&self, expr: &Scev, lp: LoopId) -> bool {
        match expr {
            Scev::Constant(_) => true,
            Scev::CouldNotCompute => false,
            Scev::Unknown(v) => self
                .function
                .parent_loop(*v)
                .map_or(true, |parent| !self.function.loop_contains(lp, parent)),
            Scev::Add(ops) | Scev::Mul(ops) => ops.iter().all(|op| self.is_loop_invariant(op, lp)),
            Scev::AddRec {
                start,
                step,
                lp: rec_lp,
            } => {
                !self.function.loop_contains(lp, *rec_lp)
                    && self.is_loop_invariant(start, lp)
                    && self.is_loop_invariant(step, lp)
            }
        }
    }

    /// Returns `true` if `expr` has the same value everywhere in the function: no
    /// recurrences and no opaque values defined inside a loop.
    #[must_use]
    pub fn is_function_invariant(&self, expr: &Scev) -> bool {
        match expr {
            Scev::Constant(_) => true,
            Scev::CouldNotCompute | Scev::AddRec { .. } => false,
            Scev::Unknown(v) => self.function.parent_loop(*v).is_none(),
            Scev::Add(ops) | Scev::Mul(ops) => ops.iter().all(|op| self.is_function_invariant(op)),
        }
    }

    /// Finds the pointer an address expression is based on.
    ///
    /// The base is the single pointer-typed opaque term of the expression, looked up through
    /// sums and recurrence starts. Expressions with no or several pointer terms have no base.
    #[must_use]
    pub fn pointer_base(&self, expr: &Scev) -> Option<ValueId> {
        match expr {
            Scev::Unknown(v) => self.function.is_pointer(*v).then_some(*v),
            Scev::AddRec { start, .. } => self.pointer_base(start),
            Scev::Add(ops) => {
                let mut bases = ops.iter().filter_map(|op| self.pointer_base(op));
                let base = bases.next()?;
                bases.next().is_none().then_some(base)
            }
            _ => None,
        }
    }

    /// Exact quotient `a / b`, or `None` if `b` does not divide `a`.
    #[must_use]
    pub fn divide_exact(&self, a: &Scev, b: &Scev) -> Option<Scev> {
        if b.is_zero() || a.has_could_not_compute() || b.has_could_not_compute() {
            return None;
        }
        if b.is_one() {
            return Some(a.clone());
        }
        if a == b {
            return Some(Scev::one());
        }
        if a.is_zero() {
            return Some(Scev::zero());
        }

        match a {
            Scev::AddRec { start, step, lp } => {
                let start = self.divide_exact(start, b)?;
                let step = self.divide_exact(step, b)?;
                return Some(self.add_rec(start, step, *lp));
            }
            Scev::Add(terms) if !matches!(b, Scev::Add(_)) => {
                let quotients = terms
                    .iter()
                    .map(|term| self.divide_exact(term, b))
                    .collect::<Option<Vec<_>>>()?;
                return Some(self.add(quotients));
            }
            _ => {}
        }

        if let Scev::Add(divisor) = b {
            // Polynomial divisor: guess the quotient from the leading terms and verify it.
            let lead_a = match a {
                Scev::Add(terms) => terms.last()?,
                other => other,
            };
            let quotient = self.divide_monomial(lead_a, divisor.last()?)?;
            return (self.mul(vec![quotient.clone(), b.clone()]) == *a).then_some(quotient);
        }
        self.divide_monomial(a, b)
    }

    fn divide_monomial(&self, a: &Scev, b: &Scev) -> Option<Scev> {
        let (a_const, mut a_factors) = split_factors(a)?;
        let (b_const, b_factors) = split_factors(b)?;
        if a_const.checked_rem(b_const)? != 0 {
            return None;
        }
        let quotient = a_const.checked_div(b_const)?;
        for factor in b_factors {
            let pos = a_factors.iter().position(|f| *f == factor)?;
            a_factors.remove(pos);
        }
        a_factors.push(Scev::Constant(quotient));
        Some(self.mul(a_factors))
    }

    /// Splits `a` into `(q, r)` with `a = q * b + r`.
    ///
    /// Terms divisible by `b` go to the quotient. Constant terms divided by a constant use
    /// Euclidean division, so the remainder is never negative. Everything else stays in the
    /// remainder.
    #[must_use]
    pub fn div_rem(&self, a: &Scev, b: &Scev) -> (Scev, Scev) {
        if let (Some(x), Some(y)) = (a.as_constant(), b.as_constant()) {
            if y == 0 {
                return (Scev::zero(), a.clone());
            }
            return (
                Scev::Constant(x.wrapping_div_euclid(y)),
                Scev::Constant(x.wrapping_rem_euclid(y)),
            );
        }
        if let Some(q) = self.divide_exact(a, b) {
            return (q, Scev::zero());
        }
        let terms = match a {
            Scev::Add(terms) => terms.as_slice(),
            other => std::slice::from_ref(other),
        };
        let mut quotients = Vec::new();
        let mut remainders = Vec::new();
        for term in terms {
            if let Some(q) = self.divide_exact(term, b) {
                quotients.push(q);
            } else if let (Some(x), Some(y)) = (term.as_constant(), b.as_constant()) {
                quotients.push(Scev::Constant(x.wrapping_div_euclid(y)));
                remainders.push(Scev::Constant(x.wrapping_rem_euclid(y)));
            } else {
                remainders.push(term.clone());
            }
        }
        (self.add(quotients), self.add(remainders))
    }

    /// Returns `true` if `a` is a proper multiple of `b` (`a = k * b` and `a != b`).
    #[must_use]
    pub fn is_multiple_of(&self, a: &Scev, b: &Scev) -> bool {
        a != b && self.divide_exact(a, b).is_some()
    }
}

/// Splits a monomial into its constant factor and its symbolic factors.
fn split_factors(expr: &Scev) -> Option<(i64, Vec<Scev>)> {
    match expr {
        Scev::Constant(c) => Some((*c, Vec::new())),
        Scev::Unknown(_) => Some((1, vec![expr.clone()])),
        Scev::Mul(factors) => {
            let mut constant = 1i64;
            let mut rest = Vec::with_capacity(factors.len());
            for factor in factors {
                match factor {
                    Scev::Constant(c) => constant = constant.wrapping_mul(*c),
                    Scev::Add(_) | Scev::CouldNotCompute => return None,
                    other => rest.push(other.clone()),
                }
            }
            Some((constant, rest))
        }
        Scev::Add(_) | Scev::AddRec { .. } | Scev::CouldNotCompute => None,
    }
}

fn rebuild_product(mut factors: Vec<Scev>) -> Scev {
    match factors.len() {
        0 => Scev::one(),
        1 => factors.remove(0),
        _ => Scev::Mul(factors),
    }
}

/// `c * term` for a term without a constant factor.
fn scale(c: i64, term: Scev) -> Scev {
    match term {
        Scev::Mul(mut factors) => {
            factors.insert(0, Scev::Constant(c));
            Scev::Mul(factors)
        }
        other => Scev::Mul(vec![Scev::Constant(c), other]),
    }
}
