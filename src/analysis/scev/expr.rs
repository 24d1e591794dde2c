//! Closed-form expression tree representation.
//!
//! This module defines [`Scev`], the symbolic representation of how an integer or address
//! value evolves across loop iterations. Expressions are plain immutable data: they are
//! compared structurally and never mutated once built. Canonical construction (constant
//! folding, operand ordering, recurrence nesting) is the job of
//! [`ScalarEvolution`](crate::analysis::ScalarEvolution); the constructors here only assemble
//! nodes.

use std::{collections::BTreeSet, fmt};

use crate::ir::{Function, LoopId, ValueId};

/// A closed-form expression over function values and loop iterations.
///
/// Operands of [`Scev::Add`] and [`Scev::Mul`] are kept sorted by the derived ordering, with
/// a constant operand (if any) first, so structurally equal expressions compare equal.
///
/// # Recurrences
///
/// `AddRec { start, step, lp }` (printed `{start,+,step}<L>`) is the value `start + k * step`
/// in the `k`-th iteration of loop `lp`. Recurrences of different loops nest with the
/// innermost loop outermost: `{{a,+,4n}<L0>,+,4}<L1>` is `a + 4n*i + 4*j` for `i` counting
/// `L0` and `j` counting the nested `L1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scev {
    /// An integer constant.
    Constant(i64),
    /// A value the toolkit does not look through (argument, global, load result, ...).
    Unknown(ValueId),
    /// Sum of two or more operands.
    Add(Vec<Scev>),
    /// Product of two or more operands.
    Mul(Vec<Scev>),
    /// Add recurrence `{start,+,step}<lp>`.
    AddRec {
        /// Value on loop entry.
        start: Box<Scev>,
        /// Per-iteration increment.
        step: Box<Scev>,
        /// The loop the recurrence advances with.
        lp: LoopId,
    },
    /// The evolution of the value cannot be described.
    CouldNotCompute,
}

impl Scev {
    /// The constant `value`.
    #[must_use]
    pub const fn constant(value: i64) -> Self {
        Self::Constant(value)
    }

    /// The constant 0.
    #[must_use]
    pub const fn zero() -> Self {
        Self::Constant(0)
    }

    /// The constant 1.
    #[must_use]
    pub const fn one() -> Self {
        Self::Constant(1)
    }

    /// An opaque value.
    #[must_use]
    pub const fn unknown(value: ValueId) -> Self {
        Self::Unknown(value)
    }

    /// Returns `true` for the constant 0.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        matches!(self, Self::Constant(0))
    }

    /// Returns `true` for the constant 1.
    #[must_use]
    pub const fn is_one(&self) -> bool {
        matches!(self, Self::Constant(1))
    }

    /// Returns the constant value, if this is a constant.
    #[must_use]
    pub const fn as_constant(&self) -> Option<i64> {
        match self {
            Self::Constant(c) => Some(*c),
            _ => None,
        }
    }

    /// Returns the opaque value, if this is one.
    #[must_use]
    pub const fn as_unknown(&self) -> Option<ValueId> {
        match self {
            Self::Unknown(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns `(start, step, loop)` if this is an add recurrence.
    #[must_use]
    pub fn as_add_rec(&self) -> Option<(&Scev, &Scev, LoopId)> {
        match self {
            Self::AddRec { start, step, lp } => Some((start, step, *lp)),
            _ => None,
        }
    }

    /// Returns `true` for [`Scev::CouldNotCompute`] anywhere in the tree.
    #[must_use]
    pub fn has_could_not_compute(&self) -> bool {
        match self {
            Self::CouldNotCompute => true,
            Self::Constant(_) | Self::Unknown(_) => false,
            Self::Add(ops) | Self::Mul(ops) => ops.iter().any(Self::has_could_not_compute),
            Self::AddRec { start, step, .. } => {
                start.has_could_not_compute() || step.has_could_not_compute()
            }
        }
    }

    /// Returns `true` if an add recurrence occurs anywhere in the tree.
    #[must_use]
    pub fn contains_add_rec(&self) -> bool {
        match self {
            Self::AddRec { .. } => true,
            Self::Constant(_) | Self::Unknown(_) | Self::CouldNotCompute => false,
            Self::Add(ops) | Self::Mul(ops) => ops.iter().any(Self::contains_add_rec),
        }
    }

    /// Returns `true` if the expression is a negative constant or a product with a negative
    /// constant factor.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        match self {
            Self::Constant(c) => *c < 0,
            Self::Mul(ops) => ops.first().and_then(Self::as_constant).is_some_and(|c| c < 0),
            _ => false,
        }
    }

    /// Collects the opaque values referenced by the expression.
    #[must_use]
    pub fn values(&self) -> BTreeSet<ValueId> {
        let mut out = BTreeSet::new();
        self.collect_values(&mut out);
        out
    }

    fn collect_values(&self, out: &mut BTreeSet<ValueId>) {
        match self {
            Self::Unknown(v) => {
                out.insert(*v);
            }
            Self::Constant(_) | Self::CouldNotCompute => {}
            Self::Add(ops) | Self::Mul(ops) => {
                for op in ops {
                    op.collect_values(out);
                }
            }
            Self::AddRec { start, step, .. } => {
                start.collect_values(out);
                step.collect_values(out);
            }
        }
    }

    /// Collects the loops the expression's recurrences advance with.
    #[must_use]
    pub fn loops(&self) -> BTreeSet<LoopId> {
        let mut out = BTreeSet::new();
        self.collect_loops(&mut out);
        out
    }

    fn collect_loops(&self, out: &mut BTreeSet<LoopId>) {
        match self {
            Self::Constant(_) | Self::Unknown(_) | Self::CouldNotCompute => {}
            Self::Add(ops) | Self::Mul(ops) => {
                for op in ops {
                    op.collect_loops(out);
                }
            }
            Self::AddRec { start, step, lp } => {
                out.insert(*lp);
                start.collect_loops(out);
                step.collect_loops(out);
            }
        }
    }

    /// Returns a displayable form that prints opaque values by their IR names.
    #[must_use]
    pub fn display<'a>(&'a self, function: &'a Function) -> ScevDisplay<'a> {
        ScevDisplay {
            expr: self,
            function: Some(function),
        }
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, function: Option<&Function>) -> fmt::Result {
        match self {
            Self::Constant(c) => write!(f, "{c}"),
            Self::Unknown(v) => match function {
                Some(function) => write!(f, "{}", function.operand_name(*v)),
                None => write!(f, "%{v}"),
            },
            Self::Add(ops) | Self::Mul(ops) => {
                let sep = if matches!(self, Self::Add(_)) {
                    " + "
                } else {
                    " * "
                };
                write!(f, "(")?;
                for (i, op) in ops.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    op.write(f, function)?;
                }
                write!(f, ")")
            }
            Self::AddRec { start, step, lp } => {
                write!(f, "{{")?;
                start.write(f, function)?;
                write!(f, ",+,")?;
                step.write(f, function)?;
                write!(f, "}}<{lp}>")
            }
            Self::CouldNotCompute => write!(f, "***COULDNOTCOMPUTE***"),
        }
    }
}

impl fmt::Display for Scev {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, None)
    }
}

/// An expression printed with IR value names, see [`Scev::display`].
pub struct ScevDisplay<'a> {
    expr: &'a Scev,
    function: Option<&'a Function>,
}

impl fmt::Display for ScevDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.expr.write(f, self.function)
    }
}
