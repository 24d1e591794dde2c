//! Splitting of induction expressions into `coefficient * recurrence`.

use crate::analysis::scev::{ScalarEvolution, Scev};

/// Decomposes `expr` into a loop-invariant coefficient and a unit-step recurrence.
///
/// - `{start,+,step}<L>` with `step` invariant in `L` yields `(step, {start/step,+,1}<L>)`;
///   a negative step is normalized to `(-step, {.,+,-1}<L>)`. When `step` does not divide
///   `start` the coefficient is the unit and the recurrence is `expr` itself.
/// - a product of exactly two operands, one of them a recurrence and the other invariant in
///   the recurrence's loop, multiplies the recurrence's coefficient by the invariant side.
///
/// # Returns
///
/// `None` if `expr` is not related to an induction variable or has any other shape (sums
/// are deliberately not taken apart).
///
/// # Examples
///
/// ```rust
/// use memscope::analysis::{find_coefficients, ScalarEvolution, Scev};
/// use memscope::ir::FunctionBuilder;
///
/// let mut b = FunctionBuilder::new("f");
/// let zero = b.constant(0);
/// let four = b.constant(4);
/// b.begin_loop("i");
/// let i = b.induction("i", zero, four)?;
/// b.end_loop()?;
/// let function = b.finish()?;
///
/// let se = ScalarEvolution::new(&function);
/// let (coefficient, recurrence) = find_coefficients(&se.scev(i), &se).unwrap();
/// assert_eq!(coefficient, Scev::constant(4));
/// assert_eq!(recurrence.to_string(), "{0,+,1}<L0>");
/// # Ok::<(), memscope::Error>(())
/// ```
#[must_use]
pub fn find_coefficients(expr: &Scev, se: &ScalarEvolution<'_>) -> Option<(Scev, Scev)> {
    match expr {
        Scev::AddRec { start, step, lp } => {
            if step.contains_add_rec() || !se.is_loop_invariant(step, *lp) {
                return None;
            }
            let (coefficient, unit) = if step.is_negative() {
                (se.neg(step), Scev::constant(-1))
            } else {
                (step.as_ref().clone(), Scev::one())
            };
            if coefficient.is_one() {
                return Some((coefficient, expr.clone()));
            }
            match se.divide_exact(start, &coefficient) {
                Some(first) => Some((coefficient, se.add_rec(first, unit, *lp))),
                None => Some((Scev::one(), expr.clone())),
            }
        }
        Scev::Mul(ops) if ops.len() == 2 => {
            let (rec, invariant) = match (&ops[0], &ops[1]) {
                (rec @ Scev::AddRec { .. }, other) | (other, rec @ Scev::AddRec { .. }) => {
                    (rec, other)
                }
                _ => return None,
            };
            let (_, _, lp) = rec.as_add_rec()?;
            if !se.is_loop_invariant(invariant, lp) {
                return None;
            }
            let (coefficient, recurrence) = find_coefficients(rec, se)?;
            Some((se.mul(vec![coefficient, invariant.clone()]), recurrence))
        }
        _ => None,
    }
}
