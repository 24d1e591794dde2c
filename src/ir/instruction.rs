//! Instructions of the host IR.
//!
//! The instruction set is deliberately small: it covers what the memory hierarchy and the
//! delinearization engine need to see (addresses, memory accesses, calls, loop inductions
//! and integer arithmetic feeding subscripts).

use strum::{Display, EnumIter};

use crate::ir::{LoopId, ValueId};

/// Type-based alias analysis tag attached to loads and stores.
///
/// Two accesses carrying different tags are known not to overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TbaaTag(pub u32);

/// Integer arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum BinaryOp {
    /// `lhs + rhs`
    Add,
    /// `lhs - rhs`
    Sub,
    /// `lhs * rhs`
    Mul,
    /// `lhs << rhs`
    Shl,
}

/// The memory behaviour of a called function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum CallEffect {
    /// The callee does not touch memory.
    None,
    /// The callee may read arbitrary memory but never writes.
    ReadOnly,
    /// The callee only accesses memory reachable from its pointer arguments.
    ArgMemOnly,
    /// The callee returns fresh memory and does not touch existing memory.
    Allocator,
    /// The callee may read and write arbitrary memory.
    Unknown,
}

/// Target of a call instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallTarget {
    /// Call to a known function symbol.
    Direct(ValueId),
    /// Call through a function pointer.
    Indirect(ValueId),
}

impl CallTarget {
    /// The value called.
    #[must_use]
    pub const fn callee(self) -> ValueId {
        match self {
            CallTarget::Direct(v) | CallTarget::Indirect(v) => v,
        }
    }
}

/// The operation performed by an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opcode {
    /// Stack allocation of `size` bytes; the result is its address.
    Alloca {
        /// Allocated bytes.
        size: u64,
    },
    /// Read `size` bytes at `ptr`.
    Load {
        /// Address read.
        ptr: ValueId,
        /// Number of bytes read.
        size: u64,
        /// Optional type-based alias tag.
        tbaa: Option<TbaaTag>,
    },
    /// Write `value` (`size` bytes) at `ptr`.
    Store {
        /// Address written.
        ptr: ValueId,
        /// Value written.
        value: ValueId,
        /// Number of bytes written.
        size: u64,
        /// Optional type-based alias tag.
        tbaa: Option<TbaaTag>,
    },
    /// Integer arithmetic.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        lhs: ValueId,
        /// Right operand.
        rhs: ValueId,
    },
    /// Value-preserving conversion (extension, truncation, pointer cast).
    Cast {
        /// Converted value.
        operand: ValueId,
    },
    /// Address arithmetic: `base + index * stride` bytes.
    ElementPtr {
        /// Base address.
        base: ValueId,
        /// Element index.
        index: ValueId,
        /// Element size in bytes.
        stride: i64,
    },
    /// Closed form of a loop header phi: `start` on entry, advanced by `step` per iteration
    /// of the instruction's parent loop.
    Induction {
        /// Initial value.
        start: ValueId,
        /// Per-iteration increment.
        step: ValueId,
    },
    /// Function call.
    Call {
        /// What is called.
        target: CallTarget,
        /// Actual arguments.
        args: Vec<ValueId>,
        /// Memory behaviour of the callee.
        effect: CallEffect,
    },
    /// Function return.
    Return {
        /// Returned value.
        value: Option<ValueId>,
    },
}

/// An instruction together with its position in the loop nest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// The operation.
    pub op: Opcode,
    /// Innermost loop containing the instruction, `None` outside of all loops.
    pub parent: Option<LoopId>,
}

impl Instruction {
    /// Returns all value operands in order.
    #[must_use]
    pub fn operands(&self) -> Vec<ValueId> {
        match &self.op {
            Opcode::Alloca { .. } => Vec::new(),
            Opcode::Load { ptr, .. } => vec![*ptr],
            Opcode::Store { ptr, value, .. } => vec![*ptr, *value],
            Opcode::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            Opcode::Cast { operand } => vec![*operand],
            Opcode::ElementPtr { base, index, .. } => vec![*base, *index],
            Opcode::Induction { start, step } => vec![*start, *step],
            Opcode::Call { target, args, .. } => {
                let mut ops = Vec::with_capacity(args.len() + 1);
                ops.push(target.callee());
                ops.extend(args.iter().copied());
                ops
            }
            Opcode::Return { value } => value.iter().copied().collect(),
        }
    }

    /// Returns the address operand of a load or store.
    #[must_use]
    pub fn pointer_operand(&self) -> Option<ValueId> {
        match &self.op {
            Opcode::Load { ptr, .. } | Opcode::Store { ptr, .. } => Some(*ptr),
            _ => None,
        }
    }

    /// Returns `true` for calls.
    #[must_use]
    pub const fn is_call(&self) -> bool {
        matches!(self.op, Opcode::Call { .. })
    }

    /// Returns the mnemonic used when printing the instruction.
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        match self.op {
            Opcode::Alloca { .. } => "alloca",
            Opcode::Load { .. } => "load",
            Opcode::Store { .. } => "store",
            Opcode::Binary { op, .. } => match op {
                BinaryOp::Add => "add",
                BinaryOp::Sub => "sub",
                BinaryOp::Mul => "mul",
                BinaryOp::Shl => "shl",
            },
            Opcode::Cast { .. } => "cast",
            Opcode::ElementPtr { .. } => "elementptr",
            Opcode::Induction { .. } => "induction",
            Opcode::Call { .. } => "call",
            Opcode::Return { .. } => "ret",
        }
    }
}
