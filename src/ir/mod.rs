//! Host intermediate representation consumed by the analyses.
//!
//! The analyses only read the IR: they never mutate or free values. A [`Function`] is a value
//! table (arguments, globals, function symbols, constants and instructions), a loop nest and
//! the program order of its instructions. Loop-carried values are expressed in closed form
//! through [`Opcode::Induction`], the equivalent of a loop-header phi whose evolution is known.
//!
//! # Key Types
//!
//! - [`Function`] / [`Module`] - Analysed units
//! - [`FunctionBuilder`] - Validating construction of functions
//! - [`Value`] / [`ValueKind`] / [`Type`] - Entries of the value table
//! - [`Instruction`] / [`Opcode`] - Instructions and their operations
//! - [`ValueId`] / [`LoopId`] - Strongly-typed handles

mod builder;
mod function;
mod ids;
mod instruction;
mod value;

pub use builder::FunctionBuilder;
pub use function::{Function, Loop, Module, ValueDisplay};
pub use ids::{LoopId, ValueId};
pub use instruction::{BinaryOp, CallEffect, CallTarget, Instruction, Opcode, TbaaTag};
pub use value::{DebugVariable, Type, Value, ValueKind};
