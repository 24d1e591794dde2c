//! # memscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types of the
//! memscope library. Import it to get quick access to the IR builder, the analyses and
//! their results.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all memscope operations
pub use crate::Error;

/// The result type used throughout memscope
pub use crate::Result;

/// Configuration of the analyses
pub use crate::config::{AliasTreeConfig, AnalysisConfig, DelinearizeConfig};

// ================================================================================================
// Host IR
// ================================================================================================

/// Analysed units and their construction
pub use crate::ir::{Function, FunctionBuilder, Module};

/// Values, instructions and handles
pub use crate::ir::{
    CallEffect, CallTarget, DebugVariable, LoopId, Opcode, TbaaTag, Type, ValueId,
};

// ================================================================================================
// Analyses
// ================================================================================================

/// Module driver and per-function results
pub use crate::analysis::{AnalysisManager, FunctionAnalysis};

/// Closed-form expressions
pub use crate::analysis::{ScalarEvolution, Scev};

/// Memory hierarchy
pub use crate::analysis::{
    AccessFlags, AliasNodeId, AliasNodeKind, AliasTree, AliasTreePrinter, LabelMode,
    MemoryLocation, Relation,
};

/// Delinearization results
pub use crate::analysis::{Array, DelinearizeInfo, Element};
