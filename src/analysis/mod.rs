//! Memory analyses for automatic parallelization.
//!
//! This module builds on the host IR in [`crate::ir`] and provides the two analyses later
//! dependence testing relies on, together with the expression toolkit both share.
//!
//! # Architecture
//!
//! - [`scev`] - Closed-form expressions of integer and address values across loop iterations
//! - [`memory`] - The memory hierarchy (alias tree) of a function
//! - [`delinearize`] - Recovery of multi-dimensional array subscripts from linear offsets
//!
//! The alias tree and the delinearization result of a function are independent of each
//! other; [`FunctionAnalysis`] bundles them and [`AnalysisManager`] caches them per function
//! and runs them over whole modules.
//!
//! # Usage
//!
//! ```rust
//! use memscope::analysis::FunctionAnalysis;
//! use memscope::config::AnalysisConfig;
//! use memscope::ir::{FunctionBuilder, Type};
//!
//! let mut b = FunctionBuilder::new("scale");
//! let a = b.noalias_argument("a");
//! let (zero, one) = (b.constant(0), b.constant(1));
//! b.begin_loop("i");
//! let i = b.induction("i", zero, one)?;
//! let p = b.element_ptr(a, i, 8)?;
//! let v = b.load(p, 8)?;
//! b.store(p, v, 8)?;
//! b.end_loop()?;
//! let function = b.finish()?;
//!
//! let analysis = FunctionAnalysis::run(&function, &AnalysisConfig::default());
//! let tree = analysis.alias_tree().unwrap();
//! assert_eq!(tree.find_pointer(p).len(), 1);
//! let info = analysis.delinearize().unwrap();
//! assert!(info.find_array(a).unwrap().is_valid());
//! # Ok::<(), memscope::Error>(())
//! ```

pub mod delinearize;
pub mod memory;
mod pass;
pub mod scev;

pub use delinearize::{find_coefficients, Array, ArraySet, DelinearizeInfo, Delinearizer, Element};
pub use memory::{
    memory_accesses, AccessFlags, AliasAnalysis, AliasInfo, AliasNode, AliasNodeId,
    AliasNodeKind, AliasResult, AliasTree, AliasTreeBuilder, AliasTreePrinter,
    BasicAliasAnalysis, EstimateMemory, EstimateNode, LabelMode, LocationSize, MemoryAccess,
    MemoryLocation, NodeKindTag, Relation, UnknownNode,
};
pub use pass::{AnalysisManager, FunctionAnalysis};
pub use scev::{ScalarEvolution, Scev, ScevDisplay};
