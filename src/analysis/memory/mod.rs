//! Memory hierarchy (alias tree) of a function.
//!
//! The alias tree groups every piece of memory a function accesses into a containment tree.
//! The root stands for the whole memory; below it, estimate nodes cluster memory locations
//! and unknown nodes collect instructions whose footprint cannot be described (for example
//! calls through function pointers). A node covers all memory of its subtree, and memory in
//! disjoint subtrees never overlaps, so alias and dependence queries reduce to ancestor
//! checks.
//!
//! # Architecture
//!
//! - `location` - Memory locations, access flags and per-instruction classification
//! - `alias` - The pairwise alias oracle the builder relies on
//! - `estimate` - Node payloads: clusters of locations and unknown instruction sets
//! - `builder` - Incremental construction and the merge/containment policy
//! - `tree` - The frozen tree, node handles and queries
//! - `printer` - DOT and text rendering
//!
//! # Usage
//!
//! ```rust
//! use memscope::analysis::{AliasTree, AliasTreePrinter};
//! use memscope::config::AliasTreeConfig;
//! use memscope::ir::FunctionBuilder;
//!
//! let mut b = FunctionBuilder::new("copy");
//! let src = b.noalias_argument("src");
//! let dst = b.noalias_argument("dst");
//! let v = b.load(src, 8)?;
//! b.store(dst, v, 8)?;
//! let function = b.finish()?;
//!
//! let tree = AliasTree::build(&function, &AliasTreeConfig::default());
//! let (s, d) = (tree.find_pointer(src)[0], tree.find_pointer(dst)[0]);
//! assert!(!tree.nodes_may_alias(s, d));
//!
//! let dot = AliasTreePrinter::new(&tree, &function).to_dot();
//! assert!(dot.contains("Whole Memory"));
//! # Ok::<(), memscope::Error>(())
//! ```

mod alias;
mod builder;
mod estimate;
mod location;
mod printer;
mod tree;

pub use alias::{AliasAnalysis, AliasResult, BasicAliasAnalysis};
pub use builder::AliasTreeBuilder;
pub use estimate::{EstimateMemory, EstimateNode, UnknownNode};
pub use location::{
    memory_accesses, AccessFlags, AliasInfo, LocationSize, MemoryAccess, MemoryLocation,
};
pub use printer::{AliasTreePrinter, LabelMode};
pub use tree::{AliasNode, AliasNodeId, AliasNodeKind, AliasTree, NodeKindTag, Relation};
