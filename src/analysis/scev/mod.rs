//! Closed-form (scalar evolution) expressions for addresses and subscripts.
//!
//! This module provides the symbolic toolkit the delinearization engine works on. Every
//! integer or address value of a function can be described as a [`Scev`] expression built
//! from constants, opaque values, sums, products and add recurrences `{start,+,step}<L>`.
//!
//! # Architecture
//!
//! - `expr` - The immutable expression tree and its printers
//! - `evolution` - [`ScalarEvolution`], which derives expressions from IR values and owns
//!   the folding arithmetic, invariance queries and exact division
//!
//! # Examples
//!
//! ```rust
//! use memscope::analysis::{Scev, ScalarEvolution};
//! use memscope::ir::{FunctionBuilder, Type};
//!
//! let mut b = FunctionBuilder::new("f");
//! let a = b.argument("a", Type::Ptr);
//! let zero = b.constant(0);
//! let one = b.constant(1);
//! b.begin_loop("i");
//! let i = b.induction("i", zero, one)?;
//! let p = b.element_ptr(a, i, 4)?;
//! b.end_loop()?;
//! let function = b.finish()?;
//!
//! let se = ScalarEvolution::new(&function);
//! assert_eq!(se.scev(p).display(&function).to_string(), "{%a,+,4}<L0>");
//! assert_eq!(se.pointer_base(&se.scev(p)), Some(a));
//! # Ok::<(), memscope::Error>(())
//! ```

mod evolution;
mod expr;

pub use evolution::ScalarEvolution;
pub use expr::{Scev, ScevDisplay};
