//! Array subscript delinearization.
//!
//! Compilers lower `a[i][j]` on a dynamically sized array to a single byte offset such as
//! `a + 4*n*i + 4*j`. Dependence analysis needs the subscripts back. This module recovers,
//! for every base pointer a function accesses, the array dimensions (as byte strides) and
//! one subscript per dimension for every accessed element.
//!
//! Dimensions are discovered from the access expressions themselves, not from declared
//! types, so flattened and pointer-based arrays are handled alike. Accesses that cannot be
//! decomposed are kept and flagged invalid, which lets consumers fall back to treating the
//! whole object conservatively.
//!
//! # Architecture
//!
//! - `coefficients` - Splitting a recurrence into `coefficient * recurrence`
//! - `array` - [`Array`] and [`Element`]
//! - `info` - [`ArraySet`] while arrays are collected, [`DelinearizeInfo`] once indexed
//! - `engine` - The per-function [`Delinearizer`]
//!
//! # Usage
//!
//! ```rust
//! use memscope::analysis::DelinearizeInfo;
//! use memscope::config::DelinearizeConfig;
//! use memscope::ir::{FunctionBuilder, Type};
//!
//! // for (i = 0; i < m; ++i) for (j = 0; j < n; ++j) a[i * n + j] = 0;
//! let mut b = FunctionBuilder::new("clear");
//! let a = b.argument("a", Type::Ptr);
//! let n = b.argument("n", Type::Int(64));
//! let (zero, one) = (b.constant(0), b.constant(1));
//! b.begin_loop("i");
//! let i = b.induction("i", zero, one)?;
//! b.begin_loop("j");
//! let j = b.induction("j", zero, one)?;
//! let row = b.mul(i, n)?;
//! let idx = b.add(row, j)?;
//! let p = b.element_ptr(a, idx, 4)?;
//! b.store(p, zero, 4)?;
//! b.end_loop()?;
//! b.end_loop()?;
//! let function = b.finish()?;
//!
//! let info = DelinearizeInfo::compute(&function, &DelinearizeConfig::default());
//! let (array, element) = info.find_element(p).unwrap();
//! assert_eq!(array.dimension_count(), 2);
//! assert_eq!(element.subscripts.len(), 2);
//! println!("{}", info.to_text(&function));
//! # Ok::<(), memscope::Error>(())
//! ```

mod array;
mod coefficients;
mod engine;
mod info;

pub use array::{Array, Element};
pub use coefficients::find_coefficients;
pub use engine::Delinearizer;
pub use info::{ArraySet, DelinearizeInfo};
