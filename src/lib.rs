// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # memscope
//!
//! Memory analyses for automatic parallelization of loop nests.
//!
//! `memscope` answers two questions a parallelizing compiler asks about every function before
//! it can test loops for dependences:
//!
//! - **Which memory can an access touch?** The *alias tree* (memory hierarchy) groups every
//!   accessed location into a containment tree rooted at the whole memory. Locations in
//!   disjoint subtrees never overlap; instructions with an unknown footprint, such as calls
//!   through function pointers, are kept in unknown nodes whose relations are only assumed.
//! - **What are the subscripts of an access?** *Delinearization* recovers the dimensions of
//!   dynamically sized and flattened arrays and one subscript per dimension from the linear
//!   byte offsets compilers emit.
//!
//! ## Features
//!
//! - **Closed-form expressions** - canonical add recurrences over nested loops
//! - **Alias oracle** - underlying objects, `noalias` arguments, capture and TBAA reasoning
//! - **Alias tree** - must-alias clusters, provable containment, ambiguous clusters, unknown
//!   memory, DOT and text rendering
//! - **Delinearization** - symbolic dimensions, partial results flagged invalid instead of
//!   dropped
//! - **Module driver** - per-function results cached and computed in parallel
//!
//! ## Quick Start
//!
//! ```rust
//! use memscope::prelude::*;
//!
//! // void f(int *a, int n) { for (i..) for (j..) a[i * n + j] += 1; }
//! let mut b = FunctionBuilder::new("f");
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
//! let v = b.load(p, 4)?;
//! let w = b.add(v, one)?;
//! b.store(p, w, 4)?;
//! b.end_loop()?;
//! b.end_loop()?;
//! let function = b.finish()?;
//!
//! let analysis = FunctionAnalysis::run(&function, &AnalysisConfig::default());
//!
//! let info = analysis.delinearize().unwrap();
//! let (array, element) = info.find_element(p).unwrap();
//! assert_eq!(array.dimension_count(), 2);
//! assert!(element.is_valid);
//!
//! let tree = analysis.alias_tree().unwrap();
//! println!("{}", AliasTreePrinter::new(tree, &function).to_dot());
//! # Ok::<(), memscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`ir`] - The host IR the analyses read, and a validating builder
//! - [`analysis`] - Expression toolkit, alias tree, delinearization and the module driver
//! - [`config`] - Analysis options
//! - [`prelude`] - Convenient re-exports of commonly used types
//! - [`Error`] and [`Result`] - Error handling for IR construction
//!
//! ## Error Handling
//!
//! Only IR construction can fail. The analyses always produce a result; conditions such as
//! an unresolvable base pointer or ambiguous aliasing are recorded on the result itself.
//!
//! ```rust
//! use memscope::{ir::FunctionBuilder, Error};
//!
//! let mut b = FunctionBuilder::new("f");
//! match b.end_loop() {
//!     Err(Error::Malformed { message, .. }) => println!("Malformed: {}", message),
//!     Err(e) => println!("Other error: {}", e),
//!     Ok(_) => unreachable!(),
//! }
//! ```

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust
/// use memscope::prelude::*;
///
/// let config = AnalysisConfig::sequential();
/// let manager = AnalysisManager::new(config);
/// assert!(manager.is_empty());
/// ```
pub mod prelude;

pub mod analysis;
pub mod config;
pub mod ir;

pub(crate) mod utils;

/// `memscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust
/// use memscope::{ir::{Function, FunctionBuilder, Type}, Result};
///
/// fn copy_one() -> Result<Function> {
///     let mut b = FunctionBuilder::new("copy_one");
///     let src = b.noalias_argument("src");
///     let dst = b.noalias_argument("dst");
///     let v = b.load(src, 4)?;
///     b.store(dst, v, 4)?;
///     b.finish()
/// }
/// # copy_one()?;
/// # Ok::<(), memscope::Error>(())
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `memscope` Error type
///
/// Returned by [`ir::FunctionBuilder`] when the IR handed to it is invalid.
pub use error::Error;
