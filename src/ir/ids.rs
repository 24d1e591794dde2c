//! Strongly-typed handles into a [`Function`](crate::ir::Function).
//!
//! Values and loops are stored in per-function tables and referenced by index. The newtype
//! wrappers prevent accidental mixing of value indices, loop indices and other integers.

use std::fmt;

/// Unique identifier for a value (argument, global, constant or instruction).
///
/// This is a lightweight handle into the value table of a single
/// [`Function`](crate::ir::Function); it is not globally unique across functions.
/// Instructions are values, so the same handle identifies an instruction and its result.
///
/// # Examples
///
/// ```rust
/// use memscope::ir::ValueId;
///
/// let id = ValueId::new(42);
/// assert_eq!(id.index(), 42);
/// assert_eq!(id.to_string(), "v42");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(usize);

impl ValueId {
    /// Creates a new value identifier from a raw table index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the underlying index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Unique identifier for a loop of a function's loop nest.
///
/// Loops are numbered in the order they are opened, so an enclosing loop always has a
/// smaller index than the loops nested inside it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoopId(usize);

impl LoopId {
    /// Creates a new loop identifier from a raw table index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the underlying index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for LoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

impl fmt::Display for LoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}
