//! Per-function delinearization results.
//!
//! Results move through two phases. While arrays are discovered they live in an
//! [`ArraySet`], which can be changed freely. [`DelinearizeInfo::new`] freezes the set and
//! builds the reverse index from pointers to arrays and elements; every query goes through
//! that index, so a stale lookup cannot happen. [`DelinearizeInfo::into_arrays`] drops the
//! index and hands the set back for further changes.

use std::{collections::HashMap, fmt::Write};

use crate::{
    analysis::delinearize::{Array, Element},
    ir::{Function, ValueId},
};

/// Arrays of a function keyed by base pointer, in order of discovery.
#[derive(Debug, Clone, Default)]
pub struct ArraySet {
    arrays: Vec<Array>,
    bases: HashMap<ValueId, usize>,
    accesses: HashMap<ValueId, ValueId>,
}

impl ArraySet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the array rooted at `base`, creating an empty one if needed.
    pub fn get_or_insert(&mut self, base: ValueId) -> &mut Array {
        let arrays = &mut self.arrays;
        let idx = *self.bases.entry(base).or_insert_with(|| {
            arrays.push(Array::new(base));
            arrays.len() - 1
        });
        &mut self.arrays[idx]
    }

    /// Inserts `array`, replacing any array with the same base.
    pub fn insert(&mut self, array: Array) {
        match self.bases.get(&array.base()) {
            Some(&idx) => self.arrays[idx] = array,
            None => {
                self.bases.insert(array.base(), self.arrays.len());
                self.arrays.push(array);
            }
        }
    }

    /// Returns the array rooted at `base`.
    #[must_use]
    pub fn get(&self, base: ValueId) -> Option<&Array> {
        self.bases.get(&base).map(|&idx| &self.arrays[idx])
    }

    /// Returns the array rooted at `base` for modification.
    pub fn get_mut(&mut self, base: ValueId) -> Option<&mut Array> {
        self.bases.get(&base).map(|&idx| &mut self.arrays[idx])
    }

    /// Returns `true` if an array is rooted at `base`.
    #[must_use]
    pub fn contains(&self, base: ValueId) -> bool {
        self.bases.contains_key(&base)
    }

    /// Records that instruction `inst` accesses memory through pointer `ptr`.
    pub fn record_access(&mut self, inst: ValueId, ptr: ValueId) {
        self.accesses.insert(inst, ptr);
    }

    /// Iterates over the arrays in order of discovery.
    pub fn iter(&self) -> impl Iterator<Item = &Array> {
        self.arrays.iter()
    }

    /// Iterates over the arrays for modification.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Array> {
        self.arrays.iter_mut()
    }

    /// Number of arrays.
    #[must_use]
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    /// Returns `true` if the set holds no array.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// Removes all arrays and recorded accesses.
    pub fn clear(&mut self) {
        self.arrays.clear();
        self.bases.clear();
        self.accesses.clear();
    }
}

/// Where a pointer sits in the recovered arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    array: usize,
    element: Option<usize>,
}

/// Frozen delinearization result of one function, with its reverse index built.
#[derive(Debug, Clone, Default)]
pub struct DelinearizeInfo {
    set: ArraySet,
    index: HashMap<ValueId, Slot>,
}

impl DelinearizeInfo {
    /// Freezes `set` and builds the reverse index.
    ///
    /// Every base maps to its array and every element pointer to its array and element. A
    /// pointer that is both a base and an element (an access at offset zero through the base
    /// itself) resolves to the element.
    #[must_use]
    pub fn new(set: ArraySet) -> Self {
        let mut index = HashMap::new();
        for (array_idx, array) in set.arrays.iter().enumerate() {
            index.entry(array.base()).or_insert(Slot {
                array: array_idx,
                element: None,
            });
        }
        for (array_idx, array) in set.arrays.iter().enumerate() {
            for (element_idx, element) in array.elements().iter().enumerate() {
                index.insert(
                    element.ptr,
                    Slot {
                        array: array_idx,
                        element: Some(element_idx),
                    },
                );
            }
        }
        Self { set, index }
    }

    /// Drops the index and returns the arrays for modification.
    #[must_use]
    pub fn into_arrays(self) -> ArraySet {
        self.set
    }

    /// Returns the array rooted at `base`.
    #[must_use]
    pub fn find_array(&self, base: ValueId) -> Option<&Array> {
        self.set.get(base)
    }

    /// Returns the array and element addressed by the element pointer `ptr`.
    #[must_use]
    pub fn find_element(&self, ptr: ValueId) -> Option<(&Array, &Element)> {
        let slot = self.index.get(&ptr)?;
        let array = &self.set.arrays[slot.array];
        Some((array, array.element(slot.element?)?))
    }

    /// Returns the array `ptr` belongs to, as its base or as one of its element pointers.
    #[must_use]
    pub fn find_array_for(&self, ptr: ValueId) -> Option<&Array> {
        self.index.get(&ptr).map(|slot| &self.set.arrays[slot.array])
    }

    /// Returns the array and element accessed by the load or store `inst`.
    #[must_use]
    pub fn find_access(&self, inst: ValueId) -> Option<(&Array, &Element)> {
        self.find_element(*self.set.accesses.get(&inst)?)
    }

    /// Iterates over all arrays in order of discovery.
    pub fn arrays(&self) -> impl Iterator<Item = &Array> {
        self.set.iter()
    }

    /// Number of arrays.
    #[must_use]
    pub fn array_count(&self) -> usize {
        self.set.len()
    }

    /// Returns `true` if no array was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Generates a textual listing of every array with its dimensions and elements.
    ///
    /// ```text
    /// Delinearization of 'f'
    /// %a, valid
    ///   dimensions: [(4 * %n), 4]
    ///   %p = elementptr ..., valid: [{0,+,1}<L0>][{0,+,1}<L1>]
    /// ```
    #[must_use]
    pub fn to_text(&self, function: &Function) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Delinearization of '{}'", function.name());
        for array in self.arrays() {
            let validity = if array.is_valid() { "valid" } else { "invalid" };
            let _ = writeln!(out, "{}, {}", function.operand_name(array.base()), validity);
            let dimensions = array
                .dimensions()
                .iter()
                .map(|d| d.display(function).to_string())
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "  dimensions: [{dimensions}]");
            for element in array.elements() {
                let validity = if element.is_valid { "valid" } else { "invalid" };
                let _ = write!(out, "  {}, {}:", function.display_value(element.ptr), validity);
                if element.subscripts.is_empty() {
                    out.push_str(" -");
                }
                out.push(' ');
                for subscript in &element.subscripts {
                    let _ = write!(out, "[{}]", subscript.display(function));
                }
                out.push('\n');
            }
        }
        out
    }
}
