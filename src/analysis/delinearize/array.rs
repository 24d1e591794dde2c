//! Arrays recovered from address arithmetic and their accessed elements.

use crate::{analysis::scev::Scev, ir::ValueId};

/// One accessed element of an [`Array`].
///
/// `subscripts` holds one expression per dimension of the owning array, outermost first.
/// An invalid element keeps whatever subscripts were recovered before decomposition failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Address of the element (the pointer operand of the accessing instructions).
    pub ptr: ValueId,
    /// Subscript expressions, outermost dimension first.
    pub subscripts: Vec<Scev>,
    /// All subscripts were recovered and are consistent with the array's dimensions.
    pub is_valid: bool,
}

impl Element {
    /// Creates an element.
    #[must_use]
    pub fn new(ptr: ValueId, subscripts: Vec<Scev>, is_valid: bool) -> Self {
        Self {
            ptr,
            subscripts,
            is_valid,
        }
    }
}

/// An array rooted at a base pointer.
///
/// Dimensions are byte strides, outermost first: the innermost dimension is the element size
/// and every outer dimension is a multiple of the next inner one. An array starts valid and
/// without dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Array {
    base: ValueId,
    dimensions: Vec<Scev>,
    elements: Vec<Element>,
    is_valid: bool,
}

impl Array {
    /// Creates an empty, valid array rooted at `base`.
    #[must_use]
    pub fn new(base: ValueId) -> Self {
        Self {
            base,
            dimensions: Vec::new(),
            elements: Vec::new(),
            is_valid: true,
        }
    }

    /// The base pointer.
    #[must_use]
    pub fn base(&self) -> ValueId {
        self.base
    }

    /// The accessed elements, in order of first access.
    #[must_use]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Returns the element at `idx`.
    #[must_use]
    pub fn element(&self, idx: usize) -> Option<&Element> {
        self.elements.get(idx)
    }

    /// Returns the element at `idx` for modification.
    pub fn element_mut(&mut self, idx: usize) -> Option<&mut Element> {
        self.elements.get_mut(idx)
    }

    /// Position of the element addressed by `ptr`.
    #[must_use]
    pub fn position(&self, ptr: ValueId) -> Option<usize> {
        self.elements.iter().position(|e| e.ptr == ptr)
    }

    /// Appends an element and returns its index.
    pub fn push(&mut self, element: Element) -> usize {
        self.elements.push(element);
        self.elements.len() - 1
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if no element has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The dimensions, outermost first.
    #[must_use]
    pub fn dimensions(&self) -> &[Scev] {
        &self.dimensions
    }

    /// Returns the dimension at `idx`.
    #[must_use]
    pub fn dimension(&self, idx: usize) -> Option<&Scev> {
        self.dimensions.get(idx)
    }

    /// Number of dimensions.
    #[must_use]
    pub fn dimension_count(&self) -> usize {
        self.dimensions.len()
    }

    /// Replaces the dimension at `idx`, growing the list with
    /// [`Scev::CouldNotCompute`] placeholders when `idx` is past the end.
    pub fn set_dimension(&mut self, idx: usize, expr: Scev) {
        if idx >= self.dimensions.len() {
            self.dimensions.resize(idx + 1, Scev::CouldNotCompute);
        }
        self.dimensions[idx] = expr;
    }

    /// Replaces all dimensions.
    pub fn set_dimensions(&mut self, dimensions: Vec<Scev>) {
        self.dimensions = dimensions;
    }

    /// Appends an innermost dimension.
    pub fn push_dimension(&mut self, expr: Scev) {
        self.dimensions.push(expr);
    }

    /// Removes all dimensions.
    pub fn clear_dimensions(&mut self) {
        self.dimensions.clear();
    }

    /// Returns `true` if the dimensions are consistent and at least one element is valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Sets the validity flag.
    pub fn set_valid(&mut self, is_valid: bool) {
        self.is_valid = is_valid;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elements() {
        let mut array = Array::new(ValueId::new(0));
        assert!(array.is_empty());
        assert!(array.is_valid());

        let first = array.push(Element::new(ValueId::new(3), vec![Scev::zero()], true));
        let second = array.push(Element::new(ValueId::new(5), Vec::new(), false));
        assert_eq!((first, second), (0, 1));
        assert_eq!(array.len(), 2);
        assert_eq!(array.position(ValueId::new(5)), Some(1));
        assert_eq!(array.position(ValueId::new(9)), None);
        assert!(!array.element(1).unwrap().is_valid);

        array.element_mut(1).unwrap().is_valid = true;
        assert!(array.elements().iter().all(|e| e.is_valid));
    }

    #[test]
    fn test_dimensions() {
        let mut array = Array::new(ValueId::new(0));
        array.push_dimension(Scev::constant(40));
        array.push_dimension(Scev::constant(4));
        assert_eq!(array.dimension_count(), 2);
        assert_eq!(array.dimension(1), Some(&Scev::constant(4)));

        array.set_dimension(3, Scev::constant(1));
        assert_eq!(
            array.dimensions(),
            &[
                Scev::constant(40),
                Scev::constant(4),
                Scev::CouldNotCompute,
                Scev::constant(1)
            ]
        );

        array.clear_dimensions();
        assert!(array.dimensions().is_empty());
        array.set_dimensions(vec![Scev::constant(8)]);
        assert_eq!(array.dimension(0), Some(&Scev::constant(8)));
    }
}
