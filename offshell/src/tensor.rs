//! Dense multi-index tensors over complex numbers.
//!
//! All wave functions, subamplitudes and propagator working buffers live in
//! [`Tensor`]. The data sits in a single linear buffer; the index ranges and
//! the precomputed block sizes (the number of entries spanned by one step of
//! an index) emulate the tensorial shape. Traversal along a single axis is a
//! constant-stride walk, which is what the recursive Feynman-rule kernels
//! rely on.

use crate::error::{Error, Result};
use num_complex::Complex;
use std::ops::{Index, IndexMut, Mul, MulAssign};

/// Complex number type used throughout the crate.
pub type Amplitude = Complex<f64>;

/// Dense tensor with runtime rank and shape.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    data: Vec<Amplitude>,
    ranges: Vec<usize>,
    blocks: Vec<usize>,
}

impl Default for Tensor {
    fn default() -> Self {
        Self::scalar()
    }
}

impl Tensor {
    /// Constructs a rank-zero tensor holding a single zero entry.
    #[must_use]
    pub fn scalar() -> Self {
        Self {
            data: vec![Amplitude::new(0.0, 0.0)],
            ranges: Vec::new(),
            blocks: Vec::new(),
        }
    }

    /// Constructs a zero-initialised tensor with the given index ranges.
    /// Zero-range entries are dropped.
    #[must_use]
    pub fn new(ranges: &[usize]) -> Self {
        let mut tensor = Self::scalar();
        tensor.resize(ranges);
        tensor
    }

    /// Returns the tensor rank.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.ranges.len()
    }

    /// Returns the range of index `axis`, or zero beyond the rank.
    #[must_use]
    pub fn index_range(&self, axis: usize) -> usize {
        self.ranges.get(axis).copied().unwrap_or(0)
    }

    /// Returns the vector of index ranges.
    #[must_use]
    pub fn ranges(&self) -> &[usize] {
        &self.ranges
    }

    /// Returns the block size of index `axis`, i.e. the number of entries in
    /// the subtensor spanned by all later indices.
    #[must_use]
    pub fn block_size(&self, axis: usize) -> usize {
        self.blocks.get(axis).copied().unwrap_or(0)
    }

    /// Returns the total number of components.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Returns the linear data slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Amplitude] {
        &self.data
    }

    /// Returns the linear data slice mutably.
    pub fn as_mut_slice(&mut self) -> &mut [Amplitude] {
        &mut self.data
    }

    /// Resets all entries to zero, keeping the shape.
    pub fn reset(&mut self) {
        for x in &mut self.data {
            *x = Amplitude::new(0.0, 0.0);
        }
    }

    /// Resizes to the given index ranges, dropping zero-range entries. The
    /// linear data is preserved when the total size is unchanged and cleared
    /// otherwise.
    pub fn resize(&mut self, ranges: &[usize]) {
        self.ranges = ranges.iter().copied().filter(|r| *r != 0).collect();
        self.blocks = vec![1; self.ranges.len()];
        for i in (0..self.ranges.len().saturating_sub(1)).rev() {
            self.blocks[i] = self.blocks[i + 1] * self.ranges[i + 1];
        }
        let size = self.ranges.iter().product::<usize>().max(1);
        if size == self.data.len() {
            return;
        }
        self.data.clear();
        self.data.resize(size, Amplitude::new(0.0, 0.0));
    }

    /// Checked linear element access.
    ///
    /// # Errors
    ///
    /// Returns a shape-conflict error if `offset` lies outside the data.
    pub fn at(&self, offset: usize) -> Result<&Amplitude> {
        self.data
            .get(offset)
            .ok_or_else(|| Error::ShapeConflict(vec![offset], vec![self.data.len()]))
    }

    /// Checked mutable linear element access.
    ///
    /// # Errors
    ///
    /// Returns a shape-conflict error if `offset` lies outside the data.
    pub fn at_mut(&mut self, offset: usize) -> Result<&mut Amplitude> {
        let len = self.data.len();
        self.data
            .get_mut(offset)
            .ok_or_else(|| Error::ShapeConflict(vec![offset], vec![len]))
    }

    /// Converts a multi-index into a linear offset.
    ///
    /// # Panics
    ///
    /// Panics if the index rank or any component is out of range.
    #[must_use]
    pub fn offset(&self, index: &[usize]) -> usize {
        assert_eq!(index.len(), self.ranges.len());
        index
            .iter()
            .zip(&self.ranges)
            .zip(&self.blocks)
            .map(|((i, r), b)| {
                assert!(i < r, "tensor index {i} out of range {r}");
                i * b
            })
            .sum()
    }

    /// Element-wise in-place addition.
    ///
    /// # Errors
    ///
    /// Returns a shape-conflict error if the shapes differ.
    pub fn add_assign(&mut self, other: &Self) -> Result<()> {
        if self.ranges != other.ranges {
            return Err(Error::ShapeConflict(
                self.ranges.clone(),
                other.ranges.clone(),
            ));
        }
        for (x, y) in self.data.iter_mut().zip(&other.data) {
            *x += y;
        }
        Ok(())
    }

    /// Element-wise in-place subtraction.
    ///
    /// # Errors
    ///
    /// Returns a shape-conflict error if the shapes differ.
    pub fn sub_assign(&mut self, other: &Self) -> Result<()> {
        if self.ranges != other.ranges {
            return Err(Error::ShapeConflict(
                self.ranges.clone(),
                other.ranges.clone(),
            ));
        }
        for (x, y) in self.data.iter_mut().zip(&other.data) {
            *x -= y;
        }
        Ok(())
    }

    /// Element-wise sum.
    ///
    /// # Errors
    ///
    /// Returns a shape-conflict error if the shapes differ.
    pub fn add(&self, other: &Self) -> Result<Self> {
        let mut result = self.clone();
        result.add_assign(other)?;
        Ok(result)
    }

    /// Element-wise difference.
    ///
    /// # Errors
    ///
    /// Returns a shape-conflict error if the shapes differ.
    pub fn sub(&self, other: &Self) -> Result<Self> {
        let mut result = self.clone();
        result.sub_assign(other)?;
        Ok(result)
    }

    /// Creates a cursor at the start of the data.
    #[must_use]
    pub const fn cursor(&self) -> Cursor {
        Cursor { offset: 0 }
    }
}

impl Index<usize> for Tensor {
    type Output = Amplitude;

    fn index(&self, offset: usize) -> &Self::Output {
        &self.data[offset]
    }
}

impl IndexMut<usize> for Tensor {
    fn index_mut(&mut self, offset: usize) -> &mut Self::Output {
        &mut self.data[offset]
    }
}

impl Index<&[usize]> for Tensor {
    type Output = Amplitude;

    fn index(&self, index: &[usize]) -> &Self::Output {
        &self.data[self.offset(index)]
    }
}

impl MulAssign<Amplitude> for Tensor {
    fn mul_assign(&mut self, rhs: Amplitude) {
        for x in &mut self.data {
            *x *= rhs;
        }
    }
}

impl MulAssign<f64> for Tensor {
    fn mul_assign(&mut self, rhs: f64) {
        for x in &mut self.data {
            *x *= rhs;
        }
    }
}

impl Mul<Amplitude> for &Tensor {
    type Output = Tensor;

    fn mul(self, rhs: Amplitude) -> Tensor {
        let mut result = self.clone();
        result *= rhs;
        result
    }
}

/// Block-strided position inside a [`Tensor`].
///
/// A cursor is a plain linear offset; all movement takes the tensor it refers
/// to as an argument, so cursors never outlive or alias the data they walk.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Cursor {
    offset: usize,
}

impl Cursor {
    /// Creates a cursor at the given linear offset.
    #[must_use]
    pub const fn at(offset: usize) -> Self {
        Self { offset }
    }

    /// Returns the linear offset.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Moves one step forward along `axis`.
    pub fn forward(&mut self, tensor: &Tensor, axis: usize) {
        self.offset += tensor.block_size(axis);
    }

    /// Moves `steps` steps backward along `axis`.
    pub fn backward(&mut self, tensor: &Tensor, axis: usize, steps: usize) {
        self.offset -= steps * tensor.block_size(axis);
    }

    /// Recovers the index along `axis` from the current offset.
    #[must_use]
    pub fn index(&self, tensor: &Tensor, axis: usize) -> usize {
        (self.offset / tensor.block_size(axis)) % tensor.index_range(axis)
    }

    /// Signed linear distance to `other`.
    #[must_use]
    pub fn distance(&self, other: &Self) -> isize {
        self.offset as isize - other.offset as isize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_and_blocks() {
        let t = Tensor::new(&[4, 0, 3, 2]);
        assert_eq!(t.rank(), 3);
        assert_eq!(t.size(), 24);
        assert_eq!(t.block_size(0), 6);
        assert_eq!(t.block_size(1), 2);
        assert_eq!(t.block_size(2), 1);
        assert_eq!(t.index_range(0), 4);
        assert_eq!(t.index_range(5), 0);
    }

    #[test]
    fn scalar_tensor() {
        let t = Tensor::scalar();
        assert_eq!(t.rank(), 0);
        assert_eq!(t.size(), 1);
        assert_eq!(t[0], Amplitude::new(0.0, 0.0));
    }

    #[test]
    fn multi_index_access() {
        let mut t = Tensor::new(&[3, 2]);
        let idx = t.offset(&[2, 1]);
        t[idx] = Amplitude::new(1.0, -1.0);
        assert_eq!(t[5], Amplitude::new(1.0, -1.0));
        assert_eq!(t[[2, 1].as_slice()], Amplitude::new(1.0, -1.0));
    }

    #[test]
    fn checked_access() {
        let t = Tensor::new(&[2, 2]);
        assert!(t.at(3).is_ok());
        assert!(matches!(t.at(4), Err(Error::ShapeConflict(..))));
    }

    #[test]
    fn arithmetic_and_shape_conflicts() {
        let mut a = Tensor::new(&[2, 2]);
        let mut b = Tensor::new(&[2, 2]);
        a[0] = Amplitude::new(1.0, 0.0);
        b[0] = Amplitude::new(0.0, 2.0);
        a.add_assign(&b).unwrap();
        assert_eq!(a[0], Amplitude::new(1.0, 2.0));
        a.sub_assign(&b).unwrap();
        assert_eq!(a[0], Amplitude::new(1.0, 0.0));

        let c = Tensor::new(&[3]);
        assert!(matches!(a.add_assign(&c), Err(Error::ShapeConflict(..))));

        a *= 2.0;
        assert_eq!(a[0], Amplitude::new(2.0, 0.0));
        a *= Amplitude::new(0.0, 1.0);
        assert_eq!(a[0], Amplitude::new(0.0, 2.0));
    }

    #[test]
    fn resize_preserves_when_possible() {
        let mut t = Tensor::new(&[4]);
        t[3] = Amplitude::new(5.0, 0.0);
        t.resize(&[2, 2]);
        assert_eq!(t[3], Amplitude::new(5.0, 0.0));
        t.resize(&[3]);
        assert_eq!(t[0], Amplitude::new(0.0, 0.0));
        assert_eq!(t.size(), 3);
    }

    #[test]
    fn cursor_walk() {
        let t = Tensor::new(&[4, 3]);
        let mut c = t.cursor();
        c.forward(&t, 0);
        c.forward(&t, 1);
        c.forward(&t, 1);
        assert_eq!(c.offset(), 5);
        assert_eq!(c.index(&t, 0), 1);
        assert_eq!(c.index(&t, 1), 2);
        c.backward(&t, 1, 2);
        assert_eq!(c.offset(), 3);
        assert_eq!(c.distance(&t.cursor()), 3);
    }
}
