use std::fmt;

use crate::error::{Error, Result};
use crate::shape::Shape;

// Layout — how logical indices map onto memory
//
// Strides are counted in ELEMENTS, not bytes, and are signed:
//
//   [2, 3] row-major     strides [3, 1]
//   [2, 3] column-major  strides [1, 2]
//   [2, 3] row-reversed  strides [-3, 1]  (data points at the last row)
//   [4, 3] broadcast row strides [0, 1]
//
// Contiguity is derived from (shape, strides), never stored. Axes of extent 1
// are skipped when checking packing since their stride is never used, so a
// rank-0 array, a [1, n] row or an [n] vector is contiguous in both orders.
// An array with a zero extent has no elements and is contiguous in any order.

/// Packing order a caller may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Order {
    /// Last axis fastest (C order).
    RowMajor,
    /// First axis fastest (Fortran order).
    ColMajor,
    /// Either of the two packed orders.
    AnyContiguous,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Order::RowMajor => "row-major",
            Order::ColMajor => "column-major",
            Order::AnyContiguous => "row- or column-major",
        };
        f.write_str(s)
    }
}

/// Shape plus signed element strides.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Layout {
    shape: Shape,
    strides: Vec<isize>,
}

impl Layout {
    /// Pair a shape with explicit strides. Fails only if their lengths differ.
    pub fn new(shape: impl Into<Shape>, strides: Vec<isize>) -> Result<Self> {
        let shape = shape.into();
        if shape.rank() != strides.len() {
            return Err(Error::StrideRankMismatch {
                shape_rank: shape.rank(),
                strides_rank: strides.len(),
            });
        }
        Ok(Layout { shape, strides })
    }

    pub fn row_major(shape: impl Into<Shape>) -> Self {
        let shape = shape.into();
        let strides = shape.row_major_strides();
        Layout { shape, strides }
    }

    pub fn col_major(shape: impl Into<Shape>) -> Self {
        let shape = shape.into();
        let strides = shape.col_major_strides();
        Layout { shape, strides }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn elem_count(&self) -> usize {
        self.shape.elem_count()
    }

    pub fn is_empty(&self) -> bool {
        self.shape.is_empty()
    }

    /// Whether the strides pack the elements without gaps in `order`.
    pub fn is_contiguous(&self, order: Order) -> bool {
        match order {
            Order::RowMajor => self.is_packed(self.rank_iter().rev()),
            Order::ColMajor => self.is_packed(self.rank_iter()),
            Order::AnyContiguous => {
                self.is_contiguous(Order::RowMajor) || self.is_contiguous(Order::ColMajor)
            }
        }
    }

    fn rank_iter(&self) -> std::ops::Range<usize> {
        0..self.rank()
    }

    /// Walk axes from fastest to slowest and check each stride equals the
    /// number of elements spanned by the faster axes.
    fn is_packed(&self, fastest_first: impl Iterator<Item = usize>) -> bool {
        if self.is_empty() {
            return true;
        }
        let mut expected = 1isize;
        for axis in fastest_first {
            let extent = self.shape.dims()[axis];
            if extent == 1 {
                continue;
            }
            if self.strides[axis] != expected {
                return false;
            }
            expected *= extent as isize;
        }
        true
    }

    /// Element offset of a multi-dimensional index: `Σ index[k] * stride[k]`.
    pub fn flat_offset(&self, index: &[usize]) -> isize {
        index
            .iter()
            .zip(&self.strides)
            .map(|(&i, &s)| i as isize * s)
            .sum()
    }

    /// Smallest and largest element offsets this layout can address, or
    /// `None` for an empty array.
    pub fn offset_bounds(&self) -> Option<(isize, isize)> {
        if self.is_empty() {
            return None;
        }
        let mut min = 0isize;
        let mut max = 0isize;
        for (&extent, &stride) in self.shape.dims().iter().zip(&self.strides) {
            let reach = (extent as isize - 1) * stride;
            if reach < 0 {
                min += reach;
            } else {
                max += reach;
            }
        }
        Some((min, max))
    }

    /// Element offsets of every element, in row-major logical order.
    pub fn strided_offsets(&self) -> StridedIter {
        StridedIter::new(self.dims(), self.strides())
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} strides {:?}", self.shape, self.strides)
    }
}

// StridedIter — element offsets of an arbitrary strided layout
//
// Advances the multi-index like an odometer (last axis first) and keeps the
// running offset incrementally, so negative and zero strides work unchanged.

/// Iterator yielding the element offset of each element of a layout.
#[derive(Debug, Clone)]
pub struct StridedIter {
    current: Vec<usize>,
    dims: Vec<usize>,
    strides: Vec<isize>,
    offset: isize,
    remaining: usize,
}

impl StridedIter {
    pub(crate) fn new(dims: &[usize], strides: &[isize]) -> Self {
        StridedIter {
            current: vec![0; dims.len()],
            dims: dims.to_vec(),
            strides: strides.to_vec(),
            offset: 0,
            remaining: dims.iter().product(),
        }
    }

    fn advance(&mut self) {
        for axis in (0..self.dims.len()).rev() {
            self.current[axis] += 1;
            self.offset += self.strides[axis];
            if self.current[axis] < self.dims[axis] {
                return;
            }
            self.offset -= self.strides[axis] * self.dims[axis] as isize;
            self.current[axis] = 0;
        }
    }
}

impl Iterator for StridedIter {
    type Item = isize;

    fn next(&mut self) -> Option<isize> {
        if self.remaining == 0 {
            return None;
        }
        let offset = self.offset;
        self.remaining -= 1;
        if self.remaining > 0 {
            self.advance();
        }
        Some(offset)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for StridedIter {}
