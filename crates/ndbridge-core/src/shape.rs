use std::fmt;

// Shape — per-axis extents of an array
//
//   Scalar: Shape([])       — 0 axes, 1 element
//   Vector: Shape([5])      — 1 axis, 5 elements
//   Image:  Shape([2, 3, 3])
//   Empty:  Shape([0, 5])   — valid, 0 elements
//
// Any zero extent makes the whole array empty. Code walking the elements of
// an empty array must simply not iterate; it is never an error.

/// Extents of an array, one per axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape(Vec<usize>);

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Shape(dims)
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of axes.
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Product of the extents. A scalar has one element, any zero extent gives zero.
    pub fn elem_count(&self) -> usize {
        self.0.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.0.contains(&0)
    }

    /// Extent of axis `d`, if it exists.
    pub fn dim(&self, d: usize) -> Option<usize> {
        self.0.get(d).copied()
    }

    /// Element strides of a packed row-major (last axis fastest) array.
    ///
    /// For shape [2, 3, 4] the strides are [12, 4, 1].
    pub fn row_major_strides(&self) -> Vec<isize> {
        let mut strides = vec![0isize; self.rank()];
        let mut acc = 1isize;
        for (stride, &extent) in strides.iter_mut().zip(&self.0).rev() {
            *stride = acc;
            acc *= extent.max(1) as isize;
        }
        strides
    }

    /// Element strides of a packed column-major (first axis fastest) array.
    ///
    /// For shape [2, 3, 4] the strides are [1, 2, 6].
    pub fn col_major_strides(&self) -> Vec<isize> {
        let mut strides = vec![0isize; self.rank()];
        let mut acc = 1isize;
        for (stride, &extent) in strides.iter_mut().zip(&self.0) {
            *stride = acc;
            acc *= extent.max(1) as isize;
        }
        strides
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

// Shape::from((3, 4)) instead of Shape::new(vec![3, 4])

impl From<()> for Shape {
    fn from(_: ()) -> Self {
        Shape(vec![])
    }
}

impl From<usize> for Shape {
    fn from(d: usize) -> Self {
        Shape(vec![d])
    }
}

impl From<(usize,)> for Shape {
    fn from((d0,): (usize,)) -> Self {
        Shape(vec![d0])
    }
}

impl From<(usize, usize)> for Shape {
    fn from((d0, d1): (usize, usize)) -> Self {
        Shape(vec![d0, d1])
    }
}

impl From<(usize, usize, usize)> for Shape {
    fn from((d0, d1, d2): (usize, usize, usize)) -> Self {
        Shape(vec![d0, d1, d2])
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape(dims.to_vec())
    }
}

impl From<Vec<usize>> for Shape {
    fn from(v: Vec<usize>) -> Self {
        Shape(v)
    }
}

impl From<&[usize]> for Shape {
    fn from(s: &[usize]) -> Self {
        Shape(s.to_vec())
    }
}
