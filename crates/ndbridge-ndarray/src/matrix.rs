use std::fmt;
use std::marker::PhantomData;

use ndarray::{Array2, ArrayView2, ArrayViewMut2, Ix2, Shape, ShapeBuilder, Zip};
use ndbridge_core::{
    validate, validate_mut, ArrayDescriptor, Constraint, Element, LayoutError, Order, OwnerToken,
    View, ViewMut,
};

use crate::export::export_array;

// Fixed-layout matrix aliases
//
// A `Matrix<T, O>` is a zero-copy window onto a foreign 2-D array that is
// known to be packed in order `O`. It behaves like a by-reference matrix
// parameter that only binds to one storage order:
//
//   as_row_major::<f32>(&desc)?   accepts C-ordered (3, 4), rejects F-ordered
//   as_col_major::<f32>(&desc)?   the other way around
//
// A mismatching array is never transposed or copied behind the caller's
// back: it comes back as `LayoutError::LayoutMismatch`.
//
// Read-only aliases hold an owner claim, so they stay valid after the
// descriptor they came from is dropped. Writable aliases (`MatrixMut`, from
// `as_row_major_mut`/`as_col_major_mut`) borrow the descriptor exclusively
// instead. Anything computed from aliases (see `sum`) lands in a fresh
// buffer with its own owner, never in the foreign memory.

mod sealed {
    pub trait Sealed {}
}

/// Storage order of a [`Matrix`].
pub trait MatrixOrder: sealed::Sealed + fmt::Debug + 'static {
    const ORDER: Order;
    const IS_COL_MAJOR: bool;
}

/// Last axis varies fastest.
#[derive(Debug)]
pub enum RowMajor {}

/// First axis varies fastest.
#[derive(Debug)]
pub enum ColMajor {}

impl sealed::Sealed for RowMajor {}
impl sealed::Sealed for ColMajor {}

impl MatrixOrder for RowMajor {
    const ORDER: Order = Order::RowMajor;
    const IS_COL_MAJOR: bool = false;
}

impl MatrixOrder for ColMajor {
    const ORDER: Order = Order::ColMajor;
    const IS_COL_MAJOR: bool = true;
}

/// Zero-copy read-only alias of a packed 2-D array in storage order `O`.
#[derive(Debug)]
pub struct Matrix<T: Element, O: MatrixOrder> {
    inner: View<T, 2>,
    _order: PhantomData<O>,
}

pub type RowMatrix<T> = Matrix<T, RowMajor>;
pub type ColMatrix<T> = Matrix<T, ColMajor>;

/// Alias `desc` as a row-major `T` matrix.
pub fn as_row_major<T: Element>(desc: &ArrayDescriptor) -> Result<RowMatrix<T>, LayoutError> {
    Matrix::alias(desc)
}

/// Alias `desc` as a column-major `T` matrix.
pub fn as_col_major<T: Element>(desc: &ArrayDescriptor) -> Result<ColMatrix<T>, LayoutError> {
    Matrix::alias(desc)
}

fn packed<O: MatrixOrder>(rows: usize, cols: usize) -> Shape<Ix2> {
    (rows, cols).set_f(O::IS_COL_MAJOR)
}

impl<T: Element, O: MatrixOrder> Matrix<T, O> {
    /// Validate `desc` as a 2-D `T` array packed in order `O` and alias it.
    pub fn alias(desc: &ArrayDescriptor) -> Result<Self, LayoutError> {
        let constraint = Constraint::of::<T, 2>().order(O::ORDER);
        let inner = validate(desc, &constraint)?.view::<T, 2>()?;
        tracing::trace!(
            order = %O::ORDER,
            rows = inner.dim(0),
            cols = inner.dim(1),
            "matrix alias"
        );
        Ok(Matrix {
            inner,
            _order: PhantomData,
        })
    }

    pub fn rows(&self) -> usize {
        self.inner.dim(0)
    }

    pub fn cols(&self) -> usize {
        self.inner.dim(1)
    }

    pub fn owner(&self) -> Option<&OwnerToken> {
        self.inner.owner()
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        let shape = packed::<O>(self.rows(), self.cols());
        // SAFETY: the descriptor was validated as packed in order `O`, so the
        // elements of `shape` are exactly the ones the view addresses, and the
        // owner claim in `inner` keeps them alive for the borrow.
        unsafe { ArrayView2::from_shape_ptr(shape, self.inner.as_ptr()) }
    }
}

/// Writable alias of a packed 2-D array, borrowing its descriptor
/// exclusively for `'a`.
#[derive(Debug)]
pub struct MatrixMut<'a, T: Element, O: MatrixOrder> {
    inner: ViewMut<'a, T, 2>,
    _order: PhantomData<O>,
}

pub type RowMatrixMut<'a, T> = MatrixMut<'a, T, RowMajor>;
pub type ColMatrixMut<'a, T> = MatrixMut<'a, T, ColMajor>;

/// Alias `desc` as a writable row-major `T` matrix.
pub fn as_row_major_mut<T: Element>(
    desc: &mut ArrayDescriptor,
) -> Result<RowMatrixMut<'_, T>, LayoutError> {
    MatrixMut::alias(desc)
}

/// Alias `desc` as a writable column-major `T` matrix.
pub fn as_col_major_mut<T: Element>(
    desc: &mut ArrayDescriptor,
) -> Result<ColMatrixMut<'_, T>, LayoutError> {
    MatrixMut::alias(desc)
}

impl<'a, T: Element, O: MatrixOrder> MatrixMut<'a, T, O> {
    /// Same checks as [`Matrix::alias`]; also fails with `Shared` while
    /// read-only aliases or clones of `desc` are alive.
    pub fn alias(desc: &'a mut ArrayDescriptor) -> Result<Self, LayoutError> {
        let constraint = Constraint::of::<T, 2>().order(O::ORDER);
        let inner = validate_mut(desc, &constraint)?.view_mut::<T, 2>()?;
        tracing::trace!(order = %O::ORDER, rows = inner.dim(0), "writable matrix alias");
        Ok(MatrixMut {
            inner,
            _order: PhantomData,
        })
    }

    pub fn rows(&self) -> usize {
        self.inner.dim(0)
    }

    pub fn cols(&self) -> usize {
        self.inner.dim(1)
    }

    pub fn owner(&self) -> Option<&OwnerToken> {
        self.inner.owner()
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        let shape = packed::<O>(self.rows(), self.cols());
        // SAFETY: as in `Matrix::view`; the exclusive borrow of the
        // descriptor keeps the elements alive.
        unsafe { ArrayView2::from_shape_ptr(shape, self.inner.as_ptr()) }
    }

    /// Writes land in the foreign buffer.
    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, T> {
        let shape = packed::<O>(self.rows(), self.cols());
        // SAFETY: packed strides never alias, no other view of the descriptor
        // exists, and `&mut self` makes this the only alias handed out.
        unsafe { ArrayViewMut2::from_shape_ptr(shape, self.inner.as_mut_ptr()) }
    }
}

/// Elementwise `a + b` into a newly allocated matrix in order `O`, exported
/// with its own owner.
pub fn sum<T: Element, O: MatrixOrder>(
    a: &Matrix<T, O>,
    b: &Matrix<T, O>,
) -> ndbridge_core::Result<ArrayDescriptor> {
    let (ad, bd) = ([a.rows(), a.cols()], [b.rows(), b.cols()]);
    if let Some(axis) = (0..2).find(|&axis| ad[axis] != bd[axis]) {
        return Err(LayoutError::ShapeMismatch {
            axis,
            expected: ad[axis],
            actual: bd[axis],
        }
        .into());
    }
    let mut out = Array2::<T>::zeros(packed::<O>(ad[0], ad[1]));
    Zip::from(&mut out)
        .and(&a.view())
        .and(&b.view())
        .for_each(|o, &x, &y| *o = x + y);
    export_array(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndbridge_core::{export_vec, export_vec_with_layout, Layout};

    #[test]
    fn test_row_major_alias_reads_in_place() {
        let desc = export_vec((0..12).map(|x| x as f32).collect(), (3, 4)).unwrap();
        let m = as_row_major::<f32>(&desc).unwrap();
        assert_eq!((m.rows(), m.cols()), (3, 4));
        let v = m.view();
        assert_eq!(v[[1, 2]], 6.0);
        assert_eq!(v.as_ptr(), desc.data_ptr() as *const f32);
    }

    #[test]
    fn test_col_major_alias_reads_in_place() {
        let data: Vec<f64> = (0..6).map(|x| x as f64).collect();
        let desc = export_vec_with_layout(data, Layout::col_major((2, 3))).unwrap();
        let m = as_col_major::<f64>(&desc).unwrap();
        assert_eq!(m.view()[[1, 2]], 5.0);
        assert_eq!(m.view()[[0, 1]], 2.0);
        assert!(matches!(
            as_row_major::<f64>(&desc),
            Err(LayoutError::LayoutMismatch {
                expected: Order::RowMajor,
                ..
            })
        ));
    }

    #[test]
    fn test_alias_checks_dtype_and_rank() {
        let desc = export_vec(vec![0i32; 6], (2, 3)).unwrap();
        assert!(matches!(
            as_row_major::<f32>(&desc),
            Err(LayoutError::DtypeMismatch { .. })
        ));
        let desc = export_vec(vec![0f32; 6], 6).unwrap();
        assert!(matches!(
            as_row_major::<f32>(&desc),
            Err(LayoutError::RankMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_writable_alias_needs_descriptor_to_itself() {
        let mut desc = export_vec(vec![0f32; 4], (2, 2)).unwrap();
        let reader = as_row_major::<f32>(&desc).unwrap();
        assert_eq!(
            as_row_major_mut::<f32>(&mut desc).unwrap_err(),
            LayoutError::Shared { holders: 1 }
        );
        drop(reader);

        let mut first = as_row_major_mut::<f32>(&mut desc).unwrap();
        first.view_mut()[[0, 1]] = 1.0;
        drop(first);
        let mut second = as_row_major_mut::<f32>(&mut desc).unwrap();
        assert_eq!(second.view()[[0, 1]], 1.0);
        second.view_mut()[[0, 1]] += 1.0;
        drop(second);
        assert_eq!(as_row_major::<f32>(&desc).unwrap().view()[[0, 1]], 2.0);
    }

    #[test]
    fn test_writable_alias_keeps_order_check() {
        let mut desc = export_vec_with_layout(vec![0i32; 6], Layout::col_major((2, 3))).unwrap();
        assert!(matches!(
            as_row_major_mut::<i32>(&mut desc),
            Err(LayoutError::LayoutMismatch { .. })
        ));
        let mut m = as_col_major_mut::<i32>(&mut desc).unwrap();
        m.view_mut().fill(7);
        assert_eq!((m.rows(), m.cols()), (2, 3));
        assert!(m.view().iter().all(|&x| x == 7));
    }

    #[test]
    fn test_single_row_binds_both_orders() {
        let desc = export_vec(vec![1f32, 2.0, 3.0], (1, 3)).unwrap();
        assert!(as_row_major::<f32>(&desc).is_ok());
        assert!(as_col_major::<f32>(&desc).is_ok());
    }

    #[test]
    fn test_sum_allocates_new_buffer() {
        let a = export_vec((0..6).map(|x| x as f32).collect(), (2, 3)).unwrap();
        let b = export_vec(vec![10f32; 6], (2, 3)).unwrap();
        let ma = as_row_major::<f32>(&a).unwrap();
        let mb = as_row_major::<f32>(&b).unwrap();
        let out = sum(&ma, &mb).unwrap();
        assert_ne!(out.data_ptr(), a.data_ptr());
        assert!(!out.owner().unwrap().same_owner(a.owner().unwrap()));
        let m = as_row_major::<f32>(&out).unwrap();
        assert_eq!(m.view()[[1, 2]], 15.0);
    }

    #[test]
    fn test_sum_rejects_mismatched_shapes() {
        let a = export_vec(vec![0f32; 6], (2, 3)).unwrap();
        let b = export_vec(vec![0f32; 6], (3, 2)).unwrap();
        let err = sum(
            &as_row_major::<f32>(&a).unwrap(),
            &as_row_major::<f32>(&b).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ndbridge_core::Error::Layout(LayoutError::ShapeMismatch {
                axis: 0,
                expected: 2,
                actual: 3
            })
        ));
    }
}
