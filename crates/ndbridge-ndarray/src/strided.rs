use ndarray::{ArrayView2, Axis, ShapeBuilder};
use ndbridge_core::{validate, ArrayDescriptor, Constraint, Element, LayoutError, OwnerToken, View};

// Layout-agnostic read-only alias
//
// Binds any 2-D array regardless of strides: transposed, sliced with a step,
// reversed (negative strides) or broadcast (zero strides). The result is a
// read-only `ArrayView2`; zero and overlapping strides make a mutable alias
// unsound, so none is offered.
//
// ndarray wants a pointer to the lowest-addressed element plus non-negative
// strides. Negative axes are rebased onto their last element and flipped
// back with `invert_axis`, which leaves logical indexing unchanged.

/// Zero-copy read-only alias of a 2-D array with arbitrary strides.
#[derive(Debug)]
pub struct StridedMatrix<T: Element> {
    inner: View<T, 2>,
}

/// Alias `desc` as a `T` matrix, accepting any strides.
pub fn as_strided<T: Element>(desc: &ArrayDescriptor) -> Result<StridedMatrix<T>, LayoutError> {
    let inner = validate(desc, &Constraint::of::<T, 2>())?.view::<T, 2>()?;
    tracing::trace!(strides = ?inner.strides(), "strided alias");
    Ok(StridedMatrix { inner })
}

impl<T: Element> StridedMatrix<T> {
    pub fn rows(&self) -> usize {
        self.inner.dim(0)
    }

    pub fn cols(&self) -> usize {
        self.inner.dim(1)
    }

    pub fn strides(&self) -> [isize; 2] {
        self.inner.strides()
    }

    pub fn owner(&self) -> Option<&OwnerToken> {
        self.inner.owner()
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        let shape = self.inner.shape();
        let strides = self.inner.strides();
        let mut ptr = self.inner.as_ptr();
        let mut flipped = [false; 2];
        for axis in 0..2 {
            if strides[axis] < 0 && shape[axis] > 0 {
                // SAFETY: the last element along `axis` belongs to the array.
                ptr = unsafe { ptr.offset(strides[axis] * (shape[axis] as isize - 1)) };
                flipped[axis] = true;
            }
        }
        let dims = (shape[0], shape[1]).strides((
            strides[0].unsigned_abs(),
            strides[1].unsigned_abs(),
        ));
        // SAFETY: every index inside `shape` addresses an element of the
        // described array, kept alive by the owner claim in `inner`. The view
        // is shared, so overlapping elements are fine.
        let mut view = unsafe { ArrayView2::from_shape_ptr(dims, ptr) };
        for (axis, &flip) in flipped.iter().enumerate() {
            if flip {
                view.invert_axis(Axis(axis));
            }
        }
        view
    }
}
