use ndarray::{ArrayView1, ArrayViewMut1};
use ndbridge_core::{
    validate, validate_mut, ArrayDescriptor, Constraint, Element, LayoutError, Order, OwnerToken,
    View, ViewMut,
};

/// Zero-copy read-only alias of a packed 1-D array.
#[derive(Debug)]
pub struct Vector<T: Element> {
    inner: View<T, 1>,
}

fn contiguous<T: Element>() -> Constraint {
    Constraint::of::<T, 1>().order(Order::AnyContiguous)
}

/// Alias `desc` as a contiguous `T` vector.
pub fn as_vector<T: Element>(desc: &ArrayDescriptor) -> Result<Vector<T>, LayoutError> {
    let inner = validate(desc, &contiguous::<T>())?.view::<T, 1>()?;
    tracing::trace!(len = inner.len(), "vector alias");
    Ok(Vector { inner })
}

impl<T: Element> Vector<T> {
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn owner(&self) -> Option<&OwnerToken> {
        self.inner.owner()
    }

    pub fn view(&self) -> ArrayView1<'_, T> {
        // SAFETY: validated as a contiguous run of `len` elements, kept alive
        // by the owner claim in `inner`.
        unsafe { ArrayView1::from_shape_ptr(self.len(), self.inner.as_ptr()) }
    }
}

/// Writable alias of a packed 1-D array, borrowing its descriptor
/// exclusively for `'a`.
#[derive(Debug)]
pub struct VectorMut<'a, T: Element> {
    inner: ViewMut<'a, T, 1>,
}

/// Alias `desc` as a writable contiguous `T` vector. Fails with `Shared`
/// while read-only aliases or clones of `desc` are alive.
pub fn as_vector_mut<T: Element>(
    desc: &mut ArrayDescriptor,
) -> Result<VectorMut<'_, T>, LayoutError> {
    let inner = validate_mut(desc, &contiguous::<T>())?.view_mut::<T, 1>()?;
    tracing::trace!(len = inner.len(), "writable vector alias");
    Ok(VectorMut { inner })
}

impl<T: Element> VectorMut<'_, T> {
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn owner(&self) -> Option<&OwnerToken> {
        self.inner.owner()
    }

    pub fn view(&self) -> ArrayView1<'_, T> {
        // SAFETY: as in `Vector::view`, kept alive by the borrowed descriptor.
        unsafe { ArrayView1::from_shape_ptr(self.len(), self.inner.as_ptr()) }
    }

    pub fn view_mut(&mut self) -> ArrayViewMut1<'_, T> {
        // SAFETY: as in `view`; the descriptor has no other view and
        // `&mut self` makes this the only alias.
        unsafe { ArrayViewMut1::from_shape_ptr(self.len(), self.inner.as_mut_ptr()) }
    }
}
