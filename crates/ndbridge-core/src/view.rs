use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};
use std::ptr::NonNull;
use std::sync::Arc;

use crate::descriptor::ArrayDescriptor;
use crate::device::DeviceKind;
use crate::dtype::Element;
use crate::error::LayoutError;
use crate::layout::StridedIter;
use crate::owner::{OwnerGuard, OwnerToken};

// View / ViewMut — typed, self-contained element accessors
//
// A view is derived once from a validated descriptor and then never looks at
// the descriptor again: the pointer, extents and strides are copied into
// fixed-size arrays so the whole thing stays small enough to live in
// registers inside a hot loop.
//
//   let view = validate(&desc, &c)?.view::<f32, 2>()?;       // read-only
//   let mut out = validate_mut(&mut desc, &c)?.view_mut()?;   // exclusive
//   for [i, j] in out.indices() {
//       out[[i, j]] = (i * j) as f32;
//   }
//
// `View` holds its own claim on the owner token. Dropping the descriptor (or
// the foreign side releasing its reference) while a view is alive leaves the
// allocation intact until the view itself goes away.
//
// `ViewMut` borrows its descriptor mutably instead, and is refused while any
// `View` or descriptor clone sharing the same elements is alive. Two writable
// views over one descriptor therefore never coexist.
//
// Element offsets are Σ index[k] * stride[k], in elements. Indexing through
// `Index`/`get` is bounds-checked; `get_unchecked` is the unchecked escape
// hatch.

/// Pointer plus copied geometry, shared by both view kinds.
struct Strided<T, const N: usize> {
    data: NonNull<T>,
    shape: [usize; N],
    strides: [isize; N],
}

impl<T: Element, const N: usize> Strided<T, N> {
    fn derive(desc: &ArrayDescriptor) -> Result<Self, LayoutError> {
        debug_assert_eq!(desc.dtype(), T::DTYPE);
        debug_assert_eq!(desc.ndim(), N);

        if !desc.device().is_host_accessible() {
            return Err(LayoutError::DeviceMismatch {
                expected: DeviceKind::Cpu,
                actual: desc.device(),
            });
        }
        if let Some(owner) = desc.owner().filter(|owner| owner.is_finalized()) {
            return Err(LayoutError::OwnerReleased { owner: owner.id() });
        }

        let data = if desc.is_empty() {
            NonNull::dangling()
        } else {
            let ptr = desc.data_ptr().cast::<T>();
            match NonNull::new(ptr) {
                Some(data) if ptr as usize % std::mem::align_of::<T>() == 0 => data,
                _ => {
                    return Err(LayoutError::Misaligned {
                        dtype: T::DTYPE,
                        address: ptr as usize,
                        align: std::mem::align_of::<T>(),
                    })
                }
            }
        };

        let mut shape = [0usize; N];
        shape.copy_from_slice(desc.shape().dims());
        let mut strides = [0isize; N];
        strides.copy_from_slice(desc.strides());

        tracing::trace!(dtype = %T::DTYPE, ?shape, ?strides, "view derived");
        Ok(Strided {
            data,
            shape,
            strides,
        })
    }

    fn len(&self) -> usize {
        self.shape.iter().product()
    }

    fn offset_unchecked(&self, index: [usize; N]) -> isize {
        index
            .iter()
            .zip(&self.strides)
            .map(|(&i, &s)| i as isize * s)
            .sum()
    }

    fn offset(&self, index: [usize; N]) -> Option<isize> {
        if index.iter().zip(&self.shape).any(|(&i, &n)| i >= n) {
            return None;
        }
        Some(self.offset_unchecked(index))
    }

    /// # Safety
    ///
    /// `offset` must come from an in-bounds index.
    unsafe fn at(&self, offset: isize) -> *mut T {
        unsafe { self.data.as_ptr().offset(offset) }
    }

    fn get(&self, index: [usize; N]) -> Option<&T> {
        let offset = self.offset(index)?;
        // SAFETY: in-bounds offsets address live elements (describe contract).
        Some(unsafe { &*self.at(offset) })
    }

    fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        StridedIter::new(&self.shape, &self.strides)
            // SAFETY: the iterator only yields offsets of in-bounds indices.
            .map(move |offset| unsafe { &*self.at(offset) })
    }

    fn out_of_bounds(&self, index: [usize; N]) -> ! {
        let shape = self.shape;
        panic!("index {index:?} out of bounds for view of shape {shape:?}")
    }
}

/// Read-only typed accessor over `N`-dimensional `T` elements of a foreign
/// array.
pub struct View<T: Element, const N: usize> {
    raw: Strided<T, N>,
    owner: Option<OwnerGuard>,
    _access: Arc<()>,
    _element: PhantomData<T>,
}

// SAFETY: a view only reads, and can move to or be shared with another
// thread together with its owner claim (the count is atomic). Writers need a
// `ViewMut`, which cannot be derived while this view is alive.
unsafe impl<T: Element, const N: usize> Send for View<T, N> {}
unsafe impl<T: Element, const N: usize> Sync for View<T, N> {}

impl<T: Element, const N: usize> View<T, N> {
    /// Build a view over `desc`, whose dtype and rank the caller has already
    /// checked against `T` and `N`.
    pub(crate) fn derive(desc: &ArrayDescriptor) -> Result<Self, LayoutError> {
        let raw = Strided::derive(desc)?;
        let owner = desc
            .try_claim_owner()
            .map_err(|err| LayoutError::OwnerReleased { owner: err.owner() })?;
        Ok(View {
            raw,
            owner,
            _access: desc.share_access(),
            _element: PhantomData,
        })
    }

    pub fn shape(&self) -> [usize; N] {
        self.raw.shape
    }

    pub fn strides(&self) -> [isize; N] {
        self.raw.strides
    }

    /// Extent of `axis`. Panics if `axis >= N`.
    pub fn dim(&self, axis: usize) -> usize {
        self.raw.shape[axis]
    }

    pub fn ndim(&self) -> usize {
        N
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn owner(&self) -> Option<&OwnerToken> {
        self.owner.as_ref().map(OwnerGuard::token)
    }

    /// Address of element `[0; N]`. Non-null and aligned for `T`, dangling
    /// when the view is empty.
    pub fn as_ptr(&self) -> *const T {
        self.raw.data.as_ptr()
    }

    pub fn get(&self, index: [usize; N]) -> Option<&T> {
        self.raw.get(index)
    }

    /// # Safety
    ///
    /// Every component of `index` must be below the extent of its axis.
    pub unsafe fn get_unchecked(&self, index: [usize; N]) -> &T {
        unsafe { &*self.raw.at(self.raw.offset_unchecked(index)) }
    }

    /// All valid indices in row-major order.
    pub fn indices(&self) -> Indices<N> {
        Indices::new(self.raw.shape)
    }

    /// Elements in row-major logical order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.raw.iter()
    }

    /// Copy the elements out, row-major.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().copied().collect()
    }
}

impl<T: Element, const N: usize> Index<[usize; N]> for View<T, N> {
    type Output = T;

    fn index(&self, index: [usize; N]) -> &T {
        match self.raw.get(index) {
            Some(element) => element,
            None => self.raw.out_of_bounds(index),
        }
    }
}

impl<T: Element, const N: usize> fmt::Debug for View<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("dtype", &T::DTYPE)
            .field("shape", &self.raw.shape)
            .field("strides", &self.raw.strides)
            .field("owner", &self.owner().map(OwnerToken::id))
            .finish()
    }
}

/// Writable typed accessor, borrowing its descriptor exclusively for `'a`.
pub struct ViewMut<'a, T: Element, const N: usize> {
    raw: Strided<T, N>,
    desc: &'a ArrayDescriptor,
}

// SAFETY: the descriptor is borrowed mutably for `'a`, so no other view of
// it can exist while this one moves between threads.
unsafe impl<T: Element, const N: usize> Send for ViewMut<'_, T, N> {}

impl<'a, T: Element, const N: usize> ViewMut<'a, T, N> {
    /// Build a writable view over `desc`, whose dtype and rank the caller has
    /// already checked against `T` and `N`.
    pub(crate) fn derive(desc: &'a mut ArrayDescriptor) -> Result<Self, LayoutError> {
        let desc: &'a ArrayDescriptor = desc;
        let raw = Strided::derive(desc)?;
        let holders = desc.sharers();
        if holders > 0 {
            return Err(LayoutError::Shared { holders });
        }
        Ok(ViewMut { raw, desc })
    }

    pub fn shape(&self) -> [usize; N] {
        self.raw.shape
    }

    pub fn strides(&self) -> [isize; N] {
        self.raw.strides
    }

    /// Extent of `axis`. Panics if `axis >= N`.
    pub fn dim(&self, axis: usize) -> usize {
        self.raw.shape[axis]
    }

    pub fn ndim(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn owner(&self) -> Option<&OwnerToken> {
        self.desc.owner()
    }

    pub fn as_ptr(&self) -> *const T {
        self.raw.data.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.raw.data.as_ptr()
    }

    pub fn get(&self, index: [usize; N]) -> Option<&T> {
        self.raw.get(index)
    }

    pub fn get_mut(&mut self, index: [usize; N]) -> Option<&mut T> {
        let offset = self.raw.offset(index)?;
        // SAFETY: in bounds, and `&mut self` keeps this the only reference
        // handed out by the one writable view of the descriptor.
        Some(unsafe { &mut *self.raw.at(offset) })
    }

    /// # Safety
    ///
    /// Every component of `index` must be below the extent of its axis.
    pub unsafe fn get_unchecked(&self, index: [usize; N]) -> &T {
        unsafe { &*self.raw.at(self.raw.offset_unchecked(index)) }
    }

    /// # Safety
    ///
    /// Every component of `index` must be below the extent of its axis.
    pub unsafe fn get_unchecked_mut(&mut self, index: [usize; N]) -> &mut T {
        unsafe { &mut *self.raw.at(self.raw.offset_unchecked(index)) }
    }

    /// All valid indices in row-major order. Owns a copy of the shape, so
    /// the view can be written while iterating.
    pub fn indices(&self) -> Indices<N> {
        Indices::new(self.raw.shape)
    }

    /// Overwrite every element with `f(index)`.
    pub fn fill_with(&mut self, mut f: impl FnMut([usize; N]) -> T) {
        for index in self.indices() {
            let offset = self.raw.offset_unchecked(index);
            // SAFETY: `indices` only yields in-bounds indices.
            unsafe { *self.raw.at(offset) = f(index) };
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.raw.iter()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().copied().collect()
    }
}

impl<T: Element, const N: usize> Index<[usize; N]> for ViewMut<'_, T, N> {
    type Output = T;

    fn index(&self, index: [usize; N]) -> &T {
        match self.raw.get(index) {
            Some(element) => element,
            None => self.raw.out_of_bounds(index),
        }
    }
}

impl<T: Element, const N: usize> IndexMut<[usize; N]> for ViewMut<'_, T, N> {
    fn index_mut(&mut self, index: [usize; N]) -> &mut T {
        let offset = match self.raw.offset(index) {
            Some(offset) => offset,
            None => self.raw.out_of_bounds(index),
        };
        // SAFETY: in bounds, as in `get_mut`.
        unsafe { &mut *self.raw.at(offset) }
    }
}

impl<T: Element, const N: usize> fmt::Debug for ViewMut<'_, T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewMut")
            .field("dtype", &T::DTYPE)
            .field("shape", &self.raw.shape)
            .field("strides", &self.raw.strides)
            .field("owner", &self.owner().map(OwnerToken::id))
            .finish()
    }
}

/// Row-major iterator over the indices of an `N`-dimensional shape.
#[derive(Debug, Clone)]
pub struct Indices<const N: usize> {
    shape: [usize; N],
    next: Option<[usize; N]>,
}

impl<const N: usize> Indices<N> {
    fn new(shape: [usize; N]) -> Self {
        let empty = shape.contains(&0);
        Indices {
            shape,
            next: (!empty).then_some([0; N]),
        }
    }
}

impl<const N: usize> Iterator for Indices<N> {
    type Item = [usize; N];

    fn next(&mut self) -> Option<[usize; N]> {
        let current = self.next?;
        let mut following = current;
        self.next = None;
        for axis in (0..N).rev() {
            following[axis] += 1;
            if following[axis] < self.shape[axis] {
                self.next = Some(following);
                break;
            }
            following[axis] = 0;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{validate, validate_mut, Constraint};
    use crate::device::Device;
    use crate::dtype::DType;
    use crate::layout::Layout;

    fn describe<T: Element>(data: &mut [T], layout: Layout) -> ArrayDescriptor {
        let ptr = data.as_mut_ptr().cast();
        unsafe { ArrayDescriptor::describe(ptr, T::DTYPE, Device::CPU, layout, None) }
    }

    fn try_view<T: Element, const N: usize>(
        desc: &ArrayDescriptor,
    ) -> Result<View<T, N>, LayoutError> {
        validate(desc, &Constraint::new())?.view()
    }

    fn view_of<T: Element, const N: usize>(desc: &ArrayDescriptor) -> View<T, N> {
        try_view(desc).unwrap()
    }

    fn view_mut_of<T: Element, const N: usize>(desc: &mut ArrayDescriptor) -> ViewMut<'_, T, N> {
        let validated = validate_mut(desc, &Constraint::new()).unwrap();
        validated.view_mut().unwrap()
    }

    #[test]
    fn test_indices() {
        let all: Vec<[usize; 2]> = Indices::new([2, 2]).collect();
        assert_eq!(all, vec![[0, 0], [0, 1], [1, 0], [1, 1]]);
        assert_eq!(Indices::new([0, 5]).count(), 0);
        assert_eq!(Indices::<0>::new([]).count(), 1);
    }

    #[test]
    fn test_fill_and_read_back() {
        let mut data = [0f32; 6];
        let mut desc = describe(&mut data, Layout::row_major((2, 3)));
        let mut view = view_mut_of::<f32, 2>(&mut desc);
        view.fill_with(|[i, j]| (10 * i + j) as f32);
        assert_eq!(view[[1, 2]], 12.0);
        assert_eq!(view.to_vec(), vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        drop(desc);
        assert_eq!(data, [0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
    }

    #[test]
    fn test_column_major_and_reversed_strides() {
        let mut data = [0i32, 1, 2, 3, 4, 5];
        // Column-major [2, 3]: element (i, j) lives at i + 2j.
        let desc = describe(&mut data, Layout::col_major((2, 3)));
        assert_eq!(view_of::<i32, 2>(&desc).to_vec(), vec![0, 2, 4, 1, 3, 5]);

        // A reversed vector: start at the last element, step back.
        let last = unsafe { data.as_mut_ptr().add(5) };
        let desc = unsafe {
            ArrayDescriptor::describe(
                last.cast(),
                DType::I32,
                Device::CPU,
                Layout::new(6, vec![-1]).unwrap(),
                None,
            )
        };
        assert_eq!(view_of::<i32, 1>(&desc).to_vec(), vec![5, 4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut data = [0u8; 4];
        let mut desc = describe(&mut data, Layout::row_major((2, 2)));
        let view = view_of::<u8, 2>(&desc);
        assert!(view.get([2, 0]).is_none());
        assert!(view.get([1, 1]).is_some());
        drop(view);
        let mut view = view_mut_of::<u8, 2>(&mut desc);
        assert!(view.get_mut([0, 2]).is_none());
        assert!(view.get_mut([1, 0]).is_some());
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_index_panics_out_of_bounds() {
        let mut data = [0u8; 4];
        let desc = describe(&mut data, Layout::row_major((2, 2)));
        let view = view_of::<u8, 2>(&desc);
        let _ = view[[0, 3]];
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_index_mut_panics_out_of_bounds() {
        let mut data = [0u8; 4];
        let mut desc = describe(&mut data, Layout::row_major((2, 2)));
        let mut view = view_mut_of::<u8, 2>(&mut desc);
        view[[2, 0]] = 1;
    }

    #[test]
    fn test_writable_view_waits_for_readers() {
        let mut data = [0f32; 3];
        let mut desc = describe(&mut data, Layout::row_major(3));
        let copy = desc.clone();
        let first = view_of::<f32, 1>(&desc);
        let second = view_of::<f32, 1>(&copy);
        let refused = validate_mut(&mut desc, &Constraint::new())
            .unwrap()
            .view_mut::<f32, 1>()
            .unwrap_err();
        assert_eq!(refused, LayoutError::Shared { holders: 3 });

        drop((first, second, copy));
        let mut writer = view_mut_of::<f32, 1>(&mut desc);
        writer[[1]] = 4.0;
        drop(writer);
        // Writers come one after the other, each with the descriptor to itself.
        let mut writer = view_mut_of::<f32, 1>(&mut desc);
        assert_eq!(writer[[1]], 4.0);
        writer[[1]] += 1.0;
        drop(writer);
        assert_eq!(view_of::<f32, 1>(&desc).to_vec(), vec![0.0, 5.0, 0.0]);
    }

    #[test]
    fn test_zero_extent_never_touches_memory() {
        let mut desc = unsafe {
            ArrayDescriptor::describe(
                std::ptr::null_mut(),
                DType::F64,
                Device::CPU,
                Layout::row_major((0, 5)),
                None,
            )
        };
        let mut view = view_mut_of::<f64, 2>(&mut desc);
        let mut calls = 0;
        view.fill_with(|_| {
            calls += 1;
            1.0
        });
        assert_eq!(calls, 0);
        assert!(view.is_empty());
        assert_eq!(view.iter().count(), 0);
    }

    #[test]
    fn test_device_and_pointer_checks() {
        let mut data = [0f32; 4];
        let on_gpu = unsafe {
            ArrayDescriptor::describe(
                data.as_mut_ptr().cast(),
                DType::F32,
                Device::cuda(0),
                Layout::row_major(4),
                None,
            )
        };
        assert!(matches!(
            try_view::<f32, 1>(&on_gpu),
            Err(LayoutError::DeviceMismatch { .. })
        ));

        let null = unsafe {
            ArrayDescriptor::describe(
                std::ptr::null_mut(),
                DType::F32,
                Device::CPU,
                Layout::row_major(4),
                None,
            )
        };
        assert!(matches!(
            try_view::<f32, 1>(&null),
            Err(LayoutError::Misaligned { address: 0, .. })
        ));

        let mut bytes = [0u8; 16];
        let skip = if (bytes.as_ptr() as usize + 1) % 4 == 0 { 2 } else { 1 };
        let odd = unsafe { bytes.as_mut_ptr().add(skip) };
        let misaligned = unsafe {
            ArrayDescriptor::describe(
                odd.cast(),
                DType::F32,
                Device::CPU,
                Layout::row_major(2),
                None,
            )
        };
        assert!(matches!(
            try_view::<f32, 1>(&misaligned),
            Err(LayoutError::Misaligned { align: 4, .. })
        ));
    }
}
