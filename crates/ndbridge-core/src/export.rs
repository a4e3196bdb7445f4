use std::ffi::c_void;
use std::marker::PhantomData;

use crate::descriptor::ArrayDescriptor;
use crate::device::Device;
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::owner::{OwnerGuard, OwnerToken};
use crate::shape::Shape;

// Buffer export — handing native allocations to a foreign caller
//
// Every exported allocation gets exactly one OwnerToken whose deleter frees
// exactly that allocation. Each exported descriptor claims one reference,
// so the allocation lives until the last descriptor (and every view derived
// from one) is gone, whichever side lets go last:
//
//   allocate_and_export::<f32>((3, 4))  → fresh zeroed row-major buffer
//   export_vec(vec, (3, 4))             → an existing Vec, no copy
//   export_shared(backing, |b| ...)     → several arrays carved out of one
//                                         backing object, one shared token
//
// Everything exported here lives on the cpu.

/// Allocate a zeroed row-major buffer for `shape` and export it.
///
/// The returned token is an uncounted handle for inspection; the only
/// reference belongs to the descriptor, and releasing it is `unsafe`.
pub fn allocate_and_export<T: Element>(shape: impl Into<Shape>) -> (ArrayDescriptor, OwnerToken) {
    let shape = shape.into();
    let data = vec![T::zero(); shape.elem_count()];
    let layout = Layout::row_major(shape);
    export_buffer(data, 0, layout)
}

/// Export `data` as a row-major array of `shape` without copying it.
pub fn export_vec<T: Element>(data: Vec<T>, shape: impl Into<Shape>) -> Result<ArrayDescriptor> {
    let shape = shape.into();
    if data.len() != shape.elem_count() {
        return Err(Error::ElementCountMismatch {
            expected: shape.elem_count(),
            got: data.len(),
            shape,
        });
    }
    Ok(export_buffer(data, 0, Layout::row_major(shape)).0)
}

/// Export `data` under an arbitrary layout, addressed from element 0 of the
/// buffer. Every reachable offset must fall inside the buffer.
pub fn export_vec_with_layout<T: Element>(data: Vec<T>, layout: Layout) -> Result<ArrayDescriptor> {
    export_vec_at(data, 0, layout)
}

/// Export `data` under an arbitrary layout whose element `[0, ..., 0]` sits
/// at `origin`. Needed for layouts with negative strides.
pub fn export_vec_at<T: Element>(
    data: Vec<T>,
    origin: usize,
    layout: Layout,
) -> Result<ArrayDescriptor> {
    check_within(&layout, origin, data.len())?;
    Ok(export_buffer(data, origin, layout).0)
}

fn check_within(layout: &Layout, origin: usize, len: usize) -> Result<()> {
    if let Some((min, max)) = layout.offset_bounds() {
        let (min, max) = (min + origin as isize, max + origin as isize);
        if min < 0 || max >= len as isize {
            return Err(Error::OutOfBounds { min, max, len });
        }
    } else if origin > len {
        return Err(Error::OutOfBounds {
            min: origin as isize,
            max: origin as isize,
            len,
        });
    }
    Ok(())
}

fn export_buffer<T: Element>(
    mut data: Vec<T>,
    origin: usize,
    layout: Layout,
) -> (ArrayDescriptor, OwnerToken) {
    // SAFETY: `origin <= data.len()`, checked by every caller.
    let ptr = unsafe { data.as_mut_ptr().add(origin) };
    tracing::debug!(dtype = %T::DTYPE, %layout, "exporting buffer");
    // Moving the Vec into the deleter does not move its heap allocation.
    let owner = OwnerGuard::new(data, drop::<Vec<T>>);
    let token = owner.token().clone();
    // SAFETY: `ptr` addresses `layout` inside `data` (checked by callers),
    // which the token keeps alive until the last claim is released.
    let desc = unsafe {
        ArrayDescriptor::describe(ptr.cast(), T::DTYPE, Device::CPU, layout, Some(owner))
    };
    (desc, token)
}

/// A typed region of a shared backing object, to be exported as one array.
pub struct Carve<'a> {
    data: *mut c_void,
    dtype: DType,
    layout: Layout,
    _borrow: PhantomData<&'a mut ()>,
}

impl<'a> Carve<'a> {
    /// View `slice` as a row-major array of `shape`.
    pub fn new<T: Element>(slice: &'a mut [T], shape: impl Into<Shape>) -> Result<Self> {
        Self::with_layout(slice, Layout::row_major(shape))
    }

    /// View `slice` under an arbitrary layout starting at its first element.
    pub fn with_layout<T: Element>(slice: &'a mut [T], layout: Layout) -> Result<Self> {
        check_within(&layout, 0, slice.len())?;
        Ok(Carve {
            data: slice.as_mut_ptr().cast(),
            dtype: T::DTYPE,
            layout,
            _borrow: PhantomData,
        })
    }
}

/// Move `backing` to the heap and export the regions `carve` picks out of it,
/// all sharing one owner. `backing` is dropped once every returned
/// descriptor (and everything derived from them) has been dropped.
pub fn export_shared<S, F>(backing: S, carve: F) -> Result<Vec<ArrayDescriptor>>
where
    S: Send + 'static,
    F: for<'a> FnOnce(&'a mut S) -> Result<Vec<Carve<'a>>>,
{
    let raw = Box::into_raw(Box::new(backing));
    // The creator's reference is released on every path out of here, so a
    // failing `carve` frees the backing object right away.
    let creator = OwnerGuard::new(raw as usize, |addr: usize| {
        // SAFETY: `addr` came from `Box::into_raw` above and the token runs
        // this deleter exactly once.
        drop(unsafe { Box::from_raw(addr as *mut S) });
    });

    // SAFETY: `raw` is valid and unaliased until the token finalizes, which
    // cannot happen while `creator` is alive.
    let carves = carve(unsafe { &mut *raw })?;
    let mut exported = Vec::with_capacity(carves.len());
    for region in carves {
        // SAFETY: the region lies inside the backing object, kept alive by
        // the claim each descriptor takes.
        exported.push(unsafe {
            ArrayDescriptor::describe(
                region.data,
                region.dtype,
                Device::CPU,
                region.layout,
                Some(creator.clone()),
            )
        });
    }
    tracing::debug!(arrays = exported.len(), "exported shared backing");
    Ok(exported)
}
