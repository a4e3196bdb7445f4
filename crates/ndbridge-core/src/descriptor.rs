use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;

use crate::device::Device;
use crate::dtype::DType;
use crate::error::LifetimeError;
use crate::layout::{Layout, Order};
use crate::owner::{OwnerGuard, OwnerToken};
use crate::shape::Shape;

// ArrayDescriptor — runtime description of a foreign array
//
// Everything needed to address the elements, nothing that owns them:
//
//   data     address of element [0, 0, ..., 0]
//   dtype    element type tag
//   device   placement tag
//   layout   extents + signed element strides
//   owner    optional claim on an OwnerToken
//
// The descriptor never frees `data`. When it carries an owner claim it keeps
// the allocation alive until it is dropped; without one the producer
// guarantees the memory outlives the descriptor (the common case for an
// array borrowed for the duration of a single call).
//
// Read-only views and clones share an access marker with the descriptor they
// came from. Mutable views borrow the descriptor exclusively and are refused
// while any of those are still alive, the `Arc::get_mut` rule applied to a
// foreign buffer.

/// Untyped description of an n-dimensional array living somewhere in memory.
pub struct ArrayDescriptor {
    data: *mut c_void,
    dtype: DType,
    device: Device,
    layout: Layout,
    owner: Option<OwnerGuard>,
    access: Arc<()>,
}

// SAFETY: the descriptor is metadata plus a lifetime claim. Reading or writing
// elements requires deriving a `View`, which carries its own thread bounds.
unsafe impl Send for ArrayDescriptor {}
unsafe impl Sync for ArrayDescriptor {}

/// The fields of a descriptor handed over to code that manages the owner
/// reference by hand, see [`ArrayDescriptor::into_parts`].
#[derive(Debug)]
pub struct DescriptorParts {
    pub data: *mut c_void,
    pub dtype: DType,
    pub device: Device,
    pub layout: Layout,
    /// Stands for one reference the receiver must eventually `release`.
    pub owner: Option<OwnerToken>,
}

impl ArrayDescriptor {
    /// Describe an array. Performs no validation.
    ///
    /// # Safety
    ///
    /// For every index inside `layout`, `data` offset by the layout's element
    /// offset must point to an initialized element of `dtype`, and this must
    /// hold for as long as the descriptor or anything derived from it is
    /// alive. If `owner` is `None` the caller alone guarantees that lifetime.
    /// Memory on a host-accessible device must not be accessed through other
    /// descriptors or references while a mutable view derived from this
    /// descriptor is alive.
    pub unsafe fn describe(
        data: *mut c_void,
        dtype: DType,
        device: Device,
        layout: Layout,
        owner: Option<OwnerGuard>,
    ) -> Self {
        ArrayDescriptor {
            data,
            dtype,
            device,
            layout,
            owner,
            access: Arc::new(()),
        }
    }

    pub fn data_ptr(&self) -> *mut c_void {
        self.data
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn shape(&self) -> &Shape {
        self.layout.shape()
    }

    pub fn ndim(&self) -> usize {
        self.layout.rank()
    }

    /// Extent of `axis`.
    pub fn dim(&self, axis: usize) -> Option<usize> {
        self.layout.shape().dim(axis)
    }

    /// Element stride of `axis`.
    pub fn stride(&self, axis: usize) -> Option<isize> {
        self.layout.strides().get(axis).copied()
    }

    pub fn strides(&self) -> &[isize] {
        self.layout.strides()
    }

    pub fn elem_count(&self) -> usize {
        self.layout.elem_count()
    }

    /// Bytes covered by the elements, ignoring gaps between them.
    pub fn nbytes(&self) -> usize {
        self.elem_count() * self.dtype.size_in_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.is_empty()
    }

    pub fn is_contiguous(&self, order: Order) -> bool {
        self.layout.is_contiguous(order)
    }

    pub fn owner(&self) -> Option<&OwnerToken> {
        self.owner.as_ref().map(OwnerGuard::token)
    }

    /// A fresh claim on this descriptor's owner, for holders that must
    /// outlive the descriptor. Fails if the owner was finalized while this
    /// descriptor still pointed into its memory.
    pub(crate) fn try_claim_owner(&self) -> Result<Option<OwnerGuard>, LifetimeError> {
        self.owner.as_ref().map(OwnerGuard::try_clone).transpose()
    }

    /// The access marker read-only views hold on to.
    pub(crate) fn share_access(&self) -> Arc<()> {
        Arc::clone(&self.access)
    }

    /// Number of live views and clones sharing this descriptor's elements.
    pub(crate) fn sharers(&self) -> usize {
        Arc::strong_count(&self.access) - 1
    }

    /// Dismantle the descriptor without releasing its owner reference. The
    /// receiver takes over that reference and must `release` it once done.
    pub fn into_parts(self) -> DescriptorParts {
        let ArrayDescriptor {
            data,
            dtype,
            device,
            layout,
            owner,
            access: _,
        } = self;
        DescriptorParts {
            data,
            dtype,
            device,
            layout,
            owner: owner.map(OwnerGuard::into_token),
        }
    }

    /// Rebuild a descriptor from parts, adopting their owner reference.
    ///
    /// # Safety
    ///
    /// Same contract as [`describe`](Self::describe). The parts' owner handle
    /// must stand for a reference the caller owns, as one produced by
    /// [`into_parts`](Self::into_parts) does until it is released.
    pub unsafe fn from_parts(parts: DescriptorParts) -> Self {
        ArrayDescriptor {
            data: parts.data,
            dtype: parts.dtype,
            device: parts.device,
            layout: parts.layout,
            // SAFETY: guaranteed by the caller.
            owner: parts.owner.map(|token| unsafe { token.adopt() }),
            access: Arc::new(()),
        }
    }
}

impl Clone for ArrayDescriptor {
    /// Clones share the data and take their own claim on the owner.
    fn clone(&self) -> Self {
        ArrayDescriptor {
            data: self.data,
            dtype: self.dtype,
            device: self.device,
            layout: self.layout.clone(),
            owner: self.owner.clone(),
            access: Arc::clone(&self.access),
        }
    }
}

impl fmt::Debug for ArrayDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayDescriptor")
            .field("data", &self.data)
            .field("dtype", &self.dtype)
            .field("device", &self.device)
            .field("shape", &self.layout.dims())
            .field("strides", &self.layout.strides())
            .field("owner", &self.owner().map(OwnerToken::id))
            .finish()
    }
}

impl fmt::Display for ArrayDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} array {} on {}", self.dtype, self.layout, self.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::ReleaseOutcome;

    #[test]
    fn test_accessors() {
        let mut data = [0f32; 6];
        let layout = Layout::row_major((2, 3));
        let desc = unsafe {
            ArrayDescriptor::describe(
                data.as_mut_ptr().cast(),
                DType::F32,
                Device::CPU,
                layout,
                None,
            )
        };
        assert_eq!(desc.ndim(), 2);
        assert_eq!(desc.dim(0), Some(2));
        assert_eq!(desc.dim(2), None);
        assert_eq!(desc.stride(0), Some(3));
        assert_eq!(desc.nbytes(), 24);
        assert!(desc.is_contiguous(Order::RowMajor));
        assert!(desc.owner().is_none());
        assert_eq!(
            desc.to_string(),
            "float32 array [2, 3] strides [3, 1] on cpu"
        );
    }

    #[test]
    fn test_clone_and_parts_track_owner() {
        let buffer = vec![0u8; 4];
        let mut buffer = std::mem::ManuallyDrop::new(buffer);
        let ptr = buffer.as_mut_ptr();
        let (len, cap) = (buffer.len(), buffer.capacity());
        let guard = OwnerGuard::new(ptr as usize, move |p: usize| {
            drop(unsafe { Vec::from_raw_parts(p as *mut u8, len, cap) });
        });
        let token = guard.token().clone();
        let desc = unsafe {
            ArrayDescriptor::describe(
                ptr.cast(),
                DType::U8,
                Device::CPU,
                Layout::row_major(4),
                Some(guard),
            )
        };
        let copy = desc.clone();
        assert_eq!(token.ref_count(), 2);
        assert_eq!(copy.sharers(), 1);
        drop(desc);
        assert_eq!(token.ref_count(), 1);
        assert_eq!(copy.sharers(), 0);

        let parts = copy.into_parts();
        assert_eq!(token.ref_count(), 1);
        let handed = parts.owner.expect("owner travels with the parts");
        assert_eq!(unsafe { handed.release() }, Ok(ReleaseOutcome::Finalized));
    }

    #[test]
    fn test_claim_fails_once_owner_is_gone() {
        let guard = OwnerGuard::new(vec![0f32; 2], drop::<Vec<f32>>);
        let token = guard.token().clone();
        let mut data = [0f32; 2];
        let desc = unsafe {
            ArrayDescriptor::describe(
                data.as_mut_ptr().cast(),
                DType::F32,
                Device::CPU,
                Layout::row_major(2),
                Some(guard),
            )
        };
        assert!(desc.try_claim_owner().unwrap().is_some());
        unsafe { token.release() }.unwrap();
        assert_eq!(
            desc.try_claim_owner().unwrap_err(),
            LifetimeError::UseAfterRelease { owner: token.id() }
        );
        // Disarm the descriptor's stolen reference.
        drop(desc.into_parts());
    }
}
