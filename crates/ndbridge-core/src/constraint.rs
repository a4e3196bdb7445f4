use std::marker::PhantomData;

use crate::config;
use crate::descriptor::ArrayDescriptor;
use crate::device::DeviceKind;
use crate::dtype::{DType, Element};
use crate::error::LayoutError;
use crate::layout::Order;
use crate::shape::Shape;
use crate::view::{View, ViewMut};

// Constraint — what a consumer requires of an incoming array
//
// A constraint is a conjunction of optional predicates. `validate` checks
// them in a fixed order and reports the FIRST failure:
//
//   1. dtype          → DtypeMismatch
//   2. device kind    → DeviceMismatch
//   3. rank           → RankMismatch
//   4. fixed extents  → ShapeMismatch  (first offending axis)
//   5. packing order  → LayoutMismatch
//
// Only structural fields are inspected; element values are never read, so
// validation is deterministic and side-effect free (apart from optional
// debug logging of rejections).

/// Required extent of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dim {
    Any,
    Fixed(usize),
}

impl From<usize> for Dim {
    fn from(extent: usize) -> Self {
        Dim::Fixed(extent)
    }
}

/// A declared set of requirements an array must meet to be accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraint {
    dtype: Option<DType>,
    device: Option<DeviceKind>,
    rank: Option<usize>,
    shape: Option<Vec<Dim>>,
    order: Option<Order>,
}

impl Constraint {
    /// A constraint every array satisfies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dtype and rank of a typed view `View<T, N>`.
    pub fn of<T: Element, const N: usize>() -> Self {
        Self::new().dtype(T::DTYPE).ndim(N)
    }

    pub fn dtype(mut self, dtype: DType) -> Self {
        self.dtype = Some(dtype);
        self
    }

    pub fn device(mut self, device: DeviceKind) -> Self {
        self.device = Some(device);
        self
    }

    /// Require `ndim` axes. Drops a previously declared shape of another rank.
    pub fn ndim(mut self, ndim: usize) -> Self {
        if self.shape.as_ref().is_some_and(|s| s.len() != ndim) {
            self.shape = None;
        }
        self.rank = Some(ndim);
        self
    }

    /// Require one extent per axis; also fixes the rank.
    pub fn shape<D: Into<Dim>>(mut self, dims: impl IntoIterator<Item = D>) -> Self {
        let dims: Vec<Dim> = dims.into_iter().map(Into::into).collect();
        self.rank = Some(dims.len());
        self.shape = Some(dims);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn required_dtype(&self) -> Option<DType> {
        self.dtype
    }

    pub fn required_rank(&self) -> Option<usize> {
        self.rank
    }

    /// Whether `desc` satisfies every predicate.
    pub fn matches(&self, desc: &ArrayDescriptor) -> bool {
        self.check(desc).is_ok()
    }

    /// Run the checks in order and return the first failure.
    pub fn check(&self, desc: &ArrayDescriptor) -> Result<(), LayoutError> {
        if let Some(expected) = self.dtype {
            if desc.dtype() != expected {
                return Err(LayoutError::DtypeMismatch {
                    expected,
                    actual: desc.dtype(),
                });
            }
        }
        if let Some(expected) = self.device {
            if desc.device().kind != expected {
                return Err(LayoutError::DeviceMismatch {
                    expected,
                    actual: desc.device(),
                });
            }
        }
        if let Some(expected) = self.rank {
            if desc.ndim() != expected {
                return Err(LayoutError::RankMismatch {
                    expected,
                    actual: desc.ndim(),
                });
            }
        }
        if let Some(dims) = &self.shape {
            check_extents(dims, desc.shape())?;
        }
        if let Some(order) = self.order {
            if !desc.is_contiguous(order) {
                return Err(LayoutError::LayoutMismatch {
                    expected: order,
                    shape: desc.shape().clone(),
                    strides: desc.strides().to_vec(),
                });
            }
        }
        Ok(())
    }
}

fn check_extents(dims: &[Dim], shape: &Shape) -> Result<(), LayoutError> {
    if dims.len() != shape.rank() {
        return Err(LayoutError::RankMismatch {
            expected: dims.len(),
            actual: shape.rank(),
        });
    }
    for (axis, (dim, &actual)) in dims.iter().zip(shape.dims()).enumerate() {
        if let Dim::Fixed(expected) = *dim {
            if expected != actual {
                return Err(LayoutError::ShapeMismatch {
                    axis,
                    expected,
                    actual,
                });
            }
        }
    }
    Ok(())
}

/// Check `desc` against `constraint`.
pub fn validate<'a>(
    desc: &'a ArrayDescriptor,
    constraint: &Constraint,
) -> Result<Validated<'a>, LayoutError> {
    match constraint.check(desc) {
        Ok(()) => Ok(Validated { desc }),
        Err(err) => {
            if config::global().log_rejections {
                tracing::debug!(array = %desc, error = %err, "array rejected");
            }
            Err(err)
        }
    }
}

/// Check `desc` against `constraint`, keeping it borrowed exclusively so a
/// writable view can be derived.
pub fn validate_mut<'a>(
    desc: &'a mut ArrayDescriptor,
    constraint: &Constraint,
) -> Result<ValidatedMut<'a>, LayoutError> {
    validate(desc, constraint)?;
    Ok(ValidatedMut { desc })
}

/// A descriptor that passed [`validate`]. The only source of read-only views.
#[derive(Debug, Clone, Copy)]
pub struct Validated<'a> {
    desc: &'a ArrayDescriptor,
}

impl<'a> Validated<'a> {
    pub fn descriptor(&self) -> &'a ArrayDescriptor {
        self.desc
    }

    /// Project onto `View<T, N>`, checking the dtype and rank the constraint
    /// may have left open.
    pub fn view<T: Element, const N: usize>(&self) -> Result<View<T, N>, LayoutError> {
        Constraint::of::<T, N>().check(self.desc)?;
        View::derive(self.desc)
    }
}

/// A descriptor that passed [`validate_mut`]. The only source of writable
/// views.
#[derive(Debug)]
pub struct ValidatedMut<'a> {
    desc: &'a mut ArrayDescriptor,
}

impl<'a> ValidatedMut<'a> {
    pub fn descriptor(&self) -> &ArrayDescriptor {
        self.desc
    }

    /// Project onto `ViewMut<T, N>`. Fails with `Shared` while read-only
    /// views or clones of the descriptor are alive.
    pub fn view_mut<T: Element, const N: usize>(self) -> Result<ViewMut<'a, T, N>, LayoutError> {
        Constraint::of::<T, N>().check(self.desc)?;
        ViewMut::derive(self.desc)
    }
}

// Array — a parameter type with its constraint attached
//
// `Array<'_, u8, 3>` accepted with
//
//   Constraint::new()
//       .shape([Dim::Any, Dim::Any, Dim::Fixed(3)])
//       .device(DeviceKind::Cpu)
//
// is the Rust spelling of "a uint8 image of any height and width with three
// channels, on the cpu". The dtype comes from `T` and overrides the one in
// the constraint. A rank or shape the constraint declares is checked as
// written, so one that disagrees with `N` accepts nothing. `ArrayMut` is the
// same parameter borrowed for writing.

/// A descriptor statically known to hold `T` elements over `N` axes.
#[derive(Debug, Clone, Copy)]
pub struct Array<'a, T: Element, const N: usize> {
    desc: &'a ArrayDescriptor,
    _element: PhantomData<T>,
}

impl<'a, T: Element, const N: usize> Array<'a, T, N> {
    /// Validate `desc` against `constraint` plus dtype `T` and rank `N`.
    pub fn accept(desc: &'a ArrayDescriptor, constraint: Constraint) -> Result<Self, LayoutError> {
        let desc = validate(desc, &constraint.dtype(T::DTYPE))?.descriptor();
        validate(desc, &Constraint::of::<T, N>())?;
        Ok(Array {
            desc,
            _element: PhantomData,
        })
    }

    pub fn descriptor(&self) -> &'a ArrayDescriptor {
        self.desc
    }

    pub fn shape(&self) -> [usize; N] {
        fixed_shape(self.desc)
    }

    /// Derive the element view. Fails only if the memory is not host
    /// accessible or the pointer is unusable for `T`.
    pub fn view(&self) -> Result<View<T, N>, LayoutError> {
        View::derive(self.desc)
    }
}

/// [`Array`] borrowed exclusively, for in-place modification.
#[derive(Debug)]
pub struct ArrayMut<'a, T: Element, const N: usize> {
    desc: &'a mut ArrayDescriptor,
    _element: PhantomData<T>,
}

impl<'a, T: Element, const N: usize> ArrayMut<'a, T, N> {
    /// Same checks as [`Array::accept`].
    pub fn accept(
        desc: &'a mut ArrayDescriptor,
        constraint: Constraint,
    ) -> Result<Self, LayoutError> {
        Array::<T, N>::accept(desc, constraint)?;
        Ok(ArrayMut {
            desc,
            _element: PhantomData,
        })
    }

    pub fn descriptor(&self) -> &ArrayDescriptor {
        self.desc
    }

    pub fn shape(&self) -> [usize; N] {
        fixed_shape(self.desc)
    }

    /// Derive a writable view for as long as this parameter is borrowed.
    pub fn view_mut(&mut self) -> Result<ViewMut<'_, T, N>, LayoutError> {
        ViewMut::derive(self.desc)
    }

    /// Derive a writable view for the whole borrow of the descriptor.
    pub fn into_view_mut(self) -> Result<ViewMut<'a, T, N>, LayoutError> {
        ViewMut::derive(self.desc)
    }
}

fn fixed_shape<const N: usize>(desc: &ArrayDescriptor) -> [usize; N] {
    let mut shape = [0; N];
    shape.copy_from_slice(desc.shape().dims());
    shape
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Device;
    use crate::layout::Layout;

    fn describe(data: &mut [f32], device: Device, layout: Layout) -> ArrayDescriptor {
        let ptr = data.as_mut_ptr().cast();
        unsafe { ArrayDescriptor::describe(ptr, DType::F32, device, layout, None) }
    }

    #[test]
    fn test_empty_constraint_matches_everything() {
        let mut data = [0f32; 12];
        let layout = Layout::new((3, 4), vec![1, 6]).unwrap();
        let desc = describe(&mut data, Device::cuda(0), layout);
        assert!(Constraint::new().matches(&desc));
    }

    #[test]
    fn test_check_order_reports_dtype_first() {
        let mut data = [0f32; 12];
        let desc = describe(&mut data, Device::cuda(0), Layout::row_major((3, 4)));
        let c = Constraint::new()
            .dtype(DType::I32)
            .device(DeviceKind::Cpu)
            .ndim(3)
            .order(Order::ColMajor);
        assert_eq!(
            c.check(&desc),
            Err(LayoutError::DtypeMismatch {
                expected: DType::I32,
                actual: DType::F32
            })
        );
        let c = c.dtype(DType::F32);
        assert_eq!(
            c.check(&desc),
            Err(LayoutError::DeviceMismatch {
                expected: DeviceKind::Cpu,
                actual: Device::cuda(0)
            })
        );
        let c = c.device(DeviceKind::Cuda);
        assert_eq!(
            c.check(&desc),
            Err(LayoutError::RankMismatch {
                expected: 3,
                actual: 2
            })
        );
        let c = c.ndim(2);
        assert!(matches!(
            c.check(&desc),
            Err(LayoutError::LayoutMismatch {
                expected: Order::ColMajor,
                ..
            })
        ));
    }

    #[test]
    fn test_fixed_extent_reports_axis() {
        let mut data = [0f32; 12];
        let desc = describe(&mut data, Device::CPU, Layout::row_major((2, 2, 3)));
        let c = Constraint::new().shape([Dim::Any, Dim::Fixed(3), Dim::Fixed(3)]);
        assert_eq!(
            c.check(&desc),
            Err(LayoutError::ShapeMismatch {
                axis: 1,
                expected: 3,
                actual: 2
            })
        );
        assert!(Constraint::new()
            .shape([Dim::Any, Dim::Any, Dim::Fixed(3)])
            .matches(&desc));
    }

    #[test]
    fn test_ndim_drops_conflicting_shape() {
        let c = Constraint::new().shape([2usize, 3]).ndim(3);
        assert_eq!(c.required_rank(), Some(3));
        assert_eq!(c, Constraint::new().ndim(3));
        let c = Constraint::new().shape([2usize, 3]).ndim(2);
        assert_ne!(c, Constraint::new().ndim(2));
    }

    #[test]
    fn test_validated_view_checks_element_type() {
        let mut data = [1f32, 2.0, 3.0, 4.0];
        let desc = describe(&mut data, Device::CPU, Layout::row_major((2, 2)));
        let validated = validate(&desc, &Constraint::new()).unwrap();
        assert!(matches!(
            validated.view::<i32, 2>(),
            Err(LayoutError::DtypeMismatch { .. })
        ));
        assert!(matches!(
            validated.view::<f32, 1>(),
            Err(LayoutError::RankMismatch { .. })
        ));
        let view = validated.view::<f32, 2>().unwrap();
        assert_eq!(view[[1, 0]], 3.0);
    }

    #[test]
    fn test_array_overrides_dtype() {
        let mut data = [0f32; 6];
        let desc = describe(&mut data, Device::CPU, Layout::row_major((2, 3)));
        let array = Array::<f32, 2>::accept(&desc, Constraint::new().dtype(DType::U8)).unwrap();
        assert_eq!(array.shape(), [2, 3]);
        assert!(Array::<f32, 3>::accept(&desc, Constraint::new()).is_err());
    }

    #[test]
    fn test_array_never_accepts_a_partial_shape_match() {
        let mut data = [0f32; 6];
        let desc = describe(&mut data, Device::CPU, Layout::row_major((2, 3)));
        let three_axes = Constraint::new().shape([Dim::Any, Dim::Any, Dim::Fixed(3)]);
        assert!(!three_axes.matches(&desc));
        assert_eq!(
            Array::<f32, 2>::accept(&desc, three_axes).unwrap_err(),
            LayoutError::RankMismatch {
                expected: 3,
                actual: 2
            }
        );

        let two_axes = Constraint::new().shape([Dim::Any, Dim::Fixed(3)]);
        assert_eq!(
            Array::<f32, 3>::accept(&desc, two_axes).unwrap_err(),
            LayoutError::RankMismatch {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn test_extents_require_one_dim_per_axis() {
        let shape = Shape::from((2, 3));
        assert_eq!(
            check_extents(&[Dim::Any, Dim::Any, Dim::Fixed(3)], &shape),
            Err(LayoutError::RankMismatch {
                expected: 3,
                actual: 2
            })
        );
        assert_eq!(check_extents(&[Dim::Any, Dim::Fixed(3)], &shape), Ok(()));
    }

    #[test]
    fn test_writable_view_needs_exclusive_descriptor() {
        let mut data = [0f32; 4];
        let mut desc = describe(&mut data, Device::CPU, Layout::row_major((2, 2)));

        let reader = validate(&desc, &Constraint::new())
            .unwrap()
            .view::<f32, 2>()
            .unwrap();
        assert_eq!(
            validate_mut(&mut desc, &Constraint::new())
                .unwrap()
                .view_mut::<f32, 2>()
                .unwrap_err(),
            LayoutError::Shared { holders: 1 }
        );
        drop(reader);

        let mut writer = validate_mut(&mut desc, &Constraint::new())
            .unwrap()
            .view_mut::<f32, 2>()
            .unwrap();
        writer[[1, 0]] = 3.0;
        drop(writer);

        let mut array = ArrayMut::<f32, 2>::accept(&mut desc, Constraint::new()).unwrap();
        array.view_mut().unwrap()[[0, 1]] = 1.0;
        assert_eq!(array.view_mut().unwrap().to_vec(), vec![0.0, 1.0, 3.0, 0.0]);
    }
}
