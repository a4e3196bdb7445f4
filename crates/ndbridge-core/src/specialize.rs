use crate::constraint::{validate_mut, Constraint, ValidatedMut};
use crate::descriptor::ArrayDescriptor;
use crate::dtype::DType;
use crate::error::{LayoutError, UnsupportedError};
use crate::view::ViewMut;

// Runtime specializer
//
// Takes a loosely constrained array and picks a strongly typed, writable
// view by looking at its runtime (dtype, ndim) tags. The candidates form a closed,
// ordered table; the first entry whose tags match wins, and no match gives
// `Specialized::Unsupported` with the observed tags for diagnostics.
//
// A linear scan is plenty for a handful of entries and keeps the dispatch
// order explicit and reproducible. Memory the host cannot dereference has
// no typed view, so it is reported as unsupported like an unknown tag pair.
//
//   match specialize(&mut desc)? {
//       Specialized::F32x2(mut v) => v.fill_with(|[i, j]| (i * j) as f32),
//       Specialized::I32x2(mut v) => v.fill_with(|[i, j]| (i + j) as i32),
//       other => println!("{other:?}"),
//   }

/// A view picked by [`specialize`], one variant per supported (dtype, ndim).
#[derive(Debug)]
pub enum Specialized<'a> {
    F32x1(ViewMut<'a, f32, 1>),
    F32x2(ViewMut<'a, f32, 2>),
    F64x1(ViewMut<'a, f64, 1>),
    F64x2(ViewMut<'a, f64, 2>),
    I32x1(ViewMut<'a, i32, 1>),
    I32x2(ViewMut<'a, i32, 2>),
    /// Interleaved 8-bit images, `[height, width, channels]`.
    U8x3(ViewMut<'a, u8, 3>),
    Unsupported(UnsupportedError),
}

impl Specialized<'_> {
    pub fn is_supported(&self) -> bool {
        !matches!(self, Specialized::Unsupported(_))
    }

    /// The (dtype, ndim) pair of the chosen variant.
    pub fn tags(&self) -> (DType, usize) {
        match self {
            Specialized::F32x1(_) => (DType::F32, 1),
            Specialized::F32x2(_) => (DType::F32, 2),
            Specialized::F64x1(_) => (DType::F64, 1),
            Specialized::F64x2(_) => (DType::F64, 2),
            Specialized::I32x1(_) => (DType::I32, 1),
            Specialized::I32x2(_) => (DType::I32, 2),
            Specialized::U8x3(_) => (DType::U8, 3),
            Specialized::Unsupported(err) => (err.dtype, err.ndim),
        }
    }
}

type Build = for<'a> fn(ValidatedMut<'a>) -> Result<Specialized<'a>, LayoutError>;

struct Entry {
    dtype: DType,
    ndim: usize,
    build: Build,
}

macro_rules! entry {
    ($variant:ident, $ty:ty, $dtype:ident, $ndim:literal) => {{
        fn build(validated: ValidatedMut<'_>) -> Result<Specialized<'_>, LayoutError> {
            validated.view_mut::<$ty, $ndim>().map(Specialized::$variant)
        }
        Entry {
            dtype: DType::$dtype,
            ndim: $ndim,
            build,
        }
    }};
}

const TABLE: &[Entry] = &[
    entry!(F32x1, f32, F32, 1),
    entry!(F32x2, f32, F32, 2),
    entry!(F64x1, f64, F64, 1),
    entry!(F64x2, f64, F64, 2),
    entry!(I32x1, i32, I32, 1),
    entry!(I32x2, i32, I32, 2),
    entry!(U8x3, u8, U8, 3),
];

/// Dispatches generic arrays to typed views, optionally behind a base
/// constraint every array must pass first.
#[derive(Debug, Clone, Default)]
pub struct Specializer {
    base: Constraint,
}

impl Specializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `base` (typically an order and a device) before dispatching.
    pub fn with_constraint(base: Constraint) -> Self {
        Specializer { base }
    }

    /// Validate against the base constraint, then pick the first matching
    /// table entry. Errors come only from the base constraint, an unusable
    /// data pointer, or views of the descriptor that are still alive.
    pub fn specialize<'a>(
        &self,
        desc: &'a mut ArrayDescriptor,
    ) -> Result<Specialized<'a>, LayoutError> {
        let validated = validate_mut(desc, &self.base)?;
        let desc = validated.descriptor();
        let (dtype, ndim, device) = (desc.dtype(), desc.ndim(), desc.device());
        let entry = device
            .is_host_accessible()
            .then(|| TABLE.iter().find(|e| e.dtype == dtype && e.ndim == ndim))
            .flatten();
        match entry {
            Some(entry) => {
                tracing::trace!(%dtype, ndim, "specialized view");
                (entry.build)(validated)
            }
            None => Ok(Specialized::Unsupported(UnsupportedError {
                dtype,
                ndim,
                device,
            })),
        }
    }
}

/// [`Specializer::specialize`] without a base constraint.
pub fn specialize(desc: &mut ArrayDescriptor) -> Result<Specialized<'_>, LayoutError> {
    Specializer::new().specialize(desc)
}
