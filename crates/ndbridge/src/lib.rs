//! # ndbridge
//!
//! Zero-copy exchange of typed multi-dimensional arrays across a runtime boundary.
//!
//! This is the top-level facade crate that re-exports everything you need.
//!
//! ## Usage
//!
//! ```rust
//! use ndbridge::prelude::*;
//!
//! let desc = export_vec((0..6).map(|x| x as f32).collect(), (2, 3)).unwrap();
//! let rows = as_row_major::<f32>(&desc).unwrap();
//! assert_eq!(rows.view()[[1, 2]], 5.0);
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|----------|
//! | `ndbridge-core` | ArrayDescriptor, OwnerToken, Constraint, View, Specializer, buffer export |
//! | `ndbridge-ndarray` | Fixed-layout matrix/vector aliases and native returns over `ndarray` |

/// Re-export core types.
pub use ndbridge_core::{
    allocate_and_export, config, constraint, descriptor, device, dtype, error, export,
    export_shared, export_vec, export_vec_at, export_vec_with_layout, layout, owner, shape,
    specialize, validate, validate_mut, view, Array, ArrayDescriptor, ArrayMut, BridgeConfig, Carve,
    Constraint, DType, Device, DeviceKind, Dim, Element, Error, LayoutError, LifetimeError,
    LifetimePolicy, Order, OwnerGuard, OwnerToken, ReleaseOutcome, Result, Shape, Specialized,
    Specializer, UnsupportedError, Validated, ValidatedMut, View, ViewMut,
};

/// Re-export the ndarray adapter.
pub mod linalg {
    pub use ndbridge_ndarray::*;
}

pub mod prelude {
    pub use crate::linalg::{
        as_col_major, as_col_major_mut, as_row_major, as_row_major_mut, as_strided, as_vector,
        as_vector_mut, export_array, ColMajor, ColMatrix, Matrix, MatrixMut, RowMajor, RowMatrix,
        StridedMatrix, Vector, VectorMut,
    };
    pub use crate::{
        allocate_and_export, export_shared, export_vec, export_vec_with_layout, specialize,
        validate, validate_mut, Array, ArrayDescriptor, ArrayMut, Carve, Constraint, DType, Device,
        DeviceKind, Dim, Element, Error, LayoutError, Order, OwnerGuard, OwnerToken, Result,
        Specialized, View, ViewMut,
    };
}
