//! # ndbridge-core
//!
//! Zero-copy exchange of n-dimensional arrays across a runtime boundary.
//!
//! This crate provides:
//! - [`ArrayDescriptor`] — untyped description of a foreign array (pointer, dtype, layout)
//! - [`OwnerToken`] / [`OwnerGuard`] — exactly-once release of exported allocations
//! - [`Constraint`] / [`validate`] — declared requirements an incoming array must meet
//! - [`View`] / [`ViewMut`] — typed, bounds-checked element access over a validated array
//! - [`specialize`] — runtime dispatch from (dtype, ndim) tags to typed views
//! - [`export`] — handing native buffers to a foreign caller
// - DType / Element: element type tags and the Rust types behind them
// - Device: placement tags, only host-accessible memory is ever dereferenced
// - Shape / Layout: extents plus signed element strides
// - BridgeConfig: process-wide knobs for lifetime violations and rejection logging

pub mod config;
pub mod constraint;
pub mod descriptor;
pub mod device;
pub mod dtype;
pub mod error;
pub mod export;
pub mod layout;
pub mod owner;
pub mod shape;
pub mod specialize;
pub mod view;

pub use config::{BridgeConfig, LifetimePolicy};
pub use constraint::{
    validate, validate_mut, Array, ArrayMut, Constraint, Dim, Validated, ValidatedMut,
};
pub use descriptor::{ArrayDescriptor, DescriptorParts};
pub use device::{Device, DeviceKind};
pub use dtype::{DType, DTypeKind, Element};
pub use error::{Error, LayoutError, LifetimeError, Result, UnsupportedError};
pub use export::{
    allocate_and_export, export_shared, export_vec, export_vec_at, export_vec_with_layout, Carve,
};
pub use layout::{Layout, Order};
pub use owner::{OwnerGuard, OwnerId, OwnerToken, ReleaseOutcome};
pub use shape::Shape;
pub use specialize::{specialize, Specialized, Specializer};
pub use view::{Indices, View, ViewMut};
