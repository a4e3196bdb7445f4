use ndarray::{Array, Dimension};
use ndbridge_core::{export_vec_at, ArrayDescriptor, Element, Layout, Result};

/// Hand an owned ndarray to the foreign side without copying, keeping its
/// native strides (row-major, column-major, or whatever slicing left behind).
pub fn export_array<T: Element, D: Dimension>(array: Array<T, D>) -> Result<ArrayDescriptor> {
    let shape = array.shape().to_vec();
    let strides = array.strides().to_vec();
    let (data, origin) = array.into_raw_vec_and_offset();
    let layout = Layout::new(shape, strides)?;
    export_vec_at(data, origin.unwrap_or(0), layout)
}
