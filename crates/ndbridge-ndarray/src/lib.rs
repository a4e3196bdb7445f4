//! # ndbridge-ndarray
//!
//! Fixed-layout aliases between ndbridge descriptors and `ndarray`.
//!
//! - [`as_row_major`] / [`as_col_major`] — zero-copy [`Matrix`] aliases that
//!   bind only to one packing order, with `_mut` variants returning [`MatrixMut`]
//! - [`as_vector`] / [`as_vector_mut`] — zero-copy [`Vector`] / [`VectorMut`]
//!   aliases over a contiguous 1-D array
//! - [`as_strided`] — read-only alias over any 2-D strides
//! - [`export_array`] — hand an owned `ndarray::Array` across without copying
//! - [`sum`] — computed results always land in a fresh, separately owned buffer

pub mod export;
pub mod matrix;
pub mod strided;
pub mod vector;

pub use export::export_array;
pub use matrix::{
    as_col_major, as_col_major_mut, as_row_major, as_row_major_mut, sum, ColMajor, ColMatrix,
    ColMatrixMut, Matrix, MatrixMut, MatrixOrder, RowMajor, RowMatrix, RowMatrixMut,
};
pub use strided::{as_strided, StridedMatrix};
pub use vector::{as_vector, as_vector_mut, Vector, VectorMut};
