// Tests for ndbridge-ndarray: order-bound aliases, in-place writes, native returns

use ndarray::{Array1, Array2, ShapeBuilder};
use ndbridge_core::{export_vec, export_vec_with_layout, Layout, LayoutError, Order};
use ndbridge_ndarray::{
    as_col_major, as_col_major_mut, as_row_major, as_row_major_mut, as_strided, as_vector,
    as_vector_mut, export_array, sum,
};

/// Column-major (rows, cols) filled 1, 2, 3, ... down each column.
fn colmajor(rows: usize, cols: usize) -> Array2<f32> {
    let mut m = Array2::zeros((rows, cols).f());
    let mut count = 0.0;
    for c in 0..cols {
        for r in 0..rows {
            count += 1.0;
            m[[r, c]] = count;
        }
    }
    m
}

/// Row-major (rows, cols) filled 1, 2, 3, ... along each row.
fn rowmajor(rows: usize, cols: usize) -> Array2<f32> {
    Array2::from_shape_fn((rows, cols), |(r, c)| (r * cols + c + 1) as f32)
}

#[test]
fn test_native_matrices_bind_only_their_order() {
    let col = export_array(colmajor(3, 4)).unwrap();
    let row = export_array(rowmajor(3, 4)).unwrap();

    let c = as_col_major::<f32>(&col).unwrap();
    assert_eq!((c.rows(), c.cols()), (3, 4));
    assert_eq!(c.view()[[2, 0]], 3.0);
    assert_eq!(c.view()[[0, 1]], 4.0);

    let r = as_row_major::<f32>(&row).unwrap();
    assert_eq!(r.view()[[0, 3]], 4.0);
    assert_eq!(r.view()[[2, 3]], 12.0);

    assert!(matches!(
        as_col_major::<f32>(&row),
        Err(LayoutError::LayoutMismatch {
            expected: Order::ColMajor,
            ..
        })
    ));
    assert!(matches!(
        as_row_major::<f32>(&col),
        Err(LayoutError::LayoutMismatch {
            expected: Order::RowMajor,
            ..
        })
    ));
}

#[test]
fn test_modify_through_col_major_alias() {
    let mut desc = export_vec_with_layout(
        vec![1f32, 4.0, 2.0, 5.0, 3.0, 6.0],
        Layout::col_major((2, 3)),
    )
    .unwrap();
    {
        let mut m = as_col_major_mut::<f32>(&mut desc).unwrap();
        m.view_mut()[[0, 0]] = 99.0;
    }
    let seen = as_strided::<f32>(&desc).unwrap();
    assert_eq!(seen.view()[[0, 0]], 99.0);
    assert_eq!(seen.view()[[1, 2]], 6.0);
}

#[test]
fn test_map_matrix_doubles_in_place() {
    let mut desc = export_vec(vec![1f32, 2.0, 3.0, 4.0, 5.0, 6.0], (2, 3)).unwrap();
    let mut m = as_row_major_mut::<f32>(&mut desc).unwrap();
    m.view_mut().mapv_inplace(|x| x * 2.0);
    drop(m);
    let again = as_row_major::<f32>(&desc).unwrap();
    assert_eq!(again.view()[[0, 0]], 2.0);
    assert_eq!(again.view()[[1, 2]], 12.0);
}

#[test]
fn test_vector_round_trip() {
    let mut created = export_array(Array1::from_shape_fn(5, |i| i as f32 + 1.0)).unwrap();
    let mut v = as_vector_mut::<f32>(&mut created).unwrap();
    assert_eq!(v.view().to_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    v.view_mut()[0] = 99.0;
    drop(v);
    assert_eq!(as_vector::<f32>(&created).unwrap().view()[0], 99.0);
}

#[test]
fn test_writable_aliases_take_turns() {
    let mut desc = export_array(rowmajor(2, 2)).unwrap();
    let held = as_row_major::<f32>(&desc).unwrap();
    assert!(matches!(
        as_row_major_mut::<f32>(&mut desc),
        Err(LayoutError::Shared { .. })
    ));
    drop(held);

    let mut a = as_row_major_mut::<f32>(&mut desc).unwrap();
    a.view_mut()[[0, 0]] = 10.0;
    drop(a);
    let mut b = as_row_major_mut::<f32>(&mut desc).unwrap();
    b.view_mut()[[0, 0]] += 5.0;
    assert_eq!(b.view()[[0, 0]], 15.0);
}

#[test]
fn test_alias_outlives_descriptor() {
    let desc = export_array(rowmajor(2, 2)).unwrap();
    let token = desc.owner().unwrap().clone();
    let m = as_row_major::<f32>(&desc).unwrap();
    drop(desc);
    assert!(!token.is_finalized());
    assert_eq!(m.view()[[1, 1]], 4.0);
    drop(m);
    assert!(token.is_finalized());
}

#[test]
fn test_sum_of_col_major_matrices() {
    let a = export_array(colmajor(3, 4)).unwrap();
    let b = export_array(colmajor(3, 4)).unwrap();
    let out = sum(
        &as_col_major::<f32>(&a).unwrap(),
        &as_col_major::<f32>(&b).unwrap(),
    )
    .unwrap();
    assert!(out.is_contiguous(Order::ColMajor));
    let m = as_col_major::<f32>(&out).unwrap();
    assert_eq!(m.view()[[2, 3]], 24.0);
    assert_eq!(out.owner().unwrap().ref_count(), 2);
}
