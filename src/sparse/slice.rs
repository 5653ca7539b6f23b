use nalgebra::{ClosedAddAssign, Scalar};
use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_traits::Zero;

/// Extracts the column range `[start_col, end_col)` of a CSC matrix.
///
/// Column slicing is cheap in CSC form: the value and row-index arrays of
/// the selected columns are contiguous. An empty range yields an
/// `nrows x 0` matrix; a system with no PQ buses has no magnitude columns.
pub(crate) fn slice_csc_columns<T: Clone>(
    mat: &CscMatrix<T>,
    start_col: usize,
    end_col: usize,
) -> CscMatrix<T> {
    assert!(start_col <= end_col, "illegal column range");
    let lo = mat.col_offsets()[start_col];
    let hi = mat.col_offsets()[end_col];

    let values = mat.values()[lo..hi].to_vec();
    let row_indices = mat.row_indices()[lo..hi].to_vec();
    let col_offsets: Vec<_> = mat.col_offsets()[start_col..=end_col]
        .iter()
        .map(|&x| x - lo)
        .collect();

    CscMatrix::try_from_csc_data(
        mat.nrows(),
        end_col - start_col,
        col_offsets,
        row_indices,
        values,
    )
    .expect("sliced CSC data is consistent by construction")
}

/// Extracts the dense block starting at `start_pos` with the given `shape`.
pub(crate) fn slice_csc_block<T: Clone + Scalar + ClosedAddAssign + Zero>(
    mat: &CscMatrix<T>,
    start_pos: (usize, usize),
    shape: (usize, usize),
) -> CscMatrix<T> {
    let (start_row, start_col) = start_pos;
    let (end_row, end_col) = (start_row + shape.0, start_col + shape.1);

    let mut coo = CooMatrix::new(shape.0, shape.1);
    for (r, c, v) in mat.triplet_iter() {
        if r >= start_row && r < end_row && c >= start_col && c < end_col {
            coo.push(r - start_row, c - start_col, v.clone());
        }
    }
    CscMatrix::from(&coo)
}
