use nalgebra_sparse::CscMatrix;
use nalgebra_sparse::pattern::SparsityPattern;

/// Horizontally concatenates CSC matrices with equal row counts.
///
/// Columns of each input stay contiguous, so the output is assembled by
/// appending value/row-index arrays and shifting the column offsets.
pub(crate) fn csc_hstack<T: Clone>(matrices: &[&CscMatrix<T>]) -> CscMatrix<T> {
    let nrows = matrices[0].nrows();
    let mut ncols = 0;
    let mut nnz = 0;
    for mat in matrices {
        assert_eq!(mat.nrows(), nrows, "all matrices must have the same row count");
        ncols += mat.ncols();
        nnz += mat.nnz();
    }

    let mut values: Vec<T> = Vec::with_capacity(nnz);
    let mut row_indices: Vec<usize> = Vec::with_capacity(nnz);
    let mut col_offsets: Vec<usize> = Vec::with_capacity(ncols + 1);
    let mut offset = 0;
    for mat in matrices {
        col_offsets.extend(
            mat.col_offsets()[..mat.ncols()]
                .iter()
                .map(|x| x + offset),
        );
        row_indices.extend_from_slice(mat.row_indices());
        values.extend_from_slice(mat.values());
        offset += mat.nnz();
    }
    col_offsets.push(nnz);

    let pattern =
        SparsityPattern::try_from_offsets_and_indices(ncols, nrows, col_offsets, row_indices)
            .expect("stacked CSC pattern is consistent by construction");
    CscMatrix::try_from_pattern_and_values(pattern, values)
        .expect("value count matches pattern by construction")
}

/// Vertically concatenates CSC matrices with equal column counts.
///
/// Each output column interleaves the corresponding column of every input,
/// with row indices shifted by the cumulative row offset.
pub(crate) fn csc_vstack<T: Clone>(matrices: &[&CscMatrix<T>]) -> CscMatrix<T> {
    let ncols = matrices[0].ncols();
    let mut nrows = 0;
    let mut nnz = 0;
    for mat in matrices {
        assert_eq!(mat.ncols(), ncols, "all matrices must have the same column count");
        nrows += mat.nrows();
        nnz += mat.nnz();
    }

    let mut values: Vec<T> = Vec::with_capacity(nnz);
    let mut row_indices: Vec<usize> = Vec::with_capacity(nnz);
    let mut col_offsets: Vec<usize> = vec![0; ncols + 1];

    for col in 0..ncols {
        let mut row_offset = 0;
        let mut count = 0;
        for mat in matrices {
            let lo = mat.col_offsets()[col];
            let hi = mat.col_offsets()[col + 1];
            values.extend_from_slice(&mat.values()[lo..hi]);
            row_indices.extend(mat.row_indices()[lo..hi].iter().map(|r| r + row_offset));
            row_offset += mat.nrows();
            count += hi - lo;
        }
        col_offsets[col + 1] = col_offsets[col] + count;
    }

    let pattern =
        SparsityPattern::try_from_offsets_and_indices(ncols, nrows, col_offsets, row_indices)
            .expect("stacked CSC pattern is consistent by construction");
    CscMatrix::try_from_pattern_and_values(pattern, values)
        .expect("value count matches pattern by construction")
}
