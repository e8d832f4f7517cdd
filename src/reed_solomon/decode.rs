//! Decode matrix selection and inverse row synthesis
//!
//! ## Overview
//!
//! Decoding works on the `k` generator rows that belong to surviving
//! fragments. Inverting that `k × k` block gives, row by row, the
//! coefficients that rebuild each *data* fragment from the survivors.
//!
//! Missing *parity* needs one more step. The generator only expresses a parity
//! fragment in terms of data fragments:
//!
//! ```text
//! P = Σ_j G[p][j] · D_j
//! ```
//!
//! Surviving `D_j` contribute `G[p][j]` directly. A missing `D_j` is replaced
//! by its inverse row (itself a combination of survivors), scaled by
//! `G[p][j]`. The result is a row expressed purely over the survivors, so
//! data and parity rows can be applied in a single bulk transform.

use super::matrix::Matrix;
use crate::error::{ErasureError, Result};
use crate::fragments::FragmentSet;
use crate::provider::FieldProvider;
use log::trace;

/// Pick the generator rows of the first `k` surviving fragments
///
/// Rows keep their ascending index order, which is also the order the
/// surviving fragment buffers are fed to the bulk transform.
pub fn build_decode_matrix(generator: &Matrix, k: usize, missing: FragmentSet) -> Result<Matrix> {
    let mut decode = Matrix::zeroed(k, k)?;
    let mut selected = 0;

    for index in (0..generator.rows()).filter(|&i| !missing.contains(i)) {
        if selected == k {
            break;
        }
        decode.row_mut(selected).copy_from_slice(generator.row(index));
        selected += 1;
    }

    if selected != k {
        return Err(ErasureError::InsufficientFragments {
            needed: k,
            available: selected,
        });
    }

    Ok(decode)
}

/// Build one decoding row per missing fragment
///
/// Rows for missing data come first (ascending), then rows for missing parity
/// (ascending). Every row has `k` coefficients over the surviving fragments
/// in the order [`build_decode_matrix`] selected them.
pub fn synthesize_inverse_rows(
    provider: &dyn FieldProvider,
    k: usize,
    m: usize,
    decode_inverse: &Matrix,
    generator: &Matrix,
    missing: FragmentSet,
) -> Result<Matrix> {
    let n = k + m;
    if decode_inverse.rows() != k || decode_inverse.cols() != k {
        return Err(ErasureError::DimensionMismatch(format!(
            "decode inverse is {}x{}, expected {k}x{k}",
            decode_inverse.rows(),
            decode_inverse.cols()
        )));
    }
    if generator.rows() != n || generator.cols() != k {
        return Err(ErasureError::DimensionMismatch(format!(
            "generator is {}x{}, expected {n}x{k}",
            generator.rows(),
            generator.cols()
        )));
    }

    let missing_count = missing.count_in(0, n);
    let mut rows = Matrix::zeroed(missing_count, k)?;
    let mut next = 0;

    // Missing data: the inverse already rebuilds these
    for i in (0..k).filter(|&i| missing.contains(i)) {
        rows.row_mut(next).copy_from_slice(decode_inverse.row(i));
        next += 1;
    }
    let data_rows = next;

    // Missing parity: substitute missing data rows into the encode coefficients
    for p in (k..n).filter(|&p| missing.contains(p)) {
        let mut avail_rank = 0;
        let mut missing_rank = 0;

        for j in 0..k {
            let coefficient = generator.get(p, j);
            if !missing.contains(j) {
                let slot = rows.get(next, avail_rank) ^ coefficient;
                rows.set(next, avail_rank, slot);
                avail_rank += 1;
            } else {
                for c in 0..k {
                    let term = provider.multiply(coefficient, rows.get(missing_rank, c));
                    let value = rows.get(next, c) ^ term;
                    rows.set(next, c, value);
                }
                missing_rank += 1;
            }
        }
        next += 1;
    }

    trace!(
        "Synthesized {} data rows and {} parity rows",
        data_rows,
        next - data_rows
    );

    Ok(rows)
}

/// Position of `target` within the synthesized row set
pub fn inverse_row_position(missing: FragmentSet, target: usize) -> Option<usize> {
    if !missing.contains(target) {
        return None;
    }
    missing.iter().position(|index| index == target)
}
