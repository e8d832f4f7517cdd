//! Row-major GF(2^8) matrices
//!
//! [`Matrix`] stores its elements as a flat `Vec<u8>` in the same layout ISA-L
//! expects (`a[row * cols + col]`), so a matrix can be handed to a native
//! library without copying element by element.
//!
//! Scratch matrices reserve their storage with `try_reserve_exact`; running
//! out of memory surfaces as [`ErasureError::AllocationFailure`].

use super::galois::{gf_inv, gf_mul};
use crate::error::{ErasureError, Result};

/// Dense `rows × cols` matrix over GF(2^8)
#[derive(Clone, PartialEq, Eq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<u8>,
}

impl Matrix {
    /// Zero matrix
    pub fn zeroed(rows: usize, cols: usize) -> Result<Self> {
        let len = rows
            .checked_mul(cols)
            .ok_or(ErasureError::AllocationFailure { bytes: usize::MAX })?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| ErasureError::AllocationFailure { bytes: len })?;
        data.resize(len, 0);
        Ok(Self { rows, cols, data })
    }

    /// Wrap an existing row-major buffer
    pub fn from_vec(rows: usize, cols: usize, data: Vec<u8>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(ErasureError::DimensionMismatch(format!(
                "{} elements cannot form a {rows}x{cols} matrix",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    pub fn identity(size: usize) -> Result<Self> {
        let mut matrix = Self::zeroed(size, size)?;
        for i in 0..size {
            matrix.set(i, i, 1);
        }
        Ok(matrix)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: u8) {
        self.data[row * self.cols + col] = value;
    }

    #[inline]
    pub fn row(&self, row: usize) -> &[u8] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [u8] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Copy of rows `start..end`
    pub fn sub_rows(&self, start: usize, end: usize) -> Result<Self> {
        if start > end || end > self.rows {
            return Err(ErasureError::DimensionMismatch(format!(
                "rows {start}..{end} outside a {}-row matrix",
                self.rows
            )));
        }
        let mut sub = Self::zeroed(end - start, self.cols)?;
        sub.data
            .copy_from_slice(&self.data[start * self.cols..end * self.cols]);
        Ok(sub)
    }

    /// First of rows `0..cols` that differs from the identity
    pub fn first_non_identity_row(&self) -> Option<usize> {
        (0..self.cols.min(self.rows)).find(|&row| {
            self.row(row)
                .iter()
                .enumerate()
                .any(|(col, &v)| v != u8::from(col == row))
        })
    }

    /// Matrix product over GF(2^8)
    pub fn multiply(&self, rhs: &Matrix) -> Result<Matrix> {
        if self.cols != rhs.rows {
            return Err(ErasureError::DimensionMismatch(format!(
                "cannot multiply {}x{} by {}x{}",
                self.rows, self.cols, rhs.rows, rhs.cols
            )));
        }
        let mut out = Self::zeroed(self.rows, rhs.cols)?;
        for r in 0..self.rows {
            for i in 0..self.cols {
                let a = self.get(r, i);
                if a == 0 {
                    continue;
                }
                for c in 0..rhs.cols {
                    out.data[r * rhs.cols + c] ^= gf_mul(a, rhs.get(i, c));
                }
            }
        }
        Ok(out)
    }

    /// Gauss-Jordan inverse of a square matrix
    pub fn invert(&self) -> Result<Matrix> {
        let n = self.rows;
        if n != self.cols {
            return Err(ErasureError::DimensionMismatch(format!(
                "cannot invert a non-square {}x{} matrix",
                self.rows, self.cols
            )));
        }

        let mut work = self.clone();
        let mut inverse = Self::identity(n)?;

        for col in 0..n {
            // Find pivot
            let pivot_row = (col..n)
                .find(|&row| work.get(row, col) != 0)
                .ok_or(ErasureError::Singular)?;

            if pivot_row != col {
                work.swap_rows(col, pivot_row);
                inverse.swap_rows(col, pivot_row);
            }

            // Scale pivot row
            let pivot_inv = gf_inv(work.get(col, col)).ok_or(ErasureError::Singular)?;
            for j in 0..n {
                work.set(col, j, gf_mul(work.get(col, j), pivot_inv));
                inverse.set(col, j, gf_mul(inverse.get(col, j), pivot_inv));
            }

            // Eliminate column in other rows
            for row in 0..n {
                if row == col {
                    continue;
                }
                let factor = work.get(row, col);
                if factor == 0 {
                    continue;
                }
                for j in 0..n {
                    let w = work.get(row, j) ^ gf_mul(factor, work.get(col, j));
                    work.set(row, j, w);
                    let v = inverse.get(row, j) ^ gf_mul(factor, inverse.get(col, j));
                    inverse.set(row, j, v);
                }
            }
        }

        Ok(inverse)
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let cols = self.cols;
        let (lo, hi) = (a.min(b), a.max(b));
        let (head, tail) = self.data.split_at_mut(hi * cols);
        head[lo * cols..(lo + 1) * cols].swap_with_slice(&mut tail[..cols]);
    }
}

impl std::fmt::Debug for Matrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Matrix {}x{}", self.rows, self.cols)?;
        for row in 0..self.rows {
            writeln!(f, "  {:02x?}", self.row(row))?;
        }
        Ok(())
    }
}

/// ISA-L style systematic Vandermonde generator (`gf_gen_rs_matrix`)
///
/// Rows `0..cols` are the identity. Parity row `i` holds `gen^j` in column
/// `j`, where `gen = 2^(i - cols)`.
pub fn gen_rs_matrix(rows: usize, cols: usize) -> Result<Matrix> {
    let mut matrix = Matrix::zeroed(rows, cols)?;
    for i in 0..cols.min(rows) {
        matrix.set(i, i, 1);
    }

    let mut gen = 1u8;
    for i in cols..rows {
        let mut p = 1u8;
        for j in 0..cols {
            matrix.set(i, j, p);
            p = gf_mul(p, gen);
        }
        gen = gf_mul(gen, 2);
    }
    Ok(matrix)
}
