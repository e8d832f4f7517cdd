//! Field arithmetic providers
//!
//! The coding core never does bulk GF(2^8) work itself. It asks a
//! [`FieldProvider`] for the generator matrix, for matrix inverses, for
//! single products while synthesizing rows, and for the table-driven bulk
//! multiply-accumulate that transforms fragment buffers.
//!
//! Two providers ship with the crate:
//! - [`NativeProvider`]: pure Rust with SIMD kernels
//! - [`IsalProvider`]: the system ISA-L library bound at runtime

pub mod isal;
pub mod native;

pub use isal::IsalProvider;
pub use native::NativeProvider;

use crate::error::{ErasureError, Result};
use crate::reed_solomon::matrix::Matrix;
use crate::reed_solomon::scalar::{build_mul_table, TABLE_BYTES};

/// GF(2^8) capabilities the erasure code is built on
pub trait FieldProvider: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// Systematic `rows × cols` generator: identity on top, parity rows below
    fn generate_matrix(&self, rows: usize, cols: usize) -> Result<Matrix>;

    /// Inverse of a square matrix, [`ErasureError::Singular`] if there is none
    fn invert(&self, matrix: &Matrix) -> Result<Matrix>;

    /// Single element product
    fn multiply(&self, a: u8, b: u8) -> u8;

    /// Expand every coefficient of `coefficients` into its lookup table
    fn expand_tables(&self, coefficients: &Matrix) -> Result<GfTables>;

    /// `outputs[r][b] = XOR over i of coef[r][i] · inputs[i][b]` for `b < block_size`
    ///
    /// Outputs are overwritten with the accumulated sum; bytes past
    /// `block_size` are left alone.
    fn multiply_accumulate(
        &self,
        block_size: usize,
        tables: &GfTables,
        inputs: &[&[u8]],
        outputs: &mut [&mut [u8]],
    ) -> Result<()>;
}

/// Expanded multiplication tables for a coefficient matrix
///
/// 32 bytes per coefficient, row-major, in the layout ISA-L's
/// `ec_init_tables` produces.
#[derive(Clone)]
pub struct GfTables {
    outputs: usize,
    inputs: usize,
    bytes: Vec<u8>,
}

impl GfTables {
    /// Zeroed tables for an `outputs × inputs` coefficient matrix
    pub fn zeroed(outputs: usize, inputs: usize) -> Result<Self> {
        let len = outputs * inputs * TABLE_BYTES;
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|_| ErasureError::AllocationFailure { bytes: len })?;
        bytes.resize(len, 0);
        Ok(Self {
            outputs,
            inputs,
            bytes,
        })
    }

    /// Build tables in Rust from a coefficient matrix
    pub fn from_matrix(coefficients: &Matrix) -> Result<Self> {
        let mut tables = Self::zeroed(coefficients.rows(), coefficients.cols())?;
        for (chunk, &coefficient) in tables
            .bytes
            .chunks_exact_mut(TABLE_BYTES)
            .zip(coefficients.as_slice())
        {
            chunk.copy_from_slice(&build_mul_table(coefficient));
        }
        Ok(tables)
    }

    /// Number of output rows
    #[inline]
    pub fn outputs(&self) -> usize {
        self.outputs
    }

    /// Number of input columns
    #[inline]
    pub fn inputs(&self) -> usize {
        self.inputs
    }

    /// Table for coefficient `(row, col)`
    #[inline]
    pub fn table(&self, row: usize, col: usize) -> &[u8] {
        let start = (row * self.inputs + col) * TABLE_BYTES;
        &self.bytes[start..start + TABLE_BYTES]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl std::fmt::Debug for GfTables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GfTables")
            .field("outputs", &self.outputs)
            .field("inputs", &self.inputs)
            .finish()
    }
}

/// Shape checks shared by every provider's bulk transform
pub(crate) fn check_bulk_shapes(
    block_size: usize,
    tables: &GfTables,
    inputs: &[&[u8]],
    outputs: &[&mut [u8]],
) -> Result<()> {
    if tables.inputs() != inputs.len() || tables.outputs() != outputs.len() {
        return Err(ErasureError::DimensionMismatch(format!(
            "tables are {}x{}, buffers are {}x{}",
            tables.outputs(),
            tables.inputs(),
            outputs.len(),
            inputs.len()
        )));
    }
    if let Some((index, buf)) = inputs
        .iter()
        .map(|b| b.len())
        .chain(outputs.iter().map(|b| b.len()))
        .enumerate()
        .find(|(_, len)| *len < block_size)
    {
        return Err(ErasureError::BufferTooSmall {
            index,
            len: buf,
            block_size,
        });
    }
    Ok(())
}
