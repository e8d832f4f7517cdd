//! Pure Rust field arithmetic
//!
//! Matrices follow ISA-L's `gf_gen_rs_matrix` construction so a session built
//! on this provider produces byte-identical parity to one built on the
//! system library. The bulk transform dispatches to the SIMD kernels and
//! spreads output fragments over the rayon pool when the work is large.

use super::{check_bulk_shapes, FieldProvider, GfTables};
use crate::error::Result;
use crate::reed_solomon::galois::gf_mul;
use crate::reed_solomon::matrix::{gen_rs_matrix, Matrix};
use crate::reed_solomon::scalar::table_coefficient;
use crate::reed_solomon::simd::process_slice_multiply_add;
use rayon::prelude::*;

/// Bytes of multiply-add work (block × inputs × outputs) before going parallel
pub const PARALLEL_THRESHOLD: usize = 1 << 20;

/// Built-in GF(2^8) provider
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeProvider;

impl NativeProvider {
    pub fn new() -> Self {
        Self
    }
}

impl FieldProvider for NativeProvider {
    fn name(&self) -> &str {
        "native"
    }

    fn generate_matrix(&self, rows: usize, cols: usize) -> Result<Matrix> {
        gen_rs_matrix(rows, cols)
    }

    fn invert(&self, matrix: &Matrix) -> Result<Matrix> {
        matrix.invert()
    }

    #[inline]
    fn multiply(&self, a: u8, b: u8) -> u8 {
        gf_mul(a, b)
    }

    fn expand_tables(&self, coefficients: &Matrix) -> Result<GfTables> {
        GfTables::from_matrix(coefficients)
    }

    fn multiply_accumulate(
        &self,
        block_size: usize,
        tables: &GfTables,
        inputs: &[&[u8]],
        outputs: &mut [&mut [u8]],
    ) -> Result<()> {
        check_bulk_shapes(block_size, tables, inputs, outputs)?;

        let work = block_size * inputs.len() * outputs.len();
        if work >= PARALLEL_THRESHOLD && outputs.len() > 1 {
            outputs
                .par_iter_mut()
                .enumerate()
                .for_each(|(row, output)| encode_row(block_size, tables, row, inputs, output));
        } else {
            for (row, output) in outputs.iter_mut().enumerate() {
                encode_row(block_size, tables, row, inputs, output);
            }
        }
        Ok(())
    }
}

/// Compute one output fragment from every input
fn encode_row(block_size: usize, tables: &GfTables, row: usize, inputs: &[&[u8]], output: &mut [u8]) {
    let output = &mut output[..block_size];
    output.fill(0);
    for (col, input) in inputs.iter().enumerate() {
        let table = tables.table(row, col);
        if table_coefficient(table) == 0 {
            continue;
        }
        process_slice_multiply_add(&input[..block_size], output, table);
    }
}
