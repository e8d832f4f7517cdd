//! Scalar GF(2^8) multiply-add kernels
//!
//! Every coefficient is expanded into a 32-byte nibble table (the ISA-L
//! `gf_vect_mul_init` layout):
//!
//! ```text
//! table[0..16]  = c · {0x00, 0x01, ..., 0x0F}
//! table[16..32] = c · {0x00, 0x10, ..., 0xF0}
//! c · x         = table[x & 0x0F] ^ table[16 + (x >> 4)]
//! ```
//!
//! The same table drives the scalar loop here and the PSHUFB kernels in
//! [`super::simd`].

use super::galois::gf_mul;

/// Bytes per expanded coefficient
pub const TABLE_BYTES: usize = 32;

/// Nibble lookup table for one coefficient
pub type MulTable = [u8; TABLE_BYTES];

/// Expand a coefficient into its nibble table
#[inline]
pub fn build_mul_table(coefficient: u8) -> MulTable {
    let mut table = [0u8; TABLE_BYTES];
    for nib in 0..16u8 {
        table[nib as usize] = gf_mul(coefficient, nib);
        table[16 + nib as usize] = gf_mul(coefficient, nib << 4);
    }
    table
}

/// Coefficient a table was built from
#[inline]
pub fn table_coefficient(table: &[u8]) -> u8 {
    table[1]
}

/// output ^= coefficient * input, one byte at a time
#[inline]
pub fn process_slice_multiply_add_scalar(input: &[u8], output: &mut [u8], table: &[u8]) {
    let (low, high) = table[..TABLE_BYTES].split_at(16);
    for (out, &x) in output.iter_mut().zip(input) {
        *out ^= low[(x & 0x0F) as usize] ^ high[(x >> 4) as usize];
    }
}
