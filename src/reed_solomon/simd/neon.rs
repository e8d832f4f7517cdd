//! NEON GF(2^8) multiply-add for AArch64
//!
//! Uses `vqtbl1q_u8` as a 16-entry nibble lookup, the ARM counterpart of
//! PSHUFB.

use super::super::scalar::process_slice_multiply_add_scalar;
use std::arch::aarch64::*;

/// NEON multiply-add, 16 bytes per iteration
///
/// # Safety
/// - Requires NEON CPU support
/// - `table` must hold at least 32 bytes
#[target_feature(enable = "neon")]
pub unsafe fn process_slice_multiply_add_neon(input: &[u8], output: &mut [u8], table: &[u8]) {
    let len = input.len().min(output.len());
    let simd_bytes = (len / 16) * 16;

    let low = vld1q_u8(table.as_ptr());
    let high = vld1q_u8(table.as_ptr().add(16));
    let mask = vdupq_n_u8(0x0F);

    let mut idx = 0;
    while idx < simd_bytes {
        let x = vld1q_u8(input.as_ptr().add(idx));
        let acc = vld1q_u8(output.as_ptr().add(idx));

        let lo_nib = vandq_u8(x, mask);
        let hi_nib = vshrq_n_u8(x, 4);
        let product = veorq_u8(vqtbl1q_u8(low, lo_nib), vqtbl1q_u8(high, hi_nib));

        vst1q_u8(output.as_mut_ptr().add(idx), veorq_u8(acc, product));
        idx += 16;
    }

    if idx < len {
        process_slice_multiply_add_scalar(&input[idx..len], &mut output[idx..len], table);
    }
}
