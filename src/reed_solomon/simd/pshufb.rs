//! PSHUFB-based GF(2^8) multiply-add for x86_64
//!
//! Each input byte is split into its low and high nibble; the two nibbles
//! index the two 16-byte halves of the coefficient's table with one shuffle
//! each, and the two results XOR into the product.

use super::super::scalar::process_slice_multiply_add_scalar;
use std::arch::x86_64::*;

/// AVX2 multiply-add, 32 bytes per iteration
///
/// # Safety
/// - Requires AVX2 CPU support
/// - `table` must hold at least 32 bytes
/// - `input` and `output` must have the same length
#[target_feature(enable = "avx2", enable = "ssse3")]
pub unsafe fn process_slice_multiply_add_avx2(input: &[u8], output: &mut [u8], table: &[u8]) {
    let len = input.len().min(output.len());
    let avx_end = (len / 32) * 32;

    // Broadcast 128-bit tables to both lanes
    let low = _mm256_broadcastsi128_si256(_mm_loadu_si128(table.as_ptr() as *const __m128i));
    let high =
        _mm256_broadcastsi128_si256(_mm_loadu_si128(table.as_ptr().add(16) as *const __m128i));
    let mask = _mm256_set1_epi8(0x0F);

    let mut pos = 0;
    while pos < avx_end {
        let x = _mm256_loadu_si256(input.as_ptr().add(pos) as *const __m256i);
        let lo_nib = _mm256_and_si256(x, mask);
        let hi_nib = _mm256_and_si256(_mm256_srli_epi64(x, 4), mask);
        let product = _mm256_xor_si256(
            _mm256_shuffle_epi8(low, lo_nib),
            _mm256_shuffle_epi8(high, hi_nib),
        );

        let out_ptr = output.as_mut_ptr().add(pos) as *mut __m256i;
        let acc = _mm256_loadu_si256(out_ptr as *const __m256i);
        _mm256_storeu_si256(out_ptr, _mm256_xor_si256(acc, product));
        pos += 32;
    }

    if avx_end < len {
        process_slice_multiply_add_ssse3(&input[avx_end..len], &mut output[avx_end..len], table);
    }
}

/// SSSE3 multiply-add, 16 bytes per iteration
///
/// # Safety
/// - Requires SSSE3 CPU support
/// - `table` must hold at least 32 bytes
#[target_feature(enable = "ssse3")]
pub unsafe fn process_slice_multiply_add_ssse3(input: &[u8], output: &mut [u8], table: &[u8]) {
    let len = input.len().min(output.len());
    let sse_end = (len / 16) * 16;

    let low = _mm_loadu_si128(table.as_ptr() as *const __m128i);
    let high = _mm_loadu_si128(table.as_ptr().add(16) as *const __m128i);
    let mask = _mm_set1_epi8(0x0F);

    let mut pos = 0;
    while pos < sse_end {
        let x = _mm_loadu_si128(input.as_ptr().add(pos) as *const __m128i);
        let lo_nib = _mm_and_si128(x, mask);
        let hi_nib = _mm_and_si128(_mm_srli_epi64(x, 4), mask);
        let product = _mm_xor_si128(_mm_shuffle_epi8(low, lo_nib), _mm_shuffle_epi8(high, hi_nib));

        let out_ptr = output.as_mut_ptr().add(pos) as *mut __m128i;
        let acc = _mm_loadu_si128(out_ptr as *const __m128i);
        _mm_storeu_si128(out_ptr, _mm_xor_si128(acc, product));
        pos += 16;
    }

    if sse_end < len {
        process_slice_multiply_add_scalar(
            &input[sse_end..len],
            &mut output[sse_end..len],
            table,
        );
    }
}
