//! SIMD-optimized GF(2^8) multiply-add
//!
//! Provides platform-specific implementations with runtime dispatch:
//! - x86_64: AVX2 PSHUFB → SSSE3 PSHUFB → scalar
//! - ARM64: NEON `vqtbl1q_u8` → scalar
//! - Other: scalar
//!
//! Based on the "Screaming Fast Galois Field Arithmetic" paper: a GF(2^8)
//! product is two 16-entry nibble lookups XORed together, and a 16-entry
//! lookup is exactly what a byte shuffle instruction does.

#[cfg(target_arch = "aarch64")]
pub mod neon;
#[cfg(target_arch = "x86_64")]
pub mod pshufb;

use super::scalar::process_slice_multiply_add_scalar;
use log::trace;
use std::sync::OnceLock;

/// SIMD implementation to use for the current platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdLevel {
    /// No SIMD available, use scalar fallback
    None,
    /// x86_64 SSSE3 (128-bit PSHUFB)
    Ssse3,
    /// x86_64 AVX2 (256-bit PSHUFB)
    Avx2,
    /// AArch64 NEON (128-bit TBL)
    Neon,
}

static SIMD_LEVEL: OnceLock<SimdLevel> = OnceLock::new();

/// Detect best available SIMD implementation for current platform
pub fn detect_simd_support() -> SimdLevel {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("ssse3") {
            return SimdLevel::Avx2;
        }
        if is_x86_feature_detected!("ssse3") {
            return SimdLevel::Ssse3;
        }
        return SimdLevel::None;
    }

    #[cfg(target_arch = "aarch64")]
    {
        if std::arch::is_aarch64_feature_detected!("neon") {
            return SimdLevel::Neon;
        }
        return SimdLevel::None;
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        SimdLevel::None
    }
}

/// Cached detection result
pub fn simd_level() -> SimdLevel {
    *SIMD_LEVEL.get_or_init(|| {
        let level = detect_simd_support();
        trace!("GF(2^8) kernels using {:?}", level);
        level
    })
}

/// output ^= coefficient * input, with the coefficient given as a 32-byte nibble table
///
/// Processes `min(input.len(), output.len())` bytes.
#[inline]
pub fn process_slice_multiply_add(input: &[u8], output: &mut [u8], table: &[u8]) {
    process_slice_multiply_add_simd(input, output, table, simd_level());
}

/// Same as [`process_slice_multiply_add`] with an explicit implementation choice
///
/// Levels the CPU does not support fall back to scalar code.
#[doc(hidden)]
pub fn process_slice_multiply_add_simd(
    input: &[u8],
    output: &mut [u8],
    table: &[u8],
    simd_level: SimdLevel,
) {
    let len = input.len().min(output.len());
    let (input, output) = (&input[..len], &mut output[..len]);

    match simd_level {
        #[cfg(target_arch = "x86_64")]
        SimdLevel::Avx2 if is_x86_feature_detected!("avx2") => {
            // SAFETY: AVX2 support checked above
            unsafe { pshufb::process_slice_multiply_add_avx2(input, output, table) }
        }
        #[cfg(target_arch = "x86_64")]
        SimdLevel::Ssse3 if is_x86_feature_detected!("ssse3") => {
            // SAFETY: SSSE3 support checked above
            unsafe { pshufb::process_slice_multiply_add_ssse3(input, output, table) }
        }
        #[cfg(target_arch = "aarch64")]
        SimdLevel::Neon => {
            // SAFETY: NEON is part of the AArch64 baseline
            unsafe { neon::process_slice_multiply_add_neon(input, output, table) }
        }
        _ => process_slice_multiply_add_scalar(input, output, table),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reed_solomon::galois::gf_mul;
    use crate::reed_solomon::scalar::build_mul_table;

    fn reference(input: &[u8], output: &[u8], coeff: u8) -> Vec<u8> {
        input
            .iter()
            .zip(output)
            .map(|(&x, &o)| o ^ gf_mul(coeff, x))
            .collect()
    }

    #[test]
    fn detect_simd_support_is_stable() {
        assert_eq!(detect_simd_support(), detect_simd_support());
        assert_eq!(simd_level(), detect_simd_support());
    }

    #[test]
    fn every_level_matches_reference() {
        let input: Vec<u8> = (0..1000u32).map(|i| (i * 7 + 3) as u8).collect();
        let start: Vec<u8> = (0..1000u32).map(|i| (i * 13) as u8).collect();

        for coeff in [0u8, 1, 2, 0x53, 0xFF] {
            let table = build_mul_table(coeff);
            let expected = reference(&input, &start, coeff);
            for level in [
                SimdLevel::None,
                SimdLevel::Ssse3,
                SimdLevel::Avx2,
                SimdLevel::Neon,
            ] {
                let mut output = start.clone();
                process_slice_multiply_add_simd(&input, &mut output, &table, level);
                assert_eq!(output, expected, "{level:?} coeff {coeff:#x}");
            }
        }
    }

    #[test]
    fn short_and_empty_buffers() {
        let table = build_mul_table(9);
        let mut empty: Vec<u8> = vec![];
        process_slice_multiply_add(&[], &mut empty, &table);

        let input = [1u8, 2, 3];
        let mut output = [0u8; 3];
        process_slice_multiply_add(&input, &mut output, &table);
        assert_eq!(output.to_vec(), reference(&input, &[0, 0, 0], 9));
    }

    #[test]
    fn processes_only_common_length() {
        let table = build_mul_table(1);
        let input = [0xFFu8; 40];
        let mut output = [0u8; 33];
        process_slice_multiply_add(&input, &mut output, &table);
        assert!(output.iter().all(|&b| b == 0xFF));
    }
}
