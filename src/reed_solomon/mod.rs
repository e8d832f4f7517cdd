//! Reed-Solomon coding core
//!
//! GF(2^8) arithmetic, the ISA-L style generator matrix, decode matrix
//! selection, inverse row synthesis, and the table-driven multiply-add
//! kernels the native provider runs on.

pub mod decode;
pub mod galois;
pub mod matrix;
pub mod scalar;
pub mod simd;

pub use decode::{build_decode_matrix, inverse_row_position, synthesize_inverse_rows};
pub use galois::{gf_inv, gf_mul};
pub use matrix::{gen_rs_matrix, Matrix};
pub use simd::{detect_simd_support, SimdLevel};
