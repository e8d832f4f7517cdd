//! Systematic Reed-Solomon erasure coding over GF(2^8)
//!
//! `k` data fragments are extended with `m` parity fragments using the
//! Vandermonde-style generator matrix of ISA-L's `gf_gen_rs_matrix`. Any `k`
//! of the `k + m` fragments are enough to rebuild the rest, either all at
//! once ([`ReedSolomonVand::decode`]) or one target at a time
//! ([`ReedSolomonVand::reconstruct`]).
//!
//! Field arithmetic is delegated to a [`FieldProvider`]: the built-in
//! [`NativeProvider`] or the system ISA-L library through [`IsalProvider`].

pub mod codec;
pub mod error;
pub mod fragment_file;
pub mod fragments;
pub mod provider;
pub mod reed_solomon;

pub use codec::{CodecConfig, ProviderKind, ReedSolomonVand};
pub use error::{ErasureError, FragmentKind, Result};
pub use fragments::{FragmentList, FragmentSet};
pub use provider::{FieldProvider, GfTables, IsalProvider, NativeProvider};
pub use reed_solomon::Matrix;
