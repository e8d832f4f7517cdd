//! Encode, decode and reconstruct sessions
//!
//! A [`ReedSolomonVand`] owns the `n × k` generator matrix for one `(k, m)`
//! configuration and the field arithmetic provider that does the bulk work.
//! Sessions are immutable after construction; every operation takes `&self`
//! and keeps its scratch matrices and tables local to the call.
//!
//! ## Usage
//!
//! ```
//! use rsvand::ReedSolomonVand;
//!
//! let codec = ReedSolomonVand::new(4, 2).unwrap();
//! let data: Vec<Vec<u8>> = (0..4).map(|i| vec![i as u8 + 1; 64]).collect();
//! let mut parity = vec![vec![0u8; 64]; 2];
//!
//! let inputs: Vec<&[u8]> = data.iter().map(|d| d.as_slice()).collect();
//! let mut outputs: Vec<&mut [u8]> = parity.iter_mut().map(|p| p.as_mut_slice()).collect();
//! codec.encode(&inputs, &mut outputs, 64).unwrap();
//!
//! // Lose data fragment 1 and parity fragment 0, then rebuild both
//! let mut damaged = data.clone();
//! damaged[1].fill(0);
//! parity[0].fill(0);
//! let mut d: Vec<&mut [u8]> = damaged.iter_mut().map(|b| b.as_mut_slice()).collect();
//! let mut p: Vec<&mut [u8]> = parity.iter_mut().map(|b| b.as_mut_slice()).collect();
//! codec.decode(&mut d, &mut p, &[1, 4], 64).unwrap();
//! assert_eq!(damaged, data);
//! ```

use crate::error::{ErasureError, FragmentKind, Result};
use crate::fragments::{FragmentList, FragmentSet, MAX_FRAGMENTS};
use crate::provider::{FieldProvider, GfTables, IsalProvider, NativeProvider};
use crate::reed_solomon::decode::{
    build_decode_matrix, inverse_row_position, synthesize_inverse_rows,
};
use crate::reed_solomon::matrix::Matrix;
use log::debug;
use std::path::PathBuf;
use std::sync::Arc;

/// Bits per field element
pub const ELEMENT_SIZE: u32 = 8;

/// Largest `k + m` GF(2^8) can support
pub const MAX_FIELD_FRAGMENTS: usize = 256;

/// Which field arithmetic provider a session should use
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProviderKind {
    /// Built-in Rust implementation
    #[default]
    Native,
    /// System ISA-L; `None` tries the platform's usual library names
    Isal(Option<PathBuf>),
}

impl ProviderKind {
    /// Bind the provider this kind names
    pub fn load(&self) -> Result<Arc<dyn FieldProvider>> {
        match self {
            ProviderKind::Native => Ok(Arc::new(NativeProvider::new())),
            ProviderKind::Isal(Some(path)) => Ok(Arc::new(IsalProvider::load(path)?)),
            ProviderKind::Isal(None) => Ok(Arc::new(IsalProvider::load_default()?)),
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    pub k: usize,
    pub m: usize,
    pub provider: ProviderKind,
}

impl CodecConfig {
    pub fn new(k: usize, m: usize) -> Self {
        Self {
            k,
            m,
            provider: ProviderKind::Native,
        }
    }

    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = provider;
        self
    }

    /// Bind the provider and build the session
    pub fn build(&self) -> Result<ReedSolomonVand> {
        check_configuration(self.k, self.m)?;
        ReedSolomonVand::with_provider(self.k, self.m, self.provider.load()?)
    }
}

fn check_configuration(k: usize, m: usize) -> Result<()> {
    let invalid = |reason: &str| ErasureError::InvalidConfiguration {
        k,
        m,
        reason: reason.to_string(),
    };

    if k == 0 {
        return Err(invalid("at least one data fragment is required"));
    }
    if m == 0 {
        return Err(invalid("at least one parity fragment is required"));
    }
    let n = k.checked_add(m).ok_or_else(|| invalid("fragment count overflows"))?;
    if n > MAX_FIELD_FRAGMENTS {
        return Err(invalid("k + m exceeds the 256 elements of GF(2^8)"));
    }
    if n > MAX_FRAGMENTS {
        return Err(invalid("k + m exceeds the 64-bit fragment set capacity"));
    }
    Ok(())
}

/// Systematic Reed-Solomon session over GF(2^8) with a Vandermonde generator
pub struct ReedSolomonVand {
    k: usize,
    m: usize,
    generator: Matrix,
    encode_tables: GfTables,
    provider: Arc<dyn FieldProvider>,
}

impl ReedSolomonVand {
    /// Session on the built-in provider
    pub fn new(k: usize, m: usize) -> Result<Self> {
        Self::with_provider(k, m, Arc::new(NativeProvider::new()))
    }

    /// Session on the system ISA-L library
    pub fn with_isal(k: usize, m: usize) -> Result<Self> {
        check_configuration(k, m)?;
        Self::with_provider(k, m, Arc::new(IsalProvider::load_default()?))
    }

    /// Session on an arbitrary provider
    ///
    /// Builds the generator once and rejects it unless its top `k × k`
    /// block is the identity.
    pub fn with_provider(k: usize, m: usize, provider: Arc<dyn FieldProvider>) -> Result<Self> {
        check_configuration(k, m)?;
        let n = k + m;

        let generator = provider.generate_matrix(n, k)?;
        if generator.rows() != n || generator.cols() != k {
            return Err(ErasureError::DimensionMismatch(format!(
                "provider {} produced a {}x{} generator, expected {n}x{k}",
                provider.name(),
                generator.rows(),
                generator.cols()
            )));
        }
        if let Some(row) = generator.first_non_identity_row() {
            return Err(ErasureError::NonSystematic { row });
        }

        let encode_tables = provider.expand_tables(&generator.sub_rows(k, n)?)?;

        debug!(
            "Created Reed-Solomon session k={} m={} provider={}",
            k,
            m,
            provider.name()
        );

        Ok(Self {
            k,
            m,
            generator,
            encode_tables,
            provider,
        })
    }

    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    #[inline]
    pub fn m(&self) -> usize {
        self.m
    }

    #[inline]
    pub fn n(&self) -> usize {
        self.k + self.m
    }

    /// The `n × k` generator matrix
    pub fn generator(&self) -> &Matrix {
        &self.generator
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Bits per field element, always 8
    pub fn element_size(&self) -> u32 {
        ELEMENT_SIZE
    }

    /// Compute all `m` parity fragments from the `k` data fragments
    pub fn encode(&self, data: &[&[u8]], parity: &mut [&mut [u8]], block_size: usize) -> Result<()> {
        check_count(FragmentKind::Data, self.k, data.len())?;
        check_count(FragmentKind::Parity, self.m, parity.len())?;
        check_lengths(
            data.iter()
                .map(|b| b.len())
                .chain(parity.iter().map(|b| b.len())),
            block_size,
        )?;

        self.provider
            .multiply_accumulate(block_size, &self.encode_tables, data, parity)
    }

    /// Regenerate every fragment listed in `missing`
    ///
    /// Missing buffers are overwritten with their reconstructed contents;
    /// surviving buffers are only read. An empty `missing` list is a no-op.
    pub fn decode(
        &self,
        data: &mut [&mut [u8]],
        parity: &mut [&mut [u8]],
        missing: &[usize],
        block_size: usize,
    ) -> Result<()> {
        let missing = self.check_decode_call(data, parity, missing, block_size)?;
        if missing.is_empty() {
            return Ok(());
        }

        let rows = self.inverse_rows(missing)?;
        let tables = self.provider.expand_tables(&rows)?;

        debug!(
            "Decoding {} missing fragments {:?}",
            missing.len(),
            missing.to_list().as_slice()
        );

        let (inputs, mut outputs) = partition(data, parity, self.k, missing, |_| true);
        self.provider
            .multiply_accumulate(block_size, &tables, &inputs, &mut outputs)
    }

    /// Regenerate only fragment `target`, which must be listed in `missing`
    ///
    /// Other missing buffers are left untouched.
    pub fn reconstruct(
        &self,
        data: &mut [&mut [u8]],
        parity: &mut [&mut [u8]],
        missing: &[usize],
        target: usize,
        block_size: usize,
    ) -> Result<()> {
        let missing = self.check_decode_call(data, parity, missing, block_size)?;
        if target >= self.n() {
            return Err(ErasureError::InvalidIndex {
                index: target,
                reason: "out of range",
            });
        }
        let position = inverse_row_position(missing, target).ok_or(ErasureError::InvalidIndex {
            index: target,
            reason: "not among the missing fragments",
        })?;

        let rows = self.inverse_rows(missing)?;
        let tables = self
            .provider
            .expand_tables(&rows.sub_rows(position, position + 1)?)?;

        debug!(
            "Reconstructing fragment {} with {} missing",
            target,
            missing.len()
        );

        let (inputs, mut outputs) = partition(data, parity, self.k, missing, |i| i == target);
        self.provider
            .multiply_accumulate(block_size, &tables, &inputs, &mut outputs)
    }

    /// The `k` lowest fragment indices outside `missing ∪ excluded`
    pub fn min_fragments_needed(&self, missing: &[usize], excluded: &[usize]) -> Result<FragmentList> {
        let n = self.n();
        let unusable =
            FragmentSet::from_indices(missing, n)?.union(FragmentSet::from_indices(excluded, n)?);

        let needed: FragmentList = (0..n)
            .filter(|&i| !unusable.contains(i))
            .take(self.k)
            .collect();

        if needed.len() < self.k {
            return Err(ErasureError::InsufficientFragments {
                needed: self.k,
                available: needed.len(),
            });
        }
        Ok(needed)
    }

    /// Shared validation for decode and reconstruct, run before any write
    fn check_decode_call(
        &self,
        data: &[&mut [u8]],
        parity: &[&mut [u8]],
        missing: &[usize],
        block_size: usize,
    ) -> Result<FragmentSet> {
        check_count(FragmentKind::Data, self.k, data.len())?;
        check_count(FragmentKind::Parity, self.m, parity.len())?;

        let missing = FragmentSet::from_indices(missing, self.n())?;
        if missing.len() > self.m {
            return Err(ErasureError::InsufficientFragments {
                needed: self.k,
                available: self.n() - missing.len(),
            });
        }

        check_lengths(
            data.iter()
                .map(|b| b.len())
                .chain(parity.iter().map(|b| b.len())),
            block_size,
        )?;
        Ok(missing)
    }

    /// Decode inverse rows for a missing set, over the first `k` survivors
    fn inverse_rows(&self, missing: FragmentSet) -> Result<Matrix> {
        let decode = build_decode_matrix(&self.generator, self.k, missing)?;
        let inverse = self.provider.invert(&decode)?;
        synthesize_inverse_rows(
            self.provider.as_ref(),
            self.k,
            self.m,
            &inverse,
            &self.generator,
            missing,
        )
    }
}

impl std::fmt::Debug for ReedSolomonVand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReedSolomonVand")
            .field("k", &self.k)
            .field("m", &self.m)
            .field("provider", &self.provider.name())
            .finish()
    }
}

fn check_count(kind: FragmentKind, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(ErasureError::FragmentCountMismatch {
            kind,
            expected,
            actual,
        });
    }
    Ok(())
}

fn check_lengths(lengths: impl Iterator<Item = usize>, block_size: usize) -> Result<()> {
    for (index, len) in lengths.enumerate() {
        if len < block_size {
            return Err(ErasureError::BufferTooSmall {
                index,
                len,
                block_size,
            });
        }
    }
    Ok(())
}

/// Split fragment buffers into the first `k` survivors and the missing
/// buffers selected by `write`, both in ascending index order
fn partition<'a>(
    data: &'a mut [&mut [u8]],
    parity: &'a mut [&mut [u8]],
    k: usize,
    missing: FragmentSet,
    write: impl Fn(usize) -> bool,
) -> (Vec<&'a [u8]>, Vec<&'a mut [u8]>) {
    let mut inputs: Vec<&'a [u8]> = Vec::with_capacity(k);
    let mut outputs: Vec<&'a mut [u8]> = Vec::with_capacity(missing.len());

    // Reborrow so both halves yield the same item type
    let buffers = data
        .iter_mut()
        .map(|b| &mut **b)
        .chain(parity.iter_mut().map(|b| &mut **b));

    for (index, buf) in buffers.enumerate() {
        if missing.contains(index) {
            if write(index) {
                outputs.push(buf);
            }
        } else if inputs.len() < k {
            inputs.push(buf);
        }
    }

    (inputs, outputs)
}
