//! Galois Field GF(2^8) arithmetic
//!
//! Uses the primitive polynomial **0x11D** (x⁸ + x⁴ + x³ + x² + 1), the same
//! field ISA-L builds its Reed-Solomon matrices over, so matrices and tables
//! produced here are interchangeable with the ones ISA-L produces.
//!
//! Multiplication goes through log/antilog tables that are built once and
//! shared by every thread.

use std::sync::OnceLock;

/// GF(2^8) primitive polynomial: 0x11D (x⁸ + x⁴ + x³ + x² + 1)
pub const GF8_GENERATOR: u32 = 0x11D;

const COUNT: usize = 256;
const LIMIT: usize = COUNT - 1;

/// Log/antilog lookup tables for GF(2^8)
pub struct GaloisTable {
    pub log: [u8; COUNT],
    /// Doubled so `antilog[log a + log b]` needs no modulo
    pub antilog: [u8; 2 * COUNT],
}

impl Default for GaloisTable {
    fn default() -> Self {
        Self::new()
    }
}

impl GaloisTable {
    pub fn new() -> Self {
        let mut table = GaloisTable {
            log: [0; COUNT],
            antilog: [0; 2 * COUNT],
        };
        table.build_tables();
        table
    }

    fn build_tables(&mut self) {
        let mut b = 1u32;

        for l in 0..LIMIT {
            self.log[b as usize] = l as u8;
            self.antilog[l] = b as u8;
            self.antilog[l + LIMIT] = b as u8;

            b <<= 1;
            if b & COUNT as u32 != 0 {
                b ^= GF8_GENERATOR;
            }
        }
    }

    /// Shared table, built on first use
    pub fn get() -> &'static GaloisTable {
        static TABLE: OnceLock<GaloisTable> = OnceLock::new();
        TABLE.get_or_init(GaloisTable::new)
    }
}

/// Multiply two field elements
#[inline]
pub fn gf_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let table = GaloisTable::get();
    table.antilog[table.log[a as usize] as usize + table.log[b as usize] as usize]
}

/// Multiplicative inverse; `None` for zero
#[inline]
pub fn gf_inv(a: u8) -> Option<u8> {
    if a == 0 {
        return None;
    }
    let table = GaloisTable::get();
    Some(table.antilog[LIMIT - table.log[a as usize] as usize])
}
