//! ISA-L field arithmetic bound at runtime
//!
//! The library is opened with `libloading` and the five routines the code
//! needs are resolved up front. A library that is missing, or that lacks any
//! one of the routines, is reported as
//! [`ErasureError::ProviderUnavailable`] so session setup fails cleanly.

use super::{check_bulk_shapes, FieldProvider, GfTables};
use crate::error::{ErasureError, Result};
use crate::reed_solomon::matrix::Matrix;
use libc::c_int;
use libloading::Library;
use log::debug;
use std::ffi::OsStr;

type EcEncodeDataFn = unsafe extern "C" fn(c_int, c_int, c_int, *mut u8, *mut *mut u8, *mut *mut u8);
type EcInitTablesFn = unsafe extern "C" fn(c_int, c_int, *mut u8, *mut u8);
type GfGenRsMatrixFn = unsafe extern "C" fn(*mut u8, c_int, c_int);
type GfInvertMatrixFn = unsafe extern "C" fn(*mut u8, *mut u8, c_int) -> c_int;
type GfMulFn = unsafe extern "C" fn(u8, u8) -> u8;

/// Library names tried by [`IsalProvider::load_default`]
#[cfg(target_os = "macos")]
pub const DEFAULT_LIBRARY_NAMES: &[&str] = &["libisal.2.dylib", "libisal.dylib"];
#[cfg(target_os = "windows")]
pub const DEFAULT_LIBRARY_NAMES: &[&str] = &["isa-l.dll", "isal.dll"];
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub const DEFAULT_LIBRARY_NAMES: &[&str] = &["libisal.so.2", "libisal.so"];

const PROVIDER_NAME: &str = "isa-l";

/// Field arithmetic backed by the system ISA-L library
pub struct IsalProvider {
    ec_encode_data: EcEncodeDataFn,
    ec_init_tables: EcInitTablesFn,
    gf_gen_rs_matrix: GfGenRsMatrixFn,
    gf_invert_matrix: GfInvertMatrixFn,
    gf_mul: GfMulFn,
    path: String,
    // Keeps the resolved function pointers valid
    _library: Library,
}

impl IsalProvider {
    /// Open the library at `path` and resolve every required routine
    pub fn load<P: AsRef<OsStr>>(path: P) -> Result<Self> {
        let path_display = path.as_ref().to_string_lossy().into_owned();

        // SAFETY: loading runs the library's initialisers; ISA-L has none with
        // preconditions
        let library = unsafe { Library::new(path.as_ref()) }
            .map_err(|e| unavailable(format!("cannot load {path_display}: {e}")))?;

        // SAFETY: the signatures match the ISA-L erasure_code.h / gf_vect_mul.h prototypes
        let provider = unsafe {
            Self {
                ec_encode_data: resolve(&library, b"ec_encode_data\0")?,
                ec_init_tables: resolve(&library, b"ec_init_tables\0")?,
                gf_gen_rs_matrix: resolve(&library, b"gf_gen_rs_matrix\0")?,
                gf_invert_matrix: resolve(&library, b"gf_invert_matrix\0")?,
                gf_mul: resolve(&library, b"gf_mul\0")?,
                path: path_display,
                _library: library,
            }
        };

        debug!("Loaded ISA-L from {}", provider.path);
        Ok(provider)
    }

    /// Try the platform's usual library names in turn
    pub fn load_default() -> Result<Self> {
        let mut reasons = Vec::new();
        for name in DEFAULT_LIBRARY_NAMES {
            match Self::load(name) {
                Ok(provider) => return Ok(provider),
                Err(e) => reasons.push(e.to_string()),
            }
        }
        Err(unavailable(reasons.join("; ")))
    }

    /// Path the library was loaded from
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Copy a function pointer out of the library
///
/// # Safety
/// `T` must be the correct function pointer type for `symbol`.
unsafe fn resolve<T: Copy>(library: &Library, symbol: &[u8]) -> Result<T> {
    library.get::<T>(symbol).map(|s| *s).map_err(|e| {
        let name = String::from_utf8_lossy(&symbol[..symbol.len() - 1]);
        unavailable(format!("missing symbol {name}: {e}"))
    })
}

fn unavailable(reason: String) -> ErasureError {
    ErasureError::ProviderUnavailable {
        provider: PROVIDER_NAME.to_string(),
        reason,
    }
}

fn to_c_int(value: usize, what: &str) -> Result<c_int> {
    c_int::try_from(value)
        .map_err(|_| ErasureError::DimensionMismatch(format!("{what} {value} exceeds C int range")))
}

impl FieldProvider for IsalProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn generate_matrix(&self, rows: usize, cols: usize) -> Result<Matrix> {
        let mut matrix = Matrix::zeroed(rows, cols)?;
        let (r, c) = (to_c_int(rows, "rows")?, to_c_int(cols, "cols")?);
        // SAFETY: the buffer holds rows * cols elements
        unsafe { (self.gf_gen_rs_matrix)(matrix.as_mut_slice().as_mut_ptr(), r, c) };
        Ok(matrix)
    }

    fn invert(&self, matrix: &Matrix) -> Result<Matrix> {
        if matrix.rows() != matrix.cols() {
            return Err(ErasureError::DimensionMismatch(format!(
                "cannot invert a non-square {}x{} matrix",
                matrix.rows(),
                matrix.cols()
            )));
        }
        let n = to_c_int(matrix.rows(), "rows")?;
        // gf_invert_matrix destroys its input
        let mut work = matrix.clone();
        let mut inverse = Matrix::zeroed(matrix.rows(), matrix.cols())?;
        // SAFETY: both buffers hold n * n elements
        let status = unsafe {
            (self.gf_invert_matrix)(
                work.as_mut_slice().as_mut_ptr(),
                inverse.as_mut_slice().as_mut_ptr(),
                n,
            )
        };
        if status != 0 {
            return Err(ErasureError::Singular);
        }
        Ok(inverse)
    }

    fn multiply(&self, a: u8, b: u8) -> u8 {
        // SAFETY: pure function on two bytes
        unsafe { (self.gf_mul)(a, b) }
    }

    fn expand_tables(&self, coefficients: &Matrix) -> Result<GfTables> {
        let mut tables = GfTables::zeroed(coefficients.rows(), coefficients.cols())?;
        if coefficients.rows() == 0 || coefficients.cols() == 0 {
            return Ok(tables);
        }
        let k = to_c_int(coefficients.cols(), "cols")?;
        let rows = to_c_int(coefficients.rows(), "rows")?;
        // ec_init_tables takes a mutable pointer but only reads the coefficients
        let mut scratch = coefficients.clone();
        // SAFETY: tables hold rows * k * 32 bytes, scratch holds rows * k
        unsafe {
            (self.ec_init_tables)(
                k,
                rows,
                scratch.as_mut_slice().as_mut_ptr(),
                tables.as_mut_slice().as_mut_ptr(),
            )
        };
        Ok(tables)
    }

    fn multiply_accumulate(
        &self,
        block_size: usize,
        tables: &GfTables,
        inputs: &[&[u8]],
        outputs: &mut [&mut [u8]],
    ) -> Result<()> {
        check_bulk_shapes(block_size, tables, inputs, outputs)?;
        if outputs.is_empty() || block_size == 0 {
            return Ok(());
        }

        let len = to_c_int(block_size, "block size")?;
        let k = to_c_int(inputs.len(), "input count")?;
        let rows = to_c_int(outputs.len(), "output count")?;

        // ISA-L reads inputs through `unsigned char **` without writing them
        let mut input_ptrs: Vec<*mut u8> = inputs.iter().map(|b| b.as_ptr() as *mut u8).collect();
        let mut output_ptrs: Vec<*mut u8> = outputs.iter_mut().map(|b| b.as_mut_ptr()).collect();
        // ec_encode_data only reads the tables despite the mutable pointer
        let table_ptr = tables.as_slice().as_ptr() as *mut u8;

        // SAFETY: every buffer is at least block_size bytes (checked above) and
        // the pointer arrays match the table dimensions
        unsafe {
            (self.ec_encode_data)(
                len,
                k,
                rows,
                table_ptr,
                input_ptrs.as_mut_ptr(),
                output_ptrs.as_mut_ptr(),
            )
        };
        Ok(())
    }
}

impl std::fmt::Debug for IsalProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsalProvider")
            .field("path", &self.path)
            .finish()
    }
}
