//! Field arithmetic provider tests
//!
//! The ISA-L cases only run when a system libisal can be loaded; otherwise
//! they print a note and pass.

use rsvand::reed_solomon::{gen_rs_matrix, Matrix};
use rsvand::{ErasureError, FieldProvider, IsalProvider, NativeProvider, ReedSolomonVand};
use std::sync::Arc;

fn isal() -> Option<IsalProvider> {
    match IsalProvider::load_default() {
        Ok(provider) => Some(provider),
        Err(e) => {
            eprintln!("Skipping ISA-L comparison: {e}");
            None
        }
    }
}

#[test]
fn test_native_generator_is_systematic() {
    let g = NativeProvider::new().generate_matrix(14, 10).unwrap();
    assert_eq!(g.first_non_identity_row(), None);
    assert_eq!(g, gen_rs_matrix(14, 10).unwrap());
}

#[test]
fn test_native_invert_reports_singular() {
    let provider = NativeProvider::new();
    let zero = Matrix::zeroed(3, 3).unwrap();
    assert!(matches!(provider.invert(&zero), Err(ErasureError::Singular)));
}

#[test]
fn test_bad_library_path() {
    let err = IsalProvider::load("/nonexistent/dir/libisal.so.2").unwrap_err();
    assert!(matches!(err, ErasureError::ProviderUnavailable { .. }));
}

#[test]
fn test_isal_matches_native_primitives() {
    let Some(isal) = isal() else { return };
    let native = NativeProvider::new();

    assert_eq!(isal.name(), "isa-l");
    assert_eq!(isal.generate_matrix(12, 8).unwrap(), native.generate_matrix(12, 8).unwrap());

    for a in [0u8, 1, 2, 0x53, 0xCA, 0xFF] {
        for b in [0u8, 1, 3, 0x8E, 0xFF] {
            assert_eq!(isal.multiply(a, b), native.multiply(a, b), "{a} * {b}");
        }
    }

    let g = native.generate_matrix(7, 4).unwrap();
    let decode = Matrix::from_vec(
        4,
        4,
        [g.row(0), g.row(2), g.row(4), g.row(6)].concat(),
    )
    .unwrap();
    assert_eq!(isal.invert(&decode).unwrap(), native.invert(&decode).unwrap());

    let coeffs = g.sub_rows(4, 7).unwrap();
    assert_eq!(
        isal.expand_tables(&coeffs).unwrap().as_slice(),
        native.expand_tables(&coeffs).unwrap().as_slice()
    );
}

#[test]
fn test_isal_and_native_sessions_agree() {
    let Some(isal) = isal() else { return };
    let (k, m, block) = (6, 3, 3000);
    let native = ReedSolomonVand::new(k, m).unwrap();
    let isal = ReedSolomonVand::with_provider(k, m, Arc::new(isal)).unwrap();
    assert_eq!(native.generator(), isal.generator());

    let data: Vec<Vec<u8>> = (0..k)
        .map(|i| (0..block).map(|b| (b * 5 + i * 71) as u8).collect())
        .collect();
    let inputs: Vec<&[u8]> = data.iter().map(|d| d.as_slice()).collect();

    let mut from_native = vec![vec![0u8; block]; m];
    let mut from_isal = vec![vec![0u8; block]; m];
    {
        let mut out: Vec<&mut [u8]> = from_native.iter_mut().map(|p| p.as_mut_slice()).collect();
        native.encode(&inputs, &mut out, block).unwrap();
        let mut out: Vec<&mut [u8]> = from_isal.iter_mut().map(|p| p.as_mut_slice()).collect();
        isal.encode(&inputs, &mut out, block).unwrap();
    }
    assert_eq!(from_native, from_isal);

    let mut d = data.clone();
    let mut p = from_isal.clone();
    d[0].fill(0);
    p[2].fill(0);
    {
        let mut dv: Vec<&mut [u8]> = d.iter_mut().map(|b| b.as_mut_slice()).collect();
        let mut pv: Vec<&mut [u8]> = p.iter_mut().map(|b| b.as_mut_slice()).collect();
        isal.decode(&mut dv, &mut pv, &[0, 8], block).unwrap();
    }
    assert_eq!(d, data);
    assert_eq!(p, from_native);
}

#[test]
fn test_isal_bulk_reuses_shared_tables() {
    let Some(isal) = isal() else { return };
    let g = gen_rs_matrix(7, 4).unwrap();
    let tables = isal.expand_tables(&g.sub_rows(4, 7).unwrap()).unwrap();
    let before = tables.as_slice().to_vec();

    let block = 777;
    let data: Vec<Vec<u8>> = (0..4)
        .map(|i| (0..block).map(|b| (b * 13 + i * 29) as u8).collect())
        .collect();
    let inputs: Vec<&[u8]> = data.iter().map(|d| d.as_slice()).collect();

    let mut first = vec![vec![0u8; block]; 3];
    let mut second = vec![vec![0xAAu8; block]; 3];
    for out in [&mut first, &mut second] {
        let mut views: Vec<&mut [u8]> = out.iter_mut().map(|p| p.as_mut_slice()).collect();
        isal.multiply_accumulate(block, &tables, &inputs, &mut views).unwrap();
    }

    assert_eq!(tables.as_slice(), before.as_slice());
    assert_eq!(first, second);

    let mut expected = vec![vec![0u8; block]; 3];
    let mut views: Vec<&mut [u8]> = expected.iter_mut().map(|p| p.as_mut_slice()).collect();
    NativeProvider::new()
        .multiply_accumulate(block, &tables, &inputs, &mut views)
        .unwrap();
    assert_eq!(first, expected);
}
