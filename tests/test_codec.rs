//! Integration tests for encode, decode and reconstruct
//!
//! Exercises the public session API end to end with random data:
//! round trips for every erasure pattern, parity regeneration, single-target
//! reconstruction and minimum-fragment selection.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rsvand::{ErasureError, FragmentKind, ReedSolomonVand};

/// Random data fragments from a fixed seed
fn random_data(k: usize, block: usize, seed: u64) -> Vec<Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..k)
        .map(|_| {
            let mut buf = vec![0u8; block];
            rng.fill(&mut buf[..]);
            buf
        })
        .collect()
}

fn encode(codec: &ReedSolomonVand, data: &[Vec<u8>], block: usize) -> Vec<Vec<u8>> {
    let mut parity = vec![vec![0u8; block]; codec.m()];
    let inputs: Vec<&[u8]> = data.iter().map(|d| d.as_slice()).collect();
    let mut outputs: Vec<&mut [u8]> = parity.iter_mut().map(|p| p.as_mut_slice()).collect();
    codec.encode(&inputs, &mut outputs, block).unwrap();
    parity
}

fn views(bufs: &mut [Vec<u8>]) -> Vec<&mut [u8]> {
    bufs.iter_mut().map(|b| b.as_mut_slice()).collect()
}

/// Zero out every missing fragment
fn erase(data: &mut [Vec<u8>], parity: &mut [Vec<u8>], missing: &[usize]) {
    let k = data.len();
    for &i in missing {
        if i < k {
            data[i].fill(0);
        } else {
            parity[i - k].fill(0);
        }
    }
}

/// All subsets of `0..n` with exactly `size` elements
fn subsets(n: usize, size: usize) -> Vec<Vec<usize>> {
    (0u64..1 << n)
        .filter(|mask| mask.count_ones() as usize == size)
        .map(|mask| (0..n).filter(|i| mask >> i & 1 == 1).collect())
        .collect()
}

#[test]
fn test_encode_leaves_data_untouched() {
    let codec = ReedSolomonVand::new(6, 3).unwrap();
    let data = random_data(6, 1000, 1);
    let before = data.clone();
    let _ = encode(&codec, &data, 1000);
    assert_eq!(data, before);
}

#[test]
fn test_systematic_property() {
    // Decoding with nothing missing hands back the data fragments as-is
    let codec = ReedSolomonVand::new(5, 2).unwrap();
    let data = random_data(5, 333, 2);
    let parity = encode(&codec, &data, 333);

    let mut d = data.clone();
    let mut p = parity.clone();
    codec
        .decode(&mut views(&mut d), &mut views(&mut p), &[], 333)
        .unwrap();
    assert_eq!(d, data);
    assert_eq!(p, parity);

    for r in 0..5 {
        let row = codec.generator().row(r);
        for (c, &v) in row.iter().enumerate() {
            assert_eq!(v, u8::from(r == c));
        }
    }
}

#[test]
fn test_round_trip_every_erasure_pattern() {
    let (k, m, block) = (4, 3, 257);
    let codec = ReedSolomonVand::new(k, m).unwrap();
    let data = random_data(k, block, 3);
    let parity = encode(&codec, &data, block);

    for size in 1..=m {
        for missing in subsets(k + m, size) {
            let mut d = data.clone();
            let mut p = parity.clone();
            erase(&mut d, &mut p, &missing);

            codec
                .decode(&mut views(&mut d), &mut views(&mut p), &missing, block)
                .unwrap_or_else(|e| panic!("missing {missing:?}: {e}"));
            assert_eq!(d, data, "missing {missing:?}");
            assert_eq!(p, parity, "missing {missing:?}");
        }
    }
}

#[test]
fn test_missing_parity_matches_fresh_encode() {
    let (k, m, block) = (8, 4, 4096);
    let codec = ReedSolomonVand::new(k, m).unwrap();
    let data = random_data(k, block, 4);
    let parity = encode(&codec, &data, block);

    let mut d = data.clone();
    let mut p = parity.clone();
    let missing = [8, 10, 11];
    erase(&mut d, &mut p, &missing);

    codec
        .decode(&mut views(&mut d), &mut views(&mut p), &missing, block)
        .unwrap();
    assert_eq!(p, encode(&codec, &data, block));
}

#[test]
fn test_reconstruct_matches_decode() {
    let (k, m, block) = (6, 4, 1500);
    let codec = ReedSolomonVand::new(k, m).unwrap();
    let data = random_data(k, block, 5);
    let parity = encode(&codec, &data, block);
    let missing = [0, 4, 7, 9];

    let mut full_d = data.clone();
    let mut full_p = parity.clone();
    erase(&mut full_d, &mut full_p, &missing);
    codec
        .decode(&mut views(&mut full_d), &mut views(&mut full_p), &missing, block)
        .unwrap();

    for &target in &missing {
        let mut d = data.clone();
        let mut p = parity.clone();
        erase(&mut d, &mut p, &missing);
        codec
            .reconstruct(&mut views(&mut d), &mut views(&mut p), &missing, target, block)
            .unwrap();

        let (rebuilt, expected) = if target < k {
            (&d[target], &full_d[target])
        } else {
            (&p[target - k], &full_p[target - k])
        };
        assert_eq!(rebuilt, expected, "target {target}");

        // Other missing buffers stay erased
        for &other in missing.iter().filter(|&&o| o != target) {
            let buf = if other < k { &d[other] } else { &p[other - k] };
            assert!(buf.iter().all(|&b| b == 0), "target {target}, other {other}");
        }
    }
}

#[test]
fn test_block_size_shorter_than_buffers() {
    // Only the first block_size bytes take part
    let (k, m) = (3, 2);
    let codec = ReedSolomonVand::new(k, m).unwrap();
    let data = random_data(k, 128, 6);
    let parity = encode(&codec, &data, 100);
    assert!(parity.iter().all(|p| p[100..].iter().all(|&b| b == 0)));

    let mut d = data.clone();
    let mut p = parity.clone();
    d[2][..100].fill(0);
    codec
        .decode(&mut views(&mut d), &mut views(&mut p), &[2], 100)
        .unwrap();
    assert_eq!(d, data);
}

#[test]
fn test_example_k4_m2() {
    let (k, m, block) = (4, 2, 4096);
    let codec = ReedSolomonVand::new(k, m).unwrap();
    let data = random_data(k, block, 7);
    let parity = encode(&codec, &data, block);

    let mut d = data.clone();
    let mut p = parity.clone();
    erase(&mut d, &mut p, &[1, 4]);

    codec
        .decode(&mut views(&mut d), &mut views(&mut p), &[1, 4], block)
        .unwrap();
    assert_eq!(d[1], data[1]);
    assert_eq!(p[0], parity[0]);
}

#[test]
fn test_example_k10_m4_too_many_missing() {
    let (k, m, block) = (10, 4, 512);
    let codec = ReedSolomonVand::new(k, m).unwrap();
    let data = random_data(k, block, 8);
    let parity = encode(&codec, &data, block);

    let missing = [1, 2, 5, 11, 13];
    let mut d = data.clone();
    let mut p = parity.clone();
    erase(&mut d, &mut p, &missing);
    let snapshot = (d.clone(), p.clone());

    let err = codec
        .decode(&mut views(&mut d), &mut views(&mut p), &missing, block)
        .unwrap_err();
    assert!(matches!(err, ErasureError::InsufficientFragments { needed: 10, available: 9 }));
    assert_eq!((d, p), snapshot);

    let err = codec.min_fragments_needed(&missing, &[]).unwrap_err();
    assert!(matches!(err, ErasureError::InsufficientFragments { .. }));
}

#[test]
fn test_min_fragments_needed_is_exact() {
    let codec = ReedSolomonVand::new(6, 3).unwrap();
    for missing in subsets(9, 2) {
        let needed = codec.min_fragments_needed(&missing, &[]).unwrap();
        assert_eq!(needed.len(), 6);
        assert!(needed.windows(2).all(|w| w[0] < w[1]));
        assert!(needed.iter().all(|i| !missing.contains(i)));
        // Nothing skipped below the last chosen index
        let last = needed[needed.len() - 1];
        assert_eq!(last + 1 - missing.iter().filter(|&&i| i < last).count(), 6);
    }

    let needed = codec.min_fragments_needed(&[0], &[1, 2]).unwrap();
    assert_eq!(needed.as_slice(), &[3, 4, 5, 6, 7, 8]);
    assert!(codec.min_fragments_needed(&[0, 1], &[2, 3]).is_err());
}

#[test]
fn test_decode_from_exactly_the_needed_fragments() {
    let (k, m, block) = (6, 3, 1111);
    let n = k + m;
    let codec = ReedSolomonVand::new(k, m).unwrap();
    let data = random_data(k, block, 91);
    let parity = encode(&codec, &data, block);

    for unusable in 0..=m {
        for lost in subsets(n, unusable) {
            // Every split of the unusable indices into missing and excluded
            for split in 0..=lost.len() {
                let (missing, excluded) = lost.split_at(split);
                let needed = codec.min_fragments_needed(missing, excluded).unwrap();
                let rest: Vec<usize> = (0..n).filter(|i| !needed.contains(i)).collect();
                assert_eq!(rest.len(), m);

                let mut d = data.clone();
                let mut p = parity.clone();
                erase(&mut d, &mut p, &rest);
                codec
                    .decode(&mut views(&mut d), &mut views(&mut p), &rest, block)
                    .unwrap();
                assert_eq!(d, data, "missing {missing:?} excluded {excluded:?}");
                assert_eq!(p, parity, "missing {missing:?} excluded {excluded:?}");
            }
        }
    }
}

#[test]
fn test_invalid_indices_rejected_before_writing() {
    let codec = ReedSolomonVand::new(3, 2).unwrap();
    let mut d = vec![vec![7u8; 16]; 3];
    let mut p = vec![vec![7u8; 16]; 2];

    for missing in [&[5][..], &[1, 1][..]] {
        let err = codec
            .decode(&mut views(&mut d), &mut views(&mut p), missing, 16)
            .unwrap_err();
        assert!(matches!(err, ErasureError::InvalidIndex { .. }), "{missing:?}");
    }
    assert!(d.iter().chain(&p).all(|b| b.iter().all(|&v| v == 7)));
}

#[test]
fn test_wrong_data_count() {
    let codec = ReedSolomonVand::new(3, 2).unwrap();
    let mut d = vec![vec![0u8; 16]; 2];
    let mut p = vec![vec![0u8; 16]; 2];
    let err = codec
        .decode(&mut views(&mut d), &mut views(&mut p), &[0], 16)
        .unwrap_err();
    assert!(matches!(
        err,
        ErasureError::FragmentCountMismatch {
            kind: FragmentKind::Data,
            expected: 3,
            actual: 2
        }
    ));
}

#[test]
fn test_session_shared_across_threads() {
    let codec = std::sync::Arc::new(ReedSolomonVand::new(4, 2).unwrap());
    let handles: Vec<_> = (0..4u64)
        .map(|seed| {
            let codec = std::sync::Arc::clone(&codec);
            std::thread::spawn(move || {
                let data = random_data(4, 200, seed);
                let parity = encode(&codec, &data, 200);
                let mut d = data.clone();
                let mut p = parity.clone();
                let missing = [seed as usize % 4, 4 + seed as usize % 2];
                erase(&mut d, &mut p, &missing);
                codec
                    .decode(&mut views(&mut d), &mut views(&mut p), &missing, 200)
                    .unwrap();
                d == data && p == parity
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
}
