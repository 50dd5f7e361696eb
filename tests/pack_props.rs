//! Packed-array codec properties:
//!  - unpack(pack(a)) == a for random arrays in both encodings
//!  - run lengths at and just past the single-pair limit
//!  - chunking never breaks the size bound and splits large arrays
//!
//! Seeds can be overridden with PACK_SEED.

use dfascan::lexer::{
    CodecError,
    tables::pack::{
        Encoding,
        MAX_CHUNK_BYTES,
        MAX_RUN,
        PackedArray,
        pack_count_value,
        pack_hi_low,
        unpack_count_value,
        unpack_hi_low,
    },
};
use rand::{Rng, SeedableRng, rngs::StdRng};

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default)
}

fn assert_chunks_bounded(p: &PackedArray) {
    for (i, c) in p.chunks().iter().enumerate() {
        assert!(
            c.utf8_len() <= MAX_CHUNK_BYTES,
            "chunk {i} estimates {} bytes",
            c.utf8_len()
        );
        assert_eq!(c.units().len() % 2, 0, "chunk {i} splits a pair");
    }
}

#[test]
fn count_value_round_trips_random_runs() {
    let mut rng = StdRng::seed_from_u64(env_u64("PACK_SEED", 0xC0FFEE));
    for _ in 0..50 {
        let mut values = Vec::new();
        let runs = rng.random_range(0..40);
        for _ in 0..runs {
            let v = rng.random_range(-1i64..=0xFFFE);
            let len = rng.random_range(1..=300);
            values.extend(std::iter::repeat_n(v, len));
        }
        let p = pack_count_value(&values, 1).expect("pack");
        assert_chunks_bounded(&p);
        assert_eq!(p.unpack().expect("unpack"), values);
    }
}

#[test]
fn hi_low_round_trips_random_values() {
    let mut rng = StdRng::seed_from_u64(env_u64("PACK_SEED", 0xC0FFEE) ^ 1);
    let values: Vec<i64> = (0..5000)
        .map(|_| i64::from(rng.random::<u32>()))
        .chain([0, 1, 0xFFFF, 0x1_0000, u32::MAX as i64])
        .collect();
    let p = pack_hi_low(&values).expect("pack");
    assert_chunks_bounded(&p);
    assert_eq!(p.unpack().expect("unpack"), values);
}

#[test]
fn boundary_run_lengths() {
    for len in [MAX_RUN - 1, MAX_RUN, MAX_RUN + 1, 2 * MAX_RUN + 3] {
        let mut values = vec![5i64; len];
        values.push(6);
        let p = pack_count_value(&values, 0).expect("pack");
        assert_eq!(p.unpack().expect("unpack"), values, "run length {len}");
        let pairs = p.chunks().iter().map(|c| c.units().len() / 2).sum::<usize>();
        assert_eq!(pairs, len.div_ceil(MAX_RUN) + 1, "run length {len}");
    }
}

#[test]
fn large_arrays_split_into_bounded_chunks() {
    // three-byte units on both halves: 6 bytes per value
    let values: Vec<i64> = (0..30_000i64).map(|i| 0x0800_0800 + (i << 16) + i).collect();
    let p = pack_hi_low(&values).expect("pack");
    assert!(p.chunks().len() > 1, "expected several chunks, got {}", p.chunks().len());
    assert_chunks_bounded(&p);
    assert_eq!(p.unpack().expect("unpack"), values);

    // alternating values defeat run-length encoding
    let values: Vec<i64> = (0..80_000).map(|i| if i % 2 == 0 { 0x1234 } else { 0 }).collect();
    let p = pack_count_value(&values, 0).expect("pack");
    assert!(p.chunks().len() > 1);
    assert_chunks_bounded(&p);
    assert_eq!(p.unpack().expect("unpack"), values);
}

#[test]
fn escaped_text_decodes_like_the_chunks() {
    let values: Vec<i64> = (0..20_000).map(|i| (i * 7919) % 0xFFFF - 1).collect();
    let p = pack_count_value(&values, 1).expect("pack");
    let texts = p.escaped_chunks();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    assert_eq!(unpack_count_value(&refs, 1, values.len()).expect("unpack"), values);

    let values: Vec<i64> = (0..1000).map(|i| i * 65_537).collect();
    let p = pack_hi_low(&values).expect("pack");
    let texts = p.escaped_chunks();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    assert_eq!(unpack_hi_low(&refs, values.len()).expect("unpack"), values);
}

#[test]
fn wrong_declared_length_is_reported() {
    let p = pack_count_value(&[1, 1, 2], 0).expect("pack");
    let texts = p.escaped_chunks();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    assert!(matches!(
        unpack_count_value(&refs, 0, 5),
        Err(CodecError::LengthMismatch { expected: 5, actual: 3 })
    ));
    let bad = PackedArray::from_escaped(Encoding::CountValue, 0, 3, &["\\u0003"]);
    assert!(matches!(bad.and_then(|p| p.unpack()), Err(CodecError::Malformed { .. })));
}
