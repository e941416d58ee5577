//! Performance Benchmarks for aggsig Signing Operations
//!
//! Benchmarks:
//! - BLS key generation
//! - Hash-to-curve
//! - BLS signing and verification
//! - Signature aggregation
//! - EIP-2537 encoding
//! - Full committee workflow (sign + aggregate + verify)

use aggsig_core::DEFAULT_DST;
use aggsig_signer::{
    aggregate_results, aggregate_signatures, decode_g2, encode_g2, hash_to_curve, verify,
    BlsSecretKey, G2Point, SignatureResult,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const USER_OP_HASH: &[u8] = b"0x9c4f6d2a0b8e1f3c5a7d9e0b2c4f6a8d1e3b5c7f9a0d2e4b6c8f1a3d5e7b9c0f";

/// Benchmark BLS key generation
fn bench_bls_key_generation(c: &mut Criterion) {
    c.bench_function("bls_key_generation", |b| {
        b.iter(|| black_box(BlsSecretKey::generate()))
    });
}

/// Benchmark hash-to-curve on G2
fn bench_hash_to_curve(c: &mut Criterion) {
    c.bench_function("hash_to_g2", |b| {
        b.iter(|| black_box(hash_to_curve(black_box(USER_OP_HASH), DEFAULT_DST)))
    });
}

/// Benchmark BLS signing of a hashed point
fn bench_bls_signing(c: &mut Criterion) {
    let sk = BlsSecretKey::generate();
    let hm = hash_to_curve(USER_OP_HASH, DEFAULT_DST);

    c.bench_function("bls_sign", |b| b.iter(|| black_box(sk.sign(black_box(&hm)))));
}

/// Benchmark BLS pairing verification
fn bench_bls_verification(c: &mut Criterion) {
    let sk = BlsSecretKey::generate();
    let pk = sk.public_key();
    let hm = hash_to_curve(USER_OP_HASH, DEFAULT_DST);
    let signature = sk.sign(&hm);

    c.bench_function("bls_verify", |b| {
        b.iter(|| black_box(verify(black_box(&signature), black_box(&hm), black_box(&pk))))
    });
}

/// Benchmark signature aggregation with varying committee sizes
fn bench_signature_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("signature_aggregation");
    let hm = hash_to_curve(USER_OP_HASH, DEFAULT_DST);

    for count in [3, 5, 7, 9].iter() {
        let signatures: Vec<G2Point> = (0..*count)
            .map(|_| BlsSecretKey::generate().sign(&hm))
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(count),
            &signatures,
            |b, signatures| b.iter(|| black_box(aggregate_signatures(black_box(signatures)))),
        );
    }

    group.finish();
}

/// Benchmark EIP-2537 G2 encode + decode (includes subgroup check)
fn bench_eip2537_g2(c: &mut Criterion) {
    let point = hash_to_curve(USER_OP_HASH, DEFAULT_DST);
    let encoded = encode_g2(&point);

    c.bench_function("eip2537_encode_g2", |b| {
        b.iter(|| black_box(encode_g2(black_box(&point))))
    });
    c.bench_function("eip2537_decode_g2", |b| {
        b.iter(|| black_box(decode_g2(black_box(&encoded))))
    });
}

/// Benchmark full committee workflow (sign + aggregate + verify)
fn bench_full_signing_workflow(c: &mut Criterion) {
    let keys: Vec<BlsSecretKey> = (0..3).map(|_| BlsSecretKey::generate()).collect();

    c.bench_function("full_3_node_workflow", |b| {
        b.iter(|| {
            // Sign
            let results: Vec<SignatureResult> = keys
                .iter()
                .enumerate()
                .map(|(i, sk)| {
                    SignatureResult::new(
                        format!("node-{}", i),
                        &sk.sign_message(USER_OP_HASH, DEFAULT_DST),
                        &sk.public_key(),
                    )
                })
                .collect();

            // Aggregate and verify
            black_box(aggregate_results(USER_OP_HASH, &results, DEFAULT_DST))
        })
    });
}

criterion_group!(
    benches,
    bench_bls_key_generation,
    bench_hash_to_curve,
    bench_bls_signing,
    bench_bls_verification,
    bench_signature_aggregation,
    bench_eip2537_g2,
    bench_full_signing_workflow,
);

criterion_main!(benches);
