use criterion::{black_box, criterion_group, criterion_main, Criterion};
use devicebind_crypto::counter::Counter;
use devicebind_crypto::key_factory::{self, MasterSecret};
use devicebind_crypto::signature;

fn bench_signature_compute(c: &mut Criterion) {
    let master_secret = MasterSecret([0x42; 16]);
    let named_keys = key_factory::derive_named_keys(&master_secret).unwrap();
    let counter = Counter::V2(0);
    let data = b"POST&/pa/signature/validate&bm9uY2U=&Ym9keQ==";

    let mut group = c.benchmark_group("signature_compute");
    group.bench_function("1fa", |b| {
        b.iter(|| {
            signature::compute(
                black_box(data),
                black_box(&[named_keys.possession.clone()]),
                black_box(&counter),
            )
            .unwrap()
        })
    });
    group.bench_function("2fa", |b| {
        b.iter(|| {
            signature::compute(
                black_box(data),
                black_box(&[named_keys.possession.clone(), named_keys.knowledge.clone()]),
                black_box(&counter),
            )
            .unwrap()
        })
    });
    group.bench_function("3fa", |b| {
        b.iter(|| {
            signature::compute(
                black_box(data),
                black_box(&[
                    named_keys.possession.clone(),
                    named_keys.knowledge.clone(),
                    named_keys.biometry.clone(),
                ]),
                black_box(&counter),
            )
            .unwrap()
        })
    });
    group.finish();
}

fn bench_key_derivation(c: &mut Criterion) {
    let master_secret = MasterSecret([0x42; 16]);
    c.bench_function("derive_named_keys", |b| {
        b.iter(|| key_factory::derive_named_keys(black_box(&master_secret)).unwrap())
    });
}

criterion_group!(benches, bench_signature_compute, bench_key_derivation);
criterion_main!(benches);
