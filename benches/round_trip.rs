use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kodo_bindings::bindings::{self, BindingsConfig, FamilyId, Value};
use kodo_bindings::field::FieldTag;

const SYMBOLS: usize = 32;
const SYMBOL_SIZE: usize = 1024;

fn bench_round_trip(c: &mut Criterion) {
    let module = bindings::assemble(&BindingsConfig {
        trace: false,
        ..BindingsConfig::default()
    })
    .unwrap();
    let data = vec![0xABu8; SYMBOLS * SYMBOL_SIZE];

    let mut group = c.benchmark_group("round_trip");
    group.throughput(Throughput::Bytes(data.len() as u64));
    for field in [FieldTag::Binary, FieldTag::Binary8, FieldTag::Binary16] {
        let encoder_factory = module
            .construct(&format!("FullVectorEncoderFactory{}", field.name()), SYMBOLS, SYMBOL_SIZE)
            .unwrap();
        let decoder_factory = module
            .construct(&format!("FullVectorDecoderFactory{}", field.name()), SYMBOLS, SYMBOL_SIZE)
            .unwrap();
        group.bench_with_input(BenchmarkId::new("full_vector", field), &field, |b, _| {
            b.iter(|| {
                let encoder = encoder_factory.build().unwrap();
                let decoder = decoder_factory.build().unwrap();
                encoder.call("set_symbols", &[Value::from(data.as_slice())]).unwrap();
                encoder.call("set_systematic_off", &[]).unwrap();
                while !decoder.call("is_complete", &[]).unwrap().as_bool().unwrap() {
                    let payload = encoder.call("write_payload", &[]).unwrap();
                    decoder.call("read_payload", &[payload]).unwrap();
                }
            });
        });
    }
    group.finish();
}

fn bench_assemble(c: &mut Criterion) {
    c.bench_with_input(
        BenchmarkId::new("assemble", FamilyId::SlidingWindow),
        &FamilyId::SlidingWindow,
        |b, &family| {
            let cfg = BindingsConfig {
                families: vec![family],
                ..BindingsConfig::default()
            };
            b.iter(|| bindings::assemble(&cfg).unwrap());
        },
    );
}

criterion_group!(round_trip_benches, bench_round_trip, bench_assemble);
criterion_main!(round_trip_benches);
