use criterion::{criterion_group, criterion_main, Criterion};
use lumecast_core::{UniverseId, DMX_CHANNELS};
use lumecast_output::ArtDmx;
use std::hint::black_box;

fn bench_codec(c: &mut Criterion) {
    let mut channels = [0u8; DMX_CHANNELS];
    for (i, slot) in channels.iter_mut().enumerate() {
        *slot = (i % 256) as u8;
    }
    let universe = UniverseId::new(1).unwrap();

    c.benchmark_group("artdmx_codec")
        .bench_function("encode_full_frame", |b| {
            let frame = ArtDmx::new(universe, 42, channels);
            b.iter(|| {
                let packet = frame.encode();
                black_box(packet);
            });
        })
        .bench_function("decode_full_frame", |b| {
            let packet = ArtDmx::new(universe, 42, channels).encode();
            b.iter(|| {
                let frame = ArtDmx::decode(&packet).unwrap();
                black_box(frame);
            });
        });
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
