//! Benchmarks for packet decoding
//!
//! Measures record scanning and sample extraction for:
//! - A packet carrying all three sensor values
//! - An idle packet (all zero headers)
//! - Random noise

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use protocol::{PACKET_SIZE, SENSOR_STREAM, SensorReading, records, samples};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn sensor_packet() -> [u8; PACKET_SIZE] {
    let mut buf = [0u8; PACKET_SIZE];
    let mut at = 0;
    for (code, text) in [(1u8, "20.1"), (2, "1013"), (3, "45")] {
        let size = text.len() as u8 + 1;
        buf[at] = SENSOR_STREAM << 3;
        buf[at + 1] = size << 2;
        buf[at + 2] = code;
        buf[at + 3..at + 3 + text.len()].copy_from_slice(text.as_bytes());
        at += size as usize + 2;
    }
    buf
}

fn benchmark_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(PACKET_SIZE as u64));

    let sensor = sensor_packet();
    group.bench_function("samples_sensor_packet", |b| {
        b.iter(|| {
            let mut reading = SensorReading::default();
            for sample in samples(black_box(&sensor)).flatten() {
                reading.apply(sample);
            }
            reading
        })
    });

    let idle = [0u8; PACKET_SIZE];
    group.bench_function("records_idle_packet", |b| {
        b.iter(|| records(black_box(&idle)).count())
    });

    let mut noise = [0u8; PACKET_SIZE];
    StdRng::seed_from_u64(7).fill(&mut noise[..]);
    group.bench_function("samples_noise", |b| {
        b.iter(|| samples(black_box(&noise)).count())
    });

    group.finish();
}

criterion_group!(benches, benchmark_decode);
criterion_main!(benches);
