//! 세그먼트 코덱 벤치마크
//!
//! - 인코딩 (헤더 + 체크섬 계산)
//! - 디코딩 + 체크섬 검증
//! - 수신 버퍼 조립

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use srfp::segment::{self, Segment};
use srfp::ReceptionBuffer;

const PAYLOAD_SIZES: [usize; 4] = [64, 512, 1400, 8192];

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment_encode");

    for &size in &PAYLOAD_SIZES {
        let payload = vec![0xA5u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| segment::encode(black_box(17), black_box(payload), false))
        });
    }
    group.finish();
}

fn bench_decode_verify(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment_decode_verify");

    for &size in &PAYLOAD_SIZES {
        let bytes = segment::encode(17, &vec![0x5Au8; size], false);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| {
                let segment = segment::decode(black_box(bytes)).unwrap();
                black_box(segment.verify())
            })
        });
    }
    group.finish();
}

fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("reception_assemble");

    // 역순 도착 (최악의 순서)
    for &count in &[100u32, 1000] {
        let segments: Vec<Segment> = (0..count)
            .rev()
            .map(|seq| Segment::new(seq, Bytes::from(vec![seq as u8; 1400]), seq + 1 == count))
            .collect();

        group.throughput(Throughput::Bytes(u64::from(count) * 1400));
        group.bench_with_input(BenchmarkId::from_parameter(count), &segments, |b, segments| {
            b.iter(|| {
                let mut buffer = ReceptionBuffer::new();
                for segment in segments {
                    buffer.insert(segment.clone());
                }
                black_box(buffer.assemble().unwrap())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode_verify, bench_assemble);
criterion_main!(benches);
