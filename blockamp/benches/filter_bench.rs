//! Filter throughput benchmark
//!
//! Measures one playback block through the IIR and delay filters at common
//! block sizes, plus the amplitude meter on the filtered block.
//!
//! **Goal:** a 20 ms stereo block at 48 kHz should filter in well under 1 ms

use blockamp::{AmpMeter, DelayFilter, FilterCoefficients, IirFilter};
use blockamp_common::ScalingKind;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const CHANNELS: usize = 2;
const SAMPLE_RATE: u32 = 48_000;

fn block(frames: usize) -> Vec<f32> {
    (0..frames * CHANNELS)
        .map(|i| ((i as f32) * 0.013).sin() * 0.8)
        .collect()
}

/// Fourth-order Butterworth lowpass (fc = 0.1 fs)
fn lowpass_order4() -> FilterCoefficients {
    FilterCoefficients::new(
        vec![0.004_824, 0.019_297, 0.028_946, 0.019_297, 0.004_824],
        vec![1.0, -2.369_513, 2.313_988, -1.054_665, 0.187_379],
    )
    .expect("valid coefficients")
}

fn bench_iir(c: &mut Criterion) {
    let mut group = c.benchmark_group("iir_filter");

    for frames in [256usize, 960, 4096] {
        let input = block(frames);
        let mut output = vec![0.0f32; input.len()];
        let mut filter = IirFilter::new(lowpass_order4(), CHANNELS).expect("filter");

        group.throughput(Throughput::Elements(frames as u64));
        group.bench_with_input(BenchmarkId::new("order4_stereo", frames), &frames, |b, &frames| {
            b.iter(|| {
                let ok = filter.apply(black_box(&input), &mut output, frames);
                black_box(ok);
            });
        });
    }

    group.finish();
}

fn bench_delay(c: &mut Criterion) {
    let mut group = c.benchmark_group("delay_filter");

    for delay_ms in [5u32, 250] {
        let frames = 960;
        let input = block(frames);
        let mut output = vec![0.0f32; input.len()];
        let mut filter = DelayFilter::new(delay_ms, 0.5, 0.3, SAMPLE_RATE, CHANNELS).expect("filter");

        group.throughput(Throughput::Elements(frames as u64));
        group.bench_with_input(BenchmarkId::new("stereo_960", delay_ms), &delay_ms, |b, _| {
            b.iter(|| {
                let ok = filter.apply(black_box(&input), &mut output, frames);
                black_box(ok);
            });
        });
    }

    group.finish();
}

fn bench_meter(c: &mut Criterion) {
    let mut group = c.benchmark_group("amp_meter");
    let input = block(960);

    for (name, scaling) in [("linear", ScalingKind::Linear), ("logarithmic", ScalingKind::Logarithmic)] {
        let meter = AmpMeter::new(scaling, 1.0, -48.0);
        group.bench_function(name, |b| {
            b.iter(|| black_box(meter.block_pattern(black_box(&input))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_iir, bench_delay, bench_meter);
criterion_main!(benches);
