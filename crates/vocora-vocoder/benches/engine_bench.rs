//! Criterion benchmarks for the vocora-vocoder engine
//!
//! Run with: cargo bench -p vocora-vocoder
#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use vocora_core::{ControlParams, MappingMode, NoteSlot, RegisterSet, ThroughMode};
use vocora_vocoder::{FFT_SIZE, RustFftPlanner, SpectralAnalyzer, TransformPlanner, VocoderEngine};

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK_SIZES: &[usize] = &[512, 1024, 2048, 4096];

/// Voice-like test signal: a few harmonics plus a little noise.
fn generate_test_signal(size: usize) -> Vec<f32> {
    let mut state = 0x1234_5678u32;
    (0..size)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE;
            let tone = (2.0 * std::f32::consts::PI * 180.0 * t).sin() * 0.3
                + (2.0 * std::f32::consts::PI * 360.0 * t).sin() * 0.15;
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            tone + ((state >> 16) as f32 / 65_536.0 - 0.5) * 0.05
        })
        .collect()
}

fn engine_with(setup: impl Fn(&ControlParams)) -> VocoderEngine {
    let params = Arc::new(ControlParams::new());
    setup(&params);
    let mut engine = VocoderEngine::new(SAMPLE_RATE, params).expect("valid sample rate");
    engine.reserve(BLOCK_SIZES[BLOCK_SIZES.len() - 1]);
    engine
}

fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("VocoderEngine");

    let configs: [(&str, fn(&ControlParams)); 4] = [
        ("natural", |_| {}),
        ("one_note", |p| p.set_note(NoteSlot { class: 0, register: 1 }, true)),
        ("full_chord_thin", |p| {
            for class in 0..12 {
                p.set_registers(class, RegisterSet::ALL);
            }
        }),
        ("full_chord_wide_mix", |p| {
            p.set_mapping(MappingMode::Wide);
            p.set_through(ThroughMode::Mix);
            p.set_echo(Some(9000));
            for class in 0..12 {
                p.set_registers(class, RegisterSet::ALL);
            }
        }),
    ];

    for &block_size in BLOCK_SIZES {
        let input = generate_test_signal(block_size);
        let mut output = vec![0.0; block_size];
        for (name, setup) in configs {
            group.bench_with_input(BenchmarkId::new(name, block_size), &block_size, |b, _| {
                let mut engine = engine_with(setup);
                b.iter(|| {
                    let _ = engine.process_block(black_box(&input), &mut output);
                    black_box(&output);
                });
            });
        }
    }
    group.finish();
}

fn bench_analyzer(c: &mut Criterion) {
    let input = generate_test_signal(2 * FFT_SIZE);
    c.bench_function("SpectralAnalyzer/section", |b| {
        let mut analyzer = SpectralAnalyzer::new(RustFftPlanner::new().plan(FFT_SIZE));
        b.iter(|| {
            analyzer.analyze_section(black_box(&input), FFT_SIZE, false, false);
            black_box(analyzer.spectrum());
        });
    });
}

criterion_group!(benches, bench_engine, bench_analyzer);
criterion_main!(benches);
