//! Benchmarks for frame selection
//!
//! Measures choosing the frame to present from a full frame window, and
//! parsing a synthetic movie end to end.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use framepull_media::fixture::{Mp4Fixture, VIDEO_TRACK_ID};
use framepull_media::{ContainerParser, ExtractionOptions, Mp4StreamParser, ParserHandler};
use framepull_pipeline::{ChunkFactory, DecodedFrame, FrameLedger, FrameWindow, TimestampMode};
use std::sync::Arc;

const FRAME_US: i64 = 40_000;

fn frame(index: i64, ledger: &Arc<FrameLedger>) -> DecodedFrame {
    DecodedFrame::new(
        index * FRAME_US,
        FRAME_US,
        (320, 240),
        Bytes::from_static(&[0; 16]),
        ledger.clone(),
    )
}

fn bench_choose(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_window_choose");
    let ledger = Arc::new(FrameLedger::default());

    for depth in [3usize, 8, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter(|| {
                let mut window = FrameWindow::new(depth);
                for i in (0..depth as i64).rev() {
                    window.insert(frame(i, &ledger));
                }
                // Clock sits between the last two frames: everything older is dropped
                let clock_us = (depth as i64 - 1) * FRAME_US - 1;
                let chosen = window.choose(black_box(clock_us)).map(|f| f.timestamp_us());
                black_box(chosen);
                window.clear();
            })
        });
    }

    group.finish();
}

#[derive(Default)]
struct CountSamples {
    samples: usize,
}

impl ParserHandler for CountSamples {
    fn on_ready(&mut self, _movie: &framepull_media::MovieInfo) {}

    fn on_samples(
        &mut self,
        _track_id: u32,
        samples: Vec<framepull_media::Sample>,
    ) -> std::ops::ControlFlow<()> {
        let chunks = ChunkFactory::new(TimestampMode::Absolute);
        for sample in &samples {
            black_box(chunks.chunk(sample).ok());
        }
        self.samples += samples.len();
        std::ops::ControlFlow::Continue(())
    }

    fn on_error(&mut self, _error: framepull_media::Error) {}

    fn on_seek_complete(&mut self, _position: framepull_media::SeekPosition) {}

    fn on_end_of_track(&mut self, _track_id: u32) {}
}

fn bench_parse(c: &mut Criterion) {
    let file = Bytes::from(Mp4Fixture::new().video_frames(600, 30).audio_frames(900).build());

    c.bench_function("parse_and_chunk_600_frames", |b| {
        b.iter(|| {
            let mut parser = Mp4StreamParser::new(CountSamples::default());
            let mut offset = 0u64;
            for piece in file.chunks(64 * 1024) {
                parser.append_bytes(Bytes::copy_from_slice(piece), offset);
                offset += piece.len() as u64;
            }
            parser.flush();
            parser
                .set_extraction_options(VIDEO_TRACK_ID, ExtractionOptions { batch_size: 32 })
                .unwrap();
            parser.start();
            black_box(parser.handler().samples)
        })
    });
}

criterion_group!(benches, bench_choose, bench_parse);
criterion_main!(benches);
