//! Worker end-to-end tests
//!
//! Drives a playback worker over a synthetic MP4 file on disk.

use assert_matches::assert_matches;
use framepull::config::Config;
use framepull::presenter::PresentationTarget;
use framepull::worker::{self, WorkerCommand, WorkerHandle, WorkerReply};
use framepull_media::fixture::Mp4Fixture;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn fixture_file(frames: u32, gop: u32) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(
        &Mp4Fixture::new()
            .video_frames(frames, gop)
            .audio_frames(frames)
            .build(),
    )
    .unwrap();
    file
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.demux.read_chunk_size = 512;
    config.scheduler.render_interval_ms = 5;
    config.scheduler.refill_interval_ms = 2;
    config
}

async fn initialize(worker: &mut WorkerHandle, file: &NamedTempFile) -> WorkerReply {
    worker
        .send(WorkerCommand::Initialize {
            source: file.path().display().to_string(),
            target: PresentationTarget::Discard,
        })
        .unwrap();
    timeout(worker.recv()).await.unwrap()
}

async fn timeout<F: std::future::Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(10), future)
        .await
        .expect("worker did not answer in time")
}

#[tokio::test]
async fn test_initialize_reports_video_track() {
    let file = fixture_file(24, 5);
    let mut worker = worker::spawn(test_config());

    let reply = initialize(&mut worker, &file).await;
    assert_matches!(
        reply,
        WorkerReply::InitializeDone {
            ref codec,
            width: Some(320),
            height: Some(240),
            sample_rate: None,
            ..
        } if codec == "avc1.64001f"
    );
    if let WorkerReply::InitializeDone { duration_secs, .. } = reply {
        assert!((duration_secs - 0.96).abs() < 1e-9);
    }

    worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_play_to_end_of_stream() {
    let file = fixture_file(24, 5);
    let mut worker = worker::spawn(test_config());
    initialize(&mut worker, &file).await;

    worker
        .send(WorkerCommand::Play {
            media_time_secs: None,
        })
        .unwrap();
    timeout(worker.expect(|r| matches!(r, WorkerReply::EndOfStream)))
        .await
        .unwrap();

    let report = worker.shutdown().await.unwrap().unwrap();
    assert_eq!(report.scheduler.submitted, 24);
    assert_eq!(report.scheduler.painted + report.scheduler.dropped, 24);
    assert_eq!(report.presenter.painted, report.scheduler.painted);
    assert_eq!(report.presenter.first_timestamp_us, Some(0));
    assert_eq!(report.presenter.last_timestamp_us, Some(23 * 40_000));
    assert_eq!(report.frames_leaked, 0);
}

#[tokio::test]
async fn test_seek_then_play() {
    let file = fixture_file(40, 5);
    let mut worker = worker::spawn(test_config());
    initialize(&mut worker, &file).await;

    worker.send(WorkerCommand::Seek { time_secs: 0.5 }).unwrap();
    let reply = timeout(worker.expect(|r| matches!(r, WorkerReply::SeekDone { .. })))
        .await
        .unwrap();
    let WorkerReply::SeekDone {
        requested_secs,
        position_secs,
    } = reply
    else {
        panic!("unexpected reply {:?}", reply);
    };
    assert!((requested_secs - 0.5).abs() < 1e-9);
    assert!((position_secs - 0.4).abs() < 1e-9);

    worker
        .send(WorkerCommand::Play {
            media_time_secs: None,
        })
        .unwrap();
    timeout(worker.expect(|r| matches!(r, WorkerReply::EndOfStream)))
        .await
        .unwrap();

    let report = worker.shutdown().await.unwrap().unwrap();
    assert!(report.presenter.first_timestamp_us.unwrap() >= 400_000);
    assert_eq!(report.presenter.last_timestamp_us, Some(39 * 40_000));
    assert_eq!(report.frames_leaked, 0);
}

#[tokio::test]
async fn test_out_of_range_times_keep_worker_alive() {
    let file = fixture_file(12, 4);
    let mut worker = worker::spawn(test_config());
    initialize(&mut worker, &file).await;

    worker
        .send(WorkerCommand::UpdateClock {
            media_time_secs: 1e20,
            captured_at: None,
        })
        .unwrap();
    worker.send(WorkerCommand::Seek { time_secs: 1e20 }).unwrap();
    worker.send(WorkerCommand::Seek { time_secs: -1.0 }).unwrap();
    for _ in 0..2 {
        assert_matches!(
            timeout(worker.recv()).await,
            Some(WorkerReply::Error { message }) if message.contains("invalid seek time")
        );
    }

    worker.send(WorkerCommand::Seek { time_secs: 0.2 }).unwrap();
    let reply = timeout(worker.expect(|r| matches!(r, WorkerReply::SeekDone { .. })))
        .await
        .unwrap();
    assert_matches!(
        reply,
        WorkerReply::SeekDone { position_secs, .. } if (position_secs - 0.16).abs() < 1e-9
    );

    let report = worker.shutdown().await.unwrap().unwrap();
    assert_eq!(report.frames_leaked, 0);
}

#[tokio::test]
async fn test_commands_without_source() {
    let mut worker = worker::spawn(test_config());

    worker.send(WorkerCommand::Pause).unwrap();
    assert_matches!(
        timeout(worker.recv()).await,
        Some(WorkerReply::Error { message }) if message.contains("no source")
    );

    assert!(worker.shutdown().await.unwrap().is_none());
}

#[tokio::test]
async fn test_initialize_missing_file() {
    let mut worker = worker::spawn(test_config());

    worker
        .send(WorkerCommand::Initialize {
            source: "/nonexistent/framepull/movie.mp4".into(),
            target: PresentationTarget::Discard,
        })
        .unwrap();
    assert_matches!(timeout(worker.recv()).await, Some(WorkerReply::Error { .. }));

    worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_reinitialize_replaces_session() {
    let first = fixture_file(10, 5);
    let second = fixture_file(20, 5);
    let mut worker = worker::spawn(test_config());

    initialize(&mut worker, &first).await;
    let reply = initialize(&mut worker, &second).await;
    assert_matches!(
        reply,
        WorkerReply::InitializeDone { duration_secs, .. } if (duration_secs - 0.8).abs() < 1e-9
    );

    let report = worker.shutdown().await.unwrap().unwrap();
    assert_eq!(report.frames_leaked, 0);
}
