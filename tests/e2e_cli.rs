//! CLI end-to-end tests
//!
//! Tests for the framepull command-line interface.

use assert_cmd::prelude::*;
use framepull_media::fixture::Mp4Fixture;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{tempdir, TempDir};

/// Get a command for the framepull binary
#[allow(deprecated)]
fn framepull_cmd() -> Command {
    Command::cargo_bin("framepull").unwrap()
}

fn write_fixture(dir: &Path, name: &str, fixture: Mp4Fixture) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, fixture.build()).unwrap();
    path
}

fn movie() -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = write_fixture(
        dir.path(),
        "movie.mp4",
        Mp4Fixture::new().video_frames(12, 4).audio_frames(10),
    );
    (dir, path)
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = framepull_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = framepull_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("framepull"));
}

#[test]
fn test_cli_inspect() {
    let (_dir, path) = movie();
    let mut cmd = framepull_cmd();
    cmd.arg("inspect")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Tracks: 2"))
        .stdout(predicate::str::contains("avc1.64001f"))
        .stdout(predicate::str::contains("mp4a.40.2"))
        .stdout(predicate::str::contains("320x240"));
}

#[test]
fn test_cli_inspect_json() {
    let (_dir, path) = movie();
    let output = framepull_cmd()
        .args(["inspect", "--json"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["tracks"].as_array().unwrap().len(), 2);
    assert_eq!(json["tracks"][0]["decoder_codec"], "avc1.64001f");
    assert_eq!(json["tracks"][0]["sample_count"], 12);
}

#[test]
fn test_cli_inspect_moov_at_end() {
    let dir = tempdir().unwrap();
    let path = write_fixture(
        dir.path(),
        "tail.mp4",
        Mp4Fixture::new().video_frames(6, 3).moov_at_end(),
    );

    framepull_cmd()
        .arg("inspect")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Tracks: 1"));
}

#[test]
fn test_cli_inspect_missing_file() {
    framepull_cmd()
        .args(["inspect", "/nonexistent/framepull/movie.mp4"])
        .assert()
        .failure();
}

#[test]
fn test_cli_dump_video() {
    let (_dir, path) = movie();
    framepull_cmd()
        .arg("dump")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("key 0 40000 64"))
        .stdout(predicate::str::contains("delta 40000 40000 24"))
        .stdout(predicate::str::contains("key 160000 40000 64"));
}

#[test]
fn test_cli_dump_seek_and_limit() {
    let (_dir, path) = movie();
    let output = framepull_cmd()
        .arg("dump")
        .arg(&path)
        .args(["--seek", "0.2", "-n", "2"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let chunks: Vec<&str> = stdout.lines().filter(|l| !l.starts_with('#')).collect();
    assert_eq!(chunks, vec!["key 160000 40000 64", "delta 200000 40000 24"]);
    assert!(stdout.contains("# seek 0.200s -> sample 4 at 0.160s"));
}

#[test]
fn test_cli_dump_audio() {
    let (_dir, path) = movie();
    framepull_cmd()
        .arg("dump")
        .arg(&path)
        .args(["--track", "audio", "-n", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# track 2 mp4a.40.2"));
}

#[test]
fn test_cli_dump_rejects_unknown_track() {
    let (_dir, path) = movie();
    framepull_cmd()
        .arg("dump")
        .arg(&path)
        .args(["--track", "subtitles"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected 'video' or 'audio'"));
}

#[test]
fn test_cli_dump_rejects_oversized_seek() {
    let (_dir, path) = movie();
    framepull_cmd()
        .arg("dump")
        .arg(&path)
        .args(["--seek", "1e20"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Seek position must be"));
}

#[test]
fn test_cli_play_rejects_infinite_duration() {
    let (_dir, path) = movie();
    framepull_cmd()
        .args(["play", "--quiet", "--duration", "inf"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Playback duration must be"));
}

#[test]
fn test_cli_play_quiet() {
    let (_dir, path) = movie();
    framepull_cmd()
        .args(["play", "--quiet"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Playing avc1.64001f 320x240"))
        .stdout(predicate::str::contains("Chunks submitted: 12"));
}

#[test]
fn test_cli_validate_config() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("framepull.toml");
    fs::write(
        &config_path,
        r#"
[demux]
sample_buffer_target = 30
seek_policy = "nearest-sample"

[playback]
track = "audio"
"#,
    )
    .unwrap();

    framepull_cmd()
        .arg("validate")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("buffer 30 samples"))
        .stdout(predicate::str::contains("audio track"));
}

#[test]
fn test_cli_validate_rejects_zero_window() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("framepull.toml");
    fs::write(&config_path, "[scheduler]\nframe_window_depth = 0\n").unwrap();

    framepull_cmd()
        .arg("validate")
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("frame_window_depth"));
}
