use std::fs;

use httpmock::prelude::*;
use stem_mixer_core::{AssetId, MixerError, Orchestrator, ServiceConfig, MAX_UPLOAD_BYTES};

fn orchestrator_for(server: &MockServer) -> Orchestrator {
    let config = ServiceConfig::new(server.base_url().parse().unwrap());
    Orchestrator::new(config).expect("client build failed")
}

fn audio_file(dir: &tempfile::TempDir, name: &str, len: usize) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, vec![0u8; len]).unwrap();
    path
}

#[test]
fn submit_returns_namespaced_asset_id() {
    let server = MockServer::start();
    let upload = server.mock(|when, then| {
        when.method(POST).path("/upload");
        then.status(200)
            .header("Content-Type", "application/json")
            .body(r#"{"filename": "12345_song.mp3"}"#);
    });

    let dir = tempfile::tempdir().unwrap();
    // a typical source file, ~3 MB
    let path = audio_file(&dir, "song.mp3", 3 * 1024 * 1024);

    let orchestrator = orchestrator_for(&server);
    let asset = orchestrator
        .submit_file(&path, Some("12345"))
        .expect("submit failed");

    assert_eq!(asset, AssetId::new("12345_song.mp3"));
    assert_eq!(asset.display_name(), "song.mp3");
    upload.assert_hits(1);
}

#[test]
fn rejected_upload_surfaces_as_upload_error() {
    let server = MockServer::start();
    let _upload = server.mock(|when, then| {
        when.method(POST).path("/upload");
        then.status(500);
    });

    let dir = tempfile::tempdir().unwrap();
    let path = audio_file(&dir, "song.wav", 1024);

    match orchestrator_for(&server).submit_file(&path, None) {
        Err(MixerError::Upload(msg)) => assert!(msg.contains("500"), "unexpected: {msg}"),
        other => panic!("expected Upload error, got {other:?}"),
    }
}

#[test]
fn missing_asset_name_surfaces_as_upload_error() {
    let server = MockServer::start();
    let _upload = server.mock(|when, then| {
        when.method(POST).path("/upload");
        then.status(200)
            .header("Content-Type", "application/json")
            .body(r#"{"status": "ok"}"#);
    });

    let dir = tempfile::tempdir().unwrap();
    let path = audio_file(&dir, "song.mp3", 1024);

    match orchestrator_for(&server).submit_file(&path, None) {
        Err(MixerError::Upload(msg)) => {
            assert!(msg.contains("asset name"), "unexpected: {msg}")
        }
        other => panic!("expected Upload error, got {other:?}"),
    }
}

#[test]
fn oversized_or_non_audio_files_are_rejected_before_upload() {
    let server = MockServer::start();
    let upload = server.mock(|when, then| {
        when.method(POST).path("/upload");
        then.status(200).body(r#"{"filename": "x"}"#);
    });

    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator_for(&server);

    let big = dir.path().join("big.mp3");
    let file = fs::File::create(&big).unwrap();
    file.set_len(MAX_UPLOAD_BYTES + 1).unwrap();
    assert!(matches!(
        orchestrator.submit_file(&big, None),
        Err(MixerError::Upload(_))
    ));

    let text = audio_file(&dir, "notes.txt", 16);
    assert!(matches!(
        orchestrator.submit_file(&text, None),
        Err(MixerError::Upload(_))
    ));

    upload.assert_hits(0);
}

#[test]
fn progress_stream_is_monotone_and_terminal_at_100() {
    let server = MockServer::start();
    let body = "data: {\"progress\": 0}\n\n\
                data: {\"progress\": 25}\n\n\
                data: {\"progress\": 60}\n\n\
                data: {\"progress\": 100}\n\n";
    let _process = server.mock(|when, then| {
        when.method(GET).path("/process/12345_song.mp3");
        then.status(200)
            .header("Content-Type", "text/event-stream")
            .body(body);
    });

    let orchestrator = orchestrator_for(&server);
    let mut watch = orchestrator
        .watch_progress(&AssetId::new("12345_song.mp3"))
        .expect("watch failed");

    let mut seen = Vec::new();
    for event in &mut watch {
        seen.push(event.expect("stream errored").progress);
    }

    assert_eq!(seen, vec![0, 25, 60, 100]);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    // fused after the terminal event
    assert!(watch.next().is_none());
}

#[test]
fn stream_error_is_terminal_with_no_further_events() {
    let server = MockServer::start();
    // producer dies at 40%
    let body = "data: {\"progress\": 0}\n\ndata: {\"progress\": 40}\n\n";
    let _process = server.mock(|when, then| {
        when.method(GET).path("/process/crash.mp3");
        then.status(200)
            .header("Content-Type", "text/event-stream")
            .body(body);
    });

    let orchestrator = orchestrator_for(&server);
    let mut watch = orchestrator
        .watch_progress(&AssetId::new("crash.mp3"))
        .expect("watch failed");

    assert_eq!(watch.next().unwrap().unwrap().progress, 0);
    assert_eq!(watch.next().unwrap().unwrap().progress, 40);
    match watch.next() {
        Some(Err(MixerError::Progress(_))) => {}
        other => panic!("expected terminal Progress error, got {other:?}"),
    }
    assert!(watch.next().is_none());
}

#[test]
fn malformed_progress_payload_is_terminal() {
    let server = MockServer::start();
    let body = "data: {\"progress\": 10}\n\ndata: not json\n\n";
    let _process = server.mock(|when, then| {
        when.method(GET).path("/process/garbled.mp3");
        then.status(200)
            .header("Content-Type", "text/event-stream")
            .body(body);
    });

    let orchestrator = orchestrator_for(&server);
    let mut watch = orchestrator
        .watch_progress(&AssetId::new("garbled.mp3"))
        .expect("watch failed");

    assert_eq!(watch.next().unwrap().unwrap().progress, 10);
    assert!(matches!(watch.next(), Some(Err(MixerError::Progress(_)))));
    assert!(watch.next().is_none());
}

#[test]
fn extraction_relays_audio_bytes() {
    let server = MockServer::start();
    let _youtube = server.mock(|when, then| {
        when.method(POST)
            .path("/youtube")
            .json_body(serde_json::json!({ "videoId": "abc123" }));
        then.status(200)
            .header("Content-Type", "audio/mpeg")
            .body(vec![1u8, 2, 3, 4]);
    });

    let orchestrator = orchestrator_for(&server);
    let (bytes, name) = orchestrator.extract_video("abc123").expect("extract failed");
    assert_eq!(bytes, vec![1, 2, 3, 4]);
    // no Content-Disposition from the server, fall back to the video id
    assert_eq!(name, "abc123.mp3");
}

#[test]
fn extraction_decodes_the_title_from_content_disposition() {
    let server = MockServer::start();
    let _youtube = server.mock(|when, then| {
        when.method(POST).path("/youtube");
        then.status(200)
            .header("Content-Type", "audio/mpeg")
            .header(
                "Content-Disposition",
                "attachment; filename=\"My%20Song.mp3\"",
            )
            .body(vec![9u8]);
    });

    let (_, name) = orchestrator_for(&server)
        .extract_video("abc123")
        .expect("extract failed");
    assert_eq!(name, "My Song.mp3");
}

#[test]
fn failed_extraction_surfaces_as_extraction_error() {
    let server = MockServer::start();
    let _youtube = server.mock(|when, then| {
        when.method(POST).path("/youtube");
        then.status(500);
    });

    match orchestrator_for(&server).extract_video("nope") {
        Err(MixerError::Extraction(msg)) => assert!(msg.contains("500"), "unexpected: {msg}"),
        other => panic!("expected Extraction error, got {other:?}"),
    }
}
