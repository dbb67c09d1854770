// relay_integration.rs
//
// Copyright 2026 Stéphane Cerveau <scerveau@igalia.com>
//
// This file is part of netcam-fix
//
// SPDX-License-Identifier: GPL-3.0-only

//! End to end tests: fake camera, relay, raw HTTP viewers

mod common;

use std::time::Duration;

use common::{fake_jpeg, spawn_relay, FakeCamera, Viewer};
use netcam_fix::http::{BOUNDARY, DEFAULT_PORT, MAX_CONCURRENT_VIEWERS, VIEWER_QUEUE_CAPACITY};
use netcam_fix::{Credentials, NetcamError, ReconnectPolicy, Relay};

#[tokio::test]
async fn test_viewers_receive_identical_frames() {
    let camera = FakeCamera::start().await;
    let relay = spawn_relay(Relay::new(camera.session())).await;

    let mut a = Viewer::connect(relay.addr).await;
    let mut b = Viewer::connect(relay.addr).await;
    relay.wait_for_viewers(2).await;

    let payloads: [&[u8]; 3] = [b"first", b"second", b"third"];
    for payload in payloads {
        camera.send_frame(payload);
    }

    for payload in payloads {
        let expected = fake_jpeg(payload);
        assert_eq!(a.next_part().await, Some(expected.clone()));
        assert_eq!(b.next_part().await, Some(expected));
    }

    assert!(relay.stop().await.is_ok());
}

#[tokio::test]
async fn test_leaving_viewer_does_not_affect_others() {
    let camera = FakeCamera::start().await;
    let relay = spawn_relay(Relay::new(camera.session())).await;

    let mut a = Viewer::connect(relay.addr).await;
    let mut b = Viewer::connect(relay.addr).await;
    relay.wait_for_viewers(2).await;

    for i in 1..=3u8 {
        camera.send_frame(&[i; 16]);
    }
    for i in 1..=3u8 {
        assert_eq!(a.next_part().await, Some(fake_jpeg(&[i; 16])));
        assert_eq!(b.next_part().await, Some(fake_jpeg(&[i; 16])));
    }

    drop(a);
    relay.wait_for_viewers(1).await;

    for i in 4..=6u8 {
        camera.send_frame(&[i; 16]);
    }
    for i in 4..=6u8 {
        assert_eq!(b.next_part().await, Some(fake_jpeg(&[i; 16])));
    }

    assert!(relay.stop().await.is_ok());
}

#[tokio::test]
async fn test_frames_split_across_chunks() {
    let camera = FakeCamera::start().await;
    let relay = spawn_relay(Relay::new(camera.session())).await;

    let mut viewer = Viewer::connect(relay.addr).await;
    relay.wait_for_viewers(1).await;

    // Cut inside both markers and inside the duplicate
    camera.send(b"--myboundary\r\n\r\n\xff".to_vec());
    camera.send(b"\xd8AA".to_vec());
    camera.send(b"A\xff".to_vec());
    camera.send(b"\xd9\xff".to_vec());
    camera.send(b"\xd9more\xff\xd8BBB\xff\xd9\xff\xd9".to_vec());

    assert_eq!(viewer.next_part().await, Some(b"\xff\xd8AAA\xff\xd9".to_vec()));
    assert_eq!(viewer.next_part().await, Some(b"\xff\xd8BBB\xff\xd9".to_vec()));

    assert!(relay.stop().await.is_ok());
}

#[tokio::test]
async fn test_credentials_sent_upstream() {
    let camera = FakeCamera::start().await;
    let config = camera
        .session()
        .credentials(Some(Credentials::new("user", "pass")));
    let relay = spawn_relay(Relay::new(config)).await;

    let request = camera.wait_for_request().await.to_lowercase();
    assert!(request.starts_with("get /video.cgi "));
    assert!(request.contains("authorization: basic dxnlcjpwyxnz"));

    assert!(relay.stop().await.is_ok());
}

#[tokio::test]
async fn test_no_credentials_no_authorization_header() {
    let camera = FakeCamera::start().await;
    let relay = spawn_relay(Relay::new(camera.session())).await;

    let request = camera.wait_for_request().await.to_lowercase();
    assert!(!request.contains("authorization:"));

    assert!(relay.stop().await.is_ok());
}

#[tokio::test]
async fn test_upstream_silence_ends_relay() {
    let camera = FakeCamera::start().await;
    let relay = Relay::new(camera.session().read_timeout(Duration::from_millis(200)));
    let mut subscription = relay.multiplexer().subscribe();
    let relay = spawn_relay(relay).await;

    // An image that never completes
    camera.send(b"--myboundary\r\n\r\n\xff\xd8partial".to_vec());

    let result = relay.finished().await;
    assert!(matches!(result, Err(NetcamError::UpstreamUnavailable(_))));

    // Stream closed without a single part
    assert!(subscription.rx.recv().await.is_none());
}

#[tokio::test]
async fn test_upstream_error_status() {
    let camera = FakeCamera::start_with_status(401).await;
    let relay = spawn_relay(Relay::new(camera.session())).await;

    let result = relay.finished().await;
    assert!(matches!(result, Err(NetcamError::UpstreamUnavailable(_))));
}

#[tokio::test]
async fn test_unreachable_camera() {
    // Bind then release a port so nothing listens on it
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let config = netcam_fix::SessionConfig::new(&format!("http://{}/", addr))
        .unwrap()
        .bind("127.0.0.1:0".parse().unwrap());
    let relay = spawn_relay(Relay::new(config)).await;

    let result = relay.finished().await;
    assert!(matches!(result, Err(NetcamError::UpstreamUnavailable(_))));
}

#[tokio::test]
async fn test_reconnect_after_upstream_drop() {
    let camera = FakeCamera::start().await;
    let config = camera.session().reconnect(ReconnectPolicy::exponential(
        Duration::from_millis(50),
        Duration::from_millis(200),
    ));
    let relay = Relay::new(config);
    let mut subscription = relay.multiplexer().subscribe();
    let relay = spawn_relay(relay).await;

    camera.send_frame(b"before");
    camera.hangup();
    camera.send_frame(b"after");

    let first = subscription.rx.recv().await.unwrap();
    assert!(first.ends_with(&fake_jpeg(b"before")));
    let second = tokio::time::timeout(common::TEST_TIMEOUT, subscription.rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(second.ends_with(&fake_jpeg(b"after")));
    assert_eq!(camera.connections(), 2);

    assert!(relay.stop().await.is_ok());
}

#[tokio::test]
async fn test_reconnect_gives_up_after_max_attempts() {
    let camera = FakeCamera::start_with_status(503).await;
    let config = camera.session().reconnect(
        ReconnectPolicy::exponential(Duration::from_millis(10), Duration::from_millis(20))
            .max_attempts(2),
    );
    let relay = spawn_relay(Relay::new(config)).await;

    let result = relay.finished().await;
    assert!(matches!(result, Err(NetcamError::UpstreamUnavailable(_))));
    assert_eq!(camera.connections(), 3);
}

#[tokio::test]
async fn test_stop_closes_viewer_streams() {
    let camera = FakeCamera::start().await;
    let relay = spawn_relay(Relay::new(camera.session())).await;

    let mut viewer = Viewer::connect(relay.addr).await;
    relay.wait_for_viewers(1).await;

    assert!(relay.stop().await.is_ok());
    assert_eq!(viewer.next_part().await, None);
}

#[test]
fn test_stream_constants() {
    assert_eq!(BOUNDARY, "--netcam_fix_boundary");
    assert_eq!(DEFAULT_PORT, 8000);
    assert_eq!(VIEWER_QUEUE_CAPACITY, 8);
    assert_eq!(MAX_CONCURRENT_VIEWERS, 64);
}
