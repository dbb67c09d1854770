// mod.rs
//
// Copyright 2026 Stéphane Cerveau <scerveau@igalia.com>
//
// This file is part of netcam-fix
//
// SPDX-License-Identifier: GPL-3.0-only

//! Fake camera and raw HTTP viewer shared by the integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use netcam_fix::{Multiplexer, Relay, SessionConfig};

pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// What the camera does next on its current connection
pub enum Feed {
    Data(Vec<u8>),
    Hangup,
}

/// Minimal HTTP camera serving a scripted multipart body
pub struct FakeCamera {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
    feed: mpsc::UnboundedSender<Feed>,
    task: JoinHandle<()>,
}

impl FakeCamera {
    /// Camera answering 200 and streaming whatever is fed to it
    pub async fn start() -> Self {
        Self::start_with_status(200).await
    }

    /// Camera answering `status`; anything but 200 is sent without a body
    pub async fn start_with_status(status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let (feed, feed_rx) = mpsc::unbounded_channel();
        let feed_rx = Arc::new(tokio::sync::Mutex::new(feed_rx));

        let task = {
            let requests = Arc::clone(&requests);
            let connections = Arc::clone(&connections);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve_camera(
                        stream,
                        status,
                        Arc::clone(&requests),
                        Arc::clone(&feed_rx),
                    ));
                }
            })
        };

        Self {
            addr,
            requests,
            connections,
            feed,
            task,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}/video.cgi", self.addr)
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig::new(&self.url())
            .unwrap()
            .bind("127.0.0.1:0".parse().unwrap())
    }

    pub fn send(&self, data: Vec<u8>) {
        let _ = self.feed.send(Feed::Data(data));
    }

    /// Send one image followed by the duplicated end marker
    pub fn send_frame(&self, payload: &[u8]) {
        self.send(camera_part(payload));
    }

    /// Close the current connection once everything queued before is sent
    pub fn hangup(&self) {
        let _ = self.feed.send(Feed::Hangup);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub async fn wait_for_request(&self) -> String {
        tokio::time::timeout(TEST_TIMEOUT, async {
            loop {
                if let Some(request) = self.requests().into_iter().next() {
                    return request;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("camera never received a request")
    }
}

impl Drop for FakeCamera {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_camera(
    mut stream: TcpStream,
    status: u16,
    requests: Arc<Mutex<Vec<String>>>,
    feed: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Feed>>>,
) {
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&chunk[..n]),
        }
    }
    requests
        .lock()
        .unwrap()
        .push(String::from_utf8_lossy(&head).into_owned());

    if status != 200 {
        let response = format!(
            "HTTP/1.0 {} Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            status
        );
        let _ = stream.write_all(response.as_bytes()).await;
        return;
    }

    let response = "HTTP/1.0 200 OK\r\n\
                    Content-Type: multipart/x-mixed-replace;boundary=myboundary\r\n\
                    Connection: close\r\n\r\n";
    if stream.write_all(response.as_bytes()).await.is_err() {
        return;
    }

    // One connection consumes the feed at a time
    let mut feed = feed.lock().await;
    while let Some(item) = feed.recv().await {
        match item {
            Feed::Data(data) => {
                if stream.write_all(&data).await.is_err() {
                    return;
                }
            }
            Feed::Hangup => return,
        }
    }
}

pub fn fake_jpeg(payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    out.extend_from_slice(payload);
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

/// Multipart section with the image end marker written twice
pub fn camera_part(payload: &[u8]) -> Vec<u8> {
    let jpeg = fake_jpeg(payload);
    let mut out = format!(
        "--myboundary\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        jpeg.len()
    )
    .into_bytes();
    out.extend_from_slice(&jpeg);
    out.extend_from_slice(&[0xFF, 0xD9]);
    out.extend_from_slice(b"\r\n");
    out
}

pub struct RunningRelay {
    pub addr: SocketAddr,
    pub multiplexer: Arc<Multiplexer>,
    pub cancel: CancellationToken,
    pub task: JoinHandle<netcam_fix::Result<()>>,
}

impl RunningRelay {
    pub async fn wait_for_viewers(&self, count: usize) {
        tokio::time::timeout(TEST_TIMEOUT, async {
            while self.multiplexer.viewer_count() != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("viewer count never reached the expected value");
    }

    /// Cancel the relay and return how it ended
    pub async fn stop(self) -> netcam_fix::Result<()> {
        self.cancel.cancel();
        tokio::time::timeout(TEST_TIMEOUT, self.task)
            .await
            .expect("relay did not stop")
            .unwrap()
    }

    /// Wait for the relay to end on its own
    pub async fn finished(self) -> netcam_fix::Result<()> {
        tokio::time::timeout(TEST_TIMEOUT, self.task)
            .await
            .expect("relay did not end")
            .unwrap()
    }
}

pub async fn spawn_relay(relay: Relay) -> RunningRelay {
    let listener = relay.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    let multiplexer = relay.multiplexer();
    let cancel = CancellationToken::new();

    let task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { relay.run(listener, cancel).await })
    };

    RunningRelay {
        addr,
        multiplexer,
        cancel,
        task,
    }
}

/// HTTP client reading the relay stream part by part
pub struct Viewer {
    stream: TcpStream,
}

impl Viewer {
    pub async fn connect(addr: SocketAddr) -> Self {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: relay\r\n\r\n")
            .await
            .unwrap();

        let mut viewer = Self { stream };
        let status = viewer.read_line().await.expect("no status line");
        assert_eq!(status, "HTTP/1.0 200 OK");
        while viewer.read_line().await.is_some_and(|line| !line.is_empty()) {}
        viewer
    }

    async fn read_line(&mut self) -> Option<String> {
        let mut line = Vec::new();
        loop {
            let byte = self.stream.read_u8().await.ok()?;
            line.push(byte);
            if line.ends_with(b"\r\n") {
                line.truncate(line.len() - 2);
                return Some(String::from_utf8_lossy(&line).into_owned());
            }
        }
    }

    /// Next image of the stream, None once the relay closed it
    pub async fn next_part(&mut self) -> Option<Vec<u8>> {
        tokio::time::timeout(TEST_TIMEOUT, async {
            let boundary = self.read_line().await?;
            assert_eq!(boundary, "--netcam_fix_boundary");

            let length = self.read_line().await?;
            let length: usize = length
                .strip_prefix("Content-Length: ")
                .expect("part without Content-Length")
                .parse()
                .unwrap();
            assert_eq!(self.read_line().await?, "");

            let mut data = vec![0u8; length];
            self.stream.read_exact(&mut data).await.ok()?;
            Some(data)
        })
        .await
        .expect("no part received in time")
    }
}
