// server.rs
//
// Copyright 2026 Stéphane Cerveau <scerveau@igalia.com>
//
// This file is part of netcam-fix
//
// SPDX-License-Identifier: GPL-3.0-only

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ViewerConfig;
use crate::error::{NetcamError, Result};

use super::multiplexer::{Multiplexer, Subscription};
use super::part::{error_response, response_head};
use super::{MAX_REQUEST_HEAD, REQUEST_HEAD_TIMEOUT};

/// Serves the re-encoded stream to any number of HTTP viewers
pub struct ViewerServer {
    listener: TcpListener,
    multiplexer: Arc<Multiplexer>,
    config: ViewerConfig,
}

impl ViewerServer {
    pub fn new(listener: TcpListener, multiplexer: Arc<Multiplexer>, config: ViewerConfig) -> Self {
        Self {
            listener,
            multiplexer,
            config,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept viewers until cancelled. Open streams are closed on cancel.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let Self {
            listener,
            multiplexer,
            config,
        } = self;
        let config = Arc::new(config);

        info!("Serving MJPEG stream on http://{}", listener.local_addr()?);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Viewer server stopped");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            Arc::clone(&multiplexer),
                            Arc::clone(&config),
                            cancel.clone(),
                        ));
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    multiplexer: Arc<Multiplexer>,
    config: Arc<ViewerConfig>,
    cancel: CancellationToken,
) {
    debug!("New connection from {}", addr);

    let request = match timeout(REQUEST_HEAD_TIMEOUT, read_request_head(&mut stream)).await {
        Ok(Ok(request)) => request,
        Ok(Err(e)) => {
            debug!("Rejecting {}: {}", addr, e);
            let _ = write_with_timeout(
                &mut stream,
                &error_response(400, "Bad Request"),
                config.write_timeout,
            )
            .await;
            return;
        }
        Err(_) => {
            debug!("No request from {} within {:?}", addr, REQUEST_HEAD_TIMEOUT);
            return;
        }
    };

    // Every path serves the stream, only the method matters
    if request.method != "GET" {
        info!("Unsupported method {} from {}", request.method, addr);
        let _ = write_with_timeout(
            &mut stream,
            &error_response(501, "Not Implemented"),
            config.write_timeout,
        )
        .await;
        return;
    }

    // Check viewer limit before subscribing
    if multiplexer.viewer_count() >= config.max_viewers {
        warn!(
            "Max viewers ({}) reached, rejecting connection from {}",
            config.max_viewers, addr
        );
        let _ = write_with_timeout(
            &mut stream,
            &error_response(503, "Service Unavailable"),
            config.write_timeout,
        )
        .await;
        return;
    }

    if let Err(e) = write_with_timeout(&mut stream, &response_head(), config.write_timeout).await {
        debug!("Failed to send response head to {}: {}", addr, e);
        return;
    }

    let Subscription { id, mut rx } = multiplexer.subscribe();
    info!("Viewer {} connected from {} ({})", id, addr, request.path);

    let (mut reader, mut writer) = stream.into_split();

    // Spawn task to forward parts from the queue to the socket
    let write_timeout = config.write_timeout;
    let mut sender_task = tokio::spawn(async move {
        let result = write_parts(&mut writer, &mut rx, id, write_timeout).await;
        let _ = writer.shutdown().await;
        result
    });

    // Watch the socket for the viewer going away
    let mut scratch = [0u8; 512];
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            finished = &mut sender_task => {
                match finished {
                    Ok(Ok(parts)) => debug!("Viewer {} stream ended after {} parts", id, parts),
                    Ok(Err(e)) => debug!("{}", e),
                    Err(e) => warn!("Viewer {} writer task failed: {}", id, e),
                }
                break;
            }
            read = reader.read(&mut scratch) => match read {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!("Read error from viewer {}: {}", id, e);
                    break;
                }
            }
        }
    }

    // Unregister viewer
    multiplexer.unsubscribe(id);
    sender_task.abort();
    info!("Viewer {} disconnected", id);
}

/// Request line of a viewer request
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestHead {
    pub method: String,
    pub path: String,
}

/// Read the request line and headers, up to the blank line.
///
/// Headers are skipped. Anything past the blank line is ignored.
pub(crate) async fn read_request_head<R>(reader: &mut R) -> Result<RequestHead>
where
    R: AsyncRead + Unpin,
{
    let mut head = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Err(NetcamError::InvalidRequest(
                "connection closed before the end of the request head".to_string(),
            ));
        }
        head.extend_from_slice(&chunk[..n]);

        if let Some(end) = find_head_end(&head) {
            return parse_request_line(&head[..end]);
        }
        if head.len() > MAX_REQUEST_HEAD {
            return Err(NetcamError::InvalidRequest(format!(
                "request head larger than {} bytes",
                MAX_REQUEST_HEAD
            )));
        }
    }
}

// Blank line ending the head; bare LF line endings are tolerated
fn find_head_end(head: &[u8]) -> Option<usize> {
    let crlf = head.windows(4).position(|w| w == b"\r\n\r\n");
    let lf = head.windows(2).position(|w| w == b"\n\n");
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn parse_request_line(head: &[u8]) -> Result<RequestHead> {
    let text = String::from_utf8_lossy(head);
    let line = text.lines().next().unwrap_or_default();
    let mut fields = line.split_whitespace();

    match (fields.next(), fields.next()) {
        (Some(method), Some(path)) => Ok(RequestHead {
            method: method.to_string(),
            path: path.to_string(),
        }),
        _ => Err(NetcamError::InvalidRequest(format!(
            "malformed request line '{}'",
            line
        ))),
    }
}

async fn write_with_timeout<W>(writer: &mut W, data: &[u8], limit: Duration) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    match timeout(limit, writer.write_all(data)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(NetcamError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("write stalled for more than {:?}", limit),
        ))),
    }
}

/// Drain a viewer queue into its socket. Returns the number of parts written
/// once the queue is closed.
pub(crate) async fn write_parts<W>(
    writer: &mut W,
    rx: &mut mpsc::Receiver<Bytes>,
    viewer: u64,
    write_timeout: Duration,
) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;

    while let Some(part) = rx.recv().await {
        match timeout(write_timeout, writer.write_all(&part)).await {
            Ok(Ok(())) => written += 1,
            Ok(Err(e)) => {
                return Err(NetcamError::SubscriberWriteFailure {
                    viewer,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(NetcamError::SubscriberWriteFailure {
                    viewer,
                    reason: format!("write stalled for more than {:?}", write_timeout),
                })
            }
        }
    }

    Ok(written)
}
