// fetcher.rs
//
// Copyright 2026 Stéphane Cerveau <scerveau@igalia.com>
//
// This file is part of netcam-fix
//
// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt, TryStreamExt};
use reqwest::header::CONTENT_TYPE;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::USER_AGENT;
use crate::config::{SessionConfig, UpstreamConfig};
use crate::error::{NetcamError, Result};
use crate::extractor::{Frame, FrameExtractor};

/// Receives every frame extracted from the camera stream, in order.
///
/// Called from the fetch loop, so implementations must not block.
pub trait FrameSink: Send + Sync {
    fn publish_frame(&self, frame: Frame);
}

/// Body of the camera response, readable in fixed-size chunks
pub type UpstreamReader = StreamReader<BoxStream<'static, std::io::Result<Bytes>>, Bytes>;

/// Owns the connection to the camera and drives the frame extractor
pub struct UpstreamFetcher {
    config: Arc<SessionConfig>,
    client: reqwest::Client,
}

impl UpstreamFetcher {
    pub fn new(config: Arc<SessionConfig>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.upstream.read_timeout)
            .user_agent(USER_AGENT)
            // Cameras sit on the local network, never behind the environment proxy
            .no_proxy()
            .build()
            .map_err(|e| NetcamError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Open the camera stream.
    ///
    /// Fails with `UpstreamUnavailable` when the camera cannot be reached,
    /// does not answer within the read timeout, or answers with an error status.
    pub async fn connect(&self) -> Result<UpstreamReader> {
        let url = &self.config.camera_url;
        let read_timeout = self.config.upstream.read_timeout;

        let mut request = self.client.get(url.clone());
        if let Some(credentials) = &self.config.credentials {
            request = request.basic_auth(&credentials.user, Some(&credentials.password));
        }

        let response = tokio::time::timeout(read_timeout, request.send())
            .await
            .map_err(|_| {
                NetcamError::UpstreamUnavailable(format!(
                    "no response from {} within {:?}",
                    url, read_timeout
                ))
            })?
            .map_err(|e| {
                NetcamError::UpstreamUnavailable(format!("request to {} failed: {}", url, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetcamError::UpstreamUnavailable(format!(
                "camera at {} answered {}",
                url, status
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        info!("Connected to camera at {} ({})", url, content_type);

        let body = response
            .bytes_stream()
            .map_err(std::io::Error::other)
            .boxed();

        Ok(StreamReader::new(body))
    }

    /// Fetch frames until cancelled or until the camera is given up on.
    ///
    /// Without a reconnect policy the first upstream failure is returned.
    /// With one, the fetcher waits and reconnects; every connection starts
    /// from a fresh extractor.
    pub async fn run<S>(&self, sink: &S, cancel: &CancellationToken) -> Result<()>
    where
        S: FrameSink + ?Sized,
    {
        let mut backoff = self.config.upstream.reconnect.backoff();

        loop {
            let mut extractor = FrameExtractor::with_max_buffer(self.config.upstream.max_buffer);
            let result = self.session(&mut extractor, sink, cancel).await;

            let stats = extractor.stats();
            debug!(
                "Camera session ended: {} frames, {} duplicate markers stripped, {} bytes discarded",
                stats.frames, stats.duplicates_stripped, stats.bytes_discarded
            );

            let err = match result {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            // A connection that delivered images counts as a success
            if stats.frames > 0 {
                backoff.reset();
            }

            let Some(delay) = backoff.next_delay() else {
                return Err(err);
            };

            warn!(
                "{}; reconnecting in {:?} (attempt {})",
                err,
                delay,
                backoff.attempts()
            );

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn session<S>(
        &self,
        extractor: &mut FrameExtractor,
        sink: &S,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        S: FrameSink + ?Sized,
    {
        let mut reader = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            reader = self.connect() => reader?,
        };

        pump(&mut reader, extractor, sink, &self.config.upstream, cancel).await
    }
}

/// Read the camera stream chunk by chunk and publish every complete frame.
///
/// Returns `Ok` only when cancelled. End of stream, read errors and silence
/// longer than the read timeout are `UpstreamUnavailable`.
pub async fn pump<R, S>(
    reader: &mut R,
    extractor: &mut FrameExtractor,
    sink: &S,
    settings: &UpstreamConfig,
    cancel: &CancellationToken,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    S: FrameSink + ?Sized,
{
    let mut buffer = vec![0u8; settings.chunk_size.max(1)];

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Upstream fetch cancelled");
                return Ok(());
            }
            read = tokio::time::timeout(settings.read_timeout, reader.read(&mut buffer)) => read,
        };

        let n = match read {
            Err(_) => {
                return Err(NetcamError::UpstreamUnavailable(format!(
                    "no data from camera for {:?}",
                    settings.read_timeout
                )))
            }
            Ok(Err(e)) => {
                return Err(NetcamError::UpstreamUnavailable(format!(
                    "read from camera failed: {}",
                    e
                )))
            }
            Ok(Ok(0)) => {
                return Err(NetcamError::UpstreamUnavailable(
                    "camera closed the connection".to_string(),
                ))
            }
            Ok(Ok(n)) => n,
        };

        extractor.feed(&buffer[..n]);

        for frame in extractor.frames() {
            match frame {
                Ok(frame) => sink.publish_frame(frame),
                Err(e) => warn!("{}; buffer reset", e),
            }
        }
    }
}
