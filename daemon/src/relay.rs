// relay.rs
//
// Copyright 2026 Stéphane Cerveau <scerveau@igalia.com>
//
// This file is part of netcam-fix
//
// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::error::Result;
use crate::http::{Multiplexer, ViewerServer};
use crate::upstream::UpstreamFetcher;

/// One camera, one listening socket, any number of viewers
pub struct Relay {
    config: Arc<SessionConfig>,
    multiplexer: Arc<Multiplexer>,
}

impl Relay {
    pub fn new(config: SessionConfig) -> Self {
        let multiplexer = Arc::new(Multiplexer::new(config.viewer.queue_capacity));
        Self {
            config: Arc::new(config),
            multiplexer,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn multiplexer(&self) -> Arc<Multiplexer> {
        Arc::clone(&self.multiplexer)
    }

    /// Bind the viewer socket on the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        Ok(TcpListener::bind(self.config.bind_addr).await?)
    }

    /// Relay the camera to viewers accepted on `listener`.
    ///
    /// Returns when `cancel` fires or when the camera is given up on. In both
    /// cases the server stops accepting and every open stream is closed.
    pub async fn run(&self, listener: TcpListener, cancel: CancellationToken) -> Result<()> {
        let fetcher = UpstreamFetcher::new(Arc::clone(&self.config))?;

        let server = ViewerServer::new(
            listener,
            Arc::clone(&self.multiplexer),
            self.config.viewer.clone(),
        );
        let server_cancel = cancel.child_token();
        let server_task = tokio::spawn(server.run(server_cancel.clone()));

        info!("Relaying camera {}", self.config.camera_url);
        let result = fetcher.run(self.multiplexer.as_ref(), &cancel).await;

        // Stop accepting viewers and end the streams still open
        server_cancel.cancel();
        self.multiplexer.close_all();

        match server_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Viewer server error: {}", e),
            Err(e) => warn!("Viewer server task failed: {}", e),
        }

        info!(
            "Relay stopped after {} frames ({} viewers dropped)",
            self.multiplexer.frames_published(),
            self.multiplexer.viewers_dropped()
        );

        result
    }
}
