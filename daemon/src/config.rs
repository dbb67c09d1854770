// config.rs
//
// Copyright 2026 Stéphane Cerveau <scerveau@igalia.com>
//
// This file is part of netcam-fix
//
// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use reqwest::Url;

use crate::error::{NetcamError, Result};
use crate::extractor::DEFAULT_MAX_BUFFER;
use crate::http::{
    DEFAULT_BIND_ADDRESS, DEFAULT_PORT, DEFAULT_WRITE_TIMEOUT, MAX_CONCURRENT_VIEWERS,
    VIEWER_QUEUE_CAPACITY,
};
use crate::upstream::{ReconnectPolicy, DEFAULT_CHUNK_SIZE, DEFAULT_READ_TIMEOUT};

/// HTTP Basic credentials for the camera
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// Build credentials when at least one part is given; the missing part is empty.
    pub fn from_parts(user: Option<String>, password: Option<String>) -> Option<Self> {
        if user.is_none() && password.is_none() {
            return None;
        }
        Some(Self::new(
            user.unwrap_or_default(),
            password.unwrap_or_default(),
        ))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Camera side tuning
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Size of every read from the camera connection
    pub chunk_size: usize,
    /// Longest wait for response headers or for the next chunk
    pub read_timeout: Duration,
    /// Buffer cap for an image that never completes
    pub max_buffer: usize,
    pub reconnect: ReconnectPolicy,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_buffer: DEFAULT_MAX_BUFFER,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Viewer side tuning
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Parts queued per viewer before it is considered too slow
    pub queue_capacity: usize,
    /// Longest time a single part write may take
    pub write_timeout: Duration,
    pub max_viewers: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: VIEWER_QUEUE_CAPACITY,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_viewers: MAX_CONCURRENT_VIEWERS,
        }
    }
}

/// Everything a relay session needs, fixed at startup
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub camera_url: Url,
    pub credentials: Option<Credentials>,
    pub bind_addr: SocketAddr,
    pub upstream: UpstreamConfig,
    pub viewer: ViewerConfig,
}

impl SessionConfig {
    /// Create a configuration with default settings for the given camera URL
    pub fn new(camera_url: &str) -> Result<Self> {
        let camera_url = Url::parse(camera_url)
            .map_err(|e| NetcamError::InvalidConfig(format!("camera URL '{}': {}", camera_url, e)))?;

        if !matches!(camera_url.scheme(), "http" | "https") {
            return Err(NetcamError::InvalidConfig(format!(
                "camera URL must use http or https, got '{}'",
                camera_url.scheme()
            )));
        }

        let bind_addr = SocketAddr::new(
            DEFAULT_BIND_ADDRESS
                .parse()
                .map_err(|e| NetcamError::InvalidConfig(format!("bind address: {}", e)))?,
            DEFAULT_PORT,
        );

        Ok(Self {
            camera_url,
            credentials: None,
            bind_addr,
            upstream: UpstreamConfig::default(),
            viewer: ViewerConfig::default(),
        })
    }

    pub fn credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.upstream.chunk_size = size;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.upstream.read_timeout = timeout;
        self
    }

    pub fn max_buffer(mut self, size: usize) -> Self {
        self.upstream.max_buffer = size;
        self
    }

    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.upstream.reconnect = policy;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.viewer.queue_capacity = capacity;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.viewer.write_timeout = timeout;
        self
    }

    pub fn max_viewers(mut self, max: usize) -> Self {
        self.viewer.max_viewers = max;
        self
    }

    /// Reject settings the relay cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.upstream.chunk_size == 0 {
            return Err(NetcamError::InvalidConfig(
                "chunk size must be at least 1 byte".to_string(),
            ));
        }
        if self.upstream.read_timeout.is_zero() {
            return Err(NetcamError::InvalidConfig(
                "read timeout must not be zero".to_string(),
            ));
        }
        if self.upstream.max_buffer < self.upstream.chunk_size {
            return Err(NetcamError::InvalidConfig(format!(
                "buffer cap ({}) is smaller than the chunk size ({})",
                self.upstream.max_buffer, self.upstream.chunk_size
            )));
        }
        if self.viewer.queue_capacity == 0 {
            return Err(NetcamError::InvalidConfig(
                "viewer queue must hold at least one part".to_string(),
            ));
        }
        if self.viewer.write_timeout.is_zero() {
            return Err(NetcamError::InvalidConfig(
                "write timeout must not be zero".to_string(),
            ));
        }
        if self.viewer.max_viewers == 0 {
            return Err(NetcamError::InvalidConfig(
                "at least one viewer must be allowed".to_string(),
            ));
        }
        Ok(())
    }
}
