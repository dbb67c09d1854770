// mod.rs
//
// Copyright 2026 Stéphane Cerveau <scerveau@igalia.com>
//
// This file is part of netcam-fix
//
// SPDX-License-Identifier: GPL-3.0-only

use std::time::Duration;

pub mod fetcher;
pub mod reconnect;

pub use fetcher::{pump, FrameSink, UpstreamFetcher, UpstreamReader};
pub use reconnect::{Backoff, ReconnectPolicy};

/// Bytes requested from the camera connection per read
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Longest silence tolerated from the camera
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

pub const USER_AGENT: &str = concat!("netcam-fix/", env!("CARGO_PKG_VERSION"));
