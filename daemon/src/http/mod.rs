// mod.rs
//
// Copyright 2026 Stéphane Cerveau <scerveau@igalia.com>
//
// This file is part of netcam-fix
//
// SPDX-License-Identifier: GPL-3.0-only

use std::time::Duration;

pub mod multiplexer;
pub mod part;
pub mod server;

pub use multiplexer::{Multiplexer, Subscription};
pub use server::ViewerServer;

/// Default port for the HTTP server
pub const DEFAULT_PORT: u16 = 8000;

/// Default bind address for the HTTP server (localhost only)
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// Multipart boundary of the re-emitted stream
pub const BOUNDARY: &str = "--netcam_fix_boundary";

/// Parts queued per viewer before it is dropped as too slow
pub const VIEWER_QUEUE_CAPACITY: usize = 8;

/// Maximum number of concurrent viewers
pub const MAX_CONCURRENT_VIEWERS: usize = 64;

pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest request line plus headers accepted from a viewer
pub const MAX_REQUEST_HEAD: usize = 8 * 1024;

pub const REQUEST_HEAD_TIMEOUT: Duration = Duration::from_secs(10);
