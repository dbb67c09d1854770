// mod.rs
//
// Copyright 2026 Stéphane Cerveau <scerveau@igalia.com>
//
// This file is part of netcam-fix
//
// SPDX-License-Identifier: GPL-3.0-only

//! Recovers complete JPEG images from the raw multipart byte stream of the camera.
//!
//! The camera sends every image followed by its end-of-image marker twice. The
//! scanner takes the bytes from the first start marker through the first end
//! marker after it, then drops one extra end marker when it directly follows.
//!
//! Marker bytes are matched blindly: a start marker repeated before the end
//! marker, or marker bytes inside entropy-coded data, will mis-frame an image.

pub mod frame;
pub mod scanner;

pub use frame::Frame;
pub use scanner::{ExtractorStats, FrameExtractor, Frames};

/// JPEG start-of-image marker
pub const MAGIC_START: [u8; 2] = [0xFF, 0xD8];

/// JPEG end-of-image marker
pub const MAGIC_END: [u8; 2] = [0xFF, 0xD9];

/// Buffer size above which an unfinished image is considered lost
pub const DEFAULT_MAX_BUFFER: usize = 4 * 1024 * 1024;
