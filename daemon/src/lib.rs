// lib.rs
//
// Copyright 2026 Stéphane Cerveau <scerveau@igalia.com>
//
// This file is part of netcam-fix
//
// SPDX-License-Identifier: GPL-3.0-only

//! Relay for netcams whose MJPEG stream repeats the JPEG end marker.
//!
//! The camera stream is read over HTTP, split into clean JPEG frames and
//! served again as `multipart/x-mixed-replace` to any number of viewers.

pub mod config;
pub mod error;
pub mod extractor;
pub mod http;
pub mod relay;
pub mod service;
pub mod upstream;

pub use config::{Credentials, SessionConfig, UpstreamConfig, ViewerConfig};
pub use error::{NetcamError, Result};
pub use extractor::{Frame, FrameExtractor};
pub use http::Multiplexer;
pub use relay::Relay;
pub use upstream::{FrameSink, ReconnectPolicy, UpstreamFetcher};
