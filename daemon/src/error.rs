// error.rs
//
// Copyright 2026 Stéphane Cerveau <scerveau@igalia.com>
//
// This file is part of netcam-fix
//
// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetcamError {
    /// Camera refused, timed out, answered with an error status or dropped mid-stream.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// No complete image was found before the buffer reached its cap.
    #[error("Malformed frame: discarded {discarded} bytes without a complete image (limit {limit})")]
    MalformedFrame { discarded: usize, limit: usize },

    #[error("Viewer {viewer} write failed: {reason}")]
    SubscriberWriteFailure { viewer: u64, reason: String },

    #[error("Failed to drop privileges: {0}")]
    PrivilegeDropFailure(String),

    #[error("Failed to open log file {}: {source}", path.display())]
    LogFileOpenFailure {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NetcamError>;
