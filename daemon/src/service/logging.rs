// logging.rs
//
// Copyright 2026 Stéphane Cerveau <scerveau@igalia.com>
//
// This file is part of netcam-fix
//
// SPDX-License-Identifier: GPL-3.0-only

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::error::{NetcamError, Result};

/// Filter used when RUST_LOG is not set
pub const DEFAULT_LOG_DIRECTIVE: &str = "netcam_fix=info";

/// Where log records go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// Open the log file for appending, creating it if needed
pub fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| NetcamError::LogFileOpenFailure {
            path: path.to_path_buf(),
            source,
        })
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE))
}

/// Install the global subscriber.
///
/// For a file target the returned guard flushes pending records when
/// dropped; keep it alive until the process exits.
pub fn init_logging(target: &LogTarget) -> Result<Option<WorkerGuard>> {
    match target {
        LogTarget::Stderr => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| NetcamError::InvalidConfig(format!("logging: {}", e)))?;
            Ok(None)
        }
        LogTarget::File(path) => {
            let file = open_log_file(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);

            tracing_subscriber::fmt()
                .with_ansi(false)
                .with_env_filter(env_filter())
                .with_writer(writer)
                .try_init()
                .map_err(|e| NetcamError::InvalidConfig(format!("logging: {}", e)))?;
            Ok(Some(guard))
        }
    }
}
