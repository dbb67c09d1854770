// mod.rs
//
// Copyright 2026 Stéphane Cerveau <scerveau@igalia.com>
//
// This file is part of netcam-fix
//
// SPDX-License-Identifier: GPL-3.0-only

//! Running as a system service: file logging and dropping root privileges.
//!
//! The process stays in the foreground; detaching is left to the service manager.

pub mod logging;
pub mod privileges;

pub use logging::{init_logging, open_log_file, LogTarget};
pub use privileges::drop_privileges;

/// Log file used in service mode
pub const DEFAULT_LOGFILE: &str = "/var/log/netcam_fix";
