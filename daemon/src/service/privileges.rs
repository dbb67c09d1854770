// privileges.rs
//
// Copyright 2026 Stéphane Cerveau <scerveau@igalia.com>
//
// This file is part of netcam-fix
//
// SPDX-License-Identifier: GPL-3.0-only

#[cfg(not(unix))]
use crate::error::Result;

/// Account the service switches to when started as root
pub const UNPRIVILEGED_USER: &str = "nobody";
pub const UNPRIVILEGED_GROUP: &str = "nogroup";

#[cfg(unix)]
pub use unix::{drop_privileges, is_privileged, lookup_group, lookup_user, Account};

#[cfg(unix)]
mod unix {
    use std::ffi::CString;

    use tracing::info;

    use super::{UNPRIVILEGED_GROUP, UNPRIVILEGED_USER};
    use crate::error::{NetcamError, Result};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Account {
        pub uid: libc::uid_t,
        pub gid: libc::gid_t,
    }

    pub fn is_privileged() -> bool {
        // SAFETY: geteuid has no preconditions and cannot fail
        unsafe { libc::geteuid() == 0 }
    }

    fn c_name(name: &str) -> Result<CString> {
        CString::new(name)
            .map_err(|_| NetcamError::PrivilegeDropFailure(format!("invalid name '{}'", name)))
    }

    pub fn lookup_user(name: &str) -> Result<Account> {
        let c_name = c_name(name)?;

        // SAFETY: the entry points to static storage, read before any other lookup
        let account = unsafe {
            let entry = libc::getpwnam(c_name.as_ptr());
            if entry.is_null() {
                None
            } else {
                Some(Account {
                    uid: (*entry).pw_uid,
                    gid: (*entry).pw_gid,
                })
            }
        };

        account.ok_or_else(|| NetcamError::PrivilegeDropFailure(format!("unknown user '{}'", name)))
    }

    pub fn lookup_group(name: &str) -> Option<libc::gid_t> {
        let c_name = c_name(name).ok()?;

        // SAFETY: same as getpwnam above
        unsafe {
            let entry = libc::getgrnam(c_name.as_ptr());
            if entry.is_null() {
                None
            } else {
                Some((*entry).gr_gid)
            }
        }
    }

    fn check(ret: libc::c_int, call: &str) -> Result<()> {
        if ret == -1 {
            return Err(NetcamError::PrivilegeDropFailure(format!(
                "{} failed: {}",
                call,
                std::io::Error::last_os_error()
            )));
        }
        Ok(())
    }

    /// Switch to the unprivileged account if running as root.
    ///
    /// Returns whether privileges were dropped. Must run after every
    /// privileged resource (log file, listening socket) is open.
    pub fn drop_privileges() -> Result<bool> {
        if !is_privileged() {
            return Ok(false);
        }

        let account = lookup_user(UNPRIVILEGED_USER)?;
        // Debian style group first, then the primary group of the user
        let gid = lookup_group(UNPRIVILEGED_GROUP).unwrap_or(account.gid);

        // Supplementary groups and gid must change while still root
        // SAFETY: plain syscalls on values owned by this function
        unsafe {
            check(libc::setgroups(0, std::ptr::null()), "setgroups")?;
            check(libc::setgid(gid), "setgid")?;
            check(libc::setuid(account.uid), "setuid")?;
        }

        info!(
            "Dropped privileges to {} (uid {}, gid {})",
            UNPRIVILEGED_USER, account.uid, gid
        );
        Ok(true)
    }
}

/// Nothing to drop outside Unix
#[cfg(not(unix))]
pub fn drop_privileges() -> Result<bool> {
    Ok(false)
}
