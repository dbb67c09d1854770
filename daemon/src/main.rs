// main.rs
//
// Copyright 2026 Stéphane Cerveau <scerveau@igalia.com>
//
// This file is part of netcam-fix
//
// SPDX-License-Identifier: GPL-3.0-only

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use netcam_fix::http::{
    DEFAULT_BIND_ADDRESS, DEFAULT_PORT, MAX_CONCURRENT_VIEWERS, VIEWER_QUEUE_CAPACITY,
};
use netcam_fix::service::{drop_privileges, init_logging, LogTarget, DEFAULT_LOGFILE};
use netcam_fix::upstream::DEFAULT_CHUNK_SIZE;
use netcam_fix::{Credentials, NetcamError, ReconnectPolicy, Relay, SessionConfig};

const EXIT_CODE_ERROR: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "netcam-fix")]
#[command(author = "Stéphane Cerveau")]
#[command(version)]
#[command(about = "Reads the MJPEG stream of a netcam, removes its duplicated end markers and serves it again")]
struct Args {
    /// URL of the camera MJPEG stream
    camera_url: String,

    /// Camera username
    #[arg(short, long)]
    user: Option<String>,

    /// Camera password
    #[arg(short = 'p', long = "pass", env = "NETCAM_PASS", hide_env_values = true)]
    password: Option<String>,

    /// HTTP port for viewers
    #[arg(short = 'P', long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Bind address for the HTTP server
    #[arg(short, long, default_value = DEFAULT_BIND_ADDRESS)]
    bind: String,

    /// Stay attached to the terminal: log to stderr and keep the current user
    #[arg(long)]
    nodaemon: bool,

    /// Log file in service mode
    #[arg(long, default_value = DEFAULT_LOGFILE)]
    logfile: PathBuf,

    /// Reconnect to the camera with exponential backoff instead of exiting
    #[arg(long)]
    reconnect: bool,

    /// Seconds to wait for data from the camera
    #[arg(long, default_value_t = 30)]
    read_timeout: u64,

    /// Bytes read from the camera at once
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Maximum number of concurrent viewers
    #[arg(long, default_value_t = MAX_CONCURRENT_VIEWERS)]
    max_viewers: usize,

    /// Frames queued per viewer before it is disconnected as too slow
    #[arg(long, default_value_t = VIEWER_QUEUE_CAPACITY)]
    viewer_queue: usize,

    /// Seconds a single write to a viewer may take
    #[arg(long, default_value_t = 10)]
    write_timeout: u64,
}

impl Args {
    fn session_config(&self) -> netcam_fix::Result<SessionConfig> {
        let ip: IpAddr = self.bind.parse().map_err(|e| {
            NetcamError::InvalidConfig(format!("bind address '{}': {}", self.bind, e))
        })?;

        let reconnect = if self.reconnect {
            ReconnectPolicy {
                enabled: true,
                ..ReconnectPolicy::default()
            }
        } else {
            ReconnectPolicy::disabled()
        };

        let config = SessionConfig::new(&self.camera_url)?
            .credentials(Credentials::from_parts(
                self.user.clone(),
                self.password.clone(),
            ))
            .bind(SocketAddr::new(ip, self.port))
            .chunk_size(self.chunk_size)
            .read_timeout(Duration::from_secs(self.read_timeout))
            .reconnect(reconnect)
            .max_viewers(self.max_viewers)
            .queue_capacity(self.viewer_queue)
            .write_timeout(Duration::from_secs(self.write_timeout));

        config.validate()?;
        Ok(config)
    }

    fn log_target(&self) -> LogTarget {
        if self.nodaemon {
            LogTarget::Stderr
        } else {
            LogTarget::File(self.logfile.clone())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logging is not set up yet, startup errors go to stderr
    let config = match args.session_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("netcam-fix: {}", e);
            std::process::exit(EXIT_CODE_ERROR);
        }
    };

    let log_guard = match init_logging(&args.log_target()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("netcam-fix: {}", e);
            std::process::exit(EXIT_CODE_ERROR);
        }
    };

    let relay = Relay::new(config);

    let listener = match relay.bind().await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", relay.config().bind_addr, e);
            eprintln!("netcam-fix: failed to bind {}: {}", relay.config().bind_addr, e);
            drop(log_guard);
            std::process::exit(EXIT_CODE_ERROR);
        }
    };
    info!("Serving at {}", listener.local_addr()?);

    // Log file and socket are open, root is no longer needed
    if !args.nodaemon {
        match drop_privileges() {
            Ok(true) => {}
            Ok(false) => debug!("Not running as root, keeping the current user"),
            Err(e) => {
                error!("{}", e);
                eprintln!("netcam-fix: {}", e);
                drop(log_guard);
                std::process::exit(EXIT_CODE_ERROR);
            }
        }
    }

    let cancel = CancellationToken::new();

    // Register signal handlers before spawning (registration is synchronous and fallible)
    #[cfg(unix)]
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;
    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = sigint.recv() => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                return;
            }
            info!("Received Ctrl+C");
        }
        signal_cancel.cancel();
    });

    info!("netcam-fix started. Press Ctrl+C to stop.");

    let result = relay.run(listener, cancel).await;

    match result {
        Ok(()) => {
            info!("Shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            if args.nodaemon {
                eprintln!("netcam-fix: {}", e);
            }
            // process::exit skips destructors, flush the log writer first
            drop(log_guard);
            std::process::exit(EXIT_CODE_ERROR);
        }
    }
}
