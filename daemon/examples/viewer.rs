// viewer.rs
//
// Copyright 2026 Stéphane Cerveau <scerveau@igalia.com>
//
// This file is part of netcam-fix
//
// SPDX-License-Identifier: GPL-3.0-only

//! Connects to a running relay and prints every frame it receives.
//!
//! Usage: cargo run --example viewer -- [URL] [COUNT]

use std::time::Instant;

use futures_util::StreamExt;
use netcam_fix::FrameExtractor;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://127.0.0.1:8000/".to_string());
    let count: Option<u64> = std::env::args().nth(2).map(|n| n.parse()).transpose()?;

    println!("Connecting to {}...", url);

    let response = reqwest::get(&url).await?.error_for_status()?;
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    println!("Connected! Content-Type: {}", content_type);

    let started = Instant::now();
    let mut extractor = FrameExtractor::new();
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        extractor.feed(&chunk?);

        for frame in extractor.frames() {
            let frame = frame?;
            let elapsed = started.elapsed().as_secs_f64();
            println!(
                "[{:8.3}s] frame #{} {} bytes ({:.1} fps)",
                elapsed,
                frame.sequence(),
                frame.len(),
                frame.sequence() as f64 / elapsed.max(f64::EPSILON)
            );

            if count.is_some_and(|count| frame.sequence() >= count) {
                return Ok(());
            }
        }
    }

    println!("Stream ended after {} frames", extractor.stats().frames);
    Ok(())
}
