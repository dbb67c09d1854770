// multiplexer.rs
//
// Copyright 2026 Stéphane Cerveau <scerveau@igalia.com>
//
// This file is part of netcam-fix
//
// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use super::part::encode_part;
use super::VIEWER_QUEUE_CAPACITY;
use crate::extractor::Frame;
use crate::upstream::FrameSink;

type ViewerTx = mpsc::Sender<Bytes>;
type ViewerMap = HashMap<u64, ViewerTx>;

/// Receiving side of a viewer registration
pub struct Subscription {
    pub id: u64,
    pub rx: mpsc::Receiver<Bytes>,
}

/// Fans every extracted frame out to the connected viewers.
///
/// Each viewer owns a bounded queue of encoded parts. Publishing never waits:
/// a viewer whose queue is full is removed, so one slow client cannot stall
/// the camera reader or the other viewers.
pub struct Multiplexer {
    viewers: RwLock<ViewerMap>,
    queue_capacity: usize,
    next_id: AtomicU64,
    frames_published: AtomicU64,
    viewers_dropped: AtomicU64,
}

impl Multiplexer {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            viewers: RwLock::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
            next_id: AtomicU64::new(1),
            frames_published: AtomicU64::new(0),
            viewers_dropped: AtomicU64::new(0),
        }
    }

    /// Register a viewer. It receives every frame published from now on.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.queue_capacity);

        let count = {
            let mut viewers = self.write_viewers();
            viewers.insert(id, tx);
            viewers.len()
        };
        debug!("Viewer {} subscribed ({} active)", id, count);

        Subscription { id, rx }
    }

    /// Remove a viewer. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: u64) -> bool {
        let removed = self.write_viewers().remove(&id).is_some();
        if removed {
            debug!("Viewer {} unsubscribed", id);
        }
        removed
    }

    pub fn viewer_count(&self) -> usize {
        self.read_viewers().len()
    }

    /// Queue one frame for every viewer and return how many accepted it.
    ///
    /// The part is encoded once; viewers share the same buffer.
    pub fn publish(&self, frame: &Frame) -> usize {
        let part = encode_part(frame);
        let mut delivered = 0;
        let mut stale = Vec::new();

        {
            let viewers = self.read_viewers();
            for (id, tx) in viewers.iter() {
                match tx.try_send(part.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!("Viewer {} cannot keep up, disconnecting it", id);
                        stale.push(*id);
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!("Viewer {} is gone", id);
                        stale.push(*id);
                    }
                }
            }
        }

        // Remove after the read lock is released
        if !stale.is_empty() {
            let mut viewers = self.write_viewers();
            for id in &stale {
                viewers.remove(id);
            }
            self.viewers_dropped
                .fetch_add(stale.len() as u64, Ordering::Relaxed);
        }

        self.frames_published.fetch_add(1, Ordering::Relaxed);
        delivered
    }

    /// Drop every viewer queue; their writers finish once the queue is drained
    pub fn close_all(&self) {
        let closed = self.write_viewers().drain().count();
        if closed > 0 {
            info!("Closed {} viewer stream(s)", closed);
        }
    }

    pub fn frames_published(&self) -> u64 {
        self.frames_published.load(Ordering::Relaxed)
    }

    /// Viewers removed for being too slow or gone
    pub fn viewers_dropped(&self) -> u64 {
        self.viewers_dropped.load(Ordering::Relaxed)
    }

    fn read_viewers(&self) -> RwLockReadGuard<'_, ViewerMap> {
        self.viewers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_viewers(&self) -> RwLockWriteGuard<'_, ViewerMap> {
        self.viewers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Multiplexer {
    fn default() -> Self {
        Self::new(VIEWER_QUEUE_CAPACITY)
    }
}

impl FrameSink for Multiplexer {
    fn publish_frame(&self, frame: Frame) {
        self.publish(&frame);
    }
}
