// scanner.rs
//
// Copyright 2026 Stéphane Cerveau <scerveau@igalia.com>
//
// This file is part of netcam-fix
//
// SPDX-License-Identifier: GPL-3.0-only

use bytes::{Buf, BytesMut};

use super::{Frame, DEFAULT_MAX_BUFFER, MAGIC_END, MAGIC_START};
use crate::error::{NetcamError, Result};

/// Counters describing what the extractor did with the upstream bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractorStats {
    /// Complete images emitted
    pub frames: u64,
    /// Spurious end markers removed after an image
    pub duplicates_stripped: u64,
    /// Bytes dropped in front of a start marker (multipart boundaries and headers)
    pub header_bytes_dropped: u64,
    /// Bytes thrown away because the buffer grew past its cap
    pub bytes_discarded: u64,
}

/// Stateful scanner turning the raw camera byte stream into frames.
///
/// Bytes are appended with [`feed`](Self::feed) and complete images are
/// pulled with [`next_frame`](Self::next_frame) or the [`frames`](Self::frames)
/// iterator. The extractor is not restartable: its state is the buffer itself.
pub struct FrameExtractor {
    buffer: BytesMut,
    max_buffer: usize,
    /// Offset of the start marker of the image being assembled
    start: Option<usize>,
    /// Offset at which the next marker search resumes
    scan_from: usize,
    /// Set after an image is emitted, until the duplicate end marker check ran
    check_duplicate: bool,
    stats: ExtractorStats,
}

impl FrameExtractor {
    pub fn new() -> Self {
        Self::with_max_buffer(DEFAULT_MAX_BUFFER)
    }

    pub fn with_max_buffer(max_buffer: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_buffer,
            start: None,
            scan_from: 0,
            check_duplicate: false,
            stats: ExtractorStats::default(),
        }
    }

    /// Append a chunk received from the camera
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Extract the next complete image, if the buffer holds one.
    ///
    /// Returns `Ok(None)` when more input is needed. When the buffer grows past
    /// its cap without producing an image, the buffer is discarded and
    /// [`NetcamError::MalformedFrame`] is returned; the extractor stays usable.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.strip_duplicate_end() {
            return Ok(None);
        }

        let start = match self.start {
            Some(start) => start,
            None => match find_marker(&self.buffer, &MAGIC_START, self.scan_from) {
                Some(start) => {
                    self.start = Some(start);
                    self.scan_from = start + MAGIC_START.len();
                    start
                }
                None => {
                    self.scan_from = resume_offset(&self.buffer);
                    return self.check_overflow();
                }
            },
        };

        let Some(end) = find_marker(&self.buffer, &MAGIC_END, self.scan_from) else {
            self.scan_from = resume_offset(&self.buffer).max(start + MAGIC_START.len());
            return self.check_overflow();
        };

        // Everything before the start marker is multipart framing from the camera
        if start > 0 {
            self.buffer.advance(start);
            self.stats.header_bytes_dropped += start as u64;
        }

        let frame_len = end + MAGIC_END.len() - start;
        let data = self.buffer.split_to(frame_len).freeze();

        self.start = None;
        self.scan_from = 0;
        self.check_duplicate = true;
        self.stats.frames += 1;

        Ok(Some(Frame::new(self.stats.frames, data)))
    }

    /// Iterate over the images currently available in the buffer
    pub fn frames(&mut self) -> Frames<'_> {
        Frames { extractor: self }
    }

    /// Drop all buffered bytes and scanning state. Counters are kept.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.start = None;
        self.scan_from = 0;
        self.check_duplicate = false;
    }

    /// Number of bytes waiting for a complete image
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn max_buffer(&self) -> usize {
        self.max_buffer
    }

    pub fn stats(&self) -> ExtractorStats {
        self.stats
    }

    /// Remove one end marker directly following the previous image.
    ///
    /// Returns false while the answer is still unknown: fewer bytes than a
    /// marker are buffered and they could be the beginning of one.
    fn strip_duplicate_end(&mut self) -> bool {
        if !self.check_duplicate {
            return true;
        }

        if self.buffer.len() < MAGIC_END.len() && MAGIC_END.starts_with(&self.buffer) {
            return false;
        }

        if self.buffer.starts_with(&MAGIC_END) {
            self.buffer.advance(MAGIC_END.len());
            self.stats.duplicates_stripped += 1;
        }

        self.check_duplicate = false;
        true
    }

    fn check_overflow(&mut self) -> Result<Option<Frame>> {
        if self.buffer.len() <= self.max_buffer {
            return Ok(None);
        }

        let discarded = self.buffer.len();
        self.reset();
        self.stats.bytes_discarded += discarded as u64;

        Err(NetcamError::MalformedFrame {
            discarded,
            limit: self.max_buffer,
        })
    }
}

impl Default for FrameExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy sequence of the frames an extractor can currently produce.
///
/// Ends when the buffer needs more input; feeding the extractor again makes
/// new frames available through a fresh iterator.
pub struct Frames<'a> {
    extractor: &'a mut FrameExtractor,
}

impl Iterator for Frames<'_> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.extractor.next_frame().transpose()
    }
}

fn find_marker(haystack: &[u8], marker: &[u8; 2], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(marker.len())
        .position(|window| window == marker)
        .map(|pos| pos + from)
}

// The last byte may be the first half of a marker split across chunks
fn resume_offset(buffer: &[u8]) -> usize {
    buffer.len().saturating_sub(1)
}
