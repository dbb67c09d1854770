// part.rs
//
// Copyright 2026 Stéphane Cerveau <scerveau@igalia.com>
//
// This file is part of netcam-fix
//
// SPDX-License-Identifier: GPL-3.0-only

use bytes::{BufMut, Bytes, BytesMut};

use super::BOUNDARY;
use crate::extractor::Frame;

pub fn content_type() -> String {
    format!("multipart/x-mixed-replace;boundary={}", BOUNDARY)
}

/// Status line and headers sent once to every viewer before the first part
pub fn response_head() -> Bytes {
    Bytes::from(format!(
        "HTTP/1.0 200 OK\r\n\
         Server: {}\r\n\
         Content-Type: {}\r\n\
         Cache-Control: no-cache, no-store\r\n\
         Pragma: no-cache\r\n\
         Connection: close\r\n\
         \r\n",
        crate::upstream::USER_AGENT,
        content_type()
    ))
}

/// Wrap one image in a multipart section.
///
/// The section carries no trailing CRLF: the next boundary line follows the
/// image bytes directly.
pub fn encode_part(frame: &Frame) -> Bytes {
    let header = format!("{}\r\nContent-Length: {}\r\n\r\n", BOUNDARY, frame.len());

    let mut part = BytesMut::with_capacity(header.len() + frame.len());
    part.put_slice(header.as_bytes());
    part.put_slice(frame.data());
    part.freeze()
}

/// Short plain text response for requests that will not get a stream
pub fn error_response(status: u16, reason: &str) -> Bytes {
    let body = format!("{} {}\n", status, reason);
    Bytes::from(format!(
        "HTTP/1.0 {} {}\r\n\
         Content-Type: text/plain\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        status,
        reason,
        body.len(),
        body
    ))
}
