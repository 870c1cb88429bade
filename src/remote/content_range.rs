// Copyright 2022 Google LLC

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Just enough of HTTP byte ranges: parsing a `Content-Range` response
//! header and formatting the open-ended `bytes=<offset>-` form we send.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_RANGE};

use super::error::Error;

/// The parts of a `Content-Range: bytes <first>-<last>/<total>` header we use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ContentRange {
    pub(crate) first: u64,
    /// `None` if the server sent `*`.
    pub(crate) total: Option<u64>,
}

impl ContentRange {
    /// Parse a header value. Both `bytes 0-9/10` and the occasionally seen
    /// `bytes=0-9/10` are accepted.
    pub(crate) fn parse(value: &str) -> Option<Self> {
        let rest = value.trim().strip_prefix("bytes")?;
        let rest = rest
            .strip_prefix(' ')
            .or_else(|| rest.strip_prefix('='))?
            .trim_start();
        let (range, total) = rest.split_once('/')?;
        let (first, last) = range.split_once('-')?;
        let first = parse_digits(first)?;
        if parse_digits(last)? < first {
            return None;
        }
        let total = match total {
            "*" => None,
            total => Some(parse_digits(total)?),
        };
        Some(Self { first, total })
    }

    /// Find and parse the `Content-Range` header of a response.
    pub(crate) fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(CONTENT_RANGE)
            .and_then(|hv| hv.to_str().ok())
            .and_then(Self::parse)
    }
}

/// `u64::from_str` tolerates a leading `+`, which has no place in a range.
fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// `bytes=<offset>-`, used both as the `Range` of a GET and the
/// `Content-Range` of a PATCH. A value that won't go in a header is a
/// failure to build the request, so it's reported as a transport error.
pub(crate) fn open_ended(offset: u64) -> Result<HeaderValue, Error> {
    HeaderValue::try_from(format!("bytes={offset}-")).map_err(|e| Error::Transport(Box::new(e)))
}
