// Copyright 2022 Google LLC

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use reqwest::{
    header::{HeaderMap, CONTENT_LENGTH},
    Method, StatusCode,
};

use super::{
    content_range::ContentRange,
    error::Error,
    transport::{Request, Transport},
};

/// Work out the total length of a resource from a response to a GET.
///
/// If `requested_offset` is given, the response must actually begin there:
/// a `206` must declare that first byte and a `200` is only acceptable for
/// offset zero. Returns `Ok(None)` when the response is acceptable but does
/// not reveal the length.
pub(crate) fn instance_length(
    status: StatusCode,
    headers: &HeaderMap,
    requested_offset: Option<u64>,
) -> Result<Option<u64>, Error> {
    match status {
        StatusCode::PARTIAL_CONTENT => {
            let content_range = ContentRange::from_headers(headers).ok_or(Error::BadResponse)?;
            match requested_offset {
                Some(offset) if offset != content_range.first => Err(Error::BadResponse),
                _ => Ok(content_range.total),
            }
        }
        StatusCode::OK => match requested_offset {
            Some(offset) if offset != 0 => Err(Error::BadResponse),
            _ => content_length(headers),
        },
        status => Err(Error::Status(status)),
    }
}

/// Determine the `Content-Length` header. Absence is fine; garbage is not.
fn content_length(headers: &HeaderMap) -> Result<Option<u64>, Error> {
    headers
        .get(CONTENT_LENGTH)
        .map(|hv| {
            hv.to_str()
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or(Error::BadContentLength)
        })
        .transpose()
}

/// Ask the server how long the resource at `url` is, without opening a
/// [`RemoteFile`](super::RemoteFile).
///
/// This issues a plain GET and drops the body unread, so the server must
/// put up with a response being abandoned. `Ok(None)` means the server
/// answered `200` without a `Content-Length`.
pub fn get_length<T: Transport>(transport: &T, url: &str) -> Result<Option<u64>, Error> {
    log::debug!("Discovering length of {}", url);
    let response = transport
        .send(Request::new(Method::GET, url))
        .map_err(Error::Transport)?;
    drop(response.body);
    if response.status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound);
    }
    instance_length(response.status, &response.headers, None)
}
