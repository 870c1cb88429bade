// Copyright 2022 Google LLC

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::io::ErrorKind;

use reqwest::StatusCode;
use thiserror::Error;

use super::transport::TransportError;

/// Errors that may be returned by a [`RemoteFile`](super::RemoteFile) or by
/// [`get_length`](super::get_length).
#[derive(Debug, Error)]
pub enum Error {
    /// A `206` whose `Content-Range` was missing, unparseable or started
    /// somewhere other than the requested offset, or a `200` in reply to a
    /// request for a non-zero offset.
    #[error("bad response")]
    BadResponse,
    /// The server replied with a status not accepted for this operation.
    #[error("{0}")]
    Status(StatusCode),
    /// Length discovery got a `404`.
    #[error("not found")]
    NotFound,
    /// Seek from the end before any response revealed the total length.
    #[error("length unknown")]
    LengthUnknown,
    #[error("unhandled whence: {0}")]
    InvalidWhence(i32),
    #[error("unparseable Content-Length header")]
    BadContentLength,
    /// A read or write was attempted with the cursor before the start of the
    /// resource. Seeking there is allowed; using the position is not.
    #[error("negative offset {0}")]
    NegativeOffset(i64),
    #[error("seek position overflows")]
    SeekOverflow,
    #[error("remote file is closed")]
    Closed,
    #[error(transparent)]
    Transport(TransportError),
    /// An error reading the response body, exactly as the body reported it.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<Error> for std::io::Error {
    fn from(error: Error) -> Self {
        if let Error::Io(inner) = error {
            return inner;
        }
        let kind = match &error {
            Error::NotFound => ErrorKind::NotFound,
            Error::InvalidWhence(_) | Error::NegativeOffset(_) | Error::SeekOverflow => {
                ErrorKind::InvalidInput
            }
            Error::BadResponse | Error::BadContentLength => ErrorKind::InvalidData,
            Error::LengthUnknown | Error::Closed => ErrorKind::Unsupported,
            Error::Status(_) | Error::Transport(_) | Error::Io(_) => ErrorKind::Other,
        };
        std::io::Error::new(kind, error)
    }
}
