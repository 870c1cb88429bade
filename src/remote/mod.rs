// Copyright 2022 Google LLC

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

mod content_range;
mod error;
mod length;
#[cfg(test)]
mod test_utils;
mod transport;

use std::io::{Read, Seek, SeekFrom, Write};

use reqwest::{
    blocking::Client,
    header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE},
    Method, StatusCode,
};

pub use self::error::Error;
pub use self::length::get_length;
pub use self::transport::{Request, Response, Transport, TransportError};

/// Where a [`RemoteFile::seek`] offset is measured from.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Whence {
    Start,
    Current,
    End,
}

impl TryFrom<i32> for Whence {
    type Error = Error;

    /// The traditional `SEEK_SET`, `SEEK_CUR` and `SEEK_END` values.
    fn try_from(whence: i32) -> Result<Self, Error> {
        match whence {
            0 => Ok(Self::Start),
            1 => Ok(Self::Current),
            2 => Ok(Self::End),
            other => Err(Error::InvalidWhence(other)),
        }
    }
}

/// A response body we are partway through, and the offset in the resource of
/// the next byte it will yield.
struct BoundBody {
    offset: u64,
    body: Box<dyn Read + Send>,
}

/// Whether we currently hold a response body, and if so where it's up to.
#[derive(Default)]
enum ReaderState {
    #[default]
    Disconnected,
    ConnectedAt(BoundBody),
}

/// A remote HTTP resource which can be read, written and seeked like a
/// local file.
///
/// Reads are served from a single GET response body which is kept open for
/// as long as reads remain sequential. Seeking elsewhere is pure
/// bookkeeping: the next read notices the body is in the wrong place, drops
/// it, and issues a fresh `Range: bytes=<offset>-` request. Writes are sent
/// straight away as a `PATCH` with `Content-Range: bytes=<offset>-`, and
/// don't affect any body held open for reading.
///
/// One caller at a time: nothing in here is synchronized.
pub struct RemoteFile<T: Transport> {
    transport: T,
    /// Emptied on close.
    url: String,
    /// May be negative; that's only an error once we try to use it.
    cursor: i64,
    reader: ReaderState,
    /// Overwritten by each response which reveals it; never checked against
    /// what an earlier response said.
    length: Option<u64>,
}

impl RemoteFile<Client> {
    /// Open `url` using a default blocking `reqwest` client. No request is
    /// made until the first read or write.
    pub fn open(url: impl Into<String>) -> Self {
        Self::new(Client::new(), url)
    }
}

impl<T: Transport> RemoteFile<T> {
    /// Open `url` over the given transport. No request is made until the
    /// first read or write.
    pub fn new(transport: T, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
            cursor: 0,
            reader: ReaderState::Disconnected,
            length: None,
        }
    }

    /// The URL, or `None` once closed.
    pub fn url(&self) -> Option<&str> {
        (!self.url.is_empty()).then_some(self.url.as_str())
    }

    pub fn is_closed(&self) -> bool {
        self.url.is_empty()
    }

    /// The offset at which the next read or write will happen.
    pub fn position(&self) -> i64 {
        self.cursor
    }

    /// The total length of the resource, if any response so far has told us.
    pub fn length(&self) -> Option<u64> {
        self.length
    }

    /// Move the cursor. Nothing is checked against the resource here, and
    /// the position may even end up negative; any problem surfaces at the
    /// next read or write.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<i64, Error> {
        let base = match whence {
            Whence::Start => 0,
            Whence::Current => self.cursor,
            Whence::End => self
                .length
                .ok_or(Error::LengthUnknown)
                .and_then(|len| i64::try_from(len).map_err(|_| Error::SeekOverflow))?,
        };
        self.cursor = base.checked_add(offset).ok_or(Error::SeekOverflow)?;
        Ok(self.cursor)
    }

    /// Read from the cursor onwards. As with any [`Read`], fewer bytes than
    /// requested may come back; zero means the end of the resource.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut bound = self.prepare_reader()?;
        // Never read past where the cursor can count to.
        let room = usize::try_from(i64::MAX - self.cursor).unwrap_or(usize::MAX);
        if room == 0 && !buf.is_empty() {
            self.reader = ReaderState::ConnectedAt(bound);
            return Err(Error::SeekOverflow);
        }
        let len = buf.len().min(room);
        let result = bound.body.read(&mut buf[..len]);
        if let Ok(n) = result {
            bound.offset += n as u64;
            self.cursor += n as i64;
        }
        // Kept even after a failed read.
        self.reader = ReaderState::ConnectedAt(bound);
        Ok(result?)
    }

    /// Write all of `buf` at the cursor with a single `PATCH`. Either the
    /// whole buffer is accepted (the server must reply `206`) and the cursor
    /// moves past it, or nothing happens to the cursor.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        let offset = self.usable_offset()?;
        let end = i64::try_from(buf.len())
            .ok()
            .and_then(|len| self.cursor.checked_add(len))
            .ok_or(Error::SeekOverflow)?;
        log::debug!(
            "PATCH 0x{:x} bytes at 0x{:x} of {}",
            buf.len(),
            offset,
            self.url
        );
        let mut request = Request::new(Method::PATCH, &self.url);
        request
            .headers
            .insert(CONTENT_RANGE, content_range::open_ended(offset)?);
        request.headers.insert(CONTENT_LENGTH, buf.len().into());
        request.body = Some(buf.to_vec());
        let response = self.transport.send(request).map_err(Error::Transport)?;
        drop(response.body);
        if response.status != StatusCode::PARTIAL_CONTENT {
            return Err(Error::Status(response.status));
        }
        self.cursor = end;
        Ok(buf.len())
    }

    /// Release any open response body and mark this file as closed. Always
    /// succeeds, however many times it's called.
    pub fn close(&mut self) -> Result<(), Error> {
        self.discard_reader();
        self.url.clear();
        Ok(())
    }

    /// Hand back a body positioned exactly at the cursor, reusing the one we
    /// have if it's already there. The caller must put it back.
    fn prepare_reader(&mut self) -> Result<BoundBody, Error> {
        match std::mem::take(&mut self.reader) {
            ReaderState::ConnectedAt(bound) if i64::try_from(bound.offset) == Ok(self.cursor) => {
                return Ok(bound)
            }
            ReaderState::ConnectedAt(bound) => {
                log::debug!(
                    "Discarding reader at 0x{:x}; cursor moved to 0x{:x}",
                    bound.offset,
                    self.cursor
                );
            }
            ReaderState::Disconnected => {}
        }
        let offset = self.usable_offset()?;
        self.acquire_reader(offset)
    }

    /// Issue a GET for everything from `offset` onwards and check the
    /// server really started there.
    fn acquire_reader(&mut self, offset: u64) -> Result<BoundBody, Error> {
        log::debug!("Fetch range 0x{:x}- of {}", offset, self.url);
        let mut request = Request::new(Method::GET, &self.url);
        if offset != 0 {
            request
                .headers
                .insert(RANGE, content_range::open_ended(offset)?);
        }
        let response = self.transport.send(request).map_err(Error::Transport)?;
        // On error the body is dropped, and so closed, on the way out.
        let total = length::instance_length(response.status, &response.headers, Some(offset))?;
        // A `206` always speaks for the length, even if only to say it's
        // unknown; a `200` without `Content-Length` says nothing.
        if response.status == StatusCode::PARTIAL_CONTENT || total.is_some() {
            self.length = total;
        }
        Ok(BoundBody {
            offset,
            body: response.body,
        })
    }

    fn discard_reader(&mut self) {
        if let ReaderState::ConnectedAt(bound) = std::mem::take(&mut self.reader) {
            log::debug!("Closing reader at 0x{:x}", bound.offset);
        }
    }

    /// The cursor as an offset we can actually send to the server.
    fn usable_offset(&self) -> Result<u64, Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        u64::try_from(self.cursor).map_err(|_| Error::NegativeOffset(self.cursor))
    }
}

impl<T: Transport> Read for RemoteFile<T> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(RemoteFile::read(self, buf)?)
    }
}

impl<T: Transport> Write for RemoteFile<T> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(RemoteFile::write(self, buf)?)
    }

    /// Writes are never buffered.
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<T: Transport> Seek for RemoteFile<T> {
    /// Unlike [`RemoteFile::seek`], refuses to land before the start, since
    /// [`Seek`] positions are unsigned. The cursor is left alone in that case.
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let (offset, whence) = match pos {
            SeekFrom::Start(offset) => (
                i64::try_from(offset).map_err(|_| Error::SeekOverflow)?,
                Whence::Start,
            ),
            SeekFrom::Current(offset) => (offset, Whence::Current),
            SeekFrom::End(offset) => (offset, Whence::End),
        };
        let previous = self.cursor;
        let new_pos = RemoteFile::seek(self, offset, whence)?;
        u64::try_from(new_pos).map_err(|_| {
            self.cursor = previous;
            Error::NegativeOffset(new_pos).into()
        })
    }
}
