// Copyright 2022 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    collections::VecDeque,
    io::{Cursor, ErrorKind, Read},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use http::{StatusCode, Version};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use super::transport::{Request, Response, Transport, TransportError};

/// A response for use with `httptest` which honours open-ended
/// `Range: bytes=N-` requests with a `206` and a `Content-Range`, and
/// answers anything else with a plain `200`.
pub(crate) struct RangeAwareResponse(Vec<u8>);

impl RangeAwareResponse {
    pub(crate) fn new(body: impl Into<Vec<u8>>) -> Self {
        Self(body.into())
    }
}

impl httptest::responders::Responder for RangeAwareResponse {
    fn respond<'a>(
        &mut self,
        req: &'a httptest::http::Request<httptest::bytes::Bytes>,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = httptest::http::Response<hyper::Body>> + Send + 'a>,
    > {
        async fn _respond(resp: http::Response<hyper::Body>) -> http::Response<hyper::Body> {
            resp
        }
        let mut builder = http::Response::builder().version(Version::HTTP_11);
        let from = req
            .headers()
            .get(http::header::RANGE)
            .and_then(|range| {
                let range_regex = Regex::new(r"^bytes=(\d+)-$").unwrap();
                range_regex
                    .captures(range.to_str().unwrap())
                    .and_then(|captures| captures.get(1))
                    .and_then(|s| s.as_str().parse::<usize>().ok())
            });
        let body = match from {
            Some(from) => {
                let last = self.0.len().saturating_sub(1);
                builder = builder.status(StatusCode::PARTIAL_CONTENT).header(
                    "Content-Range",
                    format!("bytes {}-{}/{}", from, last, self.0.len()),
                );
                self.0[from.min(self.0.len())..].to_vec()
            }
            None => {
                builder = builder.status(StatusCode::OK);
                self.0.clone()
            }
        };
        let resp = builder
            .header("Content-Length", format!("{}", body.len()))
            .body(body.into())
            .unwrap();

        Box::pin(_respond(resp))
    }
}

/// One canned reply for a [`FakeTransport`].
pub(crate) struct ScriptedResponse {
    status: u16,
    headers: HeaderMap,
    body: Vec<u8>,
    fail_body_after: Option<usize>,
    transport_error: Option<&'static str>,
}

impl ScriptedResponse {
    pub(crate) fn new(status: u16, body: &[u8]) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.to_vec(),
            fail_body_after: None,
            transport_error: None,
        }
    }

    /// The transport itself fails; no response at all.
    pub(crate) fn transport_error(message: &'static str) -> Self {
        Self {
            transport_error: Some(message),
            ..Self::new(0, b"")
        }
    }

    /// `name` must be lowercase.
    pub(crate) fn header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers
            .insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        self
    }

    /// Serve this many body bytes, then fail the read.
    pub(crate) fn fail_body_after(mut self, bytes: usize) -> Self {
        self.fail_body_after = Some(bytes);
        self
    }
}

/// A [`Transport`] which replays [`ScriptedResponse`]s in order and records
/// every request it is handed. It also keeps count of how many response
/// bodies are alive, so tests can check that a stale body was closed before
/// a new request went out.
pub(crate) struct FakeTransport {
    script: Mutex<VecDeque<ScriptedResponse>>,
    requests: Mutex<Vec<Request>>,
    open_bodies: Arc<AtomicUsize>,
    max_open_bodies_at_send: AtomicUsize,
}

impl FakeTransport {
    pub(crate) fn new(script: impl IntoIterator<Item = ScriptedResponse>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            open_bodies: Arc::new(AtomicUsize::new(0)),
            max_open_bodies_at_send: AtomicUsize::new(0),
        }
    }

    /// For tests which expect no request at all.
    pub(crate) fn unscripted() -> Self {
        Self::new(Vec::<ScriptedResponse>::new())
    }

    pub(crate) fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn open_bodies(&self) -> usize {
        self.open_bodies.load(Ordering::SeqCst)
    }

    /// The largest number of bodies that were still open at the moment a new
    /// request was sent.
    pub(crate) fn max_open_bodies_at_send(&self) -> usize {
        self.max_open_bodies_at_send.load(Ordering::SeqCst)
    }
}

impl Transport for FakeTransport {
    fn send(&self, request: Request) -> Result<Response, TransportError> {
        self.max_open_bodies_at_send
            .fetch_max(self.open_bodies(), Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        let scripted = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .expect("FakeTransport ran out of scripted responses");
        if let Some(message) = scripted.transport_error {
            return Err(message.into());
        }
        self.open_bodies.fetch_add(1, Ordering::SeqCst);
        Ok(Response {
            status: reqwest::StatusCode::from_u16(scripted.status).unwrap(),
            headers: scripted.headers,
            body: Box::new(FakeBody {
                data: Cursor::new(scripted.body),
                fail_after: scripted.fail_body_after,
                open_bodies: self.open_bodies.clone(),
            }),
        })
    }
}

struct FakeBody {
    data: Cursor<Vec<u8>>,
    fail_after: Option<usize>,
    open_bodies: Arc<AtomicUsize>,
}

impl Read for FakeBody {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.fail_after {
            Some(limit) if self.data.position() as usize >= limit => Err(std::io::Error::new(
                ErrorKind::ConnectionReset,
                "connection reset by fake peer",
            )),
            Some(limit) => {
                let remaining = limit - self.data.position() as usize;
                let len = buf.len().min(remaining);
                self.data.read(&mut buf[..len])
            }
            None => self.data.read(buf),
        }
    }
}

impl Drop for FakeBody {
    fn drop(&mut self) {
        self.open_bodies.fetch_sub(1, Ordering::SeqCst);
    }
}
