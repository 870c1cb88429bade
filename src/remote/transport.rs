// Copyright 2022 Google LLC

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::{io::Read, sync::Arc};

use reqwest::{blocking::Client, header::HeaderMap, Method, StatusCode};

/// Whatever went wrong inside a [`Transport`]. Handed back to callers
/// untouched.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// A single HTTP request, as issued by a [`RemoteFile`](super::RemoteFile).
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn new(method: Method, url: &str) -> Self {
        Self {
            method,
            url: url.to_string(),
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// The parts of an HTTP response a [`RemoteFile`](super::RemoteFile) cares
/// about. Dropping `body` closes it.
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Box<dyn Read + Send>,
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Something which can perform one HTTP round trip. Retries, pooling,
/// timeouts and TLS are all its business; a [`RemoteFile`](super::RemoteFile)
/// calls [`Transport::send`] at most once per operation and surfaces any
/// error unchanged.
pub trait Transport {
    fn send(&self, request: Request) -> Result<Response, TransportError>;
}

impl Transport for Client {
    fn send(&self, request: Request) -> Result<Response, TransportError> {
        let mut builder = self
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let response = builder.send()?;
        Ok(Response {
            status: response.status(),
            headers: response.headers().clone(),
            body: Box::new(response),
        })
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: Request) -> Result<Response, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: Request) -> Result<Response, TransportError> {
        (**self).send(request)
    }
}
