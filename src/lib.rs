// Copyright 2022 Google LLC

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! File-like access to a resource on an HTTP server, using `Range` requests
//! to read from any offset and range-addressed `PATCH` requests to write.

#![forbid(unsafe_code)]

pub mod remote;

pub use remote::get_length;
pub use remote::Error;
pub use remote::RemoteFile;
pub use remote::Request;
pub use remote::Response;
pub use remote::Transport;
pub use remote::TransportError;
pub use remote::Whence;
