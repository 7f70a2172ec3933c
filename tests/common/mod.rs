//! Shared helpers for integration tests.
#![allow(dead_code)]

use apiresponse::{RawResponse, ResponseContext};
use std::io;
use std::sync::Arc;

pub type Transport<T> = Result<RawResponse<T>, io::Error>;

pub fn ok<T>(status: u16, body: T) -> Transport<T> {
    Ok(RawResponse::with_body(status, body))
}

pub fn refused<T>() -> Transport<T> {
    Err(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"))
}

pub fn context() -> Arc<ResponseContext> {
    Arc::new(ResponseContext::new())
}

/// Install a test subscriber once; repeated calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
