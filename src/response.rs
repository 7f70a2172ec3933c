//! The tri-state response value.
//!
//! An [`ApiResponse<T>`] is exactly one of:
//!
//! - [`ApiResponse::Success`]: the endpoint answered inside the success range. Holds the body and
//!   a shared [`ResponseTag`] (status + headers of the raw response).
//! - [`ApiResponse::Failure`] with [`Failure::Error`]: the endpoint answered outside the success
//!   range. Holds an [`ErrorPayload`] (status, headers, raw error body).
//! - [`ApiResponse::Failure`] with [`Failure::Exception`]: the call never produced a classifiable
//!   response (transport fault, timeout, decoding error).
//! - [`ApiResponse::Failure`] with [`Failure::Cause`]: a custom failure injected by a failure
//!   mapper.
//!
//! Values are immutable; every transformation builds a new value. `Failure` carries no `T`, so
//! re-tagging a failure to a new type parameter is free.
//!
//! ```rust
//! use apiresponse::{ApiResponse, Failure};
//!
//! let response = ApiResponse::success(vec![1, 2, 3]);
//! match &response {
//!     ApiResponse::Success(success) => assert_eq!(success.data().unwrap().len(), 3),
//!     ApiResponse::Failure(Failure::Error(_)) => unreachable!(),
//!     ApiResponse::Failure(Failure::Exception(_)) => unreachable!(),
//!     ApiResponse::Failure(Failure::Cause(_)) => unreachable!(),
//! }
//! ```

use crate::error::{ApiError, NoContentError, SharedError};
use crate::status::StatusCode;
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

/// Ordered, case-insensitive header collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header; existing values with the same name are kept.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value for `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    /// All values for `name` in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries.iter().filter(move |(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    /// Iterate `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

/// What the transport hands over: status, headers, and an optional (already decoded) body.
///
/// `body` is the decoded success body; `error_body` is the raw body of a non-success answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse<T> {
    status: u16,
    headers: Headers,
    body: Option<T>,
    error_body: Option<String>,
}

impl<T> RawResponse<T> {
    /// Response with the given status and nothing else.
    pub fn new(status: u16) -> Self {
        Self { status, headers: Headers::new(), body: None, error_body: None }
    }

    /// Response with status and decoded body.
    pub fn with_body(status: u16, body: T) -> Self {
        Self::new(status).body(body)
    }

    pub fn body(mut self, body: T) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn error_body(mut self, raw: impl Into<String>) -> Self {
        self.error_body = Some(raw.into());
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Classify against `range` without running any hooks.
    pub fn classify(self, range: &RangeInclusive<u16>) -> ApiResponse<T> {
        let tag = Arc::new(ResponseTag { status: self.status, headers: self.headers });
        if range.contains(&self.status) {
            ApiResponse::Success(Success { data: self.body, tag })
        } else {
            ApiResponse::Failure(Failure::Error(ErrorPayload {
                tag: Some(tag),
                body: self.error_body,
            }))
        }
    }
}

/// Read-only back-reference to the raw response a value was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseTag {
    status: u16,
    headers: Headers,
}

impl ResponseTag {
    pub fn new(status: u16, headers: Headers) -> Self {
        Self { status, headers }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_code(self.status)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }
}

/// Successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Success<T> {
    data: Option<T>,
    tag: Arc<ResponseTag>,
}

impl<T> Success<T> {
    /// Synthetic success (status 200, no headers).
    pub fn new(data: T) -> Self {
        Self { data: Some(data), tag: Arc::new(ResponseTag::new(200, Headers::new())) }
    }

    /// Success sharing an existing tag.
    pub fn with_tag(data: Option<T>, tag: Arc<ResponseTag>) -> Self {
        Self { data, tag }
    }

    /// The body, or [`NoContentError`] when the response legitimately had none.
    pub fn data(&self) -> Result<&T, NoContentError> {
        self.data.as_ref().ok_or(NoContentError { status: self.tag.status })
    }

    pub fn into_data(self) -> Result<T, NoContentError> {
        let status = self.tag.status;
        self.data.ok_or(NoContentError { status })
    }

    pub fn has_content(&self) -> bool {
        self.data.is_some()
    }

    pub fn tag(&self) -> &Arc<ResponseTag> {
        &self.tag
    }

    pub fn status_code(&self) -> StatusCode {
        self.tag.status_code()
    }

    pub fn headers(&self) -> &Headers {
        &self.tag.headers
    }

    pub(crate) fn into_parts(self) -> (Option<T>, Arc<ResponseTag>) {
        (self.data, self.tag)
    }
}

/// Payload of a `Failure::Error`.
///
/// Built either from a raw non-success response, or synthetically (e.g. by `validate`), in which
/// case there is no tag and the status is `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPayload {
    tag: Option<Arc<ResponseTag>>,
    body: Option<String>,
}

impl ErrorPayload {
    pub fn from_response(tag: Arc<ResponseTag>, body: Option<String>) -> Self {
        Self { tag: Some(tag), body }
    }

    /// Synthetic error carrying only a message as its body.
    pub fn message(message: impl Into<String>) -> Self {
        Self { tag: None, body: Some(message.into()) }
    }

    /// Numeric status, `0` for synthetic errors.
    pub fn status(&self) -> u16 {
        self.tag.as_ref().map(|t| t.status).unwrap_or(0)
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_code(self.status())
    }

    pub fn headers(&self) -> Option<&Headers> {
        self.tag.as_deref().map(ResponseTag::headers)
    }

    pub fn error_body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn tag(&self) -> Option<&Arc<ResponseTag>> {
        self.tag.as_ref()
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.tag, &self.body) {
            (Some(tag), Some(body)) => write!(f, "{}: {}", tag.status_code(), body),
            (Some(tag), None) => write!(f, "{}", tag.status_code()),
            (None, Some(body)) => write!(f, "{}", body),
            (None, None) => write!(f, "error"),
        }
    }
}

/// Payload of a `Failure::Exception`.
#[derive(Debug, Clone)]
pub struct ExceptionPayload {
    error: SharedError,
    message: String,
}

impl ExceptionPayload {
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::from_shared(Arc::new(error))
    }

    pub fn from_shared(error: SharedError) -> Self {
        let message = error.to_string();
        Self { error, message }
    }

    /// The original error; clones of this payload share it.
    pub fn error(&self) -> &SharedError {
        &self.error
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.error.downcast_ref::<E>()
    }
}

impl PartialEq for ExceptionPayload {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.error, &other.error)
    }
}

/// Custom failure injected by a mapper, independent of the transport.
#[derive(Debug, Clone)]
pub struct Cause {
    error: SharedError,
}

impl Cause {
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self { error: Arc::new(error) }
    }

    pub fn error(&self) -> &SharedError {
        &self.error
    }

    pub fn message(&self) -> String {
        self.error.to_string()
    }

    /// Match a named business failure by type.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.error.downcast_ref::<E>()
    }
}

impl PartialEq for Cause {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.error, &other.error)
    }
}

/// Any non-success outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    Error(ErrorPayload),
    Exception(ExceptionPayload),
    Cause(Cause),
}

impl Failure {
    /// Human-readable reason, used e.g. as the retry engine's `last_reason`.
    pub fn message(&self) -> String {
        match self {
            Failure::Error(e) => e.to_string(),
            Failure::Exception(e) => e.message.clone(),
            Failure::Cause(c) => c.message(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Failure::Error(_))
    }

    pub fn is_exception(&self) -> bool {
        matches!(self, Failure::Exception(_))
    }

    pub fn is_cause(&self) -> bool {
        matches!(self, Failure::Cause(_))
    }

    /// Convert into the error `get_or_throw` raises. Exceptions keep their original error.
    pub fn into_api_error(self) -> ApiError {
        match self {
            Failure::Error(_) => ApiError::Status(self.to_string()),
            Failure::Exception(e) => ApiError::Exception(e.error),
            Failure::Cause(c) => ApiError::Cause(c.error),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Error(e) => write!(f, "Failure::Error({})", e),
            Failure::Exception(e) => write!(f, "Failure::Exception({})", e.message),
            Failure::Cause(c) => write!(f, "Failure::Cause({})", c.error),
        }
    }
}

impl From<ErrorPayload> for Failure {
    fn from(payload: ErrorPayload) -> Self {
        Failure::Error(payload)
    }
}

impl From<ExceptionPayload> for Failure {
    fn from(payload: ExceptionPayload) -> Self {
        Failure::Exception(payload)
    }
}

impl From<Cause> for Failure {
    fn from(cause: Cause) -> Self {
        Failure::Cause(cause)
    }
}

/// Success, error, or exception outcome of a call.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse<T> {
    Success(Success<T>),
    Failure(Failure),
}

impl<T> ApiResponse<T> {
    /// Synthetic success with status 200.
    pub fn success(data: T) -> Self {
        ApiResponse::Success(Success::new(data))
    }

    /// Synthetic `Failure::Error` carrying `message` as its body.
    pub fn error(message: impl Into<String>) -> Self {
        ApiResponse::Failure(Failure::Error(ErrorPayload::message(message)))
    }

    pub fn exception<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ApiResponse::Failure(Failure::Exception(ExceptionPayload::new(error)))
    }

    pub fn cause<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ApiResponse::Failure(Failure::Cause(Cause::new(error)))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ApiResponse::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ApiResponse::Failure(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ApiResponse::Failure(Failure::Error(_)))
    }

    pub fn is_exception(&self) -> bool {
        matches!(self, ApiResponse::Failure(Failure::Exception(_)))
    }

    pub fn is_cause(&self) -> bool {
        matches!(self, ApiResponse::Failure(Failure::Cause(_)))
    }

    pub fn as_success(&self) -> Option<&Success<T>> {
        match self {
            ApiResponse::Success(s) => Some(s),
            ApiResponse::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            ApiResponse::Success(_) => None,
            ApiResponse::Failure(f) => Some(f),
        }
    }

    /// Failure reason, `None` for successes.
    pub fn message(&self) -> Option<String> {
        self.as_failure().map(Failure::message)
    }

    /// Collapse into a std `Result`; an empty-bodied success becomes a `NoContentError` exception.
    pub fn into_result(self) -> Result<T, Failure> {
        self.split().map(|(data, _)| data)
    }

    /// Body plus tag on success. Shared by every combinator that needs the data.
    pub(crate) fn split(self) -> Result<(T, Arc<ResponseTag>), Failure> {
        match self {
            ApiResponse::Success(success) => match success.into_parts() {
                (Some(data), tag) => Ok((data, tag)),
                (None, tag) => Err(Failure::Exception(ExceptionPayload::new(NoContentError {
                    status: tag.status,
                }))),
            },
            ApiResponse::Failure(failure) => Err(failure),
        }
    }
}

/// Inverse of `ApiResponse::split`.
pub(crate) fn rebuild<V>(parts: Result<(V, Arc<ResponseTag>), Failure>) -> ApiResponse<V> {
    match parts {
        Ok((data, tag)) => ApiResponse::Success(Success::with_tag(Some(data), tag)),
        Err(failure) => ApiResponse::Failure(failure),
    }
}

impl<T> From<Failure> for ApiResponse<T> {
    fn from(failure: Failure) -> Self {
        ApiResponse::Failure(failure)
    }
}

impl<T> From<Success<T>> for ApiResponse<T> {
    fn from(success: Success<T>) -> Self {
        ApiResponse::Success(success)
    }
}
