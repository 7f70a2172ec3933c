//! Combinators over [`ApiResponse`].
//!
//! Every combinator is total, and its closure runs at most once, only on the branch it targets.
//! Combinators that need the success body share one core (`split`/`rebuild`); the `_async`
//! variants are thin entry points over the same core that await the closure's future instead of
//! calling it directly.
//!
//! A success without a body (e.g. `204`) has no data to hand to `map`, `then`, `zip` or
//! `require_some`; those treat it as `Failure::Exception(NoContentError)`. Observers (`on_*`,
//! `peek*`) and pass-through combinators (`recover`, `validate`, `filter`) leave it untouched.
//!
//! ```rust
//! use apiresponse::ApiResponse;
//!
//! let names = ApiResponse::success(vec!["ada", "", "grace"])
//!     .filter(|name| !name.is_empty())
//!     .map(|names| names.join(","))
//!     .validate(|joined| joined.len() < 64, || "too long".to_string())
//!     .get_or_else(String::new());
//! assert_eq!(names, "ada,grace");
//! ```

use crate::error::ApiError;
use crate::response::{
    rebuild, ApiResponse, Cause, ErrorPayload, ExceptionPayload, Failure, ResponseTag, Success,
};
use std::future::Future;
use std::sync::Arc;

type Parts<T> = Result<(T, Arc<ResponseTag>), Failure>;

impl<T> ApiResponse<T> {
    /// The body on success, `None` otherwise.
    pub fn get_or_none(self) -> Option<T> {
        self.into_result().ok()
    }

    pub fn get_or_else(self, default: T) -> T {
        self.into_result().unwrap_or(default)
    }

    pub fn get_or_else_with<F>(self, f: F) -> T
    where
        F: FnOnce(Failure) -> T,
    {
        self.into_result().unwrap_or_else(f)
    }

    pub async fn get_or_else_async<F, Fut>(self, f: F) -> T
    where
        F: FnOnce(Failure) -> Fut,
        Fut: Future<Output = T>,
    {
        match self.into_result() {
            Ok(data) => data,
            Err(failure) => f(failure).await,
        }
    }

    /// The body, or the failure as an error.
    ///
    /// `Failure::Exception` yields `ApiError::Exception` holding the very same error value;
    /// `Failure::Error` yields `ApiError::Status` with the failure's display string.
    pub fn get_or_throw(self) -> Result<T, ApiError> {
        match self {
            ApiResponse::Success(success) => success.into_data().map_err(ApiError::from),
            ApiResponse::Failure(failure) => Err(failure.into_api_error()),
        }
    }

    pub fn on_success<F>(self, f: F) -> Self
    where
        F: FnOnce(&Success<T>),
    {
        if let ApiResponse::Success(success) = &self {
            f(success);
        }
        self
    }

    pub fn on_error<F>(self, f: F) -> Self
    where
        F: FnOnce(&ErrorPayload),
    {
        if let ApiResponse::Failure(Failure::Error(error)) = &self {
            f(error);
        }
        self
    }

    pub fn on_exception<F>(self, f: F) -> Self
    where
        F: FnOnce(&ExceptionPayload),
    {
        if let ApiResponse::Failure(Failure::Exception(exception)) = &self {
            f(exception);
        }
        self
    }

    pub fn on_cause<F>(self, f: F) -> Self
    where
        F: FnOnce(&Cause),
    {
        if let ApiResponse::Failure(Failure::Cause(cause)) = &self {
            f(cause);
        }
        self
    }

    /// Runs for any failure: error, exception or cause.
    pub fn on_failure<F>(self, f: F) -> Self
    where
        F: FnOnce(&Failure),
    {
        if let ApiResponse::Failure(failure) = &self {
            f(failure);
        }
        self
    }

    pub async fn on_success_async<F, Fut>(self, f: F) -> Self
    where
        F: FnOnce(&Success<T>) -> Fut,
        Fut: Future<Output = ()>,
    {
        if let ApiResponse::Success(success) = &self {
            f(success).await;
        }
        self
    }

    pub async fn on_error_async<F, Fut>(self, f: F) -> Self
    where
        F: FnOnce(&ErrorPayload) -> Fut,
        Fut: Future<Output = ()>,
    {
        if let ApiResponse::Failure(Failure::Error(error)) = &self {
            f(error).await;
        }
        self
    }

    pub async fn on_exception_async<F, Fut>(self, f: F) -> Self
    where
        F: FnOnce(&ExceptionPayload) -> Fut,
        Fut: Future<Output = ()>,
    {
        if let ApiResponse::Failure(Failure::Exception(exception)) = &self {
            f(exception).await;
        }
        self
    }

    pub async fn on_cause_async<F, Fut>(self, f: F) -> Self
    where
        F: FnOnce(&Cause) -> Fut,
        Fut: Future<Output = ()>,
    {
        if let ApiResponse::Failure(Failure::Cause(cause)) = &self {
            f(cause).await;
        }
        self
    }

    pub async fn on_failure_async<F, Fut>(self, f: F) -> Self
    where
        F: FnOnce(&Failure) -> Fut,
        Fut: Future<Output = ()>,
    {
        if let ApiResponse::Failure(failure) = &self {
            f(failure).await;
        }
        self
    }

    /// Transform the body; failures pass through re-tagged.
    pub fn map<V, F>(self, f: F) -> ApiResponse<V>
    where
        F: FnOnce(T) -> V,
    {
        rebuild(self.split().map(|(data, tag)| (f(data), tag)))
    }

    pub async fn map_async<V, F, Fut>(self, f: F) -> ApiResponse<V>
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = V>,
    {
        match self.split() {
            Ok((data, tag)) => rebuild(Ok((f(data).await, tag))),
            Err(failure) => ApiResponse::Failure(failure),
        }
    }

    /// Chain a dependent call; failures short-circuit.
    pub fn then<V, F>(self, f: F) -> ApiResponse<V>
    where
        F: FnOnce(T) -> ApiResponse<V>,
    {
        match self.split() {
            Ok((data, _)) => f(data),
            Err(failure) => ApiResponse::Failure(failure),
        }
    }

    pub async fn then_async<V, F, Fut>(self, f: F) -> ApiResponse<V>
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = ApiResponse<V>>,
    {
        match self.split() {
            Ok((data, _)) => f(data).await,
            Err(failure) => ApiResponse::Failure(failure),
        }
    }

    /// Alias of [`then`](Self::then).
    pub fn flat_map<V, F>(self, f: F) -> ApiResponse<V>
    where
        F: FnOnce(T) -> ApiResponse<V>,
    {
        self.then(f)
    }

    pub async fn flat_map_async<V, F, Fut>(self, f: F) -> ApiResponse<V>
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = ApiResponse<V>>,
    {
        self.then_async(f).await
    }

    /// Rewrite a failure; successes pass through.
    pub fn map_failure<F>(self, f: F) -> Self
    where
        F: FnOnce(Failure) -> Failure,
    {
        match self {
            ApiResponse::Failure(failure) => ApiResponse::Failure(f(failure)),
            success => success,
        }
    }

    pub async fn map_failure_async<F, Fut>(self, f: F) -> Self
    where
        F: FnOnce(Failure) -> Fut,
        Fut: Future<Output = Failure>,
    {
        match self {
            ApiResponse::Failure(failure) => ApiResponse::Failure(f(failure).await),
            success => success,
        }
    }

    fn zip_parts<U>(self, other: ApiResponse<U>) -> Parts<(T, U)> {
        let (left, tag) = self.split()?;
        let (right, _) = other.split()?;
        Ok(((left, right), tag))
    }

    /// Combine two successes. The first failure, left to right, wins and `f` never runs.
    pub fn zip<U, V, F>(self, other: ApiResponse<U>, f: F) -> ApiResponse<V>
    where
        F: FnOnce(T, U) -> V,
    {
        rebuild(self.zip_parts(other).map(|((a, b), tag)| (f(a, b), tag)))
    }

    pub async fn zip_async<U, V, F, Fut>(self, other: ApiResponse<U>, f: F) -> ApiResponse<V>
    where
        F: FnOnce(T, U) -> Fut,
        Fut: Future<Output = V>,
    {
        match self.zip_parts(other) {
            Ok(((a, b), tag)) => rebuild(Ok((f(a, b).await, tag))),
            Err(failure) => ApiResponse::Failure(failure),
        }
    }

    fn zip3_parts<U, W>(self, second: ApiResponse<U>, third: ApiResponse<W>) -> Parts<(T, U, W)> {
        let ((a, b), tag) = self.zip_parts(second)?;
        let (c, _) = third.split()?;
        Ok(((a, b, c), tag))
    }

    pub fn zip3<U, W, V, F>(self, second: ApiResponse<U>, third: ApiResponse<W>, f: F) -> ApiResponse<V>
    where
        F: FnOnce(T, U, W) -> V,
    {
        rebuild(self.zip3_parts(second, third).map(|((a, b, c), tag)| (f(a, b, c), tag)))
    }

    pub async fn zip3_async<U, W, V, F, Fut>(
        self,
        second: ApiResponse<U>,
        third: ApiResponse<W>,
        f: F,
    ) -> ApiResponse<V>
    where
        F: FnOnce(T, U, W) -> Fut,
        Fut: Future<Output = V>,
    {
        match self.zip3_parts(second, third) {
            Ok(((a, b, c), tag)) => rebuild(Ok((f(a, b, c).await, tag))),
            Err(failure) => ApiResponse::Failure(failure),
        }
    }

    /// Replace any failure with a synthetic success holding `default`.
    pub fn recover(self, default: T) -> Self {
        match self {
            ApiResponse::Failure(_) => ApiResponse::success(default),
            success => success,
        }
    }

    pub fn recover_with<F>(self, f: F) -> Self
    where
        F: FnOnce(Failure) -> ApiResponse<T>,
    {
        match self {
            ApiResponse::Failure(failure) => f(failure),
            success => success,
        }
    }

    pub async fn recover_with_async<F, Fut>(self, f: F) -> Self
    where
        F: FnOnce(Failure) -> Fut,
        Fut: Future<Output = ApiResponse<T>>,
    {
        match self {
            ApiResponse::Failure(failure) => f(failure).await,
            success => success,
        }
    }

    /// Turn a success whose body fails `predicate` into a `Failure::Error` carrying `error()`.
    pub fn validate<P, E>(self, predicate: P, error: E) -> Self
    where
        P: FnOnce(&T) -> bool,
        E: FnOnce() -> String,
    {
        let invalid = match &self {
            ApiResponse::Success(success) => success.data().map(|d| !predicate(d)).unwrap_or(false),
            ApiResponse::Failure(_) => false,
        };
        if invalid {
            ApiResponse::error(error())
        } else {
            self
        }
    }

    pub async fn validate_async<P, Fut, E>(self, predicate: P, error: E) -> Self
    where
        P: FnOnce(&T) -> Fut,
        Fut: Future<Output = bool>,
        E: FnOnce() -> String,
    {
        let valid = match &self {
            ApiResponse::Success(success) => match success.data() {
                Ok(data) => predicate(data).await,
                Err(_) => true,
            },
            ApiResponse::Failure(_) => true,
        };
        if valid {
            self
        } else {
            ApiResponse::error(error())
        }
    }

    /// Narrow the body to a required field; a missing field becomes a `Failure::Error`.
    pub fn require_some<V, X, E>(self, extract: X, error: E) -> ApiResponse<V>
    where
        X: FnOnce(T) -> Option<V>,
        E: FnOnce() -> String,
    {
        match self.split() {
            Ok((data, tag)) => match extract(data) {
                Some(field) => rebuild(Ok((field, tag))),
                None => ApiResponse::error(error()),
            },
            Err(failure) => ApiResponse::Failure(failure),
        }
    }

    pub async fn require_some_async<V, X, Fut, E>(self, extract: X, error: E) -> ApiResponse<V>
    where
        X: FnOnce(T) -> Fut,
        Fut: Future<Output = Option<V>>,
        E: FnOnce() -> String,
    {
        match self.split() {
            Ok((data, tag)) => match extract(data).await {
                Some(field) => rebuild(Ok((field, tag))),
                None => ApiResponse::error(error()),
            },
            Err(failure) => ApiResponse::Failure(failure),
        }
    }

    /// Inspect the whole response.
    pub fn peek<F>(self, f: F) -> Self
    where
        F: FnOnce(&Self),
    {
        f(&self);
        self
    }

    /// Inspect the body; skipped for failures and empty-bodied successes.
    pub fn peek_success<F>(self, f: F) -> Self
    where
        F: FnOnce(&T),
    {
        if let ApiResponse::Success(success) = &self {
            if let Ok(data) = success.data() {
                f(data);
            }
        }
        self
    }

    pub fn peek_failure<F>(self, f: F) -> Self
    where
        F: FnOnce(&Failure),
    {
        self.on_failure(f)
    }

    pub fn peek_error<F>(self, f: F) -> Self
    where
        F: FnOnce(&ErrorPayload),
    {
        self.on_error(f)
    }

    pub fn peek_exception<F>(self, f: F) -> Self
    where
        F: FnOnce(&ExceptionPayload),
    {
        self.on_exception(f)
    }

    pub async fn peek_async<F, Fut>(self, f: F) -> Self
    where
        F: FnOnce(&Self) -> Fut,
        Fut: Future<Output = ()>,
    {
        f(&self).await;
        self
    }

    pub async fn peek_success_async<F, Fut>(self, f: F) -> Self
    where
        F: FnOnce(&T) -> Fut,
        Fut: Future<Output = ()>,
    {
        if let ApiResponse::Success(success) = &self {
            if let Ok(data) = success.data() {
                f(data).await;
            }
        }
        self
    }

    pub async fn peek_failure_async<F, Fut>(self, f: F) -> Self
    where
        F: FnOnce(&Failure) -> Fut,
        Fut: Future<Output = ()>,
    {
        self.on_failure_async(f).await
    }

    pub async fn peek_error_async<F, Fut>(self, f: F) -> Self
    where
        F: FnOnce(&ErrorPayload) -> Fut,
        Fut: Future<Output = ()>,
    {
        self.on_error_async(f).await
    }

    pub async fn peek_exception_async<F, Fut>(self, f: F) -> Self
    where
        F: FnOnce(&ExceptionPayload) -> Fut,
        Fut: Future<Output = ()>,
    {
        self.on_exception_async(f).await
    }

    /// Rewrite the body if present, keeping empty-bodied successes and failures as they are.
    fn map_content<F>(self, f: F) -> Self
    where
        F: FnOnce(T) -> T,
    {
        match self {
            ApiResponse::Success(success) => {
                let (data, tag) = success.into_parts();
                ApiResponse::Success(Success::with_tag(data.map(f), tag))
            }
            failure => failure,
        }
    }
}

impl<E> ApiResponse<Vec<E>> {
    /// Keep the elements matching `predicate`.
    pub fn filter<P>(self, mut predicate: P) -> Self
    where
        P: FnMut(&E) -> bool,
    {
        self.map_content(|items| items.into_iter().filter(|item| predicate(item)).collect())
    }

    /// Drop the elements matching `predicate`.
    pub fn filter_not<P>(self, mut predicate: P) -> Self
    where
        P: FnMut(&E) -> bool,
    {
        self.filter(|item| !predicate(item))
    }

    pub async fn filter_async<P, Fut>(self, mut predicate: P) -> Self
    where
        P: FnMut(&E) -> Fut,
        Fut: Future<Output = bool>,
    {
        match self {
            ApiResponse::Success(success) => {
                let (data, tag) = success.into_parts();
                let data = match data {
                    Some(items) => {
                        let mut kept = Vec::with_capacity(items.len());
                        for item in items {
                            if predicate(&item).await {
                                kept.push(item);
                            }
                        }
                        Some(kept)
                    }
                    None => None,
                };
                ApiResponse::Success(Success::with_tag(data, tag))
            }
            failure => failure,
        }
    }

    pub async fn filter_not_async<P, Fut>(self, mut predicate: P) -> Self
    where
        P: FnMut(&E) -> Fut,
        Fut: Future<Output = bool>,
    {
        let mut negated = Vec::new();
        if let ApiResponse::Success(success) = &self {
            if let Ok(items) = success.data() {
                for item in items {
                    negated.push(!predicate(item).await);
                }
            }
        }
        let mut verdicts = negated.into_iter();
        self.filter(move |_| verdicts.next().unwrap_or(false))
    }

    /// Merge this response with `others` under `policy`. See [`merge`].
    pub fn merge<I>(self, others: I, policy: MergePolicy) -> Self
    where
        I: IntoIterator<Item = ApiResponse<Vec<E>>>,
    {
        merge(std::iter::once(self).chain(others), policy)
    }
}

/// How [`merge`] treats failures among its inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergePolicy {
    /// Concatenate every success in input order; failures are dropped.
    #[default]
    IgnoreFailure,
    /// Return the first failure in input order if there is one.
    PreferredFailure,
}

/// Combine list responses into one.
///
/// The merged success reuses the tag of the first success, or a synthetic `200` tag when no
/// input succeeded.
pub fn merge<E, I>(responses: I, policy: MergePolicy) -> ApiResponse<Vec<E>>
where
    I: IntoIterator<Item = ApiResponse<Vec<E>>>,
{
    let mut merged = Vec::new();
    let mut first_tag: Option<Arc<ResponseTag>> = None;
    for response in responses {
        match response {
            ApiResponse::Success(success) => {
                let (data, tag) = success.into_parts();
                first_tag.get_or_insert(tag);
                merged.extend(data.into_iter().flatten());
            }
            ApiResponse::Failure(failure) => {
                if policy == MergePolicy::PreferredFailure {
                    return ApiResponse::Failure(failure);
                }
            }
        }
    }
    match first_tag {
        Some(tag) => ApiResponse::Success(Success::with_tag(Some(merged), tag)),
        None => ApiResponse::success(merged),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NoContentError;
    use crate::response::RawResponse;
    use std::cell::Cell;
    use std::io;

    #[test]
    fn map_keeps_tag() {
        let response = RawResponse::with_body(201, 20).header("etag", "v1").classify(&(200..=299));
        let mapped = response.map(|n| n * 2);
        let success = mapped.as_success().unwrap();
        assert_eq!(success.data().unwrap(), &40);
        assert_eq!(success.status_code().code(), 201);
        assert_eq!(success.headers().get("ETag"), Some("v1"));
    }

    #[test]
    fn map_on_empty_body_reports_no_content() {
        let response: ApiResponse<u8> = RawResponse::new(204).classify(&(200..=299));
        let ran = Cell::new(false);
        let mapped = response.map(|n| {
            ran.set(true);
            n
        });
        assert!(!ran.get());
        match mapped.get_or_throw() {
            Err(ApiError::Exception(e)) => {
                assert_eq!(e.downcast_ref::<NoContentError>(), Some(&NoContentError { status: 204 }))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn filter_leaves_empty_body_alone() {
        let response: ApiResponse<Vec<u8>> = RawResponse::new(204).classify(&(200..=299));
        let filtered = response.filter(|_| true);
        assert!(filtered.is_success());
        assert!(!filtered.as_success().unwrap().has_content());
    }

    #[test]
    fn zip_parts_takes_first_failure() {
        let a: ApiResponse<u8> = ApiResponse::error("a");
        let b: ApiResponse<u8> = ApiResponse::exception(io::Error::new(io::ErrorKind::Other, "b"));
        assert_eq!(a.zip_parts(b).unwrap_err().message(), "a");
    }

    #[tokio::test]
    async fn filter_not_async_drops_matches() {
        let response = ApiResponse::success(vec![1, 2, 3, 4]);
        let odd = response.filter_not_async(|n| {
            let even = n % 2 == 0;
            async move { even }
        });
        assert_eq!(odd.await.get_or_none(), Some(vec![1, 3]));
    }
}
