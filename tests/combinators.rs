mod common;

use apiresponse::{merge, ApiError, ApiResponse, Failure, MergePolicy, NoContentError, RawResponse};
use std::cell::Cell;
use std::io;
use std::sync::Arc;

fn failed<T>() -> ApiResponse<T> {
    ApiResponse::exception(io::Error::new(io::ErrorKind::Other, "boom"))
}

#[test]
fn hooks_fire_exactly_once_and_only_on_their_branch() {
    let success_hits = Cell::new(0);
    let failure_hits = Cell::new(0);

    ApiResponse::success(1)
        .on_success(|_| success_hits.set(success_hits.get() + 1))
        .on_failure(|_| failure_hits.set(failure_hits.get() + 1))
        .peek_success(|_| success_hits.set(success_hits.get() + 1));
    assert_eq!((success_hits.get(), failure_hits.get()), (2, 0));

    failed::<i32>()
        .on_success(|_| success_hits.set(success_hits.get() + 1))
        .on_exception(|_| failure_hits.set(failure_hits.get() + 1))
        .on_error(|_| failure_hits.set(failure_hits.get() + 100))
        .peek_failure(|_| failure_hits.set(failure_hits.get() + 1));
    assert_eq!((success_hits.get(), failure_hits.get()), (2, 2));
}

#[test]
fn map_chain_is_lazy_on_failure() {
    let calls = Cell::new(0);
    let response = failed::<i32>()
        .map(|n| {
            calls.set(calls.get() + 1);
            n + 1
        })
        .flat_map(|n| {
            calls.set(calls.get() + 1);
            ApiResponse::success(n * 2)
        });
    assert_eq!(calls.get(), 0);
    assert!(response.is_exception());
}

#[test]
fn zip_is_success_only_when_both_are() {
    assert_eq!(ApiResponse::success(2).zip(ApiResponse::success(3), |a, b| a * b).get_or_none(), Some(6));
    let left_failed = failed::<i32>().zip(ApiResponse::<i32>::error("right"), |a, b| a + b);
    assert_eq!(left_failed.message().as_deref(), Some("boom"), "first failure wins");
    let right_failed = ApiResponse::success(1).zip(ApiResponse::<i32>::error("right"), |a, b| a + b);
    assert_eq!(right_failed.message().as_deref(), Some("right"));
    let triple = ApiResponse::success(1).zip3(ApiResponse::success("x"), ApiResponse::success(2.5), |a, b, c| {
        format!("{a}{b}{c}")
    });
    assert_eq!(triple.get_or_none().as_deref(), Some("1x2.5"));
}

#[test]
fn zip_never_combines_when_an_operand_failed() {
    let combined = Cell::new(0);
    let combine2 = |a: i32, b: i32| {
        combined.set(combined.get() + 1);
        a + b
    };
    let combine3 = |a: i32, b: i32, c: i32| {
        combined.set(combined.get() + 1);
        a + b + c
    };

    let second = ApiResponse::success(1).zip(ApiResponse::<i32>::error("second"), combine2);
    assert_eq!(second.message().as_deref(), Some("second"));

    let middle = ApiResponse::success(1).zip3(ApiResponse::<i32>::error("second"), ApiResponse::success(3), combine3);
    assert_eq!(middle.message().as_deref(), Some("second"));

    let last = ApiResponse::success(1).zip3(ApiResponse::success(2), ApiResponse::<i32>::error("third"), combine3);
    assert_eq!(last.message().as_deref(), Some("third"));

    let both = ApiResponse::success(1).zip3(failed::<i32>(), ApiResponse::<i32>::error("third"), combine3);
    assert!(both.is_exception(), "leftmost failure wins");
    assert_eq!(both.message().as_deref(), Some("boom"));

    assert_eq!(combined.get(), 0);
}

#[tokio::test]
async fn zip3_async_never_combines_when_an_operand_failed() {
    let combined = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    for (second, third, expected) in [
        (ApiResponse::<i32>::error("second"), ApiResponse::success(3), "second"),
        (ApiResponse::success(2), ApiResponse::<i32>::error("third"), "third"),
        (ApiResponse::<i32>::error("second"), ApiResponse::<i32>::error("third"), "second"),
    ] {
        let counter = combined.clone();
        let response = ApiResponse::success(1)
            .zip3_async(second, third, |a, b, c| {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async move { a + b + c }
            })
            .await;
        assert_eq!(response.message().as_deref(), Some(expected));
    }
    assert_eq!(combined.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[test]
fn recover_always_succeeds_and_keeps_existing_success() {
    assert_eq!(failed::<i32>().recover(7).get_or_none(), Some(7));
    assert_eq!(ApiResponse::success(1).recover(7).get_or_none(), Some(1));
    let recovered = ApiResponse::<i32>::error("gone").recover_with(|f| {
        assert!(f.is_error());
        ApiResponse::success(0)
    });
    assert!(recovered.is_success());
}

#[test]
fn validate_turns_rejection_into_error() {
    let rejected = ApiResponse::success(-5).validate(|n| *n >= 0, || "negative".into());
    assert!(rejected.is_error());
    assert_eq!(rejected.message().as_deref(), Some("negative"));

    let missing = ApiResponse::success(vec![1, 2]).require_some(|v| v.into_iter().find(|n| *n > 5), || "none".into());
    assert!(missing.is_error());
}

#[test]
fn merge_policies() {
    let inputs = || {
        vec![
            ApiResponse::success(vec![1, 2]),
            ApiResponse::<Vec<i32>>::error("middle"),
            ApiResponse::success(vec![3]),
        ]
    };
    assert_eq!(merge(inputs(), MergePolicy::IgnoreFailure).get_or_none(), Some(vec![1, 2, 3]));
    let preferred = merge(inputs(), MergePolicy::PreferredFailure);
    assert_eq!(preferred.message().as_deref(), Some("middle"));
    assert_eq!(merge(Vec::<ApiResponse<Vec<i32>>>::new(), MergePolicy::IgnoreFailure).get_or_none(), Some(vec![]));

    let chained = ApiResponse::success(vec!['a']).merge([ApiResponse::success(vec!['b'])], MergePolicy::default());
    assert_eq!(chained.get_or_none(), Some(vec!['a', 'b']));
}

#[test]
fn get_or_throw_shares_the_original_error() {
    let response: ApiResponse<()> = failed();
    let original = match response.as_failure() {
        Some(Failure::Exception(e)) => e.error().clone(),
        other => panic!("unexpected {other:?}"),
    };
    let thrown = response.get_or_throw().unwrap_err();
    match thrown {
        ApiError::Exception(shared) => assert!(Arc::ptr_eq(&shared, &original)),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn empty_body_surfaces_as_no_content() {
    let empty: ApiResponse<String> = RawResponse::new(204).classify(&(200..=299));
    let mapped = empty.clone().map(|s| s.len());
    let exception = match mapped.as_failure() {
        Some(Failure::Exception(e)) => e.downcast_ref::<NoContentError>().copied(),
        _ => None,
    };
    assert_eq!(exception, Some(NoContentError { status: 204 }));
    assert!(matches!(empty.get_or_throw(), Err(ApiError::NoContent(NoContentError { status: 204 }))));
}

#[tokio::test]
async fn async_variants_match_sync_semantics() {
    let doubled = ApiResponse::success(21).map_async(|n| async move { n * 2 }).await;
    assert_eq!(doubled.get_or_none(), Some(42));

    let skipped = failed::<i32>()
        .map_async(|_| async { unreachable!("never called on failure") })
        .await;
    assert!(skipped.is_exception());

    let recovered = failed::<i32>()
        .recover_with_async(|_| async { ApiResponse::success(5) })
        .await;
    assert_eq!(recovered.get_or_none(), Some(5));

    let zipped = ApiResponse::success(1)
        .zip_async(ApiResponse::success(2), |a, b| async move { a + b })
        .await;
    assert_eq!(zipped.get_or_none(), Some(3));

    let kept = ApiResponse::success(vec![1, 2, 3, 4])
        .filter_async(|n| {
            let even = n % 2 == 0;
            async move { even }
        })
        .await;
    assert_eq!(kept.get_or_none(), Some(vec![2, 4]));
}
