//! Sequential chain tests for exec_async
//!
//! These tests verify declared-order execution, result threading between
//! steps and short-circuiting on the first failure.

mod common;

use common::{SETTLE_LIMIT, fulfill_after, reject_after, settle_within};
use exec_toolkit::{
    AsyncHandle, ErrorKind, ErrorValue, Execution, StepMap, StepValue, exec_async,
};
use indexmap::IndexMap;
use serde_json::{Value as JsonValue, json};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Successful chains
// ============================================================================

#[tokio::test]
async fn test_empty_chain_fulfills_immediately() {
    assert_eq!(exec_async(StepMap::new()).peek(), Some(Ok(IndexMap::new())));
}

#[tokio::test]
async fn test_step_sees_prior_results() {
    let chain = exec_async(
        StepMap::new()
            .step("a", |_| json!(1))
            .step("b", |r| json!(r["a"].as_i64().unwrap() + 1)),
    );

    let results = settle_within(chain, SETTLE_LIMIT).await.unwrap();
    assert_eq!(results.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(results["a"], json!(1));
    assert_eq!(results["b"], json!(2));
}

#[tokio::test]
async fn test_async_steps_run_in_declared_order() {
    let order = Arc::new(Mutex::new(Vec::new()));

    let first = Arc::clone(&order);
    let second = Arc::clone(&order);
    let third = Arc::clone(&order);
    let chain = exec_async(
        StepMap::new()
            .step("slow", move |_| {
                first.lock().unwrap().push("slow");
                fulfill_after(json!("s"), 30)
            })
            .step("fast", move |r| {
                second.lock().unwrap().push("fast");
                fulfill_after(json!(format!("{}f", r["slow"].as_str().unwrap())), 1)
            })
            .step("sync", move |r| {
                third.lock().unwrap().push("sync");
                r["fast"].clone()
            }),
    );

    let results = settle_within(chain, SETTLE_LIMIT).await.unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["slow", "fast", "sync"]);
    assert_eq!(results["sync"], json!("sf"));
}

#[tokio::test]
async fn test_step_may_return_step_value_handle() {
    let chain = exec_async(StepMap::new().step("a", |_| {
        AsyncHandle::fulfilled(StepValue::Data(json!({"rows": 3})))
    }));

    let results = settle_within(chain, SETTLE_LIMIT).await.unwrap();
    assert_eq!(results["a"]["rows"], json!(3));
}

#[tokio::test]
async fn test_long_synchronous_chain() {
    let mut steps = StepMap::new();
    for i in 0..10_000 {
        steps.insert_step(format!("step{}", i), move |r| {
            let previous = r.len() as u64;
            assert_eq!(previous, i);
            json!(previous)
        });
    }

    let results = exec_async(steps).peek().unwrap().unwrap();
    assert_eq!(results.len(), 10_000);
    assert_eq!(results["step9999"], json!(9_999));
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_error_value_stops_the_chain() {
    let ran_b = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran_b);

    let chain = exec_async(
        StepMap::new()
            .step("a", |_| ErrorValue::new("a failed"))
            .step("b", move |_| {
                flag.store(true, Ordering::SeqCst);
                json!(2)
            }),
    );

    let error = settle_within(chain, SETTLE_LIMIT).await.unwrap_err();
    assert_eq!(error.message(), "a failed");
    assert!(!ran_b.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_rejected_step_carries_partial_results() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let chain = exec_async(
        StepMap::new()
            .step("a", |_| json!("ok"))
            .step("b", |_| {
                reject_after::<JsonValue>(ErrorValue::new("b failed").with_code("upstream"), 5)
            })
            .step("c", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                json!("never")
            }),
    );

    let error = settle_within(chain, SETTLE_LIMIT).await.unwrap_err();
    assert_eq!(error.code(), Some("upstream"));
    assert_eq!(error.data()["a"], json!("ok"));
    assert_eq!(error.data()["b"]["message"], json!("b failed"));
    assert!(error.data().get("c").is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_result_err_fails_the_step() {
    let chain = exec_async(StepMap::new().step("parse", |_| {
        Err::<JsonValue, _>(ErrorValue::new("bad input"))
    }));

    let error = settle_within(chain, SETTLE_LIMIT).await.unwrap_err();
    assert_eq!(error.message(), "bad input");
}

#[tokio::test]
async fn test_handle_fulfilled_with_error_value_fails_the_step() {
    let chain = exec_async(StepMap::new().step("a", |_| {
        AsyncHandle::fulfilled(StepValue::Error(ErrorValue::new("soft failure")))
    }));

    let error = settle_within(chain, SETTLE_LIMIT).await.unwrap_err();
    assert_eq!(error.message(), "soft failure");
}

#[tokio::test]
async fn test_non_callable_entry_fails_at_its_key() {
    let mut steps = StepMap::new().step("a", |_| json!(1));
    steps.insert_value("b", json!("not a function"));
    steps.insert_step("c", |_| json!(3));

    let error = settle_within(exec_async(steps), SETTLE_LIMIT)
        .await
        .unwrap_err();

    assert!(error.is_kind(ErrorKind::StepFailure));
    assert_eq!(error.message(), "Step 'b' is not a function.");
    assert_eq!(error.data()["a"], json!(1));
    assert_eq!(error.data()["b"]["code"], json!("step_failure"));
}

#[tokio::test]
async fn test_dynamic_json_input() {
    let error = exec_async(json!({"a": 1})).peek().unwrap().unwrap_err();
    assert!(error.is_kind(ErrorKind::StepFailure));

    let error = exec_async(json!("steps")).peek().unwrap().unwrap_err();
    assert!(error.is_kind(ErrorKind::InvalidArguments));
    assert_eq!(error.message(), "Steps must be an object.");

    assert_eq!(exec_async(json!({})).peek(), Some(Ok(IndexMap::new())));
}

#[tokio::test]
async fn test_execution_runs_chains() {
    let execution = Execution::default();
    let chain = execution.exec_async(StepMap::new().step("a", |_| json!("done")));

    let results = settle_within(chain, SETTLE_LIMIT).await.unwrap();
    assert_eq!(results["a"], json!("done"));
}
