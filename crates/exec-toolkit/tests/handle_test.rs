//! Integration tests for the handle primitives
//!
//! These tests verify that foreign async types join the orchestrator through
//! the `Thenable` trait, and that handles interoperate with tokio tasks.

mod common;

use common::{SETTLE_LIMIT, fulfill_after, settle_within};
use exec_toolkit::{
    AsyncHandle, ErrorKind, ErrorValue, HandleState, MaybeHandle, TaskMap, Thenable, is_handle,
    wait_for_all, wrap, wrap_with,
};
use serde_json::{Value as JsonValue, json};
use std::sync::{Arc, Mutex};

// ============================================================================
// Foreign handle implementation
// ============================================================================

/// A minimal callback-based async result, settled by hand.
#[derive(Clone, Default)]
struct Callback {
    outcome: Arc<Mutex<Option<Result<JsonValue, String>>>>,
    listeners: Arc<Mutex<Vec<(Box<dyn FnOnce(JsonValue) + Send>, Box<dyn FnOnce(ErrorValue) + Send>)>>>,
}

impl Callback {
    fn complete(&self, outcome: Result<JsonValue, String>) {
        *self.outcome.lock().unwrap() = Some(outcome.clone());
        let listeners = std::mem::take(&mut *self.listeners.lock().unwrap());
        for (on_ok, on_err) in listeners {
            match outcome.clone() {
                Ok(value) => on_ok(value),
                Err(message) => on_err(ErrorValue::new(message)),
            }
        }
    }
}

impl Thenable<JsonValue> for Callback {
    fn subscribe(
        &self,
        on_fulfilled: Box<dyn FnOnce(JsonValue) + Send>,
        on_rejected: Box<dyn FnOnce(ErrorValue) + Send>,
    ) {
        let outcome = self.outcome.lock().unwrap().clone();
        match outcome {
            Some(Ok(value)) => on_fulfilled(value),
            Some(Err(message)) => on_rejected(ErrorValue::new(message)),
            None => self.listeners.lock().unwrap().push((on_fulfilled, on_rejected)),
        }
    }
}

#[test]
fn test_foreign_thenable_is_a_handle() {
    let foreign = MaybeHandle::handle(Callback::default());
    let plain: MaybeHandle<JsonValue> = MaybeHandle::Value(json!({"then": true}));

    assert!(is_handle(&foreign));
    assert!(!is_handle(&plain));
}

#[test]
fn test_wrap_adopts_foreign_thenable() {
    let callback = Callback::default();
    let wrapped = wrap(MaybeHandle::handle(callback.clone()));
    assert_eq!(wrapped.state(), HandleState::Pending);

    callback.complete(Ok(json!(5)));
    assert_eq!(wrapped.peek(), Some(Ok(json!(5))));
}

#[tokio::test]
async fn test_wait_for_all_accepts_foreign_thenables() {
    let ok = Callback::default();
    let failing = Callback::default();

    let mut tasks = TaskMap::new();
    tasks.insert("ok", MaybeHandle::handle(ok.clone()));
    tasks.insert("failing", MaybeHandle::handle(failing.clone()));
    let aggregate = wait_for_all(tasks, Some(1_000));

    ok.complete(Ok(json!("fine")));
    failing.complete(Err("broken".to_string()));

    let error = settle_within(aggregate, SETTLE_LIMIT).await.unwrap_err();
    assert!(error.is_kind(ErrorKind::AggregateFailure));
    assert_eq!(error.error_map()["failing"].message(), "broken");
    assert_eq!(error.data(), &json!({"ok": "fine"}));
}

// ============================================================================
// Runtime interop
// ============================================================================

#[tokio::test]
async fn test_spawned_handle_settles_from_task() {
    let handle = fulfill_after(json!("later"), 5);
    assert!(handle.is_pending());

    assert_eq!(settle_within(handle, SETTLE_LIMIT).await, Ok(json!("later")));
}

#[tokio::test]
async fn test_wrap_with_on_spawned_handle() {
    let handle = wrap_with(MaybeHandle::from(fulfill_after(json!("bad"), 5)), |v: &JsonValue| {
        v == "bad"
    });

    let error = settle_within(handle, SETTLE_LIMIT).await.unwrap_err();
    assert_eq!(error.message(), "bad");
}

#[tokio::test]
async fn test_handle_can_be_settled_from_another_thread() {
    let (deferred, handle) = AsyncHandle::<i32>::pending();
    std::thread::spawn(move || {
        deferred.resolve(11);
    });

    assert_eq!(settle_within(handle, SETTLE_LIMIT).await, Ok(11));
}
