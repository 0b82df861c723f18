//! Fan-out/fan-in aggregation with a deadline.

use super::config::ExecutionConfig;
use super::error::ErrorValue;
use super::handle::{AsyncHandle, Deferred, MaybeHandle};
use super::settlement_state::SettlementState;
use super::task_map::IntoTaskMap;
use crate::validation::{Kind, Rule, validate};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{Span, debug, info, info_span, warn};

struct Aggregation<T> {
    state: SettlementState<T>,
    finished: bool,
    timer: Option<JoinHandle<()>>,
}

struct WaitForAll<T> {
    aggregation: Mutex<Aggregation<T>>,
    deferred: Deferred<IndexMap<String, T>>,
    log_timeouts: bool,
    span: Span,
}

pub(crate) fn wait_for_all<I>(
    tasks: I,
    timeout_ms: Option<u64>,
    config: &ExecutionConfig,
) -> AsyncHandle<IndexMap<String, I::Output>>
where
    I: IntoTaskMap,
    I::Output: Clone + Serialize + Send + 'static,
{
    let (deferred, aggregate) = AsyncHandle::pending();

    let check = validate([(
        "timeout",
        Rule::new(timeout_ms.map(JsonValue::from), Kind::PositiveInteger)
            .with_default(json!(config.default_timeout_ms))
            .with_warn(timeout_ms.is_some()),
    )]);

    let task_map = match (tasks.into_task_map(), check.is_valid()) {
        (Some(task_map), true) => task_map,
        (task_map, _) => {
            let mut error =
                ErrorValue::invalid_arguments("Could not wait for handles. Invalid arguments.")
                    .with_data(json!({}));
            if task_map.is_none() {
                error = error.with_sub_error(
                    "tasks",
                    ErrorValue::invalid_arguments("'tasks' must be an object or an array"),
                );
            }
            for violation in check.violations() {
                error = error.with_sub_error(
                    violation.field.clone(),
                    ErrorValue::invalid_arguments(violation.to_string()),
                );
            }
            warn!(error = %error, "wait_for_all called with invalid arguments");
            deferred.reject(error);
            return aggregate;
        }
    };

    if task_map.is_empty() {
        deferred.resolve(IndexMap::new());
        return aggregate;
    }

    let timeout = Duration::from_millis(
        check
            .get("timeout")
            .and_then(JsonValue::as_u64)
            .unwrap_or(config.default_timeout_ms),
    );
    WaitForAll::launch(task_map.into_entries(), timeout, config.log_timeouts, deferred);
    aggregate
}

impl<T> WaitForAll<T>
where
    T: Clone + Serialize + Send + 'static,
{
    /// Observes every entry and starts the deadline timer.
    fn launch(
        entries: IndexMap<String, MaybeHandle<T>>,
        timeout: Duration,
        log_timeouts: bool,
        deferred: Deferred<IndexMap<String, T>>,
    ) -> Arc<Self> {
        let span = info_span!(
            "wait_for_all",
            tasks = entries.len(),
            timeout_ms = timeout.as_millis() as u64,
        );
        let _entered = span.enter();
        debug!("Waiting for {} handle(s)", entries.len());

        let mut state = SettlementState::new();
        for key in entries.keys() {
            state.register(key);
        }

        let waiter = Arc::new(WaitForAll {
            aggregation: Mutex::new(Aggregation {
                state,
                finished: false,
                timer: None,
            }),
            deferred,
            log_timeouts,
            span: span.clone(),
        });

        for (key, entry) in entries {
            match entry {
                MaybeHandle::Value(_) => {
                    warn!(key = %key, "Dependency is not a handle");
                    waiter.record(&key, Err(ErrorValue::not_a_handle()));
                }
                MaybeHandle::Handle(thenable) => {
                    let on_fulfilled = Arc::clone(&waiter);
                    let on_rejected = Arc::clone(&waiter);
                    let fulfilled_key = key.clone();
                    thenable.subscribe(
                        Box::new(move |value| on_fulfilled.record(&fulfilled_key, Ok(value))),
                        Box::new(move |error| on_rejected.record(&key, Err(error))),
                    );
                }
            }
        }

        waiter.start_timer(timeout);
        waiter
    }

    fn lock(&self) -> MutexGuard<'_, Aggregation<T>> {
        self.aggregation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records the outcome of one key and settles the aggregate once every
    /// key is done.
    fn record(&self, key: &str, outcome: Result<T, ErrorValue>) {
        let _entered = self.span.enter();

        let verdict = {
            let mut aggregation = self.lock();
            if aggregation.finished {
                debug!(key = %key, "Ignoring settlement after aggregate settled");
                return;
            }
            match outcome {
                Ok(value) => {
                    aggregation.state.resolve(key, value);
                    debug!(key = %key, "Handle resolved");
                }
                Err(error) => {
                    debug!(key = %key, error = %error, "Handle rejected");
                    aggregation.state.reject(key, error);
                }
            }
            if aggregation.state.has_pending() {
                return;
            }

            aggregation.finished = true;
            if let Some(timer) = aggregation.timer.take() {
                timer.abort();
            }
            Self::verdict(&aggregation.state)
        };

        match &verdict {
            Ok(results) => info!(tasks = results.len(), "All handles resolved"),
            Err(error) => warn!(failed = error.error_map().len(), "Handle(s) rejected"),
        }
        self.deferred.settle(verdict);
    }

    fn verdict(state: &SettlementState<T>) -> Result<IndexMap<String, T>, ErrorValue> {
        let results = state.results();
        if state.has_rejections() {
            Err(ErrorValue::aggregate(state.errors(), to_payload(&results)))
        } else {
            Ok(results)
        }
    }

    fn start_timer(self: &Arc<Self>, timeout: Duration) {
        let mut aggregation = self.lock();
        if aggregation.finished {
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                aggregation.finished = true;
                drop(aggregation);
                warn!("No tokio runtime available for the deadline timer");
                self.deferred.reject(ErrorValue::invalid_arguments(
                    "No tokio runtime available to drive the deadline timer.",
                ));
                return;
            }
        };

        let waiter = Arc::clone(self);
        aggregation.timer = Some(runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            waiter.expire();
        }));
    }

    /// Rejects every still-pending key and the aggregate.
    fn expire(&self) {
        let _entered = self.span.enter();

        let error = {
            let mut aggregation = self.lock();
            if aggregation.finished {
                return;
            }
            aggregation.finished = true;
            aggregation.timer = None;

            let expired = aggregation.state.expire_pending(ErrorValue::timed_out);
            if self.log_timeouts {
                for key in &expired {
                    warn!(key = %key, "Handle still pending at deadline");
                }
            }
            ErrorValue::deadline_elapsed(
                aggregation.state.errors(),
                to_payload(&aggregation.state.results()),
            )
        };

        self.deferred.reject(error);
    }
}

fn to_payload<T: Serialize>(results: &IndexMap<String, T>) -> JsonValue {
    serde_json::to_value(results).unwrap_or_else(|e| {
        warn!(error = %e, "Could not serialize partial results");
        JsonValue::Null
    })
}
