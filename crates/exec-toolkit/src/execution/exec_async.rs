//! Sequential step chains.
//!
//! Steps run one at a time in declared order. The chain is an explicit loop
//! over the remaining entries: a step whose output is already settled is
//! consumed inline, a pending one parks the loop on an observer that resumes
//! it once the handle settles. Long chains of synchronous steps therefore run
//! in constant stack space.

use super::error::ErrorValue;
use super::handle::{AsyncHandle, Deferred, wrap_with};
use super::steps::{IntoStepMap, StepEntry, StepResults, StepValue};
use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};
use tracing::{Span, debug, info, info_span, warn};

struct StepChain {
    steps: indexmap::map::IntoIter<String, StepEntry>,
    results: StepResults,
    deferred: Deferred<StepResults>,
    span: Span,
}

pub(crate) fn exec_async<S: IntoStepMap>(steps: S) -> AsyncHandle<StepResults> {
    let (deferred, chain) = AsyncHandle::pending();

    let Some(steps) = steps.into_step_map() else {
        warn!("exec_async called with a step collection that is not map-like");
        deferred.reject(ErrorValue::invalid_arguments("Steps must be an object."));
        return chain;
    };

    if steps.is_empty() {
        deferred.resolve(IndexMap::new());
        return chain;
    }

    let span = info_span!("exec_async", steps = steps.len());
    StepChain {
        steps: steps.into_entries().into_iter(),
        results: IndexMap::new(),
        deferred,
        span,
    }
    .run();

    chain
}

impl StepChain {
    /// Drives the chain until it finishes or a step is still pending.
    fn run(mut self) {
        let span = self.span.clone();
        let _entered = span.enter();

        loop {
            let Some((key, entry)) = self.steps.next() else {
                info!(steps = self.results.len(), "All steps completed");
                self.deferred.resolve(self.results);
                return;
            };

            let step = match entry {
                StepEntry::Step(step) => step,
                StepEntry::NotCallable(value) => {
                    debug!(key = %key, value = %value, "Step entry is not callable");
                    let error = ErrorValue::step_not_callable(&key);
                    self.fail(key, error);
                    return;
                }
            };

            debug!(key = %key, "Running step");
            let output = wrap_with(step(&self.results).into_inner(), StepValue::is_error);

            match output.peek() {
                Some(Ok(value)) => self.record(key, value),
                Some(Err(error)) => {
                    self.fail(key, error);
                    return;
                }
                None => {
                    debug!(key = %key, "Step pending, parking chain");
                    output.on_settled(move |outcome| match outcome {
                        Ok(value) => {
                            self.record(key, value);
                            self.run();
                        }
                        Err(error) => self.fail(key, error),
                    });
                    return;
                }
            }
        }
    }

    fn record(&mut self, key: String, value: StepValue) {
        let value = match value {
            StepValue::Data(value) => value,
            // Filtered out by the failure predicate.
            StepValue::Error(error) => error.to_json(),
        };
        debug!(key = %key, "Step completed");
        self.results.insert(key, value);
    }

    /// Stops the chain and rejects with `error`, carrying the partial results.
    fn fail(mut self, key: String, error: ErrorValue) {
        let _entered = self.span.enter();
        warn!(key = %key, error = %error, "Step failed, stopping chain");

        self.results.insert(key, error.to_json());
        let partial: Map<String, JsonValue> = self.results.into_iter().collect();
        self.deferred.reject(error.with_data(JsonValue::Object(partial)));
    }
}
