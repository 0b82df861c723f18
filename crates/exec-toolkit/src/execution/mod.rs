//! Execution - fan-out/fan-in and sequential composition of async handles.
//!
//! This module provides the two composite operations of the crate, both built
//! entirely on [`AsyncHandle`]:
//!
//! - [`wait_for_all`] runs independent operations side by side and combines
//!   their outcomes into one handle, bounded by a deadline.
//! - [`exec_async`] runs named steps one after the other, feeding each step the
//!   results of the steps before it and stopping at the first failure.
//!
//! Neither operation returns `Err` or panics for operational failures. Every
//! failure surfaces as the rejection of the returned handle, with partial
//! results in [`ErrorValue::data`] and per-key detail in
//! [`ErrorValue::error_map`].
//!
//! # Example
//!
//! ```rust
//! use exec_toolkit::execution::{self, StepMap};
//! use exec_toolkit::AsyncHandle;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let results = execution::wait_for_all(
//!     vec![("users", AsyncHandle::fulfilled(json!(3))), ("posts", AsyncHandle::fulfilled(json!(7)))],
//!     Some(1_000),
//! )
//! .await
//! .unwrap();
//! assert_eq!(results["posts"], json!(7));
//!
//! let chain = execution::exec_async(
//!     StepMap::new()
//!         .step("a", |_| json!(1))
//!         .step("b", |r| json!(r["a"].as_i64().unwrap_or(0) + 1)),
//! )
//! .await
//! .unwrap();
//! assert_eq!(chain["b"], json!(2));
//! # }
//! ```

pub mod config;
pub mod error;
pub mod handle;
pub mod settlement_state;
pub mod steps;
pub mod task_map;

mod exec_async;
mod wait_for_all;

pub use config::{ConfigError, DEFAULT_TIMEOUT_ENV, DEFAULT_TIMEOUT_MS, ExecutionConfig};
pub use error::{ErrorKind, ErrorValue, IntoFailure};
pub use handle::{
    AsyncHandle, Deferred, HandleState, MaybeHandle, Thenable, is_handle, wrap, wrap_with,
};
pub use settlement_state::{KeySettlement, SettlementState};
pub use steps::{IntoStepMap, StepEntry, StepFn, StepMap, StepOutput, StepResults, StepValue};
pub use task_map::{IntoTaskMap, TaskMap};

use indexmap::IndexMap;
use serde::Serialize;

/// Waits for every task and combines their outcomes, using the default
/// configuration.
///
/// `timeout_ms` defaults to [`DEFAULT_TIMEOUT_MS`]. See
/// [`Execution::wait_for_all`].
pub fn wait_for_all<I>(tasks: I, timeout_ms: Option<u64>) -> AsyncHandle<IndexMap<String, I::Output>>
where
    I: IntoTaskMap,
    I::Output: Clone + Serialize + Send + 'static,
{
    wait_for_all::wait_for_all(tasks, timeout_ms, &ExecutionConfig::default())
}

/// Runs `steps` in declared order. See [`Execution::exec_async`].
pub fn exec_async<S: IntoStepMap>(steps: S) -> AsyncHandle<StepResults> {
    exec_async::exec_async(steps)
}

/// An orchestrator bound to an [`ExecutionConfig`].
#[derive(Debug, Clone, Default)]
pub struct Execution {
    config: ExecutionConfig,
}

impl Execution {
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Waits for every task of `tasks` and settles with the combined outcome.
    ///
    /// - Fulfills with the results in declared key order once every task
    ///   fulfilled. An empty collection fulfills immediately.
    /// - Rejects with an [`ErrorKind::AggregateFailure`] error once every task
    ///   settled and at least one rejected. Entries that are not handles count
    ///   as rejected with [`ErrorKind::NotAHandle`].
    /// - Rejects with an [`ErrorKind::Timeout`] error when `timeout_ms`
    ///   (or the configured default) elapses first. Late settlements are
    ///   ignored.
    /// - Rejects with [`ErrorKind::InvalidArguments`] when the collection is
    ///   not map-like, the timeout is zero, or no tokio runtime is available
    ///   for the deadline timer.
    pub fn wait_for_all<I>(
        &self,
        tasks: I,
        timeout_ms: Option<u64>,
    ) -> AsyncHandle<IndexMap<String, I::Output>>
    where
        I: IntoTaskMap,
        I::Output: Clone + Serialize + Send + 'static,
    {
        wait_for_all::wait_for_all(tasks, timeout_ms, &self.config)
    }

    /// Runs `steps` one at a time in declared order.
    ///
    /// Each step receives the results of the steps before it. The first step
    /// that fails (returns an [`ErrorValue`], settles rejected, or is not
    /// callable) stops the chain: its error is stored under its key, the
    /// partial results become the error's data, and the chain rejects with
    /// it.
    pub fn exec_async<S: IntoStepMap>(&self, steps: S) -> AsyncHandle<StepResults> {
        exec_async::exec_async(steps)
    }
}
