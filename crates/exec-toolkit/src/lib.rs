//! 'exec-toolkit' - Small, reliable primitives for orchestrating async work.
//!
//! This library provides a single-resolution async handle and two ways of
//! composing many of them:
//!
//! - **Fan-out/fan-in** with [`wait_for_all`]: wait for a collection of
//!   handles under a deadline and get either every result or a structured
//!   error carrying the partial results and the error of each failed key.
//! - **Sequential chains** with [`exec_async`]: run named steps in order, each
//!   one seeing the results of the steps before it, stopping at the first
//!   failure.
//!
//! Failures are always reported as an [`ErrorValue`] rejecting the returned
//! handle, never as a panic.
//!
//! # Quick start
//!
//! ```rust
//! use exec_toolkit::{AsyncHandle, ErrorKind, ErrorValue, wait_for_all};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let outcome = wait_for_all(
//!     vec![
//!         ("a", AsyncHandle::fulfilled(json!(1))),
//!         ("b", AsyncHandle::rejected(ErrorValue::new("b failed"))),
//!     ],
//!     None,
//! )
//! .await;
//!
//! let error = outcome.unwrap_err();
//! assert!(error.is_kind(ErrorKind::AggregateFailure));
//! assert_eq!(error.data()["a"], json!(1));
//! assert_eq!(error.error_map()["b"].message(), "b failed");
//! # }
//! ```
//!
//! Besides the orchestrator the crate ships the validation helper it uses for
//! option bags ([`validation`]), a named-timer [`profiler`], and
//! [`observability`] for installing a `tracing` subscriber.

pub mod execution;
pub mod observability;
pub mod profiler;
pub mod validation;

pub use execution::{
    AsyncHandle, Deferred, ErrorKind, ErrorValue, Execution, ExecutionConfig, HandleState,
    IntoFailure, IntoStepMap, IntoTaskMap, MaybeHandle, StepMap, StepResults, StepValue, TaskMap,
    Thenable, exec_async, is_handle, wait_for_all, wrap, wrap_with,
};
