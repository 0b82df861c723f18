//! Helpers shared by the integration tests.

#![allow(dead_code)]

use exec_toolkit::{AsyncHandle, ErrorValue};
use std::time::Duration;

/// Default bound for [`settle_within`].
pub const SETTLE_LIMIT: Duration = Duration::from_secs(5);

/// Awaits `handle`, failing the test if it has not settled within `limit`.
pub async fn settle_within<T>(handle: AsyncHandle<T>, limit: Duration) -> Result<T, ErrorValue>
where
    T: Clone + Send + 'static,
{
    match tokio::time::timeout(limit, handle).await {
        Ok(outcome) => outcome,
        Err(_) => panic!("handle did not settle within {:?}", limit),
    }
}

/// A handle fulfilled with `value` after `delay_ms` on the current runtime.
pub fn fulfill_after<T>(value: T, delay_ms: u64) -> AsyncHandle<T>
where
    T: Clone + Send + 'static,
{
    AsyncHandle::spawn(async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        Ok(value)
    })
}

/// A handle rejected with `error` after `delay_ms` on the current runtime.
pub fn reject_after<T>(error: ErrorValue, delay_ms: u64) -> AsyncHandle<T>
where
    T: Clone + Send + 'static,
{
    AsyncHandle::spawn(async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        Err(error)
    })
}
