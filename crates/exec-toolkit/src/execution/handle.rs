//! Single-resolution asynchronous handles.
//!
//! An [`AsyncHandle`] is a promise-like container that is pending until it is
//! settled exactly once, either fulfilled with a value or rejected with an
//! [`ErrorValue`]. Observers registered with [`AsyncHandle::done`],
//! [`AsyncHandle::fail`] and [`AsyncHandle::on_settled`] run once, in
//! registration order, at settlement (or immediately when the handle is
//! already settled and no other observer is still running). An observer
//! registered from inside another observer runs after every observer
//! registered before it. The write side is a [`Deferred`].
//!
//! Handles are also futures, so async code can simply `.await` them.
//!
//! # Examples
//!
//! ```
//! use exec_toolkit::AsyncHandle;
//! use std::sync::{Arc, Mutex};
//!
//! let (deferred, handle) = AsyncHandle::<i32>::pending();
//! let seen = Arc::new(Mutex::new(None));
//!
//! let sink = Arc::clone(&seen);
//! handle.done(move |value| *sink.lock().unwrap() = Some(value));
//!
//! assert!(deferred.resolve(7));
//! assert!(!deferred.resolve(8)); // single-write
//! assert_eq!(*seen.lock().unwrap(), Some(7));
//! ```

use super::error::{ErrorKind, ErrorValue, IntoFailure};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};

/// Observable state of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Pending,
    Fulfilled,
    Rejected,
}

enum Slot<T> {
    Pending,
    Fulfilled(T),
    Rejected(ErrorValue),
}

enum Observer<T> {
    Fulfilled(Box<dyn FnOnce(T) + Send>),
    Rejected(Box<dyn FnOnce(ErrorValue) + Send>),
    Settled(Box<dyn FnOnce(Result<T, ErrorValue>) + Send>),
}

impl<T: Clone> Observer<T> {
    fn notify(self, outcome: &Result<T, ErrorValue>) {
        match (self, outcome) {
            (Observer::Fulfilled(f), Ok(value)) => f(value.clone()),
            (Observer::Rejected(f), Err(error)) => f(error.clone()),
            (Observer::Settled(f), outcome) => f(outcome.clone()),
            _ => {}
        }
    }
}

impl<T: Clone> Slot<T> {
    fn outcome(&self) -> Option<Result<T, ErrorValue>> {
        match self {
            Slot::Pending => None,
            Slot::Fulfilled(value) => Some(Ok(value.clone())),
            Slot::Rejected(error) => Some(Err(error.clone())),
        }
    }
}

struct Shared<T> {
    slot: Slot<T>,
    /// Observers not yet notified, in registration order.
    observers: VecDeque<Observer<T>>,
    wakers: Vec<Waker>,
    /// Set while some thread is draining `observers`.
    notifying: bool,
}

/// The read side of a single-resolution asynchronous result.
///
/// Cloning a handle yields another view of the same shared state.
pub struct AsyncHandle<T> {
    shared: Arc<Mutex<Shared<T>>>,
}

impl<T> Clone for AsyncHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> AsyncHandle<T> {
    fn lock(&self) -> MutexGuard<'_, Shared<T>> {
        // Observers never run under the lock, so a poisoned mutex still holds consistent state.
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the current state of the handle.
    pub fn state(&self) -> HandleState {
        match self.lock().slot {
            Slot::Pending => HandleState::Pending,
            Slot::Fulfilled(_) => HandleState::Fulfilled,
            Slot::Rejected(_) => HandleState::Rejected,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state() == HandleState::Pending
    }

    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }

    /// Returns true if both handles view the same underlying state.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<T: Clone + Send + 'static> AsyncHandle<T> {
    fn new_pending() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                slot: Slot::Pending,
                observers: VecDeque::new(),
                wakers: Vec::new(),
                notifying: false,
            })),
        }
    }

    /// Creates a pending handle together with the [`Deferred`] that settles it.
    pub fn pending() -> (Deferred<T>, Self) {
        let handle = Self::new_pending();
        (
            Deferred {
                handle: handle.clone(),
            },
            handle,
        )
    }

    /// Creates a handle that is already fulfilled with `value`.
    pub fn fulfilled(value: T) -> Self {
        let handle = Self::new_pending();
        handle.settle(Ok(value));
        handle
    }

    /// Creates a handle that is already rejected with `error`.
    pub fn rejected(error: ErrorValue) -> Self {
        let handle = Self::new_pending();
        handle.settle(Err(error));
        handle
    }

    /// Runs `future` on the current tokio runtime and settles with its output.
    ///
    /// If the task panics or is cancelled the handle is rejected with the
    /// task's failure. Without a runtime the handle is rejected with an
    /// [`ErrorKind::InvalidArguments`] error.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, ErrorValue>> + Send + 'static,
    {
        let (deferred, handle) = Self::pending();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let task = runtime.spawn(future);
                runtime.spawn(async move {
                    let outcome = task.await.unwrap_or_else(|join_error| {
                        Err(ErrorValue::new(format!(
                            "Spawned task did not complete: {}",
                            join_error
                        )))
                    });
                    deferred.settle(outcome);
                });
            }
            Err(_) => {
                deferred.reject(ErrorValue::of_kind(
                    ErrorKind::InvalidArguments,
                    "No tokio runtime available to drive the handle.",
                ));
            }
        }
        handle
    }

    /// Returns the settled outcome, or `None` while pending.
    pub fn peek(&self) -> Option<Result<T, ErrorValue>> {
        self.lock().slot.outcome()
    }

    /// Registers a fulfillment observer.
    pub fn done<F>(&self, on_fulfilled: F) -> &Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.register(Observer::Fulfilled(Box::new(on_fulfilled)));
        self
    }

    /// Registers a rejection observer.
    pub fn fail<F>(&self, on_rejected: F) -> &Self
    where
        F: FnOnce(ErrorValue) + Send + 'static,
    {
        self.register(Observer::Rejected(Box::new(on_rejected)));
        self
    }

    /// Registers an observer that receives either outcome.
    pub fn on_settled<F>(&self, on_settled: F) -> &Self
    where
        F: FnOnce(Result<T, ErrorValue>) + Send + 'static,
    {
        self.register(Observer::Settled(Box::new(on_settled)));
        self
    }

    /// Returns a handle fulfilled with `f(value)` once this one fulfills.
    /// Rejections pass through unchanged.
    pub fn map<U, F>(&self, f: F) -> AsyncHandle<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let (deferred, mapped) = AsyncHandle::pending();
        self.on_settled(move |outcome| {
            deferred.settle(outcome.map(f));
        });
        mapped
    }

    fn register(&self, observer: Observer<T>) {
        {
            let mut shared = self.lock();
            shared.observers.push_back(observer);
            if matches!(shared.slot, Slot::Pending) || shared.notifying {
                return;
            }
            shared.notifying = true;
        }
        self.drain_observers();
    }

    /// Settles the handle. Returns `false` (and does nothing) if it was
    /// already settled.
    fn settle(&self, outcome: Result<T, ErrorValue>) -> bool {
        let wakers = {
            let mut shared = self.lock();
            if !matches!(shared.slot, Slot::Pending) {
                return false;
            }
            shared.slot = match outcome {
                Ok(value) => Slot::Fulfilled(value),
                Err(error) => Slot::Rejected(error),
            };
            shared.notifying = true;
            mem::take(&mut shared.wakers)
        };

        for waker in wakers {
            waker.wake();
        }
        self.drain_observers();
        true
    }

    /// Runs queued observers one at a time, in queue order, with the lock
    /// released. Observers registered meanwhile (by an observer or by another
    /// thread) are appended and run by this loop.
    ///
    /// The caller must have set `notifying`.
    fn drain_observers(&self) {
        let mut guard = NotifyGuard { handle: Some(self) };
        loop {
            let (observer, outcome) = {
                let mut shared = self.lock();
                let next = match shared.observers.pop_front() {
                    Some(observer) => shared.slot.outcome().map(|outcome| (observer, outcome)),
                    None => None,
                };
                match next {
                    Some(next) => next,
                    None => {
                        shared.notifying = false;
                        guard.handle = None;
                        return;
                    }
                }
            };
            observer.notify(&outcome);
        }
    }
}

/// Clears `notifying` if an observer panics, so later registrations are not
/// queued forever.
struct NotifyGuard<'a, T> {
    handle: Option<&'a AsyncHandle<T>>,
}

impl<T> Drop for NotifyGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.lock().notifying = false;
        }
    }
}

impl<T: Clone + Send + 'static> Future for AsyncHandle<T> {
    type Output = Result<T, ErrorValue>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut guard = self.lock();
        let shared = &mut *guard;
        match &shared.slot {
            Slot::Fulfilled(value) => Poll::Ready(Ok(value.clone())),
            Slot::Rejected(error) => Poll::Ready(Err(error.clone())),
            Slot::Pending => {
                if !shared.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    shared.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl<T> fmt::Debug for AsyncHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncHandle")
            .field("state", &self.state())
            .finish()
    }
}

/// The write side of an [`AsyncHandle`].
pub struct Deferred<T> {
    handle: AsyncHandle<T>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Deferred<T> {
    pub fn new() -> Self {
        AsyncHandle::pending().0
    }

    /// Fulfills the handle. Returns `false` if it was already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.handle.settle(Ok(value))
    }

    /// Rejects the handle. Returns `false` if it was already settled.
    pub fn reject(&self, error: ErrorValue) -> bool {
        self.handle.settle(Err(error))
    }

    pub fn settle(&self, outcome: Result<T, ErrorValue>) -> bool {
        self.handle.settle(outcome)
    }

    /// Returns the read side.
    pub fn handle(&self) -> AsyncHandle<T> {
        self.handle.clone()
    }
}

impl<T: Clone + Send + 'static> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("state", &self.handle.state())
            .finish()
    }
}

/// The continuation protocol shared by every async handle implementation.
///
/// A value is a handle iff it implements this trait; foreign async
/// abstractions become interchangeable with [`AsyncHandle`] only by
/// implementing it explicitly.
pub trait Thenable<T>: Send {
    /// Registers one observer per outcome. Exactly one of them is invoked.
    fn subscribe(
        &self,
        on_fulfilled: Box<dyn FnOnce(T) + Send>,
        on_rejected: Box<dyn FnOnce(ErrorValue) + Send>,
    );
}

impl<T: Clone + Send + 'static> Thenable<T> for AsyncHandle<T> {
    fn subscribe(
        &self,
        on_fulfilled: Box<dyn FnOnce(T) + Send>,
        on_rejected: Box<dyn FnOnce(ErrorValue) + Send>,
    ) {
        self.register(Observer::Fulfilled(on_fulfilled));
        self.register(Observer::Rejected(on_rejected));
    }
}

/// Either a plain value or something implementing [`Thenable`].
pub enum MaybeHandle<T> {
    Value(T),
    Handle(Box<dyn Thenable<T>>),
}

impl<T> MaybeHandle<T> {
    /// Wraps any [`Thenable`] implementation.
    pub fn handle(thenable: impl Thenable<T> + 'static) -> Self {
        MaybeHandle::Handle(Box::new(thenable))
    }

    pub fn is_handle(&self) -> bool {
        matches!(self, MaybeHandle::Handle(_))
    }
}

impl<T: Clone + Send + 'static> From<AsyncHandle<T>> for MaybeHandle<T> {
    fn from(handle: AsyncHandle<T>) -> Self {
        MaybeHandle::Handle(Box::new(handle))
    }
}

impl<T: fmt::Debug> fmt::Debug for MaybeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaybeHandle::Value(value) => f.debug_tuple("Value").field(value).finish(),
            MaybeHandle::Handle(_) => f.write_str("Handle(..)"),
        }
    }
}

/// Returns true iff `value` satisfies the handle contract.
pub fn is_handle<T>(value: &MaybeHandle<T>) -> bool {
    value.is_handle()
}

/// Turns a value or handle into an [`AsyncHandle`] that never fails on its
/// own: plain values fulfill immediately, handles are mirrored.
pub fn wrap<T: Clone + Send + 'static>(value: MaybeHandle<T>) -> AsyncHandle<T> {
    match value {
        MaybeHandle::Value(value) => AsyncHandle::fulfilled(value),
        MaybeHandle::Handle(thenable) => {
            let (deferred, handle) = AsyncHandle::pending();
            let on_reject = deferred.clone();
            thenable.subscribe(
                Box::new(move |value| {
                    deferred.resolve(value);
                }),
                Box::new(move |error| {
                    on_reject.reject(error);
                }),
            );
            handle
        }
    }
}

/// Like [`wrap`], but fulfillment values for which `is_failure` returns true
/// reject the result instead.
///
/// Plain values settle synchronously. The predicate is only applied to
/// fulfillment values; rejections of a wrapped handle pass through unchanged.
pub fn wrap_with<T, F>(value: MaybeHandle<T>, is_failure: F) -> AsyncHandle<T>
where
    T: IntoFailure + Clone + Send + 'static,
    F: Fn(&T) -> bool + Send + 'static,
{
    match value {
        MaybeHandle::Value(value) => {
            if is_failure(&value) {
                AsyncHandle::rejected(value.into_failure())
            } else {
                AsyncHandle::fulfilled(value)
            }
        }
        MaybeHandle::Handle(thenable) => {
            let (deferred, handle) = AsyncHandle::pending();
            let on_reject = deferred.clone();
            thenable.subscribe(
                Box::new(move |value| {
                    if is_failure(&value) {
                        deferred.reject(value.into_failure());
                    } else {
                        deferred.resolve(value);
                    }
                }),
                Box::new(move |error| {
                    on_reject.reject(error);
                }),
            );
            handle
        }
    }
}
