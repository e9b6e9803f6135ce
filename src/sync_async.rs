//! Bridge between blocking and suspendable execution.
//!
//! Every capability of a parameter or function can be defined as a plain
//! blocking closure, as a closure returning a boxed future, or both. The
//! bridge runs either form to completion from either kind of call site:
//!
//! - a blocking caller with no runtime gets a current-thread tokio runtime
//!   for the duration of the call
//! - a blocking caller on a multi-thread runtime worker uses
//!   [`tokio::task::block_in_place`] so the worker is handed off while the
//!   future is driven
//! - a blocking caller on a current-thread runtime drives the future on a
//!   scoped helper thread with its own scheduler, leaving the caller's
//!   scheduler untouched
//! - a suspended caller awaits futures directly and pushes blocking closures
//!   onto the blocking pool with [`tokio::task::spawn_blocking`]
//!
//! Requesting a form that was never provided fails with
//! [`DaqError::CapabilityAbsent`], distinct from a plain "not implemented".

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::error::{DaqError, DaqResult};

/// Blocking form of an operation taking `A` and producing `R`.
pub type SyncFn<A, R> = Arc<dyn Fn(A) -> DaqResult<R> + Send + Sync>;

/// Suspendable form of an operation taking `A` and producing `R`.
pub type AsyncFn<A, R> = Arc<dyn Fn(A) -> BoxFuture<'static, DaqResult<R>> + Send + Sync>;

/// A single unit of work in one of the two execution modes.
pub enum Operation<T> {
    /// Runs on the calling thread.
    Blocking(Box<dyn FnOnce() -> T + Send>),
    /// Runs on a cooperative scheduler.
    Suspendable(BoxFuture<'static, T>),
}

impl<T: Send + 'static> Operation<T> {
    /// Wrap a blocking closure.
    pub fn blocking(f: impl FnOnce() -> T + Send + 'static) -> Self {
        Operation::Blocking(Box::new(f))
    }

    /// Wrap a future.
    pub fn suspendable(fut: impl Future<Output = T> + Send + 'static) -> Self {
        Operation::Suspendable(Box::pin(fut))
    }

    /// Run to completion from a blocking call site.
    pub fn run(self) -> DaqResult<T> {
        match self {
            Operation::Blocking(f) => Ok(f()),
            Operation::Suspendable(fut) => wait_for_async(fut),
        }
    }

    /// Run to completion from a suspended call site.
    pub async fn run_async(self) -> DaqResult<T> {
        match self {
            Operation::Blocking(f) => tokio::task::spawn_blocking(f)
                .await
                .map_err(|e| DaqError::Runtime(format!("blocking task failed: {}", e))),
            Operation::Suspendable(fut) => Ok(fut.await),
        }
    }
}

impl<T> std::fmt::Debug for Operation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Blocking(_) => write!(f, "Operation::Blocking"),
            Operation::Suspendable(_) => write!(f, "Operation::Suspendable"),
        }
    }
}

/// Drive `fut` to completion from a blocking context.
///
/// Must not be called from inside an `async` block on a multi-thread runtime
/// that forbids `block_in_place` (e.g. inside `LocalSet`).
pub fn wait_for_async<F>(fut: F) -> DaqResult<F::Output>
where
    F: Future + Send,
    F::Output: Send,
{
    match Handle::try_current() {
        Ok(handle) => match handle.runtime_flavor() {
            RuntimeFlavor::MultiThread => {
                Ok(tokio::task::block_in_place(move || handle.block_on(fut)))
            }
            _ => std::thread::scope(|scope| {
                scope
                    .spawn(move || block_on_fresh(fut))
                    .join()
                    .map_err(|_| DaqError::Runtime("bridge thread panicked".to_string()))?
            }),
        },
        Err(_) => block_on_fresh(fut),
    }
}

fn block_on_fresh<F: Future>(fut: F) -> DaqResult<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(fut))
}

/// Optional blocking and suspendable forms of the same operation.
pub struct Syncable<A, R> {
    sync: Option<SyncFn<A, R>>,
    asynchronous: Option<AsyncFn<A, R>>,
}

impl<A, R> Clone for Syncable<A, R> {
    fn clone(&self) -> Self {
        Self {
            sync: self.sync.clone(),
            asynchronous: self.asynchronous.clone(),
        }
    }
}

impl<A, R> Default for Syncable<A, R> {
    fn default() -> Self {
        Self {
            sync: None,
            asynchronous: None,
        }
    }
}

impl<A, R> std::fmt::Debug for Syncable<A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Syncable")
            .field("sync", &self.sync.is_some())
            .field("async", &self.asynchronous.is_some())
            .finish()
    }
}

impl<A, R> Syncable<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    /// Neither form defined.
    pub fn none() -> Self {
        Self::default()
    }

    /// Blocking form only.
    pub fn from_sync(f: impl Fn(A) -> DaqResult<R> + Send + Sync + 'static) -> Self {
        Self {
            sync: Some(Arc::new(f)),
            asynchronous: None,
        }
    }

    /// Suspendable form only; the blocking form is bridged.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DaqResult<R>> + Send + 'static,
    {
        Self {
            sync: None,
            asynchronous: Some(Arc::new(
                move |a: A| -> BoxFuture<'static, DaqResult<R>> { Box::pin(f(a)) },
            )),
        }
    }

    /// Both forms, supplied independently.
    pub fn from_parts(sync: Option<SyncFn<A, R>>, asynchronous: Option<AsyncFn<A, R>>) -> Self {
        Self { sync, asynchronous }
    }

    /// True if either form exists.
    pub fn is_defined(&self) -> bool {
        self.sync.is_some() || self.asynchronous.is_some()
    }

    /// A blocking call is possible (natively or bridged).
    pub fn has_sync(&self) -> bool {
        self.is_defined()
    }

    /// A suspendable form was defined.
    pub fn has_async(&self) -> bool {
        self.asynchronous.is_some()
    }

    /// Blocking handle: the native one, else the suspendable form driven by
    /// [`wait_for_async`].
    pub fn sync_fn(&self) -> Option<SyncFn<A, R>> {
        if let Some(f) = &self.sync {
            return Some(Arc::clone(f));
        }
        let af = Arc::clone(self.asynchronous.as_ref()?);
        Some(Arc::new(move |a: A| -> DaqResult<R> {
            wait_for_async(af(a))?
        }))
    }

    /// Suspendable handle, if one was defined.
    pub fn async_fn(&self) -> Option<AsyncFn<A, R>> {
        self.asynchronous.clone()
    }

    /// Run from a blocking call site.
    pub fn call(&self, owner: &str, arg: A) -> DaqResult<R> {
        match self.sync_fn() {
            Some(f) => f(arg),
            None => Err(DaqError::capability_absent(owner, "blocking form")),
        }
    }

    /// Run from a suspended call site. Falls back to the blocking form on the
    /// blocking pool when no suspendable form exists.
    pub async fn call_async(&self, owner: &str, arg: A) -> DaqResult<R> {
        if let Some(af) = &self.asynchronous {
            return af(arg).await;
        }
        match &self.sync {
            Some(f) => {
                let f = Arc::clone(f);
                Operation::blocking(move || f(arg)).run_async().await?
            }
            None => Err(DaqError::capability_absent(owner, "suspendable form")),
        }
    }
}
