//! Task-local storage for the active [`RequestContext`]
//!
//! The carrier is keyed by the executing tokio task, so concurrent units of
//! work never observe each other's context. [`scope`] and [`sync_scope`]
//! install a context for exactly the lifetime of the wrapped future or
//! closure and remove it on every exit path, including panics and early
//! returns.

use std::cell::RefCell;
use std::future::Future;

use super::RequestContext;

tokio::task_local! {
    static CURRENT: RefCell<Option<RequestContext>>;
}

/// Run `fut` with `ctx` as the active context
pub async fn scope<F>(ctx: RequestContext, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT.scope(RefCell::new(Some(ctx)), fut).await
}

/// Synchronous counterpart of [`scope`]
pub fn sync_scope<R>(ctx: RequestContext, f: impl FnOnce() -> R) -> R {
    CURRENT.sync_scope(RefCell::new(Some(ctx)), f)
}

/// The active context, or `None` outside any unit of work
///
/// Never fails, whether or not a carrier scope was ever entered.
pub fn current() -> Option<RequestContext> {
    CURRENT
        .try_with(|cell| cell.borrow().clone())
        .ok()
        .flatten()
}

/// Replace the context of the enclosing scope
///
/// Only works inside [`scope`], [`sync_scope`] or one of the `run_*` entry
/// runners. Returns `false` (and stores nothing) when called outside a scope.
#[must_use = "set stores nothing outside a carrier scope"]
pub fn set(ctx: RequestContext) -> bool {
    CURRENT
        .try_with(|cell| {
            *cell.borrow_mut() = Some(ctx);
        })
        .is_ok()
}

/// Remove the context of the enclosing scope, if any
pub fn clear() {
    let _ = CURRENT.try_with(|cell| cell.borrow_mut().take());
}

/// Carry the caller's context onto a future that runs elsewhere
///
/// Use when handing work to `tokio::spawn` or another executor, which would
/// otherwise start with an empty carrier.
pub fn propagate<F>(fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let ctx = current();
    async move {
        match ctx {
            Some(ctx) => scope(ctx, fut).await,
            None => fut.await,
        }
    }
}
