//! Delivery of one message to a handler snapshot.
//!
//! Shared by keyless and keyed channels; the snapshot is taken by the caller
//! and the lock is already released when these run.

use tokio_util::sync::CancellationToken;

use crate::channels::registry::Entry;
use crate::dispatch::{self, fire_and_forget, Gather, Invocation};
use crate::error::{HandlerError, HandlerResult, RequestResult};
use crate::handlers::{Handler, RequestHandler};
use crate::options::PublishStrategy;

/// Sync handlers run inline (first error stops delivery); async handlers
/// are started and left running.
pub(crate) fn broadcast<T>(handlers: &[Entry<Handler<T>>], msg: &T, channel: &'static str) -> HandlerResult
where
    T: Clone + Send + Sync + 'static,
{
    for entry in handlers {
        match entry.handler.invoke(msg, None) {
            Invocation::Done(res) => res?,
            Invocation::Started(fut) => fire_and_forget(fut, channel),
        }
    }
    Ok(())
}

/// Awaits every handler with `strategy`.
pub(crate) async fn broadcast_async<T>(
    handlers: &[Entry<Handler<T>>],
    msg: &T,
    strategy: PublishStrategy,
    token: Option<&CancellationToken>,
    channel: &'static str,
) -> HandlerResult
where
    T: Clone + Send + Sync + 'static,
{
    dispatch::run::<HandlerResult, _>(handlers.len(), strategy, Gather::Nothing, channel, |i| {
        handlers[i].handler.invoke(msg, token)
    })
    .await
    .map(|_| ())
}

/// Collects responses without awaiting; stops at the first one unless `all`.
///
/// An async handler that does not finish on its first poll is detached and
/// counts as not handled.
pub(crate) fn request<T, R>(
    handlers: &[Entry<RequestHandler<T, R>>],
    msg: &T,
    all: bool,
    channel: &'static str,
) -> Result<Vec<R>, HandlerError>
where
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    let mut out = Vec::new();
    for entry in handlers {
        let Some(res) = entry.handler.invoke(msg, None).now_or_detach(channel) else {
            continue;
        };
        if let Some(value) = res? {
            out.push(value);
            if !all {
                break;
            }
        }
    }
    Ok(out)
}

/// Awaits request handlers with `strategy`; values come back in
/// registration order (at most one unless `all`).
pub(crate) async fn request_async<T, R>(
    handlers: &[Entry<RequestHandler<T, R>>],
    msg: &T,
    all: bool,
    strategy: PublishStrategy,
    token: Option<&CancellationToken>,
    channel: &'static str,
) -> Result<Vec<R>, HandlerError>
where
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    let gather = if all { Gather::Indexed } else { Gather::First };
    let slots = dispatch::run::<RequestResult<R>, _>(handlers.len(), strategy, gather, channel, |i| {
        handlers[i].handler.invoke(msg, token)
    })
    .await?;

    let mut values = slots.into_iter().flatten();
    Ok(if all {
        values.collect()
    } else {
        values.next().into_iter().collect()
    })
}
