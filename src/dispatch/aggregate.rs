//! # Parallel completion aggregator.
//!
//! [`WhenAll`] starts N handler calls and completes when all of them succeed,
//! or as soon as one fails.
//!
//! ## Architecture
//! ```text
//! WhenAll::start(n, invoke)
//!   for i in 0..n (registration order):
//!     invoke(i) ──► Done(out)          ──► fold(i, out)
//!              └─► Started(fut) ──► poll once with pooled node waker
//!                                    ├─ Ready(out) ──► fold(i, out), node back to pool
//!                                    └─ Pending    ──► park (slot, fut, node)
//!
//! node.wake() ──► shared.ready.push(slot) ──► shared.waker.wake()
//! WhenAll::poll ──► drain ready slots ──► re-poll those futures only
//! ```
//!
//! ## Rules
//! - Calls that complete without suspending fold in place: no shared state,
//!   no node, no allocation beyond the results vector (only when gathering).
//! - **Fail fast**: the first error completes the aggregator; later handlers
//!   are not started, still-pending ones are detached (not cancelled).
//! - Gathered values sit at their handler's index regardless of completion order.
//! - Dropping `WhenAll` before completion drops its parked futures.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::task::{waker_ref, ArcWake, AtomicWaker};
use parking_lot::{const_mutex, Mutex};

use crate::dispatch::invocation::{detach, Invocation, Outcome};
use crate::error::HandlerError;

/// Upper bound on idle nodes kept for reuse.
const POOL_LIMIT: usize = 256;

static POOL: Mutex<Vec<Arc<AwaiterNode>>> = const_mutex(Vec::new());

/// State shared between one aggregator and the nodes it leased.
struct Shared {
    ready: Mutex<Vec<usize>>,
    waker: AtomicWaker,
}

/// Reusable waker target for one parked future.
///
/// Nodes carry no type information, so one pool serves every message type.
pub(crate) struct AwaiterNode {
    lease: Mutex<Option<(Arc<Shared>, usize)>>,
}

impl AwaiterNode {
    fn acquire(shared: &Arc<Shared>, slot: usize) -> Arc<Self> {
        let node = POOL.lock().pop().unwrap_or_else(|| {
            Arc::new(AwaiterNode {
                lease: Mutex::new(None),
            })
        });
        *node.lease.lock() = Some((Arc::clone(shared), slot));
        node
    }

    /// Ends the lease; the node is pooled only if no waker clone survives.
    fn release(node: Arc<Self>) {
        node.lease.lock().take();
        if Arc::strong_count(&node) == 1 {
            let mut pool = POOL.lock();
            if pool.len() < POOL_LIMIT {
                pool.push(node);
            }
        }
    }
}

impl ArcWake for AwaiterNode {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        let lease = arc_self.lease.lock();
        if let Some((shared, slot)) = lease.as_ref() {
            shared.ready.lock().push(*slot);
            shared.waker.wake();
        }
    }
}

struct Parked<O> {
    index: usize,
    fut: BoxFuture<'static, O>,
    node: Arc<AwaiterNode>,
}

/// What the aggregator keeps from successful outcomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Gather {
    /// Only success or failure matters.
    Nothing,
    /// Only the lowest-index value matters. Sequential runs stop at it;
    /// the aggregator still gathers by index.
    First,
    /// Keep every value at its handler's index.
    Indexed,
}

/// Future awaiting a batch of handler calls.
pub(crate) struct WhenAll<O: Outcome> {
    shared: Option<Arc<Shared>>,
    parked: Vec<Option<Parked<O>>>,
    outstanding: usize,
    results: Vec<Option<O::Value>>,
    gather: Gather,
    error: Option<HandlerError>,
    channel: &'static str,
}

impl<O: Outcome> WhenAll<O> {
    /// Starts `count` calls in index order.
    ///
    /// `invoke(i)` is called at most once per index and never after a
    /// synchronous failure.
    pub(crate) fn start<F>(
        count: usize,
        gather: Gather,
        channel: &'static str,
        mut invoke: F,
    ) -> Self
    where
        F: FnMut(usize) -> Invocation<O>,
    {
        let results = match gather {
            Gather::Nothing => Vec::new(),
            Gather::First | Gather::Indexed => (0..count).map(|_| None).collect(),
        };
        let mut this = Self {
            shared: None,
            parked: Vec::new(),
            outstanding: 0,
            results,
            gather,
            error: None,
            channel,
        };

        for index in 0..count {
            let folded = match invoke(index) {
                Invocation::Done(out) => this.fold(index, out),
                Invocation::Started(fut) => this.first_poll(index, fut),
            };
            if let Err(err) = folded {
                this.fail(err);
                break;
            }
        }
        this
    }

    fn first_poll(
        &mut self,
        index: usize,
        mut fut: BoxFuture<'static, O>,
    ) -> Result<(), HandlerError> {
        let shared = Arc::clone(self.shared.get_or_insert_with(|| {
            Arc::new(Shared {
                ready: Mutex::new(Vec::new()),
                waker: AtomicWaker::new(),
            })
        }));
        let slot = self.parked.len();
        let node = AwaiterNode::acquire(&shared, slot);

        let polled = {
            let waker = waker_ref(&node);
            let mut cx = Context::from_waker(&waker);
            fut.as_mut().poll(&mut cx)
        };
        match polled {
            Poll::Ready(out) => {
                drop(fut);
                AwaiterNode::release(node);
                self.fold(index, out)
            }
            Poll::Pending => {
                self.parked.push(Some(Parked { index, fut, node }));
                self.outstanding += 1;
                Ok(())
            }
        }
    }

    fn fold(&mut self, index: usize, out: O) -> Result<(), HandlerError> {
        let value = out.into_parts()?;
        if self.gather != Gather::Nothing {
            self.results[index] = value;
        }
        Ok(())
    }

    /// Records the first error and detaches everything still pending.
    fn fail(&mut self, err: HandlerError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
        for parked in self.parked.iter_mut().filter_map(Option::take) {
            parked.node.lease.lock().take();
            detach(parked.fut, self.channel);
        }
        self.outstanding = 0;
    }

    fn finish(&mut self) -> Poll<Result<Vec<Option<O::Value>>, HandlerError>> {
        match self.error.take() {
            Some(err) => Poll::Ready(Err(err)),
            None => Poll::Ready(Ok(std::mem::take(&mut self.results))),
        }
    }
}

// Parked futures are boxed and results are never pinned.
impl<O: Outcome> Unpin for WhenAll<O> {}

impl<O: Outcome> Future for WhenAll<O> {
    type Output = Result<Vec<Option<O::Value>>, HandlerError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.error.is_some() || this.outstanding == 0 {
            return this.finish();
        }
        let Some(shared) = this.shared.clone() else {
            return this.finish();
        };
        shared.waker.register(cx.waker());

        loop {
            let ready = std::mem::take(&mut *shared.ready.lock());
            if ready.is_empty() {
                break;
            }
            for slot in ready {
                let Some(parked) = this.parked.get_mut(slot).and_then(Option::as_mut) else {
                    continue;
                };
                let polled = {
                    let waker = waker_ref(&parked.node);
                    let mut node_cx = Context::from_waker(&waker);
                    parked.fut.as_mut().poll(&mut node_cx)
                };
                let Poll::Ready(out) = polled else {
                    continue;
                };
                let Some(Parked { index, fut, node }) = this.parked[slot].take() else {
                    continue;
                };
                drop(fut);
                AwaiterNode::release(node);
                this.outstanding -= 1;

                if let Err(err) = this.fold(index, out) {
                    this.fail(err);
                    return this.finish();
                }
            }
        }

        if this.outstanding == 0 {
            this.finish()
        } else {
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HandlerResult, RequestResult};
    use futures::FutureExt;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn later<R: Send + 'static>(ms: u64, value: RequestResult<R>) -> Invocation<RequestResult<R>> {
        Invocation::Started(
            async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                value
            }
            .boxed(),
        )
    }

    #[tokio::test]
    async fn test_all_synchronous() {
        let all = WhenAll::<RequestResult<u32>>::start(3, Gather::Indexed, "Test", |i| {
            Invocation::Done(Ok(Some(i as u32 * 10)))
        });
        assert!(all.shared.is_none());
        assert_eq!(all.await, Ok(vec![Some(0), Some(10), Some(20)]));
    }

    #[tokio::test]
    async fn test_results_indexed_by_registration_order() {
        let started = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&started);
        let all = WhenAll::start(4, Gather::Indexed, "Test", move |i| {
            s.lock().push(i);
            match i {
                0 => later(30, Ok(Some("slow"))),
                1 => Invocation::Done(Ok(None)),
                2 => later(5, Ok(Some("fast"))),
                _ => Invocation::Started(async { Ok(Some("ready")) }.boxed()),
            }
        });
        assert_eq!(*started.lock(), vec![0, 1, 2, 3]);
        assert_eq!(
            all.await,
            Ok(vec![Some("slow"), None, Some("fast"), Some("ready")])
        );
    }

    #[tokio::test]
    async fn test_sync_failure_stops_starting() {
        let calls = AtomicUsize::new(0);
        let all = WhenAll::<HandlerResult>::start(5, Gather::Nothing, "Test", |i| {
            calls.fetch_add(1, Ordering::SeqCst);
            if i == 1 {
                Invocation::Done(Err(HandlerError::fail("second")))
            } else {
                Invocation::Done(Ok(()))
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(all.await, Err(HandlerError::fail("second")));
    }

    #[tokio::test]
    async fn test_async_failure_completes_without_waiting_for_others() {
        let (tx, rx) = oneshot::channel::<()>();
        let finished = Arc::new(AtomicBool::new(false));
        let f = Arc::clone(&finished);
        let mut rx = Some(rx);

        let all = WhenAll::<HandlerResult>::start(2, Gather::Nothing, "Test", |i| {
            if i == 0 {
                let rx = rx.take();
                let f = Arc::clone(&f);
                Invocation::Started(
                    async move {
                        if let Some(rx) = rx {
                            let _ = rx.await;
                        }
                        f.store(true, Ordering::SeqCst);
                        Ok(())
                    }
                    .boxed(),
                )
            } else {
                Invocation::Started(
                    async {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        Err(HandlerError::fail("late failure"))
                    }
                    .boxed(),
                )
            }
        });

        assert_eq!(all.await, Err(HandlerError::fail("late failure")));
        assert!(!finished.load(Ordering::SeqCst));

        // the first handler was detached, not cancelled
        tx.send(()).unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_gathers_values_that_are_not_unpin() {
        use std::marker::PhantomPinned;

        let all = WhenAll::<RequestResult<PhantomPinned>>::start(2, Gather::Indexed, "Test", |i| {
            if i == 0 {
                later(5, Ok(Some(PhantomPinned)))
            } else {
                Invocation::Done(Ok(None))
            }
        });
        let slots = all.await.unwrap();
        assert_eq!(slots.len(), 2);
        assert!(slots[0].is_some());
        assert!(slots[1].is_none());
    }

    #[tokio::test]
    async fn test_zero_handlers() {
        let all = WhenAll::<HandlerResult>::start(0, Gather::Indexed, "Test", |_| {
            unreachable!("no handler to start")
        });
        assert_eq!(all.await, Ok(vec![]));
    }

    #[test]
    fn test_released_node_is_unleased() {
        let shared = Arc::new(Shared {
            ready: Mutex::new(Vec::new()),
            waker: AtomicWaker::new(),
        });
        let node = AwaiterNode::acquire(&shared, 3);
        let waker = futures::task::waker(Arc::clone(&node));

        waker.wake_by_ref();
        assert_eq!(*shared.ready.lock(), vec![3]);

        AwaiterNode::release(node);
        waker.wake();
        assert_eq!(*shared.ready.lock(), vec![3]);
    }
}
