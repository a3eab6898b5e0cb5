//! Strategy selection for awaited publishes.

use crate::dispatch::aggregate::{Gather, WhenAll};
use crate::dispatch::invocation::{Invocation, Outcome};
use crate::error::HandlerError;
use crate::options::PublishStrategy;

/// Runs `count` handler calls with the given strategy.
///
/// - `count <= 1` or [`PublishStrategy::Sequential`]: each call is awaited
///   before the next one starts. With [`Gather::First`] the run stops at
///   the first value.
/// - [`PublishStrategy::Parallel`]: everything goes through [`WhenAll`].
///
/// The returned vector is empty for [`Gather::Nothing`]. Otherwise it holds
/// one slot per started call, in index order.
pub(crate) async fn run<O, F>(
    count: usize,
    strategy: PublishStrategy,
    gather: Gather,
    channel: &'static str,
    mut invoke: F,
) -> Result<Vec<Option<O::Value>>, HandlerError>
where
    O: Outcome,
    F: FnMut(usize) -> Invocation<O>,
{
    if count > 1 && strategy == PublishStrategy::Parallel {
        return WhenAll::start(count, gather, channel, invoke).await;
    }

    let mut results = match gather {
        Gather::Nothing => Vec::new(),
        Gather::First | Gather::Indexed => Vec::with_capacity(count),
    };
    for index in 0..count {
        let value = invoke(index).resolve().await.into_parts()?;
        match gather {
            Gather::Nothing => {}
            Gather::First => {
                let found = value.is_some();
                results.push(value);
                if found {
                    break;
                }
            }
            Gather::Indexed => results.push(value),
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HandlerResult, RequestResult};
    use futures::FutureExt;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sequential_completes_each_before_next() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let res = run::<HandlerResult, _>(3, PublishStrategy::Sequential, Gather::Nothing, "Test", |i| {
            let log = Arc::clone(&log);
            Invocation::Started(
                async move {
                    log.lock().push(format!("start {i}"));
                    tokio::time::sleep(Duration::from_millis(3 - i as u64)).await;
                    log.lock().push(format!("end {i}"));
                    Ok(())
                }
                .boxed(),
            )
        })
        .await;

        assert_eq!(res, Ok(vec![]));
        assert_eq!(
            *log.lock(),
            vec!["start 0", "end 0", "start 1", "end 1", "start 2", "end 2"]
        );
    }

    #[tokio::test]
    async fn test_sequential_first_stops_at_first_value() {
        let calls = Arc::new(Mutex::new(0));
        let res = run::<RequestResult<i32>, _>(4, PublishStrategy::Sequential, Gather::First, "Test", |i| {
            *calls.lock() += 1;
            Invocation::Done(Ok(if i >= 1 { Some(i as i32) } else { None }))
        })
        .await;

        assert_eq!(res, Ok(vec![None, Some(1)]));
        assert_eq!(*calls.lock(), 2);
    }

    #[tokio::test]
    async fn test_single_handler_runs_inline_even_when_parallel() {
        let res = run::<RequestResult<i32>, _>(1, PublishStrategy::Parallel, Gather::Indexed, "Test", |_| {
            Invocation::Done(Ok(Some(9)))
        })
        .await;
        assert_eq!(res, Ok(vec![Some(9)]));
    }

    #[tokio::test]
    async fn test_sequential_error_stops_run() {
        let calls = Arc::new(Mutex::new(0));
        let res = run::<HandlerResult, _>(3, PublishStrategy::Sequential, Gather::Nothing, "Test", |i| {
            *calls.lock() += 1;
            if i == 0 {
                Invocation::Done(Err(HandlerError::fail("first")))
            } else {
                Invocation::Done(Ok(()))
            }
        })
        .await;
        assert_eq!(res, Err(HandlerError::fail("first")));
        assert_eq!(*calls.lock(), 1);
    }
}
