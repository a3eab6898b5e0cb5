//! # Basic Event Example
//!
//! Shows the keyless event channel end to end:
//! - Sync and async subscribers on one channel
//! - Fire-and-forget `publish` vs awaited `publish_async`
//! - Replay of buffered messages to a late subscriber
//! - Waiting for the next matching message with `first_with`
//! - Reading a subscription as a stream
//!
//! ## Run
//! ```bash
//! cargo run --example basic_event
//! ```

use std::{
    sync::Arc,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use futures::StreamExt;

use eventvisor::{Dispose, EventFactory, Handler, PublishOptions, PublishStrategy};

#[derive(Clone, Debug)]
struct Tick {
    seq: u64,
    label: &'static str,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let factory = EventFactory::default();
    let ticks = factory.event::<Tick>();
    let total = Arc::new(AtomicU64::new(0));

    let t = Arc::clone(&total);
    let printer = ticks.subscribe_fn(move |tick| {
        t.fetch_add(tick.seq, Ordering::Relaxed);
        println!("[sync ] tick #{} ({})", tick.seq, tick.label);
        Ok(())
    })?;

    let slow = ticks.subscribe(Handler::async_fn(|tick: Tick| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        println!("[async] tick #{} done", tick.seq);
        Ok(())
    }))?;

    println!("publish (async subscriber keeps running in background)");
    ticks.publish(&Tick { seq: 1, label: "fire" })?;

    println!("publish_async (awaits both subscribers)");
    ticks.publish_async(Tick { seq: 2, label: "awaited" }).await?;

    let opts = PublishOptions::new().strategy(PublishStrategy::Sequential);
    ticks.publish_async_with(Tick { seq: 3, label: "sequential" }, opts).await?;

    printer.dispose();
    slow.dispose();
    println!("subscribers left: {}", ticks.handler_count());

    for seq in 10..13 {
        ticks.publish_buffered(&Tick { seq, label: "buffered" })?;
    }
    println!("buffered: {}", ticks.buffered_len());

    let late = ticks.subscribe_buffered(
        Handler::sync(|tick: &Tick| {
            println!("[late ] replayed #{}", tick.seq);
            Ok(())
        }),
        &[],
    )?;

    let next_even = ticks.first_with(|tick| tick.seq % 2 == 0, None)?;
    ticks.publish(&Tick { seq: 21, label: "odd" })?;
    ticks.publish(&Tick { seq: 22, label: "even" })?;
    let hit = next_even.await?;
    println!("first even tick: #{} ({})", hit.seq, hit.label);

    let mut feed = ticks.stream(&[])?;
    ticks.publish(&Tick { seq: 30, label: "streamed" })?;
    ticks.publish(&Tick { seq: 31, label: "streamed" })?;

    late.dispose();
    ticks.dispose();
    while let Some(tick) = feed.next().await {
        println!("[feed ] tick #{} ({})", tick.seq, tick.label);
    }

    println!();
    println!("Summary:");
    println!(" ├─► Sum of sync seqs: {}", total.load(Ordering::Relaxed));
    println!(" └─► Live subscriptions: {}", factory.diagnostics().subscription_count());
    Ok(())
}
