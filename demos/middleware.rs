//! # Middleware Example
//!
//! Decorators wrap every handler invocation. This example registers:
//! - a global timing decorator for all `Order` subscriptions
//! - a call-site `Filter` that drops small orders
//! - a request decorator that vetoes answers for blocked customers
//!
//! It also captures subscribe call sites and prints them grouped by caller.
//!
//! ## Run
//! ```bash
//! cargo run --example middleware
//! ```

use std::{sync::Arc, time::Instant};

use eventvisor::{
    AsyncFn, Decorator, EventFactory, Filter, Handler, HandlerResult, Options, RequestDecorator,
    RequestHandler, RequestResult, SyncFn, SyncRequestFn,
};

#[derive(Clone, Debug)]
struct Order {
    customer: &'static str,
    amount: u32,
}

/// Prints how long each invocation took.
struct Timing;

#[async_trait::async_trait]
impl Decorator<Order> for Timing {
    fn order(&self) -> i32 {
        -10
    }

    fn handle(&self, msg: &Order, next: &SyncFn<Order>) -> HandlerResult {
        let started = Instant::now();
        let res = next(msg);
        println!("  timing: sync handler took {:?}", started.elapsed());
        res
    }

    async fn handle_async(&self, msg: Order, next: AsyncFn<Order>) -> HandlerResult {
        let started = Instant::now();
        let res = next(msg).await;
        println!("  timing: async handler took {:?}", started.elapsed());
        res
    }
}

/// Declines quotes for blocked customers without calling the responder.
struct Blocklist(&'static [&'static str]);

impl RequestDecorator<Order, u32> for Blocklist {
    fn try_handle(&self, msg: &Order, next: &SyncRequestFn<Order, u32>) -> RequestResult<u32> {
        if self.0.contains(&msg.customer) {
            return Ok(None);
        }
        next(msg)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut options = Options::default();
    options.capture_stack_traces = true;
    let factory = EventFactory::with_options(options);
    factory.options().register_decorator::<Order>(Arc::new(Timing));

    let orders = factory.event::<Order>();
    let _big = orders.subscribe_with(
        Handler::sync(|o: &Order| {
            println!("big order from {}: {}", o.customer, o.amount);
            Ok(())
        }),
        &[Filter::arc(|o: &Order| o.amount >= 100)],
    )?;
    let _audit = orders.subscribe(Handler::async_fn(|o: Order| async move {
        tokio::task::yield_now().await;
        println!("audit: {} x{}", o.customer, o.amount);
        Ok(())
    }))?;

    for (customer, amount) in [("ada", 20), ("bob", 250)] {
        println!("publish {customer}/{amount}");
        orders.publish_async(Order { customer, amount }).await?;
    }

    let quotes = factory.event_requester::<Order, u32>();
    let _discount = quotes.subscribe_with(
        RequestHandler::from_fn(|o: &Order| o.amount * 9 / 10),
        &[Arc::new(Blocklist(&["mallory"]))],
    )?;
    for customer in ["ada", "mallory"] {
        let quote = quotes.try_publish(&Order { customer, amount: 100 })?;
        println!("quote for {customer}: {quote:?}");
    }

    println!();
    println!("Subscriptions by call site:");
    for (site, infos) in factory.diagnostics().grouped_by_caller(true) {
        println!(" ├─► {site}: {}", infos.len());
    }
    println!(" └─► total: {}", factory.diagnostics().subscription_count());
    Ok(())
}
