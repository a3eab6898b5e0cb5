//! # Topic Requester Example
//!
//! Keyed request/response: resolvers register under a region key and the
//! caller asks for the first answer or for all of them.
//!
//! ## Run
//! ```bash
//! cargo run --example topic_requester
//! ```

use std::time::Duration;

use eventvisor::{EventFactory, PublishOptions, PublishStrategy, RequestHandler};

#[derive(Clone, Debug)]
struct Lookup {
    host: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let factory = EventFactory::default();
    let resolvers = factory.topic_requester::<&'static str, Lookup, String>();

    // Declines hosts it does not know.
    let _cache = resolvers.subscribe(
        "eu",
        RequestHandler::sync(|q: &Lookup| {
            Ok((q.host == "api").then(|| "10.0.0.1 (cache)".to_string()))
        }),
    )?;

    let _dns = resolvers.subscribe(
        "eu",
        RequestHandler::async_fn(|q: Lookup| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(Some(format!("10.0.9.{} (dns)", q.host.len())))
        }),
    )?;

    let _us = resolvers.subscribe_fn("us", |q: &Lookup| format!("172.16.0.1 for {}", q.host))?;

    let api = Lookup { host: "api".into() };
    let web = Lookup { host: "web".into() };

    println!("eu/api first: {:?}", resolvers.try_publish_async(&"eu", api.clone()).await?);
    println!("eu/web first: {:?}", resolvers.try_publish_async(&"eu", web.clone()).await?);

    let mut all = Vec::new();
    resolvers.try_publish_all_async(&"eu", api.clone(), &mut all).await?;
    println!("eu/api all:   {all:?}");

    let opts = PublishOptions::new().strategy(PublishStrategy::Sequential);
    let first = resolvers.try_publish_async_with(&"us", web, opts).await?;
    println!("us/web seq:   {first:?}");

    // Sync form: the dns resolver is still pending after one poll, so only the cache answers.
    resolvers.try_publish_all(&"eu", &api, &mut all)?;
    println!("eu/api sync:  {all:?}");

    println!("ap/api:       {:?}", resolvers.try_publish(&"ap", &api)?);
    println!("keys:         {:?}", resolvers.keys());
    Ok(())
}
