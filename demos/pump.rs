//! # Example: In-memory pump with the built-in logger
//!
//! Pushes a few orders into a [`MemoryTransport`], handles them with at most two
//! running at once, fails one on purpose, then shuts down.
//!
//! ```text
//! cargo run --example pump --features logging
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use msgpump::{
    HandlerError, HandlerFn, HandlerRef, LogWriter, MemoryTransport, ReceiverBuilder,
    ReceiverConfig,
};

#[derive(Debug)]
struct Order {
    id: u32,
    qty: u32,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let orders = MemoryTransport::with_kind("orders");
    orders.extend((1..=6).map(|id| Order { id, qty: id % 4 }));

    let cfg = ReceiverConfig {
        max_concurrent: 2,
        name: Some("orders-demo".into()),
        ..ReceiverConfig::default()
    };
    let receiver = ReceiverBuilder::new(orders.clone(), cfg)
        .with_subscriber(Arc::new(LogWriter::new()))
        .build();

    let done = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&done);
    let handler: HandlerRef<Order> = HandlerFn::arc(move |order: Order| {
        let counter = Arc::clone(&counter);
        async move {
            let res = if order.qty == 0 {
                let reason = format!("order {} has no items", order.id);
                Err(HandlerError::fail(reason))
            } else {
                println!("[handler] order {} x{}", order.id, order.qty);
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(())
            };
            counter.fetch_add(1, Ordering::SeqCst);
            res
        }
    });

    receiver.start(handler).await?;

    while done.load(Ordering::SeqCst) < 6 {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    orders.push(Order { id: 99, qty: 1 });
    tokio::time::sleep(Duration::from_millis(50)).await;

    receiver.dispose().await;
    println!("[demo] left in queue: {}", orders.len());
    Ok(())
}
