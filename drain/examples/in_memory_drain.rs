//! Drain an in-memory queue with a custom handler.
//!
//! Shows how to plug a [`MessageHandler`] into [`BatchWorker`] without a
//! hosted queue: JSON bodies are parsed, odd order numbers are rejected and
//! forwarded to an error queue.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use drain::cli::LogFormat;
use drain::logging::init_logging;
use drain::*;
use drain_testkit::ScriptedQueue;
use serde_json::Value;

struct OrderHandler;

#[async_trait]
impl MessageHandler for OrderHandler {
    async fn handle(&self, message: &ReservedMessage) -> HandlerOutcome {
        let order: Value = match serde_json::from_str(&message.body) {
            Ok(order) => order,
            Err(err) => return HandlerOutcome::failure(format!("not json: {err}")),
        };

        match order["number"].as_u64() {
            Some(number) if number % 2 == 0 => {
                println!("[HANDLER] shipped order {number}");
                tokio::time::sleep(Duration::from_millis(50)).await;
                HandlerOutcome::Success
            }
            Some(number) => HandlerOutcome::failure(format!("order {number} is on hold")),
            None => HandlerOutcome::failure("missing order number"),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_logging(LogFormat::Pretty)?;

    let queue = ScriptedQueue::named("orders");
    queue.enqueue((1..=7).map(|n| format!(r#"{{"number": {n}}}"#)));
    queue.enqueue(["garbage"]);
    let errors = ScriptedQueue::named("orders_errors");

    let config = WorkerConfig::new("orders", QueueSettings::new("demo", "demo-token"))
        .with_batch_size(3)
        .with_msg_duration(Duration::from_millis(50))
        .with_error_queue("orders_errors");

    let worker = BatchWorker::builder(config)
        .with_queue(Arc::new(queue.clone()))
        .with_error_queue(Arc::new(errors.clone()))
        .with_handler(Arc::new(OrderHandler))
        .build()?;
    let summary = worker.run().await?;

    println!("stop reason:   {}", summary.stop_reason);
    println!("processed:     {}", summary.processed);
    println!("dead-lettered: {}", summary.dead_lettered);
    println!("error queue:   {:?}", errors.pushed_bodies());

    Ok(())
}
