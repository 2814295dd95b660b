//! End-to-end throughput benchmark for courier.
//!
//! Drives a live broker with concurrent producers and draining subscribers
//! and reports routed and delivered message rates. Ctrl-C stops early.

use anyhow::Result;
use courier_bench::{init_tracing, start_metrics_server, BenchConfig, WorkloadConfig};
use courier_core::{Broker, Message, ShutdownSignal};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Barrier;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = BenchConfig::load()?;
    if config.metrics.enabled {
        if let Err(e) = start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {:#}", e);
        }
    }

    let cancel = ShutdownSignal::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, shutting down");
                cancel.trigger();
            }
        });
    }

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║         Courier End-to-End Throughput Benchmark              ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    run_benchmark(config, cancel).await;
    Ok(())
}

async fn run_benchmark(config: BenchConfig, cancel: ShutdownSignal) {
    let workload = config.workload.clone();
    let subscribers = workload.subscribers.max(1);

    println!(
        "📊 {} producers × {} messages, {} subscribers",
        workload.producers, workload.messages_per_producer, subscribers
    );
    println!();

    let broker = Arc::new(Broker::with_config(config.broker, cancel));
    let router = {
        let broker = Arc::clone(&broker);
        tokio::spawn(async move { broker.run().await })
    };

    // Subscribers drain their own inboxes
    let received = Arc::new(AtomicU64::new(0));
    let mut consumers = Vec::with_capacity(subscribers);
    for i in 0..subscribers {
        let (endpoint, mut inbox) = broker.endpoint();
        broker.register_user(subscriber_id(i), endpoint);

        let received = Arc::clone(&received);
        consumers.push(tokio::spawn(async move {
            while inbox.recv().await.is_some() {
                received.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }

    let barrier = Arc::new(Barrier::new(workload.producers + 1));
    let mut producers = Vec::with_capacity(workload.producers);
    for p in 0..workload.producers {
        let broker = Arc::clone(&broker);
        let barrier = Arc::clone(&barrier);
        let workload = workload.clone();
        producers.push(tokio::spawn(async move {
            barrier.wait().await;
            produce(p, &broker, &workload, subscribers).await
        }));
    }

    barrier.wait().await;
    let start = Instant::now();

    let mut sent = 0u64;
    for producer in producers {
        sent += producer.await.unwrap_or_default();
    }

    // Let the routing loop catch up with everything accepted
    while !broker.is_shutting_down() && broker.stats().routed < broker.stats().accepted {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let elapsed = start.elapsed();

    broker.shutdown();
    if let Err(e) = router.await {
        error!("Routing loop panicked: {}", e);
    }

    // Dropping the endpoints ends the consumer tasks
    for i in 0..subscribers {
        broker.unregister_user(&subscriber_id(i));
    }
    for consumer in consumers {
        let _ = consumer.await;
    }

    let stats = broker.stats();
    let secs = elapsed.as_secs_f64().max(f64::EPSILON);

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                         RESULTS                              ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Duration:             {:>10.2}s                          ║", secs);
    println!("║  Sent:                 {:>10}                           ║", sent);
    println!("║  Routed:               {:>10}                           ║", stats.routed);
    println!("║  Delivered:            {:>10}                           ║", stats.delivered);
    println!("║  Received:             {:>10}                           ║", received.load(Ordering::Relaxed));
    println!("║  Dropped (full):       {:>10}                           ║", stats.dropped);
    println!("║  Rejected (closed):    {:>10}                           ║", stats.rejected);
    println!(
        "║  Routing rate:         {:>10.0} msg/s                    ║",
        stats.routed as f64 / secs
    );
    println!(
        "║  Delivery rate:        {:>10.0} msg/s                    ║",
        stats.delivered as f64 / secs
    );
    println!("╚══════════════════════════════════════════════════════════════╝");
}

/// Send this producer's share of the workload. Returns how many were accepted.
async fn produce(
    producer: usize,
    broker: &Broker,
    workload: &WorkloadConfig,
    subscribers: usize,
) -> u64 {
    let sender = format!("producer-{producer}");
    let mut accepted = 0;

    for i in 0..workload.messages_per_producer {
        let content = format!("{sender}:{i}");
        let message = if workload.broadcast_every > 0 && i % workload.broadcast_every == 0 {
            Message::broadcast(sender.as_str(), content)
        } else {
            let recipient = subscriber_id((producer + i) % subscribers);
            Message::direct(sender.as_str(), recipient, content)
        };

        if broker.send_message(message).await.is_err() {
            break;
        }
        accepted += 1;
    }

    accepted
}

fn subscriber_id(index: usize) -> String {
    format!("user-{index}")
}
