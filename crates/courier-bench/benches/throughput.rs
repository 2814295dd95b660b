//! Throughput benchmarks for courier.
//!
//! These benchmarks measure registry fan-out and broker routing throughput.

use courier_core::{endpoint, Broker, BrokerConfig, Message, Registry, ShutdownSignal, Target};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::time::Instant;

/// Benchmark registry mutations.
fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");

    group.bench_function("register", |b| {
        let registry = Registry::new();
        let (tx, _rx) = endpoint(1);
        // Fixed key set so the map stops growing after the first pass
        let ids: Vec<String> = (0..1024).map(|i| format!("user-{i}")).collect();
        let mut keys = ids.iter().cycle();
        b.iter(|| {
            let id = keys.next().expect("cycle never ends");
            registry.register(id.as_str(), tx.clone())
        });
    });

    group.bench_function("register_unregister", |b| {
        let registry = Registry::new();
        let (tx, _rx) = endpoint(1);
        b.iter(|| {
            registry.register("user", tx.clone());
            registry.unregister(black_box("user"))
        });
    });

    group.finish();
}

/// Benchmark broadcast fan-out to drained endpoints.
fn bench_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout");

    for size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let registry = Registry::new();
            let mut inboxes: Vec<_> = (0..size)
                .map(|i| {
                    let (tx, rx) = endpoint(1);
                    registry.register(format!("user-{i}"), tx);
                    rx
                })
                .collect();
            let message = Arc::new(Message::broadcast("user-0", "x".repeat(64)));

            b.iter(|| {
                let report = registry.deliver(Target::All, black_box(&message));
                for inbox in &mut inboxes {
                    let _ = inbox.try_recv();
                }
                report
            });
        });
    }

    group.finish();
}

/// Benchmark direct delivery against registry size.
fn bench_direct(c: &mut Criterion) {
    let mut group = c.benchmark_group("direct");

    for size in [1, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let registry = Registry::new();
            let mut target = None;
            for i in 0..size {
                let (tx, rx) = endpoint(1);
                registry.register(format!("user-{i}"), tx);
                if i == 0 {
                    target = Some(rx);
                }
            }
            let mut inbox = target.expect("at least one subscriber");
            let message = Arc::new(Message::direct("user-1", "user-0", "x".repeat(64)));

            b.iter(|| {
                let report = registry.deliver(Target::One("user-0"), black_box(&message));
                let _ = inbox.try_recv();
                report
            });
        });
    }

    group.finish();
}

/// Benchmark submit through the routing loop.
fn bench_broker_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("broker");
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("tokio runtime");

    group.throughput(Throughput::Elements(1));
    group.bench_function("send_and_route", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let config = BrokerConfig {
                    inbound_capacity: 1024,
                    endpoint_capacity: 1024,
                };
                let broker = Arc::new(Broker::with_config(config, ShutdownSignal::new()));
                let (tx, mut inbox) = broker.endpoint();
                broker.register_user("sink", tx);
                let router = {
                    let broker = Arc::clone(&broker);
                    tokio::spawn(async move { broker.run().await })
                };

                let consumer = tokio::spawn(async move { while inbox.recv().await.is_some() {} });

                let start = Instant::now();
                let mut sent = 0;
                for _ in 0..iters {
                    let message = Message::direct("source", "sink", "payload");
                    if broker.send_message(message).await.is_err() {
                        break;
                    }
                    sent += 1;
                }
                // Full inboxes drop, so wait on the routing loop rather than the consumer
                while broker.stats().routed < sent {
                    tokio::task::yield_now().await;
                }
                let elapsed = start.elapsed();

                broker.shutdown();
                let _ = router.await;
                broker.unregister_user("sink");
                let _ = consumer.await;
                elapsed
            })
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_registry,
    bench_fanout,
    bench_direct,
    bench_broker_pipeline,
);
criterion_main!(benches);
