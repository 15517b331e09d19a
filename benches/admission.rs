use brrtdispatch::policy::evaluate;
use brrtdispatch::{
    CancellationToken, Dispatcher, HttpRequest, QueuingBehaviour, TransportError,
    TransportResponse,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use http::StatusCode;
use std::hint::black_box;
use std::sync::mpsc;

fn active_set(n: usize) -> Vec<HttpRequest> {
    (0..n)
        .map(|i| {
            HttpRequest::get(format!("Kind{}", i % 16), "/items")
                .query("page", &i.to_string())
        })
        .collect()
}

fn bench_policy_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("policy_evaluate");
    for size in [8usize, 64, 512] {
        let active = active_set(size);
        let incoming = HttpRequest::get("Kind3", "/items")
            .query("page", "3")
            .behaviour(QueuingBehaviour::CancelExistingEqual);
        group.bench_with_input(BenchmarkId::from_parameter(size), &active, |b, active| {
            b.iter(|| black_box(evaluate(&incoming, active.iter())));
        });
    }
    group.finish();
}

fn bench_enqueue_round_trip(c: &mut Criterion) {
    let transport = |_: &HttpRequest,
                     _: &CancellationToken|
     -> Result<TransportResponse, TransportError> {
        Ok(TransportResponse::new(StatusCode::OK, Vec::new()))
    };
    let dispatcher = Dispatcher::builder()
        .host("bench.local")
        .max_concurrent(4)
        .build(transport)
        .expect("dispatcher starts");

    let mut group = c.benchmark_group("enqueue");
    for behaviour in [
        QueuingBehaviour::Plain,
        QueuingBehaviour::CancelExistingOfSameType,
    ] {
        group.bench_function(behaviour.as_str(), |b| {
            b.iter(|| {
                let (tx, rx) = mpsc::channel();
                for i in 0..32 {
                    let tx = tx.clone();
                    dispatcher.enqueue(
                        HttpRequest::get("Bench", "/bench")
                            .query("n", &i.to_string())
                            .behaviour(behaviour),
                        move |outcome| {
                            let _ = tx.send(outcome.is_success());
                        },
                    );
                }
                drop(tx);
                black_box(rx.iter().count())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_policy_evaluation, bench_enqueue_round_trip);
criterion_main!(benches);
