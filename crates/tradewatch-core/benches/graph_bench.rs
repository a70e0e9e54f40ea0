use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

use tradewatch_core::feed::Reconciler;
use tradewatch_core::graph::{GraphEngine, PhysicsConfig, Viewport};
use tradewatch_core::model::event::{Event, Utterance};
use tradewatch_core::model::network::{GraphSnapshot, SnapshotEdge, SnapshotNode};

fn ring_snapshot(size: usize) -> GraphSnapshot {
    let ids: Vec<String> = (0..size).map(|i| format!("Agent {i}")).collect();
    GraphSnapshot {
        nodes: ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let mut node = SnapshotNode::new(id);
                node.sales = (i * 25) as f64;
                node.net_value = (i as f64 - size as f64 / 2.0) * 20.0;
                node
            })
            .collect(),
        edges: (0..size)
            .flat_map(|i| {
                [(i + 1) % size, (i + 7) % size].map(|j| SnapshotEdge {
                    source: ids[i].clone(),
                    target: ids[j].clone(),
                    weight: 0.1 + (j % 9) as f64 / 10.0,
                })
            })
            .collect(),
    }
}

fn warm_engine(size: usize) -> GraphEngine {
    let mut engine = GraphEngine::new(Viewport::default(), PhysicsConfig::default());
    engine.ingest_snapshot(&ring_snapshot(size));
    engine
}

fn physics_tick(c: &mut Criterion) {
    for size in [10, 50, 200] {
        let mut engine = warm_engine(size);
        c.bench_function(&format!("physics_tick_{size}_nodes"), |b| {
            b.iter(|| {
                engine.reheat(1.0);
                engine.tick();
            });
        });
    }
}

fn physics_step_frame(c: &mut Criterion) {
    let mut engine = warm_engine(50);
    c.bench_function("physics_step_16ms", |b| {
        b.iter(|| {
            engine.reheat(0.5);
            black_box(engine.step(Duration::from_millis(16)));
        });
    });
}

fn snapshot_ingest(c: &mut Criterion) {
    let snapshot = ring_snapshot(100);
    let mut engine = warm_engine(100);
    c.bench_function("snapshot_ingest_100_nodes", |b| {
        b.iter(|| black_box(engine.ingest_snapshot(&snapshot)));
    });
}

fn frame_export(c: &mut Criterion) {
    let mut engine = warm_engine(50);
    engine.settle(1000);
    c.bench_function("frame_to_svg_50_nodes", |b| {
        b.iter(|| black_box(engine.frame().to_svg()));
    });
}

fn feed_reconcile(c: &mut Criterion) {
    let batch: Vec<Event> = (0..100)
        .map(|i| {
            Event::utterance(
                i as f64,
                Utterance {
                    markov_step: i / 10,
                    conversation_turn: i % 10,
                    conversation_id: None,
                    agent: format!("Agent {}", i % 2),
                    text: "What would you take for the lantern?".to_string(),
                    participants: Some(vec!["Agent 0".to_string(), "Agent 1".to_string()]),
                    context: None,
                    ended: None,
                },
            )
        })
        .collect();
    c.bench_function("reconcile_batch_100", |b| {
        b.iter(|| {
            let mut reconciler = Reconciler::new();
            black_box(reconciler.apply_batch(batch.clone()))
        });
    });
}

criterion_group!(
    benches,
    physics_tick,
    physics_step_frame,
    snapshot_ingest,
    frame_export,
    feed_reconcile
);
criterion_main!(benches);
