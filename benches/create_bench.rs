//! Creation and destruction benchmarks
//!
//! Run with: cargo bench --bench create_bench

use chunk_ecs::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hecs::World as HecsWorld;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct Health(u32);

fn values(i: usize) -> (Position, Velocity, Health) {
    (
        Position {
            x: i as f32,
            y: 0.0,
            z: 0.0,
        },
        Velocity {
            x: 1.0,
            y: 0.0,
            z: 0.0,
        },
        Health(100),
    )
}

fn manager_with_archetype() -> (EntityManager, ArchetypeId) {
    let mut manager = EntityManager::new();
    let archetype = manager
        .create_entity_type_for_chunk_size::<(Position, Velocity, Health)>(Space(0))
        .expect("archetype");
    (manager, archetype)
}

// Bench: creating entities one at a time and in bulk
fn bench_create(c: &mut Criterion) {
    let mut group = c.benchmark_group("create");

    for count in [1_000, 10_000, 100_000].iter() {
        group.bench_with_input(
            BenchmarkId::new("chunk_create_with_3_components", count),
            count,
            |b, &count| {
                b.iter(|| {
                    let (mut manager, archetype) = manager_with_archetype();
                    for i in 0..count {
                        manager.create_entity_with(archetype, values(i));
                    }
                    black_box(manager.entity_count());
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("chunk_create_entities_with_3_components", count),
            count,
            |b, &count| {
                b.iter(|| {
                    let (mut manager, archetype) = manager_with_archetype();
                    let entities = manager
                        .create_entities_with(count, archetype, values(0))
                        .expect("bulk create");
                    black_box(entities.len());
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("hecs_spawn_with_3_components", count),
            count,
            |b, &count| {
                b.iter(|| {
                    let mut world = HecsWorld::new();
                    for i in 0..count {
                        world.spawn(values(i));
                    }
                    black_box(world.len());
                });
            },
        );
    }

    group.finish();
}

// Bench: destroying entities (swap-remove)
fn bench_destroy(c: &mut Criterion) {
    let mut group = c.benchmark_group("destroy");

    group.bench_function("chunk_destroy_1k_entities", |b| {
        b.iter_batched(
            || {
                let (mut manager, archetype) = manager_with_archetype();
                let entities = manager
                    .create_entities_with(1_000, archetype, values(0))
                    .expect("bulk create");
                (manager, entities)
            },
            |(mut manager, entities)| {
                for entity in entities {
                    let _ = manager.destroy_entity(entity);
                }
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.bench_function("hecs_despawn_1k_entities", |b| {
        b.iter_batched(
            || {
                let mut world = HecsWorld::new();
                let entities: Vec<_> = (0..1_000).map(|i| world.spawn(values(i))).collect();
                (world, entities)
            },
            |(mut world, entities)| {
                for entity in entities {
                    let _ = world.despawn(entity);
                }
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.bench_function("chunk_recycle_1k_entities", |b| {
        let (mut manager, archetype) = manager_with_archetype();
        b.iter(|| {
            let entities = manager
                .create_entities(1_000, archetype)
                .expect("bulk create");
            manager.destroy_entities(&entities).expect("destroy");
        });
    });

    group.finish();
}

criterion_group!(benches, bench_create, bench_destroy);
criterion_main!(benches);
