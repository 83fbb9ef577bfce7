//! Benchmarks for kiln-scene
//!
//! Measures the logic tick, global transform reads and renderable harvesting.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::Vec2;
use kiln_scene::{
    collect_commands, QuadComponent, RenderStates, Scene, SceneObject, Tick,
};
use std::sync::Arc;

fn populated_scene(object_count: usize) -> Arc<Scene> {
    let scene = Scene::new("bench");
    for i in 0..object_count {
        let object = scene.create_object("quad");
        object.transform().set_position(Vec2::new(i as f32, 0.0));
        object
            .insert_component(QuadComponent::default().with_layer((i % 8) as i32))
            .unwrap();
    }
    scene.update(&Tick::default());
    scene
}

/// Chain of `depth` objects, each parented to the previous one
fn hierarchy(scene: &Arc<Scene>, depth: usize) -> (Arc<SceneObject>, Arc<SceneObject>) {
    let root = scene.create_object("root");
    let mut leaf = Arc::clone(&root);
    for _ in 0..depth {
        let child = leaf.create_child("link").unwrap();
        child.transform().set_position(Vec2::new(1.0, 0.0));
        child.transform().set_rotation(5.0);
        leaf = child;
    }
    (root, leaf)
}

fn bench_scene_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("scene_tick");

    for object_count in [10, 100, 1000].iter() {
        let scene = populated_scene(*object_count);

        group.bench_with_input(
            BenchmarkId::from_parameter(object_count),
            object_count,
            |b, _| {
                let mut index = 0;
                b.iter(|| {
                    scene.update(black_box(&Tick::new(index, Default::default())));
                    index += 1;
                });
            },
        );
    }

    group.finish();
}

fn bench_global_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("global_transform");

    for depth in [1, 8, 32].iter() {
        let scene = Scene::new("bench");
        let (root, leaf) = hierarchy(&scene, *depth);

        // Cache clean: read only
        group.bench_with_input(BenchmarkId::new("cached", depth), depth, |b, _| {
            leaf.transform().global_position();
            b.iter(|| black_box(leaf.transform().global_position()));
        });

        // Root moved every iteration: the whole chain recomputes
        group.bench_with_input(BenchmarkId::new("recompute", depth), depth, |b, _| {
            b.iter(|| {
                root.transform().translate(Vec2::new(0.1, 0.0));
                black_box(leaf.transform().global_position())
            });
        });
    }

    group.finish();
}

fn bench_harvest(c: &mut Criterion) {
    let mut group = c.benchmark_group("harvest");

    for object_count in [10, 100, 1000].iter() {
        let scene = populated_scene(*object_count);
        scene.renderable_components();

        group.bench_with_input(
            BenchmarkId::new("unchanged", object_count),
            object_count,
            |b, _| {
                b.iter(|| black_box(scene.renderable_components().len()));
            },
        );

        let quads: Vec<Arc<QuadComponent>> = scene
            .objects()
            .iter()
            .filter_map(|object| object.get_component::<QuadComponent>())
            .collect();
        group.bench_with_input(
            BenchmarkId::new("restaged", object_count),
            object_count,
            |b, _| {
                let mut layer = 0;
                b.iter(|| {
                    layer += 1;
                    quads[0].set_layer(layer % 8);
                    black_box(scene.renderable_components().len())
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("draw", object_count), object_count, |b, _| {
            let states = RenderStates::default();
            b.iter(|| black_box(collect_commands(&scene, &states)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_scene_tick, bench_global_transform, bench_harvest);
criterion_main!(benches);
