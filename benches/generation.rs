use criterion::{criterion_group, criterion_main, Criterion, black_box};

use cropfield::generation::layout::{seeded_rng, LayoutParams, LayoutPlanner};
use cropfield::scene::{render_world, ModelCatalog, TemplateSet};
use cropfield::terrain::{HeightField, PointCloud};

use glam::DVec3;
use std::path::Path;

/// Rolling terrain sampled on an n x n grid over 100 m x 100 m.
fn create_test_cloud(n: usize) -> PointCloud {
    let mut points = Vec::with_capacity(n * n);
    for j in 0..n {
        for i in 0..n {
            let x = i as f64 / (n - 1) as f64 * 100.0 - 50.0;
            let y = j as f64 / (n - 1) as f64 * 100.0 - 50.0;
            let z = (x * 0.1).sin() * 2.0 + (y * 0.07).cos() * 1.5;
            points.push(DVec3::new(x, y, z));
        }
    }
    PointCloud::new(points)
}

fn bench_height_field_build_32(c: &mut Criterion) {
    let cloud = create_test_cloud(32);

    c.bench_function("height_field_build_32", |b| {
        b.iter(|| HeightField::new(black_box(cloud.clone())).unwrap());
    });
}

fn bench_height_field_build_512(c: &mut Criterion) {
    let cloud = create_test_cloud(512);

    let mut group = c.benchmark_group("height_field_build_512");
    group.sample_size(10);
    group.bench_function("build", |b| {
        b.iter(|| HeightField::new(black_box(cloud.clone())).unwrap());
    });
    group.finish();
}

fn bench_height_field_query(c: &mut Criterion) {
    let field = HeightField::new(create_test_cloud(32)).unwrap();

    c.bench_function("height_field_query_inside", |b| {
        let mut t = 0u32;
        b.iter(|| {
            t = t.wrapping_add(1);
            let x = (t as f64 * 0.37).sin() * 45.0;
            let y = (t as f64 * 0.11).cos() * 45.0;
            field.query(black_box(x), black_box(y))
        });
    });

    c.bench_function("height_field_query_outside", |b| {
        b.iter(|| field.query(black_box(80.0), black_box(-75.0)));
    });
}

fn bench_layout_generate(c: &mut Criterion) {
    let field = HeightField::new(create_test_cloud(32)).unwrap();
    let planner = LayoutPlanner::new(LayoutParams::new(24, 3, 2.5, 2.5, 1.2, 20)).unwrap();

    c.bench_function("layout_generate_24x20", |b| {
        b.iter(|| planner.generate(black_box(&field), &mut seeded_rng(42)));
    });
}

fn bench_render_world(c: &mut Criterion) {
    let field = HeightField::new(create_test_cloud(16)).unwrap();
    let planner = LayoutPlanner::new(LayoutParams::new(24, 3, 2.5, 2.5, 1.2, 20)).unwrap();
    let placements = planner.generate(&field, &mut seeded_rng(42));
    let templates = TemplateSet::builtin();
    let models = ModelCatalog::from_names(
        "olive",
        Path::new("models"),
        vec!["olive1".to_string(), "olive2".to_string()],
    )
    .unwrap();

    c.bench_function("render_world_480", |b| {
        b.iter(|| {
            render_world(&templates, "hills", &models, black_box(&placements), &mut seeded_rng(1)).unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_height_field_build_32,
    bench_height_field_build_512,
    bench_height_field_query,
    bench_layout_generate,
    bench_render_world,
);
criterion_main!(benches);
