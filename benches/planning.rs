//! Planning and rendering throughput
//!
//! Usage:
//!   Quick run:      TEST_TIER=quick cargo bench --bench planning
//!   Full sweep:     TEST_TIER=release cargo bench --bench planning
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use simdgen::emit::{render_packing, SortRenderer};
use simdgen::packing::{PackDirection, Transform, PACK_LANES};
use simdgen::test_tiers::TierConfig;
use simdgen::{
    pack_batch, BitPackPlanner, Direction, ElementType, GenerationRequest, SortKernelSet,
    SortSimulator,
};
use std::hint::black_box;

fn request(element: ElementType, max_vectors: usize, threshold: usize) -> GenerationRequest {
    GenerationRequest::new(element, 32, max_vectors, threshold, Direction::Ascending)
        .expect("valid request")
}

fn bench_sort_planning(c: &mut Criterion) {
    let tier = TierConfig::from_env();
    let mut group = c.benchmark_group("sort_planning");

    for &threshold in tier.unroll_thresholds {
        let req = request(ElementType::I32, 16, threshold);
        group.bench_with_input(BenchmarkId::new("i32_16v", threshold), &req, |b, req| {
            b.iter(|| black_box(SortKernelSet::plan(req)));
        });
    }
    group.finish();
}

fn bench_rendering(c: &mut Criterion) {
    let mut group = c.benchmark_group("rendering");

    for element in [ElementType::I32, ElementType::U64] {
        let kernels = SortKernelSet::plan(&request(element, 16, 4));
        group.bench_function(BenchmarkId::new("sort", element), |b| {
            b.iter(|| black_box(SortRenderer::new(&kernels).render()));
        });
    }

    let planner = BitPackPlanner::default();
    let plans = planner.plan_all().expect("every width plans");
    group.bench_function("pack_plan_all", |b| {
        b.iter(|| black_box(planner.plan_all()));
    });
    group.bench_function("pack_render", |b| {
        b.iter(|| black_box(render_packing(planner.batch_length(), &plans)));
    });
    group.finish();
}

fn bench_simulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation");
    let mut rng = StdRng::seed_from_u64(42);

    let kernels = SortKernelSet::plan(&request(ElementType::F32, 16, 4));
    let data: Vec<f32> = (0..128).map(|_| rng.gen_range(-1.0e3..1.0e3)).collect();
    group.bench_function("sort_f32_128", |b| {
        b.iter(|| {
            let mut values = data.clone();
            SortSimulator::new(&kernels)
                .sort(&mut values, 128)
                .expect("sorts");
            black_box(values)
        });
    });

    for bit_width in [5u32, 17] {
        let plan = BitPackPlanner::default()
            .plan(bit_width, PackDirection::Pack)
            .expect("plans");
        let mask = plan.field_mask();
        let input: Vec<[u32; PACK_LANES]> = (0..plan.batch_length())
            .map(|_| std::array::from_fn(|_| rng.gen::<u32>() & mask))
            .collect();
        let mut output = vec![[0u32; PACK_LANES]; plan.words()];
        group.bench_function(BenchmarkId::new("pack", bit_width), |b| {
            b.iter(|| {
                black_box(pack_batch(
                    &plan,
                    Transform::Identity,
                    &input,
                    [0; PACK_LANES],
                    &mut output,
                ))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sort_planning, bench_rendering, bench_simulation);
criterion_main!(benches);
