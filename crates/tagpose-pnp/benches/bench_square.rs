use criterion::{criterion_group, criterion_main, Criterion};

use tagpose_pnp::{
    ops::{project_points, rotation_from_axis_angle, square_object_points},
    CameraIntrinsics, PoseSolver, SquareTagSolver, SquareTagSolverParams,
};

fn bench_square(c: &mut Criterion) {
    let intrinsics = CameraIntrinsics::new(600.0, 600.0, 240.0, 320.0);
    let r = rotation_from_axis_angle(&[0.1, 0.3, -0.05]);
    let mut corners = project_points(&square_object_points(0.015), &r, &[0.02, 0.0, 0.4], &intrinsics)
        .unwrap();
    corners[0][0] += 0.2;
    corners[2][1] -= 0.2;

    let mut group = c.benchmark_group("square_tag");

    let plain = SquareTagSolver::new(SquareTagSolverParams {
        refine: false,
        ..Default::default()
    });
    group.bench_function("homography", |b| {
        b.iter(|| std::hint::black_box(plain.solve(&corners, &intrinsics, 0.015).unwrap()))
    });

    let refined = SquareTagSolver::default();
    group.bench_function("homography_refined", |b| {
        b.iter(|| std::hint::black_box(refined.solve(&corners, &intrinsics, 0.015).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_square);
criterion_main!(benches);
