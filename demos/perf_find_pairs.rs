use bucketbonk::*;
use glam::{Quat, UVec3, Vec3};
use std::time::Instant;

fn lcg(seed: &mut u32) -> u32 {
    *seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
    *seed
}

fn unit(seed: &mut u32) -> f32 {
    lcg(seed) as f32 / u32::MAX as f32
}

fn main() {
    env_logger::init();

    let n = 20_000usize; // number of colliders
    let radius = 150.0;
    let settings = CollisionLayerSettings::from_arena_radius(radius, UVec3::new(4, 1, 4));
    let mut seed = 1u32;
    let bodies: Vec<ColliderBody> = (0..n)
        .map(|i| {
            let p = Vec3::new(
                unit(&mut seed) * 2.0 * radius - radius,
                unit(&mut seed) * 20.0 - 10.0,
                unit(&mut seed) * 2.0 * radius - radius,
            );
            let rot = Quat::from_rotation_y(unit(&mut seed) * std::f32::consts::TAU);
            let collider: Collider = match i % 3 {
                0 => SphereCollider::new(Vec3::ZERO, 0.5).into(),
                1 => CapsuleCollider::new(Vec3::new(-0.5, 0.0, 0.0), Vec3::new(0.5, 0.0, 0.0), 0.3).into(),
                _ => BoxCollider::new(Vec3::ZERO, Vec3::splat(0.5)).into(),
            };
            ColliderBody::new(collider, EntityId(i as u64), RigidTransform::new(rot, p))
        })
        .collect();

    let t0 = Instant::now();
    let layer = match CollisionLayer::build_parallel(&bodies, settings) {
        Ok(layer) => layer,
        Err(e) => {
            eprintln!("invalid settings: {e}");
            return;
        }
    };
    let t_build = t0.elapsed();

    let t1 = Instant::now();
    let mut touching = 0usize;
    let candidates = FindPairs::self_layer(&layer).run(&mut |r: &FindPairsResult<'_>| {
        let (a, b) = (r.body_a(), r.body_b());
        let (hit, _) = distance_between(&a.collider, &a.transform, &b.collider, &b.transform, 0.0);
        touching += hit as usize;
    });
    let t_single = t1.elapsed();

    let t2 = Instant::now();
    let flags = MonotonicFlags::all_set(n);
    struct Untouched<'f>(&'f MonotonicFlags);
    impl MonotonicProcessor for Untouched<'_> {
        fn execute(&self, r: &FindPairsResult<'_>) {
            self.0.clear(r.source_index_a());
            self.0.clear(r.source_index_b());
        }
    }
    FindPairs::self_layer(&layer).run_parallel_relaxed(&Untouched(&flags));
    let t_relaxed = t2.elapsed();

    println!(
        "N={} buckets={} build={:?} single={:?} relaxed={:?} candidates={} touching={} untouched={}",
        n,
        layer.bucket_count(),
        t_build,
        t_single,
        t_relaxed,
        candidates,
        touching,
        flags.count_set()
    );
}
