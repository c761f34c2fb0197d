use bucketbonk::*;
use bytemuck::{Pod, Zeroable};
use glam::{UVec3, Vec3};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

fn lcg(seed: &mut u32) -> u32 {
    *seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
    *seed
}

fn unit(seed: &mut u32) -> f32 {
    lcg(seed) as f32 / u32::MAX as f32
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct Hit {
    damage: u32,
    separation: f32,
}

/// Records ship/bullet hits into a private writer per task.
struct HitRecorder<'a> {
    writer: ParallelWriter,
    finished: &'a Mutex<Vec<PairStream>>,
}

impl Clone for HitRecorder<'_> {
    fn clone(&self) -> Self {
        Self { writer: self.writer.fork(), finished: self.finished }
    }
}

impl FindPairsProcessor for HitRecorder<'_> {
    fn execute(&mut self, r: &FindPairsResult<'_>) {
        let (ship, bullet) = (r.body_a(), r.body_b());
        let (hit, d) = distance_between(&ship.collider, &ship.transform, &bullet.collider, &bullet.transform, 0.0);
        if hit {
            let payload = Hit { damage: 10, separation: d.distance };
            if let Err(e) = self.writer.add_pair_from_result(r, true, true, &payload) {
                log::error!("dropping hit: {e}");
            }
        }
    }

    fn end_bucket(&mut self, _a: usize, _b: usize) {
        if self.writer.is_empty() {
            return;
        }
        let fresh = self.writer.fork();
        let done = std::mem::replace(&mut self.writer, fresh).into_stream();
        match self.finished.lock() {
            Ok(mut finished) => finished.push(done),
            Err(e) => log::error!("dropping {} hits: {e}", done.pair_count()),
        }
    }
}

fn main() {
    env_logger::init();

    let radius = 100.0;
    let settings = CollisionLayerSettings::from_arena_radius(radius, UVec3::new(3, 1, 3));
    let mut seed = 7u32;
    let random_point = |seed: &mut u32| {
        Vec3::new(unit(seed) * 2.0 * radius - radius, 0.0, unit(seed) * 2.0 * radius - radius)
    };

    let ships: Vec<ColliderBody> = (0..2_000)
        .map(|i| {
            let p = random_point(&mut seed);
            ColliderBody::new(
                BoxCollider::new(Vec3::ZERO, Vec3::new(1.5, 0.5, 1.0)),
                EntityId(i),
                RigidTransform::from_translation(p),
            )
        })
        .collect();
    let bullets: Vec<ColliderBody> = (0..20_000)
        .map(|i| {
            let p = random_point(&mut seed);
            let travel = Vec3::new(unit(&mut seed) - 0.5, 0.0, unit(&mut seed) - 0.5) * 4.0;
            ColliderBody::new(
                CapsuleCollider::new(Vec3::ZERO, travel, 0.1),
                EntityId(100_000 + i),
                RigidTransform::from_translation(p),
            )
        })
        .collect();

    let (ship_layer, bullet_layer) = match (
        CollisionLayer::build_parallel(&ships, settings),
        CollisionLayer::build_parallel(&bullets, settings),
    ) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("invalid settings: {e}");
            return;
        }
    };
    let find = match FindPairs::cross_layer(&ship_layer, &bullet_layer) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };

    let t0 = Instant::now();
    let mut stream = PairStream::from_layer(&ship_layer);
    let finished = Mutex::new(Vec::new());
    let recorder = HitRecorder { writer: stream.parallel_writer(), finished: &finished };
    let candidates = find.run_parallel(&recorder);
    drop(recorder);
    let parts = match finished.into_inner() {
        Ok(parts) => parts,
        Err(e) => {
            log::error!("hit recorder panicked: {e}");
            return;
        }
    };
    for part in parts {
        if let Err(e) = stream.concatenate(part) {
            eprintln!("{e}");
            return;
        }
    }
    let t_find = t0.elapsed();

    let health: Vec<AtomicU32> = ships.iter().map(|_| AtomicU32::new(100)).collect();
    let t1 = Instant::now();
    stream.for_each_pair_parallel(|pair| {
        let hit: Hit = pair.payload();
        let ship = pair.entity_a().0 as usize;
        let _ = health[ship].fetch_update(Ordering::Relaxed, Ordering::Relaxed, |h| Some(h.saturating_sub(hit.damage)));
    });
    let t_apply = t1.elapsed();

    let destroyed = health.iter().filter(|h| h.load(Ordering::Relaxed) == 0).count();
    println!(
        "candidates={} hits={} islanded={} islands={} find={:?} apply={:?} destroyed={}",
        candidates,
        stream.pair_count(),
        stream.needs_islanding(),
        stream.islands().len(),
        t_find,
        t_apply,
        destroyed
    );
    stream.dispose_in_background();
}
