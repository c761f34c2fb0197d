use std::sync::Arc;

use glam::{Mat3, Quat, UVec3, Vec3};

use crate::error::CollisionError;

/// Opaque caller handle carried through layers, pair results and streams.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityId(pub u64);

/// Rotation followed by translation. No scale.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RigidTransform {
    pub rotation: Quat,
    pub position: Vec3,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl RigidTransform {
    pub const IDENTITY: Self = Self { rotation: Quat::IDENTITY, position: Vec3::ZERO };

    pub fn new(rotation: Quat, position: Vec3) -> Self {
        Self { rotation, position }
    }

    pub fn from_translation(position: Vec3) -> Self {
        Self { rotation: Quat::IDENTITY, position }
    }

    #[inline]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.rotation * p + self.position
    }

    #[inline]
    pub fn transform_direction(&self, d: Vec3) -> Vec3 {
        self.rotation * d
    }

    #[inline]
    pub fn inverse_transform_point(&self, p: Vec3) -> Vec3 {
        self.rotation.inverse() * (p - self.position)
    }

    #[inline]
    pub fn inverse_transform_direction(&self, d: Vec3) -> Vec3 {
        self.rotation.inverse() * d
    }

    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self { rotation, position: rotation * -self.position }
    }

    /// `self * rhs`: applies `rhs` first, then `self`.
    pub fn mul(&self, rhs: &RigidTransform) -> Self {
        Self {
            rotation: (self.rotation * rhs.rotation).normalize(),
            position: self.transform_point(rhs.position),
        }
    }

    /// Transform that maps points of `other`'s local space into `self`'s local space.
    pub fn relative_to(&self, other: &RigidTransform) -> Self {
        self.inverse().mul(other)
    }
}

/// Axis-aligned bounding box in world space.
///
/// `min <= max` holds component-wise for every box the engine derives from a
/// collider with finite inputs. Boxes built from NaN inputs keep their NaNs so
/// the layer can route them to the overflow bucket.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self { min: center - extents, max: center + extents }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half size along each axis.
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Inclusive on faces: touching boxes overlap.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    /// True when `other` lies entirely inside `self`.
    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.cmple(other.min).all() && other.max.cmple(self.max).all()
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        self.min.cmple(p).all() && p.cmple(self.max).all()
    }

    pub fn union(&self, other: &Aabb) -> Self {
        Self { min: self.min.min(other.min), max: self.max.max(other.max) }
    }

    /// Inflates by a uniform margin on every side.
    pub fn expand(&self, margin: f32) -> Self {
        Self { min: self.min - Vec3::splat(margin), max: self.max + Vec3::splat(margin) }
    }

    pub fn is_nan(&self) -> bool {
        self.min.is_nan() || self.max.is_nan()
    }

    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SphereCollider {
    pub center: Vec3,
    pub radius: f32,
}

impl SphereCollider {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}

/// Segment `point_a..point_b` swept by a sphere of `radius`.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CapsuleCollider {
    pub point_a: Vec3,
    pub point_b: Vec3,
    pub radius: f32,
}

impl CapsuleCollider {
    pub fn new(point_a: Vec3, point_b: Vec3, radius: f32) -> Self {
        Self { point_a, point_b, radius }
    }
}

/// Oriented box in the collider's local space.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoxCollider {
    pub center: Vec3,
    pub half_size: Vec3,
}

impl BoxCollider {
    pub fn new(center: Vec3, half_size: Vec3) -> Self {
        Self { center, half_size }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompoundChild {
    pub collider: Collider,
    pub transform: RigidTransform,
}

/// Children share one allocation owned outside the body array.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompoundCollider {
    pub children: Arc<[CompoundChild]>,
}

impl CompoundCollider {
    pub fn new(children: impl Into<Arc<[CompoundChild]>>) -> Self {
        Self { children: children.into() }
    }
}

/// Supported collider shapes.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Collider {
    Sphere(SphereCollider),
    Capsule(CapsuleCollider),
    Box(BoxCollider),
    /// Broad phase only; the narrow phase does not resolve compounds.
    Compound(CompoundCollider),
}

impl From<SphereCollider> for Collider {
    fn from(s: SphereCollider) -> Self {
        Collider::Sphere(s)
    }
}

impl From<CapsuleCollider> for Collider {
    fn from(c: CapsuleCollider) -> Self {
        Collider::Capsule(c)
    }
}

impl From<BoxCollider> for Collider {
    fn from(b: BoxCollider) -> Self {
        Collider::Box(b)
    }
}

impl From<CompoundCollider> for Collider {
    fn from(c: CompoundCollider) -> Self {
        Collider::Compound(c)
    }
}

impl Collider {
    /// World-space bounds of the collider placed at `transform`.
    pub fn aabb(&self, transform: &RigidTransform) -> Aabb {
        match self {
            Collider::Sphere(s) => {
                let c = transform.transform_point(s.center);
                Aabb::from_center_extents(c, Vec3::splat(s.radius))
            }
            Collider::Capsule(c) => {
                let a = transform.transform_point(c.point_a);
                let b = transform.transform_point(c.point_b);
                let r = Vec3::splat(c.radius);
                Aabb::new(a.min(b) - r, a.max(b) + r)
            }
            Collider::Box(b) => {
                let c = transform.transform_point(b.center);
                let rot = Mat3::from_quat(transform.rotation);
                let abs = Mat3::from_cols(rot.x_axis.abs(), rot.y_axis.abs(), rot.z_axis.abs());
                Aabb::from_center_extents(c, abs * b.half_size)
            }
            Collider::Compound(c) => {
                let mut children = c.children.iter();
                let Some(first) = children.next() else {
                    return Aabb::from_center_extents(transform.position, Vec3::ZERO);
                };
                children.fold(first.collider.aabb(&transform.mul(&first.transform)), |acc, child| {
                    acc.union(&child.collider.aabb(&transform.mul(&child.transform)))
                })
            }
        }
    }
}

/// One participant of a detection step.
#[derive(Clone, Debug, PartialEq)]
pub struct ColliderBody {
    pub collider: Collider,
    pub entity: EntityId,
    pub transform: RigidTransform,
}

impl ColliderBody {
    pub fn new(collider: impl Into<Collider>, entity: EntityId, transform: RigidTransform) -> Self {
        Self { collider: collider.into(), entity, transform }
    }

    pub fn aabb(&self) -> Aabb {
        self.collider.aabb(&self.transform)
    }
}

/// Spatial partition of a collision layer. Supplied by the caller, never global.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CollisionLayerSettings {
    pub world_aabb: Aabb,
    pub subdivisions_per_axis: UVec3,
}

impl Default for CollisionLayerSettings {
    fn default() -> Self {
        Self {
            world_aabb: Aabb::new(Vec3::splat(-1000.0), Vec3::splat(1000.0)),
            subdivisions_per_axis: UVec3::splat(2),
        }
    }
}

impl CollisionLayerSettings {
    pub fn new(world_aabb: Aabb, subdivisions_per_axis: UVec3) -> Self {
        Self { world_aabb, subdivisions_per_axis }
    }

    /// Cube world of half size `radius` around the origin, e.g. a play-area bound.
    pub fn from_arena_radius(radius: f32, subdivisions_per_axis: UVec3) -> Self {
        Self {
            world_aabb: Aabb::from_center_extents(Vec3::ZERO, Vec3::splat(radius)),
            subdivisions_per_axis,
        }
    }

    /// Rejects settings that cannot produce well-defined cell indices.
    pub fn validate(&self) -> Result<(), CollisionError> {
        let s = self.subdivisions_per_axis;
        if s.cmpeq(UVec3::ZERO).any() {
            return Err(CollisionError::ZeroSubdivisions(s));
        }
        let w = self.world_aabb;
        if !w.is_finite() || !w.min.cmplt(w.max).all() {
            return Err(CollisionError::DegenerateWorldAabb { min: w.min, max: w.max });
        }
        let cells = s.x as u64 * s.y as u64 * s.z as u64;
        // One extra bucket for overflow, and 5 streams per cell in a PairStream.
        if cells >= (u32::MAX as u64) / 8 {
            return Err(CollisionError::TooManyCells(cells));
        }
        Ok(())
    }

    /// Number of grid cells, excluding the overflow bucket.
    pub fn cell_count(&self) -> usize {
        self.subdivisions_per_axis.x as usize
            * self.subdivisions_per_axis.y as usize
            * self.subdivisions_per_axis.z as usize
    }

    /// World-space size of one cell.
    pub fn cell_stride(&self) -> Vec3 {
        (self.world_aabb.max - self.world_aabb.min) / self.subdivisions_per_axis.as_vec3()
    }
}

/// Signed-distance result between two colliders.
///
/// `normal_a` is the surface normal of A at `hitpoint_a` (pointing towards B
/// when separated); `normal_b` likewise for B. `distance` is negative when the
/// shapes interpenetrate.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ColliderDistanceResult {
    pub hitpoint_a: Vec3,
    pub hitpoint_b: Vec3,
    pub normal_a: Vec3,
    pub normal_b: Vec3,
    pub distance: f32,
}

impl Default for ColliderDistanceResult {
    fn default() -> Self {
        Self {
            hitpoint_a: Vec3::ZERO,
            hitpoint_b: Vec3::ZERO,
            normal_a: Vec3::ZERO,
            normal_b: Vec3::ZERO,
            distance: f32::INFINITY,
        }
    }
}

impl ColliderDistanceResult {
    /// Same result with the roles of A and B exchanged.
    pub fn swapped(&self) -> Self {
        Self {
            hitpoint_a: self.hitpoint_b,
            hitpoint_b: self.hitpoint_a,
            normal_a: self.normal_b,
            normal_b: self.normal_a,
            distance: self.distance,
        }
    }

    pub(crate) fn transformed(&self, t: &RigidTransform) -> Self {
        Self {
            hitpoint_a: t.transform_point(self.hitpoint_a),
            hitpoint_b: t.transform_point(self.hitpoint_b),
            normal_a: t.transform_direction(self.normal_a),
            normal_b: t.transform_direction(self.normal_b),
            distance: self.distance,
        }
    }
}

/// Signed distance from a point to a collider surface.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointDistanceResult {
    pub hitpoint: Vec3,
    pub normal: Vec3,
    pub distance: f32,
}

impl Default for PointDistanceResult {
    fn default() -> Self {
        Self { hitpoint: Vec3::ZERO, normal: Vec3::ZERO, distance: f32::INFINITY }
    }
}
