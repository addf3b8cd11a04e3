//! Collision and visual shapes from body-description geoms.

use flygym_ir::{GeomClass, GeomDef, GeomShape};
use nalgebra::{Isometry3, Vector3};
use parry3d::shape::SharedShape;
use rapier3d::dynamics::CoefficientCombineRule;
use rapier3d::geometry::{ColliderBuilder, Group, InteractionGroups};

use crate::joints::{to_point, to_vector};

/// Collision group of the fly's contact geoms.
pub const FLY_GROUP: Group = Group::GROUP_1;
/// Collision group of terrain geoms.
pub const TERRAIN_GROUP: Group = Group::GROUP_2;

/// Interaction groups for fly geoms of a given class.
///
/// Fly geoms never collide with each other, only with the terrain. Visual
/// geoms collide with nothing.
pub fn fly_groups(class: GeomClass) -> InteractionGroups {
    match class {
        GeomClass::Collision => InteractionGroups::new(FLY_GROUP, TERRAIN_GROUP),
        GeomClass::Visual => InteractionGroups::none(),
    }
}

/// Interaction groups for terrain geoms.
pub fn terrain_groups() -> InteractionGroups {
    InteractionGroups::new(TERRAIN_GROUP, FLY_GROUP)
}

/// Shape of a geom and its placement in the owning body's frame.
pub fn geom_shape(shape: &GeomShape) -> (SharedShape, Isometry3<f32>) {
    match shape {
        GeomShape::Capsule { from, to, radius } => (
            SharedShape::capsule(to_point(*from), to_point(*to), *radius as f32),
            Isometry3::identity(),
        ),
        GeomShape::Sphere { center, radius } => (
            SharedShape::ball(*radius as f32),
            Isometry3::translation(center.x as f32, center.y as f32, center.z as f32),
        ),
        GeomShape::Box {
            center,
            half_extents,
        } => {
            let h = to_vector(*half_extents);
            (
                SharedShape::cuboid(h.x, h.y, h.z),
                Isometry3::translation(center.x as f32, center.y as f32, center.z as f32),
            )
        }
    }
}

/// Collider for a fly geom.
///
/// `friction` is the sliding coefficient. Contacts use the larger of the
/// two coefficients, so the fly's friction dominates over a slipperier floor.
pub fn geom_collider(geom: &GeomDef, default_density: f64, friction: f32) -> ColliderBuilder {
    let (shape, position) = geom_shape(&geom.shape);
    ColliderBuilder::new(shape)
        .position(position)
        .density(geom.density.unwrap_or(default_density) as f32)
        .friction(friction)
        .friction_combine_rule(CoefficientCombineRule::Max)
        .collision_groups(fly_groups(geom.class))
}

/// Static terrain box centered at `center`.
pub fn terrain_box(
    center: Vector3<f32>,
    half_extents: Vector3<f32>,
    friction: f32,
) -> ColliderBuilder {
    ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
        .translation(center)
        .friction(friction)
        .friction_combine_rule(CoefficientCombineRule::Max)
        .collision_groups(terrain_groups())
}

/// Convert a `[r, g, b]` color in 0.0..1.0 to bytes.
pub fn color_bytes(color: [f64; 3]) -> [u8; 3] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}
