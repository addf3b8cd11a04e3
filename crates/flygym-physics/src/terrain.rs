//! Static scenes the fly is placed into.

use nalgebra::{Isometry3, Translation3, Unit, UnitQuaternion, Vector3};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::colliders::terrain_box;
use crate::config::{
    BallTerrainConfig, BlocksTerrainConfig, FlatTerrainConfig, GappedTerrainConfig, TerrainConfig,
};
use crate::error::PhysicsError;
use crate::world::PhysicsWorld;

/// Thickness of floor slabs below their top face.
pub const FLOOR_THICKNESS: f32 = 1000.0;

const FLOOR_COLOR: [f64; 3] = [0.35, 0.38, 0.35];
const BLOCK_COLOR: [f64; 3] = [0.55, 0.5, 0.45];

/// A static scene.
pub trait Terrain {
    /// Add the terrain's colliders to `world`.
    fn build(&self, world: &mut PhysicsWorld) -> Result<(), PhysicsError>;

    /// Where the fly's root body is placed.
    fn spawn_pose(&self) -> Isometry3<f32>;
}

/// Terrain for a configuration.
pub fn terrain_for(config: &TerrainConfig) -> Box<dyn Terrain> {
    match config {
        TerrainConfig::Flat(c) => Box::new(FlatTerrain(c.clone())),
        TerrainConfig::Gapped(c) => Box::new(GappedTerrain(c.clone())),
        TerrainConfig::Blocks(c) => Box::new(BlocksTerrain(c.clone())),
        TerrainConfig::Ball(c) => Box::new(BallTerrain(c.clone())),
    }
}

/// Spawn pose from a position and an axis-angle `[ax, ay, az, angle]`.
pub fn spawn_pose(pos: [f64; 3], orient: [f64; 4]) -> Isometry3<f32> {
    let axis = Vector3::new(orient[0] as f32, orient[1] as f32, orient[2] as f32);
    let rotation = match Unit::try_new(axis, 1e-9) {
        Some(axis) => UnitQuaternion::from_axis_angle(&axis, orient[3] as f32),
        None => UnitQuaternion::identity(),
    };
    Isometry3::from_parts(
        Translation3::new(pos[0] as f32, pos[1] as f32, pos[2] as f32),
        rotation,
    )
}

fn sliding_friction(friction: [f64; 3]) -> f32 {
    log::debug!(
        "using sliding friction {}; torsional {} and rolling {} are not modelled",
        friction[0],
        friction[1],
        friction[2]
    );
    friction[0] as f32
}

/// Box spanning `[x0, x1] × [y0, y1] × [z0, z1]`.
fn span_box(
    world: &mut PhysicsWorld,
    min: Vector3<f32>,
    max: Vector3<f32>,
    friction: f32,
    color: [f64; 3],
) {
    let center = (min + max) / 2.0;
    let half = (max - min) / 2.0;
    world.insert_terrain(terrain_box(center, half, friction), color);
}

/// Bounded flat floor with its top face at z = 0.
pub struct FlatTerrain(pub FlatTerrainConfig);

impl Terrain for FlatTerrain {
    fn build(&self, world: &mut PhysicsWorld) -> Result<(), PhysicsError> {
        let [sx, sy] = self.0.size.map(|v| v as f32);
        span_box(
            world,
            Vector3::new(-sx / 2.0, -sy / 2.0, -FLOOR_THICKNESS),
            Vector3::new(sx / 2.0, sy / 2.0, 0.0),
            sliding_friction(self.0.friction),
            FLOOR_COLOR,
        );
        Ok(())
    }

    fn spawn_pose(&self) -> Isometry3<f32> {
        spawn_pose(self.0.fly_pos, self.0.fly_orient)
    }
}

/// Strips of floor along x separated by gaps, over a deep floor.
pub struct GappedTerrain(pub GappedTerrainConfig);

impl GappedTerrain {
    /// `[start, end]` of each block along x.
    pub fn block_spans(&self) -> Vec<[f64; 2]> {
        let c = &self.0;
        let mut spans = Vec::new();
        let mut start = c.x_range[0];
        while start < c.x_range[1] {
            spans.push([start, (start + c.block_width).min(c.x_range[1])]);
            start += c.block_width + c.gap_width;
        }
        spans
    }
}

impl Terrain for GappedTerrain {
    fn build(&self, world: &mut PhysicsWorld) -> Result<(), PhysicsError> {
        let c = &self.0;
        let friction = sliding_friction(c.friction);
        let [y0, y1] = c.y_range.map(|v| v as f32);
        let depth = c.gap_depth as f32;

        for [x0, x1] in self.block_spans() {
            span_box(
                world,
                Vector3::new(x0 as f32, y0, -depth),
                Vector3::new(x1 as f32, y1, 0.0),
                friction,
                BLOCK_COLOR,
            );
        }
        span_box(
            world,
            Vector3::new(c.x_range[0] as f32, y0, -depth - FLOOR_THICKNESS),
            Vector3::new(c.x_range[1] as f32, y1, -depth),
            friction,
            FLOOR_COLOR,
        );
        Ok(())
    }

    fn spawn_pose(&self) -> Isometry3<f32> {
        spawn_pose(self.0.fly_pos, self.0.fly_orient)
    }
}

/// Checkerboard of blocks of random height on a floor at z = 0.
pub struct BlocksTerrain(pub BlocksTerrainConfig);

impl BlocksTerrain {
    /// `(x, y, height)` of each block, deterministic in the seed.
    pub fn blocks(&self) -> Vec<(f64, f64, f64)> {
        let c = &self.0;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(c.rand_seed);
        let nx = ((c.x_range[1] - c.x_range[0]) / c.block_size).floor() as usize;
        let ny = ((c.y_range[1] - c.y_range[0]) / c.block_size).floor() as usize;
        let [lo, hi] = c.height_range;

        let mut blocks = Vec::new();
        for i in 0..nx {
            for j in 0..ny {
                if (i + j) % 2 != 0 {
                    continue;
                }
                let x = c.x_range[0] + (i as f64 + 0.5) * c.block_size;
                let y = c.y_range[0] + (j as f64 + 0.5) * c.block_size;
                let height = rng.gen_range(lo..=hi);
                blocks.push((x, y, height));
            }
        }
        blocks
    }
}

impl Terrain for BlocksTerrain {
    fn build(&self, world: &mut PhysicsWorld) -> Result<(), PhysicsError> {
        let c = &self.0;
        let friction = sliding_friction(c.friction);
        let half = (c.block_size / 2.0) as f32;

        for (x, y, height) in self.blocks() {
            if height <= 0.0 {
                continue;
            }
            let (x, y) = (x as f32, y as f32);
            span_box(
                world,
                Vector3::new(x - half, y - half, 0.0),
                Vector3::new(x + half, y + half, height as f32),
                friction,
                BLOCK_COLOR,
            );
        }
        span_box(
            world,
            Vector3::new(c.x_range[0] as f32, c.y_range[0] as f32, -FLOOR_THICKNESS),
            Vector3::new(c.x_range[1] as f32, c.y_range[1] as f32, 0.0),
            friction,
            FLOOR_COLOR,
        );
        Ok(())
    }

    fn spawn_pose(&self) -> Isometry3<f32> {
        spawn_pose(self.0.fly_pos, self.0.fly_orient)
    }
}

/// Spherical treadmill.
pub struct BallTerrain(pub BallTerrainConfig);

impl Terrain for BallTerrain {
    fn build(&self, _world: &mut PhysicsWorld) -> Result<(), PhysicsError> {
        Err(PhysicsError::Unimplemented("ball terrain"))
    }

    fn spawn_pose(&self) -> Isometry3<f32> {
        spawn_pose(self.0.fly_pos, self.0.fly_orient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TerrainKind;
    use approx::assert_relative_eq;

    #[test]
    fn test_flat_floor_top_at_zero() {
        let mut world = PhysicsWorld::new();
        let terrain = terrain_for(&TerrainConfig::default());
        terrain.build(&mut world).unwrap();
        assert_eq!(world.terrain_count(), 1);
        let (shape, pos) = world.terrain_shapes().next().unwrap();
        let cuboid = shape.as_cuboid().unwrap();
        assert_relative_eq!(pos.translation.z + cuboid.half_extents.z, 0.0);
        assert_relative_eq!(cuboid.half_extents.x, 25_000.0);
    }

    #[test]
    fn test_gapped_spans() {
        let terrain = GappedTerrain(GappedTerrainConfig {
            x_range: [0.0, 3000.0],
            ..Default::default()
        });
        assert_eq!(
            terrain.block_spans(),
            vec![[0.0, 1000.0], [1200.0, 2200.0], [2400.0, 3000.0]]
        );

        let mut world = PhysicsWorld::new();
        terrain.build(&mut world).unwrap();
        // three strips and the floor below the gaps
        assert_eq!(world.terrain_count(), 4);
        let lowest = world
            .terrain_shapes()
            .map(|(shape, pos)| pos.translation.z + shape.as_cuboid().unwrap().half_extents.z)
            .fold(f32::INFINITY, f32::min);
        assert_relative_eq!(lowest, -2000.0);
    }

    #[test]
    fn test_blocks_are_seeded() {
        let config = BlocksTerrainConfig {
            height_range: [100.0, 500.0],
            rand_seed: 7,
            ..Default::default()
        };
        let a = BlocksTerrain(config.clone()).blocks();
        let b = BlocksTerrain(config.clone()).blocks();
        assert_eq!(a, b);
        assert!(a.iter().all(|&(_, _, h)| (100.0..=500.0).contains(&h)));

        let other = BlocksTerrain(BlocksTerrainConfig {
            rand_seed: 8,
            ..config
        })
        .blocks();
        assert_ne!(a, other);
    }

    #[test]
    fn test_blocks_checkerboard() {
        let terrain = BlocksTerrain(BlocksTerrainConfig {
            x_range: [0.0, 4000.0],
            y_range: [0.0, 2000.0],
            ..Default::default()
        });
        let blocks = terrain.blocks();
        // 4 x 2 cells, half occupied
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0], (500.0, 500.0, 300.0));

        let mut world = PhysicsWorld::new();
        terrain.build(&mut world).unwrap();
        assert_eq!(world.terrain_count(), 5);
    }

    #[test]
    fn test_ball_is_unimplemented() {
        let mut world = PhysicsWorld::new();
        let terrain = terrain_for(&TerrainConfig::default_for(TerrainKind::Ball));
        assert!(matches!(
            terrain.build(&mut world),
            Err(PhysicsError::Unimplemented(_))
        ));
    }

    #[test]
    fn test_spawn_pose() {
        let pose = spawn_pose([0.0, 0.0, 300.0], [0.0, 1.0, 0.0, 0.1]);
        assert_relative_eq!(pose.translation.z, 300.0);
        assert_relative_eq!(pose.rotation.angle(), 0.1, epsilon = 1e-6);
        let axis = pose.rotation.axis().unwrap();
        assert_relative_eq!(axis.y, 1.0, epsilon = 1e-6);

        let level = spawn_pose([1.0, 2.0, 3.0], [0.0, 0.0, 0.0, 0.5]);
        assert_eq!(level.rotation, UnitQuaternion::identity());
    }
}
