//! CPU ray-cast renderer for recording the simulation.
//!
//! Renders the scene's colliders without GPU dependencies, from a camera
//! that follows the fly.

use image::{Rgb, RgbImage};
use nalgebra::{Point3, Vector3};
use parry3d::bounding_volume::Aabb;
use parry3d::query::{Ray, RayCast};

use crate::config::RecordingOptions;
use crate::world::{PhysicsWorld, RenderItem};

/// Edge length of the floor's checker tiles.
const CHECKER_SIZE: f32 = 1000.0;
const AMBIENT: f32 = 0.35;
const SKY_HORIZON: [f32; 3] = [200.0, 215.0, 230.0];
const SKY_ZENITH: [f32; 3] = [110.0, 145.0, 190.0];

/// Decides when the simulation clock has advanced enough for a new frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderGate {
    interval: f64,
    last: f64,
}

impl RenderGate {
    /// Gate producing one frame per `interval` of simulated time.
    pub fn new(interval: f64) -> Self {
        Self {
            interval,
            last: f64::NEG_INFINITY,
        }
    }

    /// Whether a frame is due at `time`.
    pub fn ready(&self, time: f64) -> bool {
        time >= self.last + self.interval
    }

    /// Record that a frame was produced at `time`.
    pub fn mark(&mut self, time: f64) {
        self.last = time;
    }

    /// Forget the last frame.
    pub fn reset(&mut self) {
        self.last = f64::NEG_INFINITY;
    }
}

/// A pinhole camera looking at a target point.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    /// Eye position.
    pub eye: Point3<f32>,
    forward: Vector3<f32>,
    right: Vector3<f32>,
    up: Vector3<f32>,
    tan_half_fovy: f32,
}

impl Camera {
    /// Camera orbiting `target` at `distance`, with azimuth and elevation in
    /// degrees. Negative elevation looks down.
    pub fn tracking(
        target: Point3<f32>,
        distance: f32,
        azimuth: f32,
        elevation: f32,
        fovy: f32,
    ) -> Self {
        let (az, el) = (azimuth.to_radians(), elevation.to_radians());
        let forward = Vector3::new(el.cos() * az.cos(), el.cos() * az.sin(), el.sin());
        let right = forward
            .cross(&Vector3::z())
            .try_normalize(1e-6)
            .unwrap_or_else(Vector3::x);
        let up = right.cross(&forward);
        Self {
            eye: target - forward * distance,
            forward,
            right,
            up,
            tan_half_fovy: (fovy.to_radians() / 2.0).tan(),
        }
    }

    /// Ray through pixel `(x, y)` of a `width × height` image.
    pub fn ray(&self, x: u32, y: u32, width: u32, height: u32) -> Ray {
        let aspect = width as f32 / height as f32;
        let u = (2.0 * (x as f32 + 0.5) / width as f32 - 1.0) * self.tan_half_fovy * aspect;
        let v = (1.0 - 2.0 * (y as f32 + 0.5) / height as f32) * self.tan_half_fovy;
        let dir = (self.forward + self.right * u + self.up * v).normalize();
        Ray::new(self.eye, dir)
    }
}

/// Renders frames of a physics world.
#[derive(Debug, Clone)]
pub struct Renderer {
    options: RecordingOptions,
    light: Vector3<f32>,
}

impl Renderer {
    /// Renderer with the given recording options.
    pub fn new(options: RecordingOptions) -> Self {
        Self {
            options,
            light: Vector3::new(-0.3, -0.5, 1.0).normalize(),
        }
    }

    /// Recording options.
    pub fn options(&self) -> &RecordingOptions {
        &self.options
    }

    /// Camera following `target` with the configured placement.
    pub fn camera(&self, target: Point3<f32>) -> Camera {
        let o = &self.options;
        Camera::tracking(
            target,
            o.camera_distance as f32,
            o.camera_azimuth as f32,
            o.camera_elevation as f32,
            o.fovy as f32,
        )
    }

    /// Render `world` from a camera following `target`.
    pub fn render(&self, world: &PhysicsWorld, target: Point3<f32>) -> RgbImage {
        let [width, height] = self.options.window_size;
        let camera = self.camera(target);
        let items = world.render_items();
        let bounds: Vec<Aabb> = items
            .iter()
            .map(|item| item.shape.compute_aabb(&item.pose))
            .collect();

        RgbImage::from_fn(width, height, |x, y| {
            let ray = camera.ray(x, y, width, height);
            self.shade(&ray, &items, &bounds)
        })
    }

    fn shade(&self, ray: &Ray, items: &[RenderItem], bounds: &[Aabb]) -> Rgb<u8> {
        let mut nearest = f32::MAX;
        let mut hit = None;
        for (item, aabb) in items.iter().zip(bounds) {
            match aabb.cast_local_ray(ray, nearest, true) {
                Some(_) => {}
                None => continue,
            }
            if let Some(intersection) =
                item.shape
                    .cast_ray_and_get_normal(&item.pose, ray, nearest, true)
            {
                nearest = intersection.time_of_impact;
                hit = Some((item, intersection.normal));
            }
        }

        let Some((item, normal)) = hit else {
            return sky(ray.dir.z);
        };

        let mut intensity = AMBIENT + (1.0 - AMBIENT) * normal.dot(&self.light).max(0.0);
        if item.terrain {
            let p = ray.point_at(nearest);
            let tile = (p.x / CHECKER_SIZE).floor() as i64 + (p.y / CHECKER_SIZE).floor() as i64;
            if tile.rem_euclid(2) == 1 {
                intensity *= 0.8;
            }
        }
        Rgb(item
            .color
            .map(|c| (f32::from(c) * intensity).clamp(0.0, 255.0) as u8))
    }
}

fn sky(dz: f32) -> Rgb<u8> {
    let t = dz.clamp(0.0, 1.0);
    let mut rgb = [0u8; 3];
    for (i, c) in rgb.iter_mut().enumerate() {
        *c = (SKY_HORIZON[i] + (SKY_ZENITH[i] - SKY_HORIZON[i]) * t) as u8;
    }
    Rgb(rgb)
}
