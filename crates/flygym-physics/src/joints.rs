//! Hinge and weld joints between body segments.
//!
//! Every hinge is a Rapier revolute joint whose local frames put the hinge
//! axis on the frame's X axis, so `JointAxis::AngX` is the DoF. Joint angles
//! and rates are measured from the body poses rather than from the motor
//! state, which keeps them valid whatever controller drives the joint.

use std::f32::consts::PI;

use flygym_ir::Vec3;
use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
use rapier3d::dynamics::{GenericJoint, GenericJointBuilder, JointAxesMask, JointAxis, MotorModel};

/// Convert an IR vector to a Rapier vector.
pub fn to_vector(v: Vec3) -> Vector3<f32> {
    Vector3::new(v.x as f32, v.y as f32, v.z as f32)
}

/// Convert an IR vector to a Rapier point.
pub fn to_point(v: Vec3) -> Point3<f32> {
    Point3::new(v.x as f32, v.y as f32, v.z as f32)
}

/// Frame at `anchor` whose X axis is `axis`.
pub fn hinge_frame(anchor: Vector3<f32>, axis: Vector3<f32>) -> Isometry3<f32> {
    let rotation = UnitQuaternion::rotation_between(&Vector3::x(), &axis)
        .unwrap_or_else(|| UnitQuaternion::from_axis_angle(&Vector3::z_axis(), PI));
    Isometry3::from_parts(Translation3::from(anchor), rotation)
}

/// Revolute joint about the X axis of both local frames.
///
/// `range` is in degrees, as in the body description.
pub fn hinge_joint(
    frame1: Isometry3<f32>,
    frame2: Isometry3<f32>,
    range: Option<(f64, f64)>,
) -> GenericJoint {
    let mut builder = GenericJointBuilder::new(JointAxesMask::LOCKED_REVOLUTE_AXES)
        .local_frame1(frame1)
        .local_frame2(frame2)
        .contacts_enabled(false)
        .motor_model(JointAxis::AngX, MotorModel::AccelerationBased);

    if let Some((lower, upper)) = range {
        builder = builder.limits(
            JointAxis::AngX,
            [lower.to_radians() as f32, upper.to_radians() as f32],
        );
    }

    builder.build()
}

/// Weld between two bodies.
pub fn fixed_joint(frame1: Isometry3<f32>, frame2: Isometry3<f32>) -> GenericJoint {
    GenericJointBuilder::new(JointAxesMask::LOCKED_FIXED_AXES)
        .local_frame1(frame1)
        .local_frame2(frame2)
        .contacts_enabled(false)
        .build()
}

/// Wrap an angle to `(-π, π]`.
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI {
        wrapped + 2.0 * PI
    } else {
        wrapped
    }
}

/// Hinge angle between two bodies given their poses and local joint frames.
pub fn hinge_angle(
    pos1: &Isometry3<f32>,
    frame1: &Isometry3<f32>,
    pos2: &Isometry3<f32>,
    frame2: &Isometry3<f32>,
) -> f32 {
    let world1 = pos1 * frame1;
    let world2 = pos2 * frame2;
    let rel = world1.rotation.inverse() * world2.rotation;
    wrap_angle(2.0 * rel.i.atan2(rel.w))
}

/// World-space direction of a hinge axis.
pub fn hinge_axis(pos1: &Isometry3<f32>, frame1: &Isometry3<f32>) -> Vector3<f32> {
    (pos1 * frame1).rotation * Vector3::x()
}

/// Hinge rate from the angular velocities of both bodies.
pub fn hinge_rate(
    pos1: &Isometry3<f32>,
    frame1: &Isometry3<f32>,
    angvel1: &Vector3<f32>,
    angvel2: &Vector3<f32>,
) -> f32 {
    (angvel2 - angvel1).dot(&hinge_axis(pos1, frame1))
}

/// Pose of the child body for a given hinge angle.
pub fn child_pose(
    parent: &Isometry3<f32>,
    frame1: &Isometry3<f32>,
    angle: f32,
    frame2: &Isometry3<f32>,
) -> Isometry3<f32> {
    let hinge = Isometry3::from_parts(
        Translation3::identity(),
        UnitQuaternion::from_axis_angle(&Vector3::x_axis(), angle),
    );
    parent * frame1 * hinge * frame2.inverse()
}

/// Pose of a welded child body.
pub fn welded_pose(
    parent: &Isometry3<f32>,
    frame1: &Isometry3<f32>,
    frame2: &Isometry3<f32>,
) -> Isometry3<f32> {
    parent * frame1 * frame2.inverse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_hinge_frame_aligns_axis() {
        for axis in [
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(-1.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, -1.0),
        ] {
            let frame = hinge_frame(Vector3::new(1.0, 2.0, 3.0), axis);
            assert_relative_eq!(frame.rotation * Vector3::x(), axis, epsilon = 1e-6);
            assert_relative_eq!(frame.translation.vector, Vector3::new(1.0, 2.0, 3.0));
        }
    }

    #[test]
    fn test_forward_kinematics_roundtrip() {
        let parent = Isometry3::new(Vector3::new(10.0, -5.0, 300.0), Vector3::new(0.1, 0.2, 0.3));
        let frame1 = hinge_frame(Vector3::new(0.0, 60.0, -100.0), Vector3::new(0.0, 1.0, 0.0));
        let frame2 = hinge_frame(Vector3::zeros(), Vector3::new(0.0, 1.0, 0.0));

        for angle in [-2.5_f32, -0.7, 0.0, 0.4, 3.0] {
            let child = child_pose(&parent, &frame1, angle, &frame2);
            let measured = hinge_angle(&parent, &frame1, &child, &frame2);
            assert_relative_eq!(measured, angle, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_zero_angle_keeps_child_at_anchor() {
        let parent = Isometry3::translation(0.0, 0.0, 300.0);
        let frame1 = hinge_frame(Vector3::new(250.0, 120.0, -100.0), Vector3::new(0.0, 0.0, 1.0));
        let frame2 = hinge_frame(Vector3::zeros(), Vector3::new(0.0, 0.0, 1.0));
        let child = child_pose(&parent, &frame1, 0.0, &frame2);
        assert_relative_eq!(
            child.translation.vector,
            Vector3::new(250.0, 120.0, 200.0),
            epsilon = 1e-3
        );
        assert_relative_eq!(child.rotation.angle(), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_hinge_rate_projects_on_axis() {
        let pos = Isometry3::identity();
        let frame = hinge_frame(Vector3::zeros(), Vector3::new(0.0, -1.0, 0.0));
        let rate = hinge_rate(
            &pos,
            &frame,
            &Vector3::new(0.0, 1.0, 0.0),
            &Vector3::new(5.0, -2.0, 0.0),
        );
        assert_relative_eq!(rate, 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_wrap_angle() {
        assert_relative_eq!(wrap_angle(0.5), 0.5);
        assert_relative_eq!(wrap_angle(2.0 * PI + 0.5), 0.5, epsilon = 1e-5);
        assert_relative_eq!(wrap_angle(-PI - 0.5), PI - 0.5, epsilon = 1e-5);
        assert_relative_eq!(wrap_angle(PI), PI, epsilon = 1e-6);
    }

    #[test]
    fn test_hinge_joint_limits() {
        let frame = hinge_frame(Vector3::zeros(), Vector3::x());
        let joint = hinge_joint(frame, frame, Some((-90.0, 45.0)));
        let limits = joint.limits(JointAxis::AngX).map(|l| (l.min, l.max));
        let (lo, hi) = limits.unwrap();
        assert_relative_eq!(lo, -std::f32::consts::FRAC_PI_2, epsilon = 1e-6);
        assert_relative_eq!(hi, std::f32::consts::FRAC_PI_4, epsilon = 1e-6);
    }
}
