//! Naming conventions for legs, degrees of freedom and actuators.

/// Legs in canonical order: left then right, front to hind.
pub const LEGS: [&str; 6] = ["LF", "LM", "LH", "RF", "RM", "RH"];

/// Actuatable DoFs of one leg, proximal to distal.
pub const LEG_DOFS: [&str; 7] = [
    "Coxa",
    "Coxa_roll",
    "Coxa_yaw",
    "Femur",
    "Femur_roll",
    "Tibia",
    "Tarsus1",
];

/// Joint name of a leg DoF, e.g. `joint_LFCoxa_roll`.
pub fn leg_joint(leg: &str, dof: &str) -> String {
    format!("joint_{leg}{dof}")
}

/// Every leg DoF, in the default actuation order (42 joints).
pub fn all_leg_dofs() -> Vec<String> {
    LEGS.iter()
        .flat_map(|leg| LEG_DOFS.iter().map(move |dof| leg_joint(leg, dof)))
        .collect()
}

/// Actuator name for a control mode and joint: `actuator_{control}_{joint}`.
pub fn actuator_name(control: &str, joint: &str) -> String {
    format!("actuator_{control}_{joint}")
}
