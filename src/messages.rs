// Define message types for the runtime

use serde::{Deserialize, Serialize};

use crate::swerve::Vector2;

// Command from teleop/scripts -> runtime
// Robot frame: x_vel to the right, y_vel forward (m/s); rotation in rad/s, positive clockwise
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct MotionCommand {
    pub x_vel: f64,
    pub y_vel: f64,
    pub rotation: f64,
}

impl MotionCommand {
    pub fn direction(&self) -> Vector2 {
        Vector2::new(self.x_vel, self.y_vel)
    }
}

// Snapshot published by the runtime after every cycle
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ChassisState {
    pub direction: Vector2,
    pub rotation: f64,
    pub groups: Vec<GroupState>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupState {
    pub name: String,
    pub target_angle: f64,
    pub measured_angle: f64,
    pub reverse_speed: bool,
    pub closed_loop: bool,
    pub safety_stop: bool,
    pub wheels: Vec<WheelState>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WheelState {
    pub name: String,
    pub target_velocity: f64,
    pub measured_velocity: f64,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}
