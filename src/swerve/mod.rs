// Swerve drivetrain core
//
// Provides:
// - Vector2 and angle restrictions
// - DriveWheel and SteeringGroup, the per-cycle actuator state machines
// - The chained-motorcycle steering strategy
// - Chassis, which owns the groups and runs the strategy every cycle

mod chassis;
mod group;
pub mod restriction;
pub mod strategy;
mod vector;
mod wheel;

#[cfg(test)]
pub(crate) mod testing;

pub use chassis::{Chassis, WheelGrouping, WheelLocation};
pub use group::{SteerSettings, SteeringGroup};
pub use restriction::{AngleRestriction, RestrictionConfig, Unrestricted, WedgeRestriction};
pub use strategy::{ChainedMotorcycleStrategy, SteerSelection, SteeringStrategy};
pub use vector::Vector2;
pub use wheel::{DriveSettings, DriveWheel};

use tracing::{error, warn};

use crate::error::ActuatorError;

/// Hardware failures never abort a cycle; they are logged and the step skipped
fn log_actuator_failure(channel: &str, action: &str, err: &ActuatorError) {
    if err.is_timeout() {
        warn!("{}: {} skipped this cycle: {}", channel, action, err);
    } else {
        error!("{}: {} failed: {}", channel, action, err);
    }
}
