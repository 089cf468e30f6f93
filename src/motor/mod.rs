// Motor layer for the swerve base
//
// Provides:
// - Actuator capabilities consumed by the swerve core
// - Feetech STS serial protocol and the channels built on it
// - Simulated actuators for running without hardware

pub mod actuator;
mod driver;
pub mod feetech;
pub mod sim;

pub use actuator::{DriveActuator, SteerActuator};
pub use driver::{FeetechDrive, FeetechSteer, SharedBus, open_shared_bus};
pub use feetech::{FeetechBus, FeetechError};
pub use sim::{SimDrive, SimSteer};
