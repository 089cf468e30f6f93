// Swerve drivetrain runtime
//
// Steering groups, drive wheels and the chained-motorcycle strategy, driven
// at a fixed rate from motion commands received over zenoh.

pub mod assembly;
pub mod config;
pub mod error;
pub mod messages;
pub mod motor;
pub mod pid;
pub mod runtime;
pub mod swerve;
pub mod tuning;
