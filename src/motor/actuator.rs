// Capabilities the swerve core needs from its hardware
//
// One implementation per actuator family: the Feetech serial bus in `driver`
// and a kinematic stand-in in `sim`.

use crate::error::ActuatorError;
use crate::pid::PidGains;

pub type Result<T> = std::result::Result<T, ActuatorError>;

/// Steering motor plus its absolute angle sensor
pub trait SteerActuator {
    /// Open-loop command in [-1, 1]
    fn write_raw(&mut self, value: f64) -> Result<()>;

    /// Current steering angle in radians, 0 = straight ahead
    fn read_angle(&mut self) -> Result<f64>;
}

/// Drive motor with its own velocity loop
pub trait DriveActuator {
    /// Open-loop command in [-1, 1], bypassing the velocity loop
    fn write_raw(&mut self, value: f64) -> Result<()>;

    /// Closed-loop velocity target in the actuator's native unit
    fn write_velocity(&mut self, native: f64) -> Result<()>;

    /// Measured velocity in the actuator's native unit
    fn read_velocity(&mut self) -> Result<f64>;

    /// Push gains to an onboard velocity loop. Families without tunable
    /// onboard gains ignore this.
    fn set_gains(&mut self, _gains: PidGains) -> Result<()> {
        Ok(())
    }
}
