// Hardware-free actuators for running the runtime without a motor bus
//
// Steering integrates its raw command into an angle; drive velocity follows
// whatever it was last told. Good enough to watch the control loop behave.

use super::actuator::{DriveActuator, Result, SteerActuator};

pub struct SimSteer {
    angle: f64,
    max_rate: f64,
    period: f64,
}

impl SimSteer {
    /// `max_rate` is the slew rate in rad/s at full command, `period` the cycle time
    pub fn new(max_rate: f64, period: f64) -> Self {
        Self {
            angle: 0.0,
            max_rate,
            period,
        }
    }
}

impl SteerActuator for SimSteer {
    fn write_raw(&mut self, value: f64) -> Result<()> {
        self.angle += value.clamp(-1.0, 1.0) * self.max_rate * self.period;
        Ok(())
    }

    fn read_angle(&mut self) -> Result<f64> {
        Ok(self.angle)
    }
}

pub struct SimDrive {
    velocity: f64,
    max_native: f64,
}

impl SimDrive {
    /// `max_native` is the velocity reached at full raw command
    pub fn new(max_native: f64) -> Self {
        Self {
            velocity: 0.0,
            max_native,
        }
    }
}

impl DriveActuator for SimDrive {
    fn write_raw(&mut self, value: f64) -> Result<()> {
        self.velocity = value.clamp(-1.0, 1.0) * self.max_native;
        Ok(())
    }

    fn write_velocity(&mut self, native: f64) -> Result<()> {
        self.velocity = native.clamp(-self.max_native, self.max_native);
        Ok(())
    }

    fn read_velocity(&mut self) -> Result<f64> {
        Ok(self.velocity)
    }
}
