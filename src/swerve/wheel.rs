use tracing::{info, warn};

use super::{Vector2, log_actuator_failure};
use crate::error::ConstructionError;
use crate::motor::DriveActuator;
use crate::pid::PidGains;
use crate::tuning::OverrideHandle;

/// Per-wheel drive limits and unit conversion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveSettings {
    /// Target speed limit in m/s
    pub max_speed: f64,
    /// Actuator native velocity units per m/s of wheel surface speed
    pub units_per_meter: f64,
    /// Default gains for the actuator's velocity loop
    pub gains: PidGains,
}

impl DriveSettings {
    fn validate(&self) -> Result<(), ConstructionError> {
        for (what, value) in [
            ("Drive max speed", self.max_speed),
            ("Drive units per meter", self.units_per_meter),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConstructionError::NonPositive { what, value });
            }
        }
        Ok(())
    }
}

/// One wheel's drive motor: chases a target surface speed every cycle
pub struct DriveWheel {
    name: String,
    position: Vector2,
    settings: DriveSettings,
    target_velocity: f64,
    measured_velocity: f64,
    raw_control: bool,
    actuator: Box<dyn DriveActuator>,
    tuning: OverrideHandle,
}

impl DriveWheel {
    /// `position` is the wheel's contact point relative to the robot center, in meters
    pub fn new(
        name: &str,
        position: Vector2,
        settings: DriveSettings,
        actuator: Box<dyn DriveActuator>,
        tuning: OverrideHandle,
    ) -> Result<Self, ConstructionError> {
        if name.is_empty() {
            return Err(ConstructionError::InvalidName(name.to_string()));
        }
        if !position.is_finite() {
            return Err(ConstructionError::NonFinitePosition(name.to_string()));
        }
        settings.validate()?;

        Ok(Self {
            name: name.to_string(),
            position,
            settings,
            target_velocity: 0.0,
            measured_velocity: 0.0,
            raw_control: false,
            actuator,
            tuning,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Vector2 {
        self.position
    }

    /// Target surface speed in m/s, already clamped
    pub fn target_velocity(&self) -> f64 {
        self.target_velocity
    }

    /// Last successfully read surface speed in m/s
    pub fn measured_velocity(&self) -> f64 {
        self.measured_velocity
    }

    /// Set the target speed in m/s and push it to the actuator
    pub fn set_velocity(&mut self, velocity: f64) {
        self.target_velocity = if velocity.is_finite() {
            velocity.clamp(-self.settings.max_speed, self.settings.max_speed)
        } else {
            warn!("{}: ignoring non-finite velocity {}, stopping", self.name, velocity);
            0.0
        };
        self.update();
    }

    pub fn update(&mut self) {
        match self.actuator.read_velocity() {
            Ok(native) => {
                self.measured_velocity = native / self.settings.units_per_meter;
                self.tuning.report_value(self.measured_velocity);
            }
            Err(e) => log_actuator_failure(&self.name, "velocity read", &e),
        }

        let gains = self.tuning.gains(self.settings.gains);
        if let Err(e) = self.actuator.set_gains(gains) {
            log_actuator_failure(&self.name, "gain update", &e);
        }

        let written = match self.tuning.raw_override() {
            Some(raw) => {
                if !self.raw_control {
                    info!("{}: remote raw control engaged", self.name);
                    self.raw_control = true;
                }
                self.actuator.write_raw(raw.clamp(-1.0, 1.0))
            }
            None => {
                if self.raw_control {
                    info!("{}: back to velocity control", self.name);
                    self.raw_control = false;
                }
                let setpoint = self
                    .tuning
                    .resolve_setpoint(self.target_velocity * self.settings.units_per_meter);
                self.actuator.write_velocity(setpoint)
            }
        };
        if let Err(e) = written {
            log_actuator_failure(&self.name, "write", &e);
        }
    }
}
