// Build a Chassis from a RobotConfig
//
// Wheels are placed by location, so the order in the config file does not
// matter. A chained group takes its steering motor, encoder zero and
// restriction from its first member.

use std::f64::consts::PI;

use tracing::info;

use crate::config::{RobotConfig, WheelConfig, loop_period};
use crate::error::{ActuatorError, BuildError, ConstructionError};
use crate::motor::{DriveActuator, FeetechDrive, FeetechSteer, SharedBus, SimDrive, SimSteer, SteerActuator};
use crate::swerve::{
    ChainedMotorcycleStrategy, Chassis, DriveWheel, SteeringGroup, SteeringStrategy,
};
use crate::tuning::TuningRegistry;

/// Makes the actuators for one wheel module
pub trait ActuatorFactory {
    fn steer(&mut self, wheel: &WheelConfig, zero_steps: u16) -> Result<Box<dyn SteerActuator>, ActuatorError>;
    fn drive(&mut self, wheel: &WheelConfig) -> Result<Box<dyn DriveActuator>, ActuatorError>;
}

/// Feetech motors sharing one serial bus
pub struct FeetechFactory {
    bus: SharedBus,
}

impl FeetechFactory {
    pub fn new(bus: SharedBus) -> Self {
        Self { bus }
    }
}

impl ActuatorFactory for FeetechFactory {
    fn steer(&mut self, wheel: &WheelConfig, zero_steps: u16) -> Result<Box<dyn SteerActuator>, ActuatorError> {
        Ok(Box::new(FeetechSteer::new(self.bus.clone(), wheel.steer_id, zero_steps)?))
    }

    fn drive(&mut self, wheel: &WheelConfig) -> Result<Box<dyn DriveActuator>, ActuatorError> {
        Ok(Box::new(FeetechDrive::new(self.bus.clone(), wheel.drive_id)?))
    }
}

/// Simulated actuators, all starting pointed straight ahead
pub struct SimFactory {
    period: f64,
    steer_rate: f64,
    max_native: f64,
}

impl SimFactory {
    pub fn new(config: &RobotConfig) -> Self {
        Self {
            period: loop_period(),
            steer_rate: PI,
            max_native: 2.0 * config.drive.max_speed * config.drive.units_per_meter(),
        }
    }
}

impl ActuatorFactory for SimFactory {
    fn steer(&mut self, _wheel: &WheelConfig, _zero_steps: u16) -> Result<Box<dyn SteerActuator>, ActuatorError> {
        Ok(Box::new(SimSteer::new(self.steer_rate, self.period)))
    }

    fn drive(&mut self, _wheel: &WheelConfig) -> Result<Box<dyn DriveActuator>, ActuatorError> {
        Ok(Box::new(SimDrive::new(self.max_native)))
    }
}

/// Assemble every group and wheel, registering their tuning overrides
/// as `steer_<group>` and `drive_<location>`
pub fn build_chassis(
    config: &RobotConfig,
    registry: &mut TuningRegistry,
    factory: &mut dyn ActuatorFactory,
) -> Result<Chassis, BuildError> {
    config.validate()?;
    let steer_settings = config.steer_settings();
    let drive_settings = config.drive_settings();

    let mut groups = Vec::new();
    for (name, members) in config.grouping.groups() {
        let lead = members
            .first()
            .and_then(|&location| config.wheel(location))
            .ok_or_else(|| ConstructionError::EmptyGroup(name.to_string()))?;

        let mut wheels = Vec::with_capacity(members.len());
        for location in members {
            let wheel = config
                .wheel(location)
                .ok_or_else(|| ConstructionError::MissingWheel(location.to_string()))?;
            let actuator = factory.drive(wheel)?;
            let tuning = registry.lookup(&format!("drive_{}", location))?;
            wheels.push(DriveWheel::new(
                location.name(),
                wheel.position,
                drive_settings,
                actuator,
                tuning,
            )?);
        }

        let zero_steps = lead.zero_steps.unwrap_or(config.steering.zero_steps);
        let actuator = factory.steer(lead, zero_steps)?;
        let tuning = registry.lookup(&format!("steer_{}", name))?;
        let group = SteeringGroup::new(
            name,
            wheels,
            lead.restriction.build()?,
            steer_settings,
            actuator,
            tuning,
        )?;
        info!(
            "Steering group {}: {} wheel(s) on steering motor {}",
            name,
            group.wheels().len(),
            lead.steer_id
        );
        groups.push(group);
    }

    let strategy: Box<dyn SteeringStrategy> = match config.desaturate_to {
        Some(limit) => Box::new(ChainedMotorcycleStrategy::with_desaturation(limit)?),
        None => Box::new(ChainedMotorcycleStrategy::new()),
    };
    Ok(Chassis::new(groups, strategy)?)
}
