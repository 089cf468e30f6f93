// Timeouts, topics, motor configuration, robot geometry
use std::collections::HashSet;
use std::f64::consts::TAU;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ConfigError, ConstructionError};
use crate::motor::feetech::STEPS_PER_REVOLUTION;
use crate::pid::PidGains;
use crate::swerve::{DriveSettings, RestrictionConfig, SteerSettings, Vector2, WheelGrouping, WheelLocation};

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_BASE: &str = "swerve/cmd/base"; // commands
pub const TOPIC_RT_STATE: &str = "swerve/rt/state"; // chassis state
pub const TOPIC_HEALTH: &str = "swerve/state/health"; // health status

// Motor configuration
// Serial port for Feetech motor controller
pub const MOTOR_PORT: &str = "/dev/ttyUSB0";

// Enable hardware motor control (set to false for simulation/testing)
pub const MOTOR_ENABLED: bool = true;

/// Control period in seconds
pub fn loop_period() -> f64 {
    1.0 / LOOP_HZ as f64
}

/// One wheel module: where it sits and which motors drive it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WheelConfig {
    pub location: WheelLocation,
    /// Contact point relative to the robot center, meters (+x right, +y forward)
    pub position: Vector2,
    pub drive_id: u8,
    pub steer_id: u8,
    /// Steering limits; only the first wheel of a chained group is consulted
    #[serde(default)]
    pub restriction: RestrictionConfig,
    /// Overrides `SteeringConfig::zero_steps` for this wheel's steering encoder
    #[serde(default)]
    pub zero_steps: Option<u16>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SteeringConfig {
    pub gains: PidGains,
    pub output_scale: f64,
    /// Encoder reading with the wheel pointing forward
    pub zero_steps: u16,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            gains: PidGains::new(1.5, 0.0, 0.05, 0.0),
            output_scale: 0.2,
            zero_steps: 2048,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DriveConfig {
    /// m/s
    pub max_speed: f64,
    /// m
    pub wheel_radius: f64,
    pub gains: PidGains,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            max_speed: 1.0,
            wheel_radius: 0.05,
            gains: PidGains::new(1.0, 0.0, 0.0, 0.0),
        }
    }
}

impl DriveConfig {
    /// Encoder steps per second for one m/s of wheel surface speed
    pub fn units_per_meter(&self) -> f64 {
        STEPS_PER_REVOLUTION / (TAU * self.wheel_radius)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RobotConfig {
    #[serde(default)]
    pub grouping: WheelGrouping,
    pub wheels: Vec<WheelConfig>,
    #[serde(default)]
    pub steering: SteeringConfig,
    #[serde(default)]
    pub drive: DriveConfig,
    /// Scale all wheel speeds together so none exceeds this (m/s)
    #[serde(default)]
    pub desaturate_to: Option<f64>,
}

impl Default for RobotConfig {
    fn default() -> Self {
        let wheels = WheelLocation::ALL
            .iter()
            .enumerate()
            .map(|(i, &location)| {
                let x = match location {
                    WheelLocation::FrontLeft | WheelLocation::RearLeft => -0.25,
                    WheelLocation::FrontRight | WheelLocation::RearRight => 0.25,
                };
                let y = match location {
                    WheelLocation::FrontLeft | WheelLocation::FrontRight => 0.25,
                    WheelLocation::RearLeft | WheelLocation::RearRight => -0.25,
                };
                WheelConfig {
                    location,
                    position: Vector2::new(x, y),
                    drive_id: i as u8 + 1,
                    steer_id: i as u8 + 11,
                    restriction: RestrictionConfig::Unrestricted,
                    zero_steps: None,
                }
            })
            .collect();

        Self {
            grouping: WheelGrouping::None,
            wheels,
            steering: SteeringConfig::default(),
            drive: DriveConfig::default(),
            desaturate_to: None,
        }
    }
}

impl RobotConfig {
    /// Read a JSON config file and validate it
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Loading robot config from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        let config: RobotConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check everything that can be checked without touching hardware
    pub fn validate(&self) -> Result<(), ConstructionError> {
        let mut seen = HashSet::new();
        for wheel in &self.wheels {
            if !seen.insert(wheel.location) {
                return Err(ConstructionError::DuplicateWheel(wheel.location.to_string()));
            }
            if !wheel.position.is_finite() {
                return Err(ConstructionError::NonFinitePosition(wheel.location.to_string()));
            }
            wheel.restriction.build()?;
        }
        for location in WheelLocation::ALL {
            if !seen.contains(&location) {
                return Err(ConstructionError::MissingWheel(location.to_string()));
            }
        }

        for (what, value) in [
            ("Drive max speed", self.drive.max_speed),
            ("Wheel radius", self.drive.wheel_radius),
            ("Steering output scale", self.steering.output_scale),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConstructionError::NonPositive { what, value });
            }
        }
        if let Some(limit) = self.desaturate_to {
            if !(limit.is_finite() && limit > 0.0) {
                return Err(ConstructionError::NonPositive {
                    what: "Desaturation limit",
                    value: limit,
                });
            }
        }
        Ok(())
    }

    pub fn wheel(&self, location: WheelLocation) -> Option<&WheelConfig> {
        self.wheels.iter().find(|w| w.location == location)
    }

    pub fn steer_settings(&self) -> SteerSettings {
        SteerSettings {
            gains: self.steering.gains,
            output_scale: self.steering.output_scale,
        }
    }

    pub fn drive_settings(&self) -> DriveSettings {
        DriveSettings {
            max_speed: self.drive.max_speed,
            units_per_meter: self.drive.units_per_meter(),
            gains: self.drive.gains,
        }
    }
}
