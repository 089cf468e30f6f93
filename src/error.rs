// Error types shared by the swerve core, the hardware layer and the config loader

use crate::motor::feetech::FeetechError;

/// Failure talking to a steering or drive actuator.
///
/// Never escapes a control cycle: groups and wheels log it and skip the write.
#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[error("Timeout communicating with actuator {channel}")]
    Timeout { channel: String },

    #[error("Actuator bus error: {0}")]
    Bus(FeetechError),
}

impl ActuatorError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ActuatorError::Timeout { .. })
    }
}

impl From<FeetechError> for ActuatorError {
    fn from(err: FeetechError) -> Self {
        match err {
            FeetechError::Timeout { id } => ActuatorError::Timeout {
                channel: format!("motor {}", id),
            },
            other => ActuatorError::Bus(other),
        }
    }
}

/// Rejected construction of a restriction, group, wheel, chassis or tuning entry
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConstructionError {
    #[error("Wedge bounds must be finite, got ({start}, {end})")]
    NonFiniteWedge { start: f64, end: f64 },

    #[error("Name {0:?} must not be empty or contain a comma")]
    InvalidName(String),

    #[error("Steering group {0} has no wheels")]
    EmptyGroup(String),

    #[error("{what} must be positive and finite, got {value}")]
    NonPositive { what: &'static str, value: f64 },

    #[error("Wheel {0} has a non-finite position")]
    NonFinitePosition(String),

    #[error("Chassis needs at least one steering group")]
    NoGroups,

    #[error("Steering group name {0} is used twice")]
    DuplicateGroup(String),

    #[error("Wheel location {0} appears more than once")]
    DuplicateWheel(String),

    #[error("No wheel configured for location {0}")]
    MissingWheel(String),
}

/// Errors assembling a chassis from its configuration
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error("Actuator setup failed: {0}")]
    Actuator(#[from] ActuatorError),
}

/// Errors loading a robot configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(#[from] ConstructionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_timeout_becomes_actuator_timeout() {
        let err = ActuatorError::from(FeetechError::Timeout { id: 4 });
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Timeout communicating with actuator motor 4");
    }

    #[test]
    fn test_other_bus_errors_stay_bus_errors() {
        let err = ActuatorError::from(FeetechError::ChecksumMismatch { id: 2 });
        assert!(!err.is_timeout());
        assert!(matches!(err, ActuatorError::Bus(_)));
    }
}
