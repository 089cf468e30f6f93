use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{SteeringGroup, SteeringStrategy, Vector2};
use crate::error::ConstructionError;
use crate::messages::{ChassisState, GroupState, WheelState};

/// Corner of a four-wheel base
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WheelLocation {
    FrontLeft,
    FrontRight,
    RearLeft,
    RearRight,
}

impl WheelLocation {
    pub const ALL: [WheelLocation; 4] = [
        WheelLocation::FrontLeft,
        WheelLocation::FrontRight,
        WheelLocation::RearLeft,
        WheelLocation::RearRight,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WheelLocation::FrontLeft => "front_left",
            WheelLocation::FrontRight => "front_right",
            WheelLocation::RearLeft => "rear_left",
            WheelLocation::RearRight => "rear_right",
        }
    }
}

impl fmt::Display for WheelLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which wheels are mechanically chained to one steering actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WheelGrouping {
    /// Every wheel steers on its own
    #[default]
    None,
    FrontBack,
    LeftRight,
    All,
}

impl WheelGrouping {
    /// Group names and members, in a fixed order
    pub fn groups(self) -> Vec<(&'static str, Vec<WheelLocation>)> {
        use WheelLocation::*;
        match self {
            WheelGrouping::None => WheelLocation::ALL.iter().map(|&l| (l.name(), vec![l])).collect(),
            WheelGrouping::FrontBack => vec![
                ("front", vec![FrontLeft, FrontRight]),
                ("rear", vec![RearLeft, RearRight]),
            ],
            WheelGrouping::LeftRight => vec![
                ("left", vec![FrontLeft, RearLeft]),
                ("right", vec![FrontRight, RearRight]),
            ],
            WheelGrouping::All => vec![("all", WheelLocation::ALL.to_vec())],
        }
    }
}

/// The drivetrain: steering groups plus the strategy that commands them
pub struct Chassis {
    groups: Vec<SteeringGroup>,
    strategy: Box<dyn SteeringStrategy>,
    direction: Vector2,
    rotation: f64,
}

impl Chassis {
    pub fn new(
        groups: Vec<SteeringGroup>,
        strategy: Box<dyn SteeringStrategy>,
    ) -> Result<Self, ConstructionError> {
        if groups.is_empty() {
            return Err(ConstructionError::NoGroups);
        }
        let mut seen = HashSet::new();
        for group in &groups {
            if !seen.insert(group.name()) {
                return Err(ConstructionError::DuplicateGroup(group.name().to_string()));
            }
        }

        Ok(Self {
            groups,
            strategy,
            direction: Vector2::ZERO,
            rotation: 0.0,
        })
    }

    /// Store the commanded motion; takes effect on the next `update`
    pub fn set_motion(&mut self, direction: Vector2, rotation: f64) {
        if direction.is_finite() && rotation.is_finite() {
            self.direction = direction;
            self.rotation = rotation;
        } else {
            warn!(
                "Ignoring non-finite motion ({:?}, {}), stopping",
                direction, rotation
            );
            self.direction = Vector2::ZERO;
            self.rotation = 0.0;
        }
    }

    /// Run one control cycle across every group and wheel
    pub fn update(&mut self) {
        debug!(
            "Chassis update: direction ({:.3}, {:.3}), rotation {:.3}",
            self.direction.x, self.direction.y, self.rotation
        );
        self.strategy
            .apply(&mut self.groups, self.direction, self.rotation);
    }

    pub fn direction(&self) -> Vector2 {
        self.direction
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn groups(&self) -> &[SteeringGroup] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&SteeringGroup> {
        self.groups.iter().find(|g| g.name() == name)
    }

    pub fn state(&self) -> ChassisState {
        ChassisState {
            direction: self.direction,
            rotation: self.rotation,
            groups: self
                .groups
                .iter()
                .map(|group| GroupState {
                    name: group.name().to_string(),
                    target_angle: group.target_angle(),
                    measured_angle: group.measured_angle(),
                    reverse_speed: group.reverse_speed(),
                    closed_loop: group.is_closed_loop(),
                    safety_stop: group.is_safety_stopped(),
                    wheels: group
                        .wheels()
                        .iter()
                        .map(|wheel| WheelState {
                            name: wheel.name().to_string(),
                            target_velocity: wheel.target_velocity(),
                            measured_velocity: wheel.measured_velocity(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pid::PidGains;
    use crate::swerve::testing::{recording_drive, recording_steer};
    use crate::swerve::{ChainedMotorcycleStrategy, DriveSettings, DriveWheel, SteerSettings, Unrestricted};
    use crate::tuning::OverrideHandle;

    fn group(name: &str, positions: &[Vector2]) -> SteeringGroup {
        let wheels = positions
            .iter()
            .enumerate()
            .map(|(i, &position)| {
                let (actuator, _) = recording_drive();
                let wheel_name = format!("{}_{}", name, i);
                let settings = DriveSettings {
                    max_speed: 3.0,
                    units_per_meter: 1.0,
                    gains: PidGains::default(),
                };
                DriveWheel::new(&wheel_name, position, settings, actuator, OverrideHandle::detached())
                    .unwrap()
            })
            .collect();
        let (actuator, _) = recording_steer(0.0);
        SteeringGroup::new(
            name,
            wheels,
            Box::new(Unrestricted),
            SteerSettings::default(),
            actuator,
            OverrideHandle::detached(),
        )
        .unwrap()
    }

    fn strategy() -> Box<dyn SteeringStrategy> {
        Box::new(ChainedMotorcycleStrategy::new())
    }

    #[test]
    fn test_groupings_cover_every_wheel_once() {
        for grouping in [
            WheelGrouping::None,
            WheelGrouping::FrontBack,
            WheelGrouping::LeftRight,
            WheelGrouping::All,
        ] {
            let mut members: Vec<WheelLocation> = grouping.groups().into_iter().flat_map(|(_, m)| m).collect();
            members.sort();
            assert_eq!(members, WheelLocation::ALL.to_vec(), "{:?}", grouping);
        }
        assert_eq!(WheelGrouping::None.groups().len(), 4);
        assert_eq!(WheelGrouping::All.groups().len(), 1);
    }

    #[test]
    fn test_location_names() {
        assert_eq!(WheelLocation::RearLeft.to_string(), "rear_left");
        let parsed: WheelLocation = serde_json::from_str("\"front_right\"").unwrap();
        assert_eq!(parsed, WheelLocation::FrontRight);
    }

    #[test]
    fn test_rejects_empty_and_duplicate_groups() {
        assert_eq!(Chassis::new(Vec::new(), strategy()).err(), Some(ConstructionError::NoGroups));

        let groups = vec![group("a", &[Vector2::ZERO]), group("a", &[Vector2::new(1.0, 0.0)])];
        assert_eq!(
            Chassis::new(groups, strategy()).err(),
            Some(ConstructionError::DuplicateGroup("a".to_string()))
        );
    }

    #[test]
    fn test_update_drives_every_wheel() {
        let groups = vec![
            group("left", &[Vector2::new(-0.25, 0.25), Vector2::new(-0.25, -0.25)]),
            group("right", &[Vector2::new(0.25, 0.25), Vector2::new(0.25, -0.25)]),
        ];
        let mut chassis = Chassis::new(groups, strategy()).unwrap();
        chassis.set_motion(Vector2::new(0.0, 1.0), 0.0);
        chassis.update();

        let state = chassis.state();
        assert_eq!(state.groups.len(), 2);
        for group in &state.groups {
            assert_eq!(group.target_angle, 0.0);
            for wheel in &group.wheels {
                assert_eq!(wheel.target_velocity, 1.0);
            }
        }
        assert!(chassis.group("right").is_some());
        assert!(chassis.group("front").is_none());
    }

    #[test]
    fn test_non_finite_motion_stops() {
        let mut chassis = Chassis::new(vec![group("solo", &[Vector2::ZERO])], strategy()).unwrap();
        chassis.set_motion(Vector2::new(1.0, 0.0), 0.5);
        chassis.set_motion(Vector2::new(f64::NAN, 0.0), 0.5);
        assert_eq!(chassis.direction(), Vector2::ZERO);
        assert_eq!(chassis.rotation(), 0.0);

        chassis.update();
        assert_eq!(chassis.groups()[0].wheels()[0].target_velocity().abs(), 0.0);
    }
}
