use ::pid::Pid;
use tracing::{info, warn};

use super::{AngleRestriction, DriveWheel, Vector2, log_actuator_failure};
use crate::error::ConstructionError;
use crate::motor::SteerActuator;
use crate::pid::PidGains;
use crate::tuning::OverrideHandle;

/// Steering loop parameters shared by every group built from one config
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteerSettings {
    /// Default gains for the steering PID
    pub gains: PidGains,
    /// Multiplier applied to every command before it reaches the actuator
    pub output_scale: f64,
}

impl Default for SteerSettings {
    fn default() -> Self {
        Self {
            gains: PidGains::new(1.0, 0.0, 0.0, 0.0),
            output_scale: 1.0,
        }
    }
}

/// Wheels that share one steering actuator and therefore one angle.
///
/// `set_angle` takes the angle as given; picking a legal angle is the
/// strategy's job. The group only refuses to drive while its *measured*
/// angle is outside the restriction.
pub struct SteeringGroup {
    name: String,
    wheels: Vec<DriveWheel>,
    restriction: Box<dyn AngleRestriction>,
    settings: SteerSettings,
    target_angle: f64,
    measured_angle: f64,
    reverse_speed: bool,
    last_was_remote: bool,
    safety_stop: bool,
    controller: Pid<f64>,
    closed_loop: bool,
    actuator: Box<dyn SteerActuator>,
    tuning: OverrideHandle,
}

impl SteeringGroup {
    pub fn new(
        name: &str,
        wheels: Vec<DriveWheel>,
        restriction: Box<dyn AngleRestriction>,
        settings: SteerSettings,
        actuator: Box<dyn SteerActuator>,
        tuning: OverrideHandle,
    ) -> Result<Self, ConstructionError> {
        if name.is_empty() {
            return Err(ConstructionError::InvalidName(name.to_string()));
        }
        if wheels.is_empty() {
            return Err(ConstructionError::EmptyGroup(name.to_string()));
        }
        if !(settings.output_scale.is_finite() && settings.output_scale > 0.0) {
            return Err(ConstructionError::NonPositive {
                what: "Steering output scale",
                value: settings.output_scale,
            });
        }

        let mut group = Self {
            name: name.to_string(),
            wheels,
            restriction,
            settings,
            target_angle: 0.0,
            measured_angle: 0.0,
            reverse_speed: false,
            last_was_remote: false,
            safety_stop: false,
            controller: settings.gains.controller(),
            closed_loop: true,
            actuator,
            tuning,
        };
        group.refresh_measured_angle();
        group.target_angle = group.measured_angle;
        Ok(group)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wheels(&self) -> &[DriveWheel] {
        &self.wheels
    }

    pub fn wheels_mut(&mut self) -> &mut [DriveWheel] {
        &mut self.wheels
    }

    pub fn restriction(&self) -> &dyn AngleRestriction {
        self.restriction.as_ref()
    }

    /// Mean mounting position of the member wheels
    pub fn centroid(&self) -> Vector2 {
        Vector2::mean(self.wheels.iter().map(DriveWheel::position)).unwrap_or(Vector2::ZERO)
    }

    pub fn target_angle(&self) -> f64 {
        self.target_angle
    }

    /// Angle from the last successful sensor read, in radians
    pub fn measured_angle(&self) -> f64 {
        self.measured_angle
    }

    pub fn reverse_speed(&self) -> bool {
        self.reverse_speed
    }

    pub fn set_reverse_speed(&mut self, reverse: bool) {
        self.reverse_speed = reverse;
    }

    /// Whether the local PID is driving the actuator this cycle
    pub fn is_closed_loop(&self) -> bool {
        self.closed_loop
    }

    /// Whether the measured angle is currently outside the restriction
    pub fn is_safety_stopped(&self) -> bool {
        self.safety_stop
    }

    pub fn set_angle(&mut self, angle: f64) {
        self.target_angle = angle;
        self.update();
    }

    fn refresh_measured_angle(&mut self) {
        match self.actuator.read_angle() {
            Ok(angle) => {
                self.measured_angle = angle;
                self.tuning.report_value(angle);
            }
            Err(e) => log_actuator_failure(&self.name, "angle read", &e),
        }
    }

    /// Run one control cycle: pick the command source, apply the safety
    /// cutoff and write the actuator
    pub fn update(&mut self) {
        self.refresh_measured_angle();
        let gains = self.tuning.gains(self.settings.gains);
        gains.apply(&mut self.controller);

        let mut output = match self.tuning.raw_override() {
            Some(raw) => {
                if !self.last_was_remote {
                    info!("{}: remote raw control engaged", self.name);
                }
                self.last_was_remote = true;
                self.closed_loop = false;
                raw.clamp(-1.0, 1.0)
            }
            None => {
                if self.last_was_remote {
                    self.controller.reset_integral_term();
                }
                self.last_was_remote = false;
                self.closed_loop = true;
                let setpoint = self.tuning.resolve_setpoint(self.target_angle);
                gains.step(&mut self.controller, setpoint, self.measured_angle)
            }
        };

        let illegal = !self.restriction.is_valid(self.measured_angle);
        if illegal {
            self.last_was_remote = true;
            self.closed_loop = false;
            output = 0.0;
        }
        if illegal != self.safety_stop {
            if illegal {
                warn!(
                    "{}: measured angle {:.3} rad is outside its restriction, steering stopped",
                    self.name, self.measured_angle
                );
            } else {
                info!("{}: steering back inside its restriction", self.name);
            }
            self.safety_stop = illegal;
        }

        if let Err(e) = self.actuator.write_raw(output * self.settings.output_scale) {
            log_actuator_failure(&self.name, "write", &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swerve::testing::{SteerLog, recording_drive, recording_steer};
    use crate::swerve::{DriveSettings, Unrestricted, WedgeRestriction};
    use crate::tuning::{RemoteMode, TuningRegistry};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn wheel(name: &str, position: Vector2) -> DriveWheel {
        let (actuator, _) = recording_drive();
        let settings = DriveSettings {
            max_speed: 2.0,
            units_per_meter: 1.0,
            gains: PidGains::default(),
        };
        DriveWheel::new(name, position, settings, actuator, OverrideHandle::detached()).unwrap()
    }

    fn settings() -> SteerSettings {
        SteerSettings {
            gains: PidGains::new(0.5, 0.0, 0.0, 0.0),
            ..Default::default()
        }
    }

    fn group(
        restriction: Box<dyn AngleRestriction>,
        measured: f64,
        tuning: OverrideHandle,
    ) -> (SteeringGroup, Rc<RefCell<SteerLog>>) {
        let (actuator, log) = recording_steer(measured);
        let wheels = vec![
            wheel("fl", Vector2::new(-0.25, 0.25)),
            wheel("fr", Vector2::new(0.25, 0.25)),
        ];
        let group = SteeringGroup::new("front", wheels, restriction, settings(), actuator, tuning).unwrap();
        (group, log)
    }

    #[test]
    fn test_centroid_is_mean_of_wheels() {
        let (group, _) = group(Box::new(Unrestricted), 0.0, OverrideHandle::detached());
        assert_eq!(group.centroid(), Vector2::new(0.0, 0.25));
    }

    #[test]
    fn test_set_angle_stores_angle_verbatim() {
        let wedge = WedgeRestriction::new(-0.5, 0.5).unwrap();
        let (mut group, _) = group(Box::new(wedge), 0.0, OverrideHandle::detached());
        group.set_angle(2.0);
        assert_eq!(group.target_angle(), 2.0);
    }

    #[test]
    fn test_closed_loop_drives_toward_target() {
        let (mut group, log) = group(Box::new(Unrestricted), 0.2, OverrideHandle::detached());
        group.set_angle(1.0);
        // p = 0.5, error = 0.8
        assert!((log.borrow().last_write().unwrap() - 0.4).abs() < 1e-12);
        assert!(group.is_closed_loop());
    }

    #[test]
    fn test_raw_override_then_controller_reset() {
        let mut registry = TuningRegistry::new();
        let handle = registry.lookup("steer_front").unwrap();
        let (mut group, log) = group(Box::new(Unrestricted), 0.0, handle);

        registry.modify("steer_front", |o| {
            o.set_remote_raw_value(-3.0);
            o.set_remote_mode(RemoteMode::RawValue);
        });
        group.set_angle(1.0);
        assert_eq!(log.borrow().last_write(), Some(-1.0));
        assert!(!group.is_closed_loop());

        registry.reset_all();
        group.update();
        assert!(group.is_closed_loop());
        assert!((log.borrow().last_write().unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_integral_cleared_after_raw_control() {
        let mut registry = TuningRegistry::new();
        let handle = registry.lookup("steer_front").unwrap();
        let (actuator, log) = recording_steer(0.0);
        let settings = SteerSettings {
            gains: PidGains::new(0.0, 0.1, 0.0, 0.0),
            output_scale: 1.0,
        };
        let wheels = vec![wheel("fl", Vector2::ZERO)];
        let mut group = SteeringGroup::new("front", wheels, Box::new(Unrestricted), settings, actuator, handle).unwrap();

        group.set_angle(1.0);
        group.update();
        assert!((log.borrow().last_write().unwrap() - 0.2).abs() < 1e-12);

        registry.modify("steer_front", |o| o.set_remote_mode(RemoteMode::RawValue));
        group.update();
        registry.reset_all();
        group.update();
        assert!((log.borrow().last_write().unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_remote_setpoint_replaces_target() {
        let mut registry = TuningRegistry::new();
        let handle = registry.lookup("steer_front").unwrap();
        let (mut group, log) = group(Box::new(Unrestricted), 0.0, handle);
        registry.modify("steer_front", |o| {
            o.set_remote_setpoint(-1.0);
            o.set_remote_mode(RemoteMode::Setpoint);
        });
        group.set_angle(1.0);
        assert!((log.borrow().last_write().unwrap() + 0.5).abs() < 1e-12);
        assert_eq!(registry.inspect("steer_front", |o| o.local_setpoint()), Some(1.0));
        assert_eq!(registry.inspect("steer_front", |o| o.value()), Some(0.0));
    }

    #[test]
    fn test_illegal_measured_angle_stops_steering() {
        let wedge = WedgeRestriction::new(-0.5, 0.5).unwrap();
        let (mut group, log) = group(Box::new(wedge), 0.9, OverrideHandle::detached());
        group.set_angle(0.0);
        assert_eq!(log.borrow().last_write(), Some(0.0));
        assert!(!group.is_closed_loop());
        assert!(group.is_safety_stopped());

        // Back inside: the controller resumes from a clean state
        log.borrow_mut().angle = 0.4;
        group.update();
        assert!(group.is_closed_loop());
        assert!(!group.is_safety_stopped());
        assert!((log.borrow().last_write().unwrap() + 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_safety_cutoff_overrides_raw_control() {
        let mut registry = TuningRegistry::new();
        let handle = registry.lookup("steer_front").unwrap();
        let wedge = WedgeRestriction::new(-0.5, 0.5).unwrap();
        let (mut group, log) = group(Box::new(wedge), -0.7, handle);
        registry.modify("steer_front", |o| {
            o.set_remote_raw_value(0.8);
            o.set_remote_mode(RemoteMode::RawValue);
        });
        group.update();
        assert_eq!(log.borrow().last_write(), Some(0.0));
    }

    #[test]
    fn test_timeouts_keep_last_state() {
        let (mut group, log) = group(Box::new(Unrestricted), 0.3, OverrideHandle::detached());
        log.borrow_mut().fail_reads = true;
        log.borrow_mut().fail_writes = true;
        log.borrow_mut().angle = 1.2;
        group.set_angle(0.5);
        assert_eq!(group.measured_angle(), 0.3);
        assert_eq!(group.target_angle(), 0.5);
        assert!(log.borrow().writes.is_empty());
    }

    #[test]
    fn test_output_scale_applied() {
        let (actuator, log) = recording_steer(0.0);
        let settings = SteerSettings {
            gains: PidGains::new(1.0, 0.0, 0.0, 0.0),
            output_scale: 0.2,
        };
        let wheels = vec![wheel("fl", Vector2::ZERO)];
        let mut group =
            SteeringGroup::new("front", wheels, Box::new(Unrestricted), settings, actuator, OverrideHandle::detached())
                .unwrap();
        group.set_angle(0.5);
        assert!((log.borrow().last_write().unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_empty_group() {
        let (actuator, _) = recording_steer(0.0);
        let err = SteeringGroup::new(
            "front",
            Vec::new(),
            Box::new(Unrestricted),
            settings(),
            actuator,
            OverrideHandle::detached(),
        )
        .err()
        .unwrap();
        assert_eq!(err, ConstructionError::EmptyGroup("front".to_string()));
    }
}
