// Remote PID tuning: per-actuator overrides and the registry that owns them
//
// A tuning console can replace the gains of any named controller, substitute
// its setpoint, or take raw control of the actuator entirely. The registry owns
// every override; steering groups and drive wheels only hold weak handles and
// fall back to their local behaviour once the registry is gone.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConstructionError;
use crate::pid::PidGains;

/// What a tuning session substitutes for local control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteMode {
    #[default]
    None,
    /// Controller chases `remote_setpoint` instead of the local setpoint
    Setpoint,
    /// Controller is bypassed, `remote_raw_value` goes straight to the actuator
    RawValue,
}

/// Tuning state of one named controller.
///
/// Two overrides with the same name are the same logical config.
#[derive(Debug, Clone)]
pub struct PidOverride {
    name: String,
    gains: PidGains,
    override_gains: bool,
    local_setpoint: f64,
    local_value: f64,
    remote_mode: RemoteMode,
    remote_setpoint: f64,
    remote_raw_value: f64,
}

impl PidOverride {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            gains: PidGains::default(),
            override_gains: false,
            local_setpoint: 0.0,
            local_value: 0.0,
            remote_mode: RemoteMode::None,
            remote_setpoint: 0.0,
            remote_raw_value: 0.0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn p(&self, default: f64) -> f64 {
        if self.override_gains { self.gains.p } else { default }
    }

    pub fn i(&self, default: f64) -> f64 {
        if self.override_gains { self.gains.i } else { default }
    }

    pub fn d(&self, default: f64) -> f64 {
        if self.override_gains { self.gains.d } else { default }
    }

    pub fn f(&self, default: f64) -> f64 {
        if self.override_gains { self.gains.f } else { default }
    }

    /// Tuned gains if a session pushed some, otherwise `defaults`
    pub fn gains(&self, defaults: PidGains) -> PidGains {
        if self.override_gains { self.gains } else { defaults }
    }

    pub fn set_pid(&mut self, gains: PidGains) {
        self.gains = gains;
        self.override_gains = true;
    }

    /// Feedback value shown to the tuning console (sensor reading)
    pub fn set_value(&mut self, value: f64) {
        self.local_value = value;
    }

    pub fn value(&self) -> f64 {
        self.local_value
    }

    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.local_setpoint = setpoint;
    }

    /// Setpoint the controller should chase: the remote one in `Setpoint` mode
    pub fn setpoint(&self) -> f64 {
        match self.remote_mode {
            RemoteMode::Setpoint => self.remote_setpoint,
            RemoteMode::None | RemoteMode::RawValue => self.local_setpoint,
        }
    }

    pub fn local_setpoint(&self) -> f64 {
        self.local_setpoint
    }

    pub fn remote_mode(&self) -> RemoteMode {
        self.remote_mode
    }

    pub fn set_remote_mode(&mut self, mode: RemoteMode) {
        self.remote_mode = mode;
    }

    pub fn is_remote_control_enabled(&self) -> bool {
        self.remote_mode != RemoteMode::None
    }

    pub fn set_remote_setpoint(&mut self, setpoint: f64) {
        self.remote_setpoint = setpoint;
    }

    pub fn should_override_raw_control(&self) -> bool {
        self.remote_mode == RemoteMode::RawValue
    }

    pub fn remote_raw_value(&self) -> f64 {
        self.remote_raw_value
    }

    pub fn set_remote_raw_value(&mut self, value: f64) {
        self.remote_raw_value = value;
    }

    /// Drop tuned gains and remote control. Local setpoint and value are kept.
    pub fn reset(&mut self) {
        self.override_gains = false;
        self.remote_mode = RemoteMode::None;
    }
}

impl PartialEq for PidOverride {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for PidOverride {}

impl Hash for PidOverride {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Non-owning, name-keyed view of a registry entry held by an actuator.
///
/// Every accessor degrades to "no override" once the registry is dropped.
#[derive(Debug, Clone)]
pub struct OverrideHandle {
    entry: Weak<RefCell<PidOverride>>,
}

impl OverrideHandle {
    /// Handle that never overrides anything
    #[cfg(test)]
    pub fn detached() -> Self {
        Self { entry: Weak::new() }
    }

    fn with<R>(&self, f: impl FnOnce(&mut PidOverride) -> R) -> Option<R> {
        self.entry.upgrade().map(|entry| f(&mut entry.borrow_mut()))
    }

    pub fn gains(&self, defaults: PidGains) -> PidGains {
        self.with(|o| o.gains(defaults)).unwrap_or(defaults)
    }

    pub fn report_value(&self, value: f64) {
        self.with(|o| o.set_value(value));
    }

    /// Record the local setpoint and return the one the controller should use
    pub fn resolve_setpoint(&self, local: f64) -> f64 {
        self.with(|o| {
            o.set_setpoint(local);
            o.setpoint()
        })
        .unwrap_or(local)
    }

    /// The remote raw value, if the tuning session has taken raw control
    pub fn raw_override(&self) -> Option<f64> {
        self.with(|o| o.should_override_raw_control().then(|| o.remote_raw_value()))
            .flatten()
    }
}

/// One exchange with the tuning console.
///
/// `system` selects a controller by name; an empty name selects nothing.
/// The remote fields are additive and only applied when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TuningRequest {
    #[serde(default)]
    pub system: String,
    #[serde(default)]
    pub p: f64,
    #[serde(default)]
    pub i: f64,
    #[serde(default)]
    pub d: f64,
    #[serde(default)]
    pub f: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_mode: Option<RemoteMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_setpoint: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_raw_value: Option<f64>,
}

/// What the runtime reports back to the tuning console
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningStatus {
    /// Comma-separated names of every known controller
    pub subsystems: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setpoint: Option<f64>,
}

/// Owner of every PID override, keyed by name
#[derive(Debug, Default)]
pub struct TuningRegistry {
    entries: BTreeMap<String, Rc<RefCell<PidOverride>>>,
}

impl TuningRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn validate_name(name: &str) -> Result<(), ConstructionError> {
        if name.is_empty() || name.contains(',') {
            return Err(ConstructionError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    fn entry(&mut self, name: &str) -> Result<&Rc<RefCell<PidOverride>>, ConstructionError> {
        Self::validate_name(name)?;
        Ok(self.entries.entry(name.to_string()).or_insert_with(|| {
            debug!("Creating PID override {}", name);
            Rc::new(RefCell::new(PidOverride::new(name)))
        }))
    }

    /// Get the handle for `name`, creating the override on first use
    pub fn lookup(&mut self, name: &str) -> Result<OverrideHandle, ConstructionError> {
        let entry = self.entry(name)?;
        Ok(OverrideHandle {
            entry: Rc::downgrade(entry),
        })
    }

    /// Run `f` against the override called `name`, if it exists
    pub fn inspect<R>(&self, name: &str, f: impl FnOnce(&PidOverride) -> R) -> Option<R> {
        self.entries.get(name).map(|entry| f(&entry.borrow()))
    }

    pub fn modify<R>(&self, name: &str, f: impl FnOnce(&mut PidOverride) -> R) -> Option<R> {
        self.entries.get(name).map(|entry| f(&mut entry.borrow_mut()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of every override, comma-separated in sorted order
    pub fn names(&self) -> String {
        self.entries.keys().map(String::as_str).collect::<Vec<_>>().join(",")
    }

    /// Apply one tuning exchange and build the reply
    pub fn run_tuning(&mut self, request: &TuningRequest) -> Result<TuningStatus, ConstructionError> {
        if request.system.is_empty() {
            return Ok(TuningStatus {
                subsystems: self.names(),
                value: None,
                setpoint: None,
            });
        }

        let (value, setpoint) = {
            let mut config = self.entry(&request.system)?.borrow_mut();
            config.set_pid(PidGains::new(request.p, request.i, request.d, request.f));
            if let Some(setpoint) = request.remote_setpoint {
                config.set_remote_setpoint(setpoint);
            }
            if let Some(value) = request.remote_raw_value {
                config.set_remote_raw_value(value);
            }
            if let Some(mode) = request.remote_mode {
                if mode != config.remote_mode() {
                    info!("PID {} remote mode {:?} -> {:?}", config.name(), config.remote_mode(), mode);
                }
                config.set_remote_mode(mode);
            }
            (config.value(), config.setpoint())
        };

        Ok(TuningStatus {
            subsystems: self.names(),
            value: Some(value),
            setpoint: Some(setpoint),
        })
    }

    /// Undo every tuning edit at once
    pub fn reset_all(&mut self) {
        info!("Resetting {} PID overrides", self.entries.len());
        for entry in self.entries.values() {
            entry.borrow_mut().reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_returns_same_config() {
        let mut registry = TuningRegistry::new();
        let first = registry.lookup("front_left").unwrap();
        let second = registry.lookup("front_left").unwrap();
        assert_eq!(registry.len(), 1);

        registry.modify("front_left", |o| o.set_pid(PidGains::new(1.0, 2.0, 3.0, 4.0)));
        let defaults = PidGains::new(0.1, 0.0, 0.0, 0.0);
        assert_eq!(first.gains(defaults), PidGains::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(second.gains(defaults), first.gains(defaults));
    }

    #[test]
    fn test_equality_is_by_name() {
        let mut a = PidOverride::new("steer");
        let b = PidOverride::new("steer");
        a.set_pid(PidGains::new(9.0, 0.0, 0.0, 0.0));
        assert_eq!(a, b);
        assert_ne!(a, PidOverride::new("drive"));
    }

    #[test]
    fn test_rejects_comma_names() {
        let mut registry = TuningRegistry::new();
        assert_eq!(
            registry.lookup("front,left").unwrap_err(),
            ConstructionError::InvalidName("front,left".to_string())
        );
        assert!(registry.lookup("").is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_defaults_until_tuned() {
        let mut config = PidOverride::new("steer");
        assert_eq!(config.p(0.5), 0.5);
        assert_eq!(config.f(0.1), 0.1);
        config.set_pid(PidGains::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(config.p(0.5), 1.0);
        assert_eq!(config.i(0.0), 2.0);
        assert_eq!(config.d(0.0), 3.0);
        assert_eq!(config.f(0.1), 4.0);
    }

    #[test]
    fn test_reset_restores_defaults_and_keeps_local_state() {
        let mut config = PidOverride::new("steer");
        config.set_pid(PidGains::new(1.0, 0.0, 0.0, 0.0));
        config.set_remote_mode(RemoteMode::RawValue);
        config.set_remote_raw_value(0.7);
        config.set_setpoint(1.5);
        config.set_value(1.2);

        config.reset();

        assert_eq!(config.p(0.25), 0.25);
        assert!(!config.should_override_raw_control());
        assert!(!config.is_remote_control_enabled());
        assert_eq!(config.local_setpoint(), 1.5);
        assert_eq!(config.value(), 1.2);
    }

    #[test]
    fn test_setpoint_follows_remote_mode() {
        let mut config = PidOverride::new("steer");
        config.set_setpoint(1.0);
        config.set_remote_setpoint(-2.0);
        assert_eq!(config.setpoint(), 1.0);

        config.set_remote_mode(RemoteMode::Setpoint);
        assert_eq!(config.setpoint(), -2.0);
        assert_eq!(config.local_setpoint(), 1.0);

        config.set_remote_mode(RemoteMode::RawValue);
        assert_eq!(config.setpoint(), 1.0);
    }

    #[test]
    fn test_handle_raw_override() {
        let mut registry = TuningRegistry::new();
        let handle = registry.lookup("drive").unwrap();
        assert_eq!(handle.raw_override(), None);

        registry.modify("drive", |o| {
            o.set_remote_raw_value(0.3);
            o.set_remote_mode(RemoteMode::RawValue);
        });
        assert_eq!(handle.raw_override(), Some(0.3));

        registry.reset_all();
        assert_eq!(handle.raw_override(), None);
    }

    #[test]
    fn test_detached_handle_uses_local_behaviour() {
        let handle = {
            let mut registry = TuningRegistry::new();
            let handle = registry.lookup("steer").unwrap();
            registry.modify("steer", |o| o.set_remote_mode(RemoteMode::RawValue));
            handle
        };
        let defaults = PidGains::new(0.4, 0.0, 0.0, 0.0);
        assert_eq!(handle.gains(defaults), defaults);
        assert_eq!(handle.resolve_setpoint(0.8), 0.8);
        assert_eq!(handle.raw_override(), None);
        assert_eq!(OverrideHandle::detached().raw_override(), None);
    }

    #[test]
    fn test_run_tuning_exchange() {
        let mut registry = TuningRegistry::new();
        let steer = registry.lookup("steer_front").unwrap();
        registry.lookup("drive_front_left").unwrap();
        steer.report_value(0.4);
        steer.resolve_setpoint(0.5);

        let idle = registry.run_tuning(&TuningRequest::default()).unwrap();
        assert_eq!(idle.subsystems, "drive_front_left,steer_front");
        assert_eq!(idle.value, None);

        let request = TuningRequest {
            system: "steer_front".to_string(),
            p: 2.0,
            remote_mode: Some(RemoteMode::Setpoint),
            remote_setpoint: Some(1.0),
            ..Default::default()
        };
        let status = registry.run_tuning(&request).unwrap();
        assert_eq!(status.value, Some(0.4));
        assert_eq!(status.setpoint, Some(1.0));
        assert_eq!(steer.gains(PidGains::default()).p, 2.0);
        assert_eq!(steer.resolve_setpoint(0.5), 1.0);
    }

    #[test]
    fn test_run_tuning_creates_unknown_system() {
        let mut registry = TuningRegistry::new();
        let request: TuningRequest = serde_json::from_str(r#"{"system":"arm","p":0.3}"#).unwrap();
        registry.run_tuning(&request).unwrap();
        assert_eq!(registry.names(), "arm");
        assert_eq!(registry.inspect("arm", |o| o.p(0.0)), Some(0.3));
        assert_eq!(registry.inspect("arm", |o| o.remote_mode()), Some(RemoteMode::None));
    }
}
