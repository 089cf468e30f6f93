// Feetech-backed steering and drive channels
//
// All channels share one serial bus. Drive motors normally run in velocity
// mode; a raw override flips them to PWM mode until the override ends.
// Steering motors stay in PWM mode and are closed by the software PID.

use std::cell::RefCell;
use std::f64::consts::TAU;
use std::rc::Rc;

use tracing::{debug, info, warn};

use super::actuator::{DriveActuator, Result, SteerActuator};
use super::feetech::{FeetechBus, FeetechError, MAX_PWM, OperatingMode, STEPS_PER_REVOLUTION};
use crate::pid::PidGains;

pub type SharedBus = Rc<RefCell<FeetechBus>>;

/// Open the serial bus and wrap it for sharing between channels
pub fn open_shared_bus(port: &str) -> std::result::Result<SharedBus, FeetechError> {
    info!("Opening motor bus on {}", port);
    Ok(Rc::new(RefCell::new(FeetechBus::open(port)?)))
}

fn to_pwm(value: f64) -> i16 {
    (value.clamp(-1.0, 1.0) * MAX_PWM as f64).round() as i16
}

/// Encoder steps -> radians around `zero_steps`, wrapped into (-pi, pi]
fn steps_to_angle(steps: u16, zero_steps: u16) -> f64 {
    let offset = steps as f64 - zero_steps as f64;
    let angle = offset / STEPS_PER_REVOLUTION * TAU;
    if angle > TAU / 2.0 {
        angle - TAU
    } else if angle <= -TAU / 2.0 {
        angle + TAU
    } else {
        angle
    }
}

/// Check the motor answers, then put it in `mode` with torque on
fn configure(bus: &SharedBus, id: u8, mode: OperatingMode) -> Result<()> {
    let mut bus = bus.borrow_mut();
    if !bus.ping(id)? {
        return Err(FeetechError::Timeout { id }.into());
    }
    bus.switch_mode(id, mode)?;
    Ok(())
}

/// Steering motor in PWM mode reading its own absolute position
pub struct FeetechSteer {
    bus: SharedBus,
    id: u8,
    zero_steps: u16,
}

impl FeetechSteer {
    /// `zero_steps` is the encoder reading with the wheel pointing forward
    pub fn new(bus: SharedBus, id: u8, zero_steps: u16) -> Result<Self> {
        debug!("Configuring steering motor {} (zero at {} steps)", id, zero_steps);
        configure(&bus, id, OperatingMode::Pwm)?;
        Ok(Self { bus, id, zero_steps })
    }
}

impl SteerActuator for FeetechSteer {
    fn write_raw(&mut self, value: f64) -> Result<()> {
        self.bus.borrow_mut().set_pwm(self.id, to_pwm(value))?;
        Ok(())
    }

    fn read_angle(&mut self) -> Result<f64> {
        let steps = self.bus.borrow_mut().get_position(self.id)?;
        Ok(steps_to_angle(steps, self.zero_steps))
    }
}

/// Remembers the first gains a drive was given and flags the first change
#[derive(Debug, Default)]
struct FixedGains {
    baseline: Option<PidGains>,
    warned: bool,
}

impl FixedGains {
    /// True once, the first time `gains` differ from the baseline
    fn changed(&mut self, gains: PidGains) -> bool {
        match self.baseline {
            None => {
                self.baseline = Some(gains);
                false
            }
            Some(baseline) if baseline != gains && !self.warned => {
                self.warned = true;
                true
            }
            _ => false,
        }
    }
}

/// Drive motor; native velocity unit is encoder steps per second
pub struct FeetechDrive {
    bus: SharedBus,
    id: u8,
    mode: OperatingMode,
    gains: FixedGains,
}

impl FeetechDrive {
    pub fn new(bus: SharedBus, id: u8) -> Result<Self> {
        debug!("Configuring drive motor {}", id);
        configure(&bus, id, OperatingMode::Velocity)?;
        Ok(Self {
            bus,
            id,
            mode: OperatingMode::Velocity,
            gains: FixedGains::default(),
        })
    }

    fn ensure_mode(&mut self, mode: OperatingMode) -> Result<()> {
        if self.mode != mode {
            info!("Drive motor {} switching to {:?} mode", self.id, mode);
            self.bus.borrow_mut().switch_mode(self.id, mode)?;
            self.mode = mode;
        }
        Ok(())
    }
}

impl DriveActuator for FeetechDrive {
    fn write_raw(&mut self, value: f64) -> Result<()> {
        self.ensure_mode(OperatingMode::Pwm)?;
        self.bus.borrow_mut().set_pwm(self.id, to_pwm(value))?;
        Ok(())
    }

    fn write_velocity(&mut self, native: f64) -> Result<()> {
        self.ensure_mode(OperatingMode::Velocity)?;
        let steps = native.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        self.bus.borrow_mut().set_velocity(self.id, steps)?;
        Ok(())
    }

    fn read_velocity(&mut self) -> Result<f64> {
        Ok(self.bus.borrow_mut().get_velocity(self.id)? as f64)
    }

    // The STS velocity loop gains are not exposed over the bus
    fn set_gains(&mut self, gains: PidGains) -> Result<()> {
        if self.gains.changed(gains) {
            warn!(
                "Drive motor {} cannot be tuned, ignoring gains {:?}",
                self.id, gains
            );
        }
        Ok(())
    }
}

impl Drop for FeetechDrive {
    fn drop(&mut self) {
        // Leave the wheel stopped
        let stopped = match self.mode {
            OperatingMode::Velocity => self.bus.borrow_mut().set_velocity(self.id, 0),
            OperatingMode::Pwm => self.bus.borrow_mut().set_pwm(self.id, 0),
        };
        if let Err(e) = stopped {
            warn!("Failed to stop drive motor {} on drop: {}", self.id, e);
        }
    }
}

impl Drop for FeetechSteer {
    fn drop(&mut self) {
        if let Err(e) = self.bus.borrow_mut().set_pwm(self.id, 0) {
            warn!("Failed to stop steering motor {} on drop: {}", self.id, e);
        }
    }
}
