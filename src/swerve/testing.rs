// Recording actuators for the swerve unit tests

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::ActuatorError;
use crate::motor::actuator::{DriveActuator, Result, SteerActuator};
use crate::pid::PidGains;

fn timeout(channel: &str) -> ActuatorError {
    ActuatorError::Timeout {
        channel: channel.to_string(),
    }
}

#[derive(Debug, Default)]
pub struct SteerLog {
    pub angle: f64,
    pub writes: Vec<f64>,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

impl SteerLog {
    pub fn last_write(&self) -> Option<f64> {
        self.writes.last().copied()
    }
}

pub struct RecordingSteer(Rc<RefCell<SteerLog>>);

pub fn recording_steer(angle: f64) -> (Box<dyn SteerActuator>, Rc<RefCell<SteerLog>>) {
    let log = Rc::new(RefCell::new(SteerLog {
        angle,
        ..Default::default()
    }));
    (Box::new(RecordingSteer(log.clone())), log)
}

impl SteerActuator for RecordingSteer {
    fn write_raw(&mut self, value: f64) -> Result<()> {
        let mut log = self.0.borrow_mut();
        if log.fail_writes {
            return Err(timeout("test steer"));
        }
        log.writes.push(value);
        Ok(())
    }

    fn read_angle(&mut self) -> Result<f64> {
        let log = self.0.borrow();
        if log.fail_reads {
            return Err(timeout("test steer"));
        }
        Ok(log.angle)
    }
}

#[derive(Debug, Default)]
pub struct DriveLog {
    pub velocity: f64,
    pub raw_writes: Vec<f64>,
    pub velocity_writes: Vec<f64>,
    pub gains: Vec<PidGains>,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

impl DriveLog {
    pub fn last_velocity(&self) -> Option<f64> {
        self.velocity_writes.last().copied()
    }
}

pub struct RecordingDrive(Rc<RefCell<DriveLog>>);

pub fn recording_drive() -> (Box<dyn DriveActuator>, Rc<RefCell<DriveLog>>) {
    let log = Rc::new(RefCell::new(DriveLog::default()));
    (Box::new(RecordingDrive(log.clone())), log)
}

impl DriveActuator for RecordingDrive {
    fn write_raw(&mut self, value: f64) -> Result<()> {
        let mut log = self.0.borrow_mut();
        if log.fail_writes {
            return Err(timeout("test drive"));
        }
        log.raw_writes.push(value);
        Ok(())
    }

    fn write_velocity(&mut self, native: f64) -> Result<()> {
        let mut log = self.0.borrow_mut();
        if log.fail_writes {
            return Err(timeout("test drive"));
        }
        log.velocity_writes.push(native);
        Ok(())
    }

    fn read_velocity(&mut self) -> Result<f64> {
        let log = self.0.borrow();
        if log.fail_reads {
            return Err(timeout("test drive"));
        }
        Ok(log.velocity)
    }

    fn set_gains(&mut self, gains: PidGains) -> Result<()> {
        self.0.borrow_mut().gains.push(gains);
        Ok(())
    }
}
