// Gains for the steering loop and the glue onto the `pid` crate
//
// Gains are per control cycle: the integral grows by `i * error` every step
// and the derivative acts on the change in measurement between steps.

use ::pid::Pid;
use serde::{Deserialize, Serialize};

/// Limit on the loop output and on each of its terms
pub const OUTPUT_LIMIT: f64 = 1.0;

/// Proportional, integral, derivative and feed-forward gains
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PidGains {
    pub p: f64,
    pub i: f64,
    pub d: f64,
    #[serde(default)]
    pub f: f64,
}

impl PidGains {
    pub const fn new(p: f64, i: f64, d: f64, f: f64) -> Self {
        Self { p, i, d, f }
    }

    pub fn controller(&self) -> Pid<f64> {
        let mut pid = Pid::new(0.0, OUTPUT_LIMIT);
        self.apply(&mut pid);
        pid
    }

    /// Load these gains into `pid`, keeping its integral and history
    pub fn apply(&self, pid: &mut Pid<f64>) {
        pid.p(self.p, OUTPUT_LIMIT)
            .i(self.i, OUTPUT_LIMIT)
            .d(self.d, OUTPUT_LIMIT);
    }

    /// One loop step toward `setpoint`, with `f * setpoint` added as feed-forward
    pub fn step(&self, pid: &mut Pid<f64>, setpoint: f64, measurement: f64) -> f64 {
        pid.setpoint(setpoint);
        let feedback = pid.next_control_output(measurement).output;
        (feedback + self.f * setpoint).clamp(-OUTPUT_LIMIT, OUTPUT_LIMIT)
    }
}
