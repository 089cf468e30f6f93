// Mechanical steering limits
//
// Angles are radians, compared as plain numbers: no wrap-around is applied, so
// a restriction is only meaningful over the range the steering sensor reports.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::ConstructionError;

/// Which steering angles a group can physically reach
pub trait AngleRestriction: Debug {
    fn is_valid(&self, angle: f64) -> bool;

    /// Nearest legal angle. Returns `angle` unchanged when it is already legal.
    fn closest_legal(&self, angle: f64) -> f64;
}

/// Every angle is legal
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Unrestricted;

impl AngleRestriction for Unrestricted {
    fn is_valid(&self, _angle: f64) -> bool {
        true
    }

    fn closest_legal(&self, angle: f64) -> f64 {
        angle
    }
}

/// Legal inside `[start, end]`, or outside it when inverted
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WedgeRestriction {
    start: f64,
    end: f64,
    invert: bool,
}

impl WedgeRestriction {
    /// Wedge from `start` to `end`. With `end < start` the bounds are swapped
    /// and the wedge becomes "legal outside".
    pub fn new(start: f64, end: f64) -> Result<Self, ConstructionError> {
        Self::with_logic(start, end, false)
    }

    pub fn with_logic(start: f64, end: f64, invert: bool) -> Result<Self, ConstructionError> {
        if !start.is_finite() || !end.is_finite() {
            return Err(ConstructionError::NonFiniteWedge { start, end });
        }
        if end < start {
            return Ok(Self {
                start: end,
                end: start,
                invert: !invert,
            });
        }
        Ok(Self { start, end, invert })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn is_inverted(&self) -> bool {
        self.invert
    }
}

impl AngleRestriction for WedgeRestriction {
    fn is_valid(&self, angle: f64) -> bool {
        (self.start..=self.end).contains(&angle) != self.invert
    }

    fn closest_legal(&self, angle: f64) -> f64 {
        if self.is_valid(angle) {
            return angle;
        }
        if (angle - self.start).abs() < (angle - self.end).abs() {
            self.start
        } else {
            self.end
        }
    }
}

/// Serializable description of a restriction, in degrees for readability
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RestrictionConfig {
    #[default]
    Unrestricted,
    Wedge {
        start_deg: f64,
        end_deg: f64,
        #[serde(default)]
        invert: bool,
    },
}

impl RestrictionConfig {
    pub fn build(&self) -> Result<Box<dyn AngleRestriction>, ConstructionError> {
        match *self {
            RestrictionConfig::Unrestricted => Ok(Box::new(Unrestricted)),
            RestrictionConfig::Wedge {
                start_deg,
                end_deg,
                invert,
            } => Ok(Box::new(WedgeRestriction::with_logic(
                start_deg.to_radians(),
                end_deg.to_radians(),
                invert,
            )?)),
        }
    }
}
