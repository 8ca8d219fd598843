// src/profile.rs - Time/temperature firing schedule
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Profile JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Profile '{0}' has no points")]
    Empty(String),
}

/// Wire format accepted from the control layer:
/// `{"name": "...", "data": [[time_secs, temperature], ...]}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProfileSpec {
    pub name: String,
    pub data: Vec<(f64, f64)>,
}

/// Immutable firing schedule: ordered (time, temperature) points.
///
/// Points are sorted ascending by time at construction. Duplicate times are
/// not rejected; interpolation over them is first-match and therefore
/// order dependent, matching the historical behavior.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub name: String,
    pub points: Vec<(f64, f64)>,
}

impl Profile {
    pub fn new(name: String, mut points: Vec<(f64, f64)>) -> Result<Self, ProfileError> {
        if points.is_empty() {
            return Err(ProfileError::Empty(name));
        }
        points.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        Ok(Self { name, points })
    }

    pub fn from_spec(spec: ProfileSpec) -> Result<Self, ProfileError> {
        Self::new(spec.name, spec.data)
    }

    pub fn from_json(json: &str) -> Result<Self, ProfileError> {
        let spec: ProfileSpec = serde_json::from_str(json)?;
        Self::from_spec(spec)
    }

    /// Total schedule length in seconds.
    pub fn duration(&self) -> f64 {
        self.points
            .iter()
            .map(|(t, _)| *t)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// The two points bracketing `time`, found by a first-match scan.
    /// A query before the first point keeps the historical scan-order
    /// behavior and brackets against the last point.
    fn surrounding_points(&self, time: f64) -> Option<((f64, f64), (f64, f64))> {
        if time > self.duration() {
            return None;
        }
        let idx = self.points.iter().position(|(t, _)| time < *t)?;
        let prev = if idx == 0 {
            *self.points.last()?
        } else {
            self.points[idx - 1]
        };
        Some((prev, self.points[idx]))
    }

    /// Linear interpolation of the schedule at `time`; 0 outside the
    /// schedule.
    pub fn target_temperature(&self, time: f64) -> f64 {
        match self.surrounding_points(time) {
            Some(((t0, v0), (t1, v1))) => {
                let slope = (v1 - v0) / (t1 - t0);
                v0 + (time - t0) * slope
            }
            None => 0.0,
        }
    }
}
