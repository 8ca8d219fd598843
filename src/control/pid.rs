// src/control/pid.rs - PID control law for the heating element
use crate::clock::Clock;
use crate::config::PidConfig;
use serde::Serialize;

/// The raw control output lives in [0, window] before normalization. A
/// window of 100 gives the integral and derivative terms room to act
/// instead of degenerating into bang-bang control.
const WINDOW_SIZE: f64 = 100.0;

/// Diagnostics snapshot recorded after every compute call. Telemetry only;
/// it never feeds back into the control law.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PidStats {
    pub time: f64,
    pub time_delta_secs: f64,
    pub setpoint: f64,
    pub ispoint: f64,
    pub err: f64,
    #[serde(rename = "errDelta")]
    pub err_delta: f64,
    pub p: f64,
    pub i: f64,
    pub d: f64,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub pid: f64,
    pub out: f64,
}

/// PID controller consumed once per control tick.
///
/// The oven re-instantiates this on every reset, which is what clears the
/// integral and derivative memory between runs.
#[derive(Debug)]
pub struct Pid {
    kp: f64,
    ki: f64,
    kd: f64,
    iterm: f64,
    last_err: f64,
    last_now: f64,
    control_enabled: bool,
    clock: Clock,
    stats: PidStats,
}

impl Pid {
    pub fn new(cfg: &PidConfig, clock: Clock) -> Self {
        Self {
            kp: cfg.kp,
            ki: cfg.ki,
            kd: cfg.kd,
            iterm: 0.0,
            last_err: 0.0,
            last_now: clock.now(),
            control_enabled: true,
            clock,
            stats: PidStats::default(),
        }
    }

    pub fn enable_control(&mut self) {
        self.control_enabled = true;
    }

    pub fn disable_control(&mut self) {
        self.control_enabled = false;
    }

    /// Compute the heater duty fraction in [0, 1].
    ///
    /// Anti-windup: the integral accumulates only while the P action alone
    /// stays inside the output window; outside it the integral is frozen
    /// (not reset) for that tick. The derivative divides by the elapsed
    /// virtual time since the previous call: two calls at the same instant
    /// produce a non-finite derivative which propagates to the output. The
    /// tick timer keeps calls apart in normal operation; callers that
    /// cannot guarantee that must check for a finite result.
    pub fn compute(&mut self, setpoint: f64, ispoint: f64) -> f64 {
        let now = self.clock.now();
        let time_delta_secs = now - self.last_now;
        self.last_now = now;

        let error = setpoint - ispoint;
        let d_err;
        let raw;

        if self.control_enabled {
            // No point winding up the integral while the P action alone
            // saturates the window.
            if self.ki > 0.0 && (self.kp * error).abs() <= WINDOW_SIZE {
                self.iterm += error * time_delta_secs * self.ki;
            }
            d_err = (error - self.last_err) / time_delta_secs;
            raw = self.kp * error + self.iterm + self.kd * d_err;
        } else {
            self.iterm = 0.0;
            d_err = 0.0;
            if error < 0.0 {
                tracing::info!("kiln outside pid control window, max cooling");
                raw = 0.0;
            } else {
                tracing::info!("kiln outside pid control window, max heating");
                raw = WINDOW_SIZE;
            }
        }
        self.last_err = error;

        // No cooling action, so the floor is always 0.
        let output = raw.clamp(0.0, WINDOW_SIZE) / WINDOW_SIZE;

        self.stats = PidStats {
            time: now,
            time_delta_secs,
            setpoint,
            ispoint,
            err: error,
            err_delta: d_err,
            p: self.kp * error,
            i: self.iterm,
            d: self.kd * d_err,
            kp: self.kp,
            ki: self.ki,
            kd: self.kd,
            pid: raw,
            out: output,
        };

        tracing::debug!(
            "pid actuals pid={:.2} p={:.2} i={:.2} d={:.2} error={:.2}",
            raw,
            self.kp * error,
            self.iterm,
            self.kd * d_err,
            error
        );

        output
    }

    pub fn stats(&self) -> &PidStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(kp: f64, ki: f64, kd: f64) -> Pid {
        let cfg = PidConfig { kp, ki, kd };
        Pid::new(&cfg, Clock::new())
    }

    #[test]
    fn output_stays_in_unit_range() {
        let mut p = pid(25.0, 0.005, 0.2);
        std::thread::sleep(std::time::Duration::from_millis(2));
        for (setpoint, measured) in [
            (1000.0, 20.0),
            (0.0, 1200.0),
            (500.0, 499.0),
            (-50.0, 50.0),
        ] {
            std::thread::sleep(std::time::Duration::from_millis(2));
            let out = p.compute(setpoint, measured);
            assert!((0.0..=1.0).contains(&out), "out of range: {out}");
        }
    }

    #[test]
    fn integral_frozen_outside_window() {
        let mut p = pid(25.0, 0.5, 0.0);
        // |kp * error| = 25 * 400 far above the window: integral must not move.
        std::thread::sleep(std::time::Duration::from_millis(5));
        p.compute(500.0, 100.0);
        assert_eq!(p.stats().i, 0.0);
        assert_eq!(p.stats().out, 1.0);
    }

    #[test]
    fn integral_accumulates_inside_window() {
        let mut p = pid(25.0, 0.5, 0.0);
        // |kp * error| = 50, inside the window.
        std::thread::sleep(std::time::Duration::from_millis(5));
        p.compute(102.0, 100.0);
        assert!(p.stats().i > 0.0);
    }

    #[test]
    fn disabled_control_is_bang_bang() {
        let mut p = pid(25.0, 0.5, 0.2);
        p.disable_control();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert_eq!(p.compute(500.0, 100.0), 1.0);
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert_eq!(p.compute(100.0, 500.0), 0.0);
        assert_eq!(p.stats().i, 0.0);
    }

    #[test]
    fn stats_snapshot_reflects_last_call() {
        let mut p = pid(10.0, 0.0, 0.0);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let out = p.compute(50.0, 45.0);
        let stats = p.stats();
        assert_eq!(stats.setpoint, 50.0);
        assert_eq!(stats.ispoint, 45.0);
        assert_eq!(stats.err, 5.0);
        assert_eq!(stats.p, 50.0);
        assert_eq!(stats.out, out);
    }

    #[test]
    fn zero_dt_yields_non_finite_derivative() {
        // Reproduces the historical division-by-zero instead of guarding it.
        let clock = Clock::new();
        clock.set_speed(0.0);
        let cfg = PidConfig { kp: 1.0, ki: 0.0, kd: 1.0 };
        let mut p = Pid::new(&cfg, clock);
        p.compute(10.0, 0.0);
        assert!(!p.stats().err_delta.is_finite());
    }
}
