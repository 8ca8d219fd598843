// src/oven/simulated.rs - Two-mass thermal model of the kiln
use crate::config::SimulateConfig;
use crate::sensor::SimulatedSensor;

/// Explicit-Euler model of the heating element and oven cavity as two
/// coupled thermal masses, with the cavity losing heat to the environment.
/// Each control tick injects the duty-scaled heater energy and integrates
/// one step, then publishes the cavity temperature to the simulated sensor.
#[derive(Debug)]
pub struct SimulatedKiln {
    sensor: SimulatedSensor,
    t_env: f64,
    c_heat: f64,
    c_oven: f64,
    p_heat: f64,
    r_o_nocool: f64,
    r_ho: f64,
    /// Cavity temperature, deg C.
    pub t: f64,
    /// Heating element temperature, deg C.
    pub t_h: f64,
    /// Energy injected this tick, J.
    q_h: f64,
    /// Element -> cavity power flow, W.
    pub p_ho: f64,
    /// Cavity -> environment power flow, W.
    pub p_env: f64,
}

impl SimulatedKiln {
    pub fn new(cfg: &SimulateConfig, sensor: SimulatedSensor) -> Self {
        // Everything starts at the temperature of the surrounding room.
        sensor.set_temperature(cfg.t_env);
        Self {
            sensor,
            t_env: cfg.t_env,
            c_heat: cfg.c_heat,
            c_oven: cfg.c_oven,
            p_heat: cfg.p_heat,
            r_o_nocool: cfg.r_o_nocool,
            r_ho: cfg.r_ho_noair,
            t: cfg.t_env,
            t_h: cfg.t_env,
            q_h: 0.0,
            p_ho: 0.0,
            p_env: 0.0,
        }
    }

    /// Duty-scaled energy entering the element this tick; a duty below 1
    /// models the element being on for only part of the tick.
    pub fn heating_energy(&mut self, duty: f64, time_step: f64) {
        self.q_h = self.p_heat * time_step * duty;
    }

    /// One integration step over both masses.
    pub fn temp_changes(&mut self, time_step: f64) {
        // Element warms from the injected energy.
        self.t_h += self.q_h / self.c_heat;

        // Element -> cavity flux.
        self.p_ho = (self.t_h - self.t) / self.r_ho;
        self.t += self.p_ho * time_step / self.c_oven;
        self.t_h -= self.p_ho * time_step / self.c_heat;

        // Cavity cools to the environment.
        self.p_env = (self.t - self.t_env) / self.r_o_nocool;
        self.t -= self.p_env * time_step / self.c_oven;

        self.sensor.set_temperature(self.t);
    }

    /// Apply one tick of heating at `duty` and integrate.
    pub fn step(&mut self, duty: f64, time_step: f64) {
        self.heating_energy(duty, time_step);
        self.temp_changes(time_step);
    }

    pub fn heater_power(&self, duty: f64) -> f64 {
        self.p_heat * duty
    }
}
