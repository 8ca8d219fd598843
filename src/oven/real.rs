// src/oven/real.rs - Relay outputs for a physical kiln
use crate::config::OutputsConfig;
use crate::gpio::{Gpio, Output};
use std::sync::{Arc, Mutex};

/// The two physical outputs of the kiln: the master enable contactor and
/// the zero-cross solid-state relay switching the element.
///
/// `heat_on_secs` remembers the ON interval chosen by the last duty
/// computation so the next tick can tell a 100%-duty interval (leave the
/// relay alone) from a partial one (turn it off for the remainder).
pub struct RelayBank {
    pub heat: Output,
    master: Output,
    pub heat_on_secs: f64,
}

impl RelayBank {
    pub fn new(gpio: Arc<Mutex<dyn Gpio>>, cfg: &OutputsConfig) -> Self {
        let master = Output::new(gpio.clone(), cfg.enable, cfg.active_low);
        let heat = Output::new(gpio, cfg.heat, cfg.active_low);
        let mut bank = Self { heat, master, heat_on_secs: 0.0 };
        bank.master_set(false);
        bank
    }

    /// Drive the master contactor, logging only real transitions.
    pub fn master_set(&mut self, on: bool) {
        let log_it = self.master.state.is_none() || self.master.state != Some(on);
        self.master.set(on);
        if log_it {
            tracing::info!("Master output is {}", if on { "On" } else { "Off" });
        }
    }

    /// Lazily energize the master contactor the first time the oven is
    /// actively running.
    pub fn on_running(&mut self) {
        if !self.master.is_on() {
            self.master_set(true);
        }
    }

    pub fn master_is_on(&self) -> bool {
        self.master.is_on()
    }

    /// Drop both outputs. Part of every reset path, including emergencies.
    pub fn de_energize(&mut self) {
        self.heat.set(false);
        self.master_set(false);
    }
}
