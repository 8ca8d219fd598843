// src/gpio.rs - GPIO capability and logical outputs
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinDirection {
    Input,
    Output,
}

/// Pin-level access contract. Register twiddling lives behind this trait in
/// the platform crate; the control core only ever sees logical pins.
pub trait Gpio: Send {
    fn configure(&mut self, pin: u8, direction: PinDirection);
    fn write(&mut self, pin: u8, on: bool);
    fn read(&mut self, pin: u8) -> bool;
}

/// A binary logical line bound to one physical pin.
///
/// `state` is `None` until the first set, after which it tracks the last
/// commanded value. Callers use it to detect and log only real transitions
/// instead of every reassertion. Relay boards driven through an inverting
/// stage take `active_low`; `state` always holds the logical value, only
/// the wire level is inverted.
pub struct Output {
    gpio: Arc<Mutex<dyn Gpio>>,
    pin: u8,
    active_low: bool,
    pub state: Option<bool>,
}

impl Output {
    pub fn new(gpio: Arc<Mutex<dyn Gpio>>, pin: u8, active_low: bool) -> Self {
        gpio.lock()
            .expect("gpio lock poisoned")
            .configure(pin, PinDirection::Output);
        Self { gpio, pin, active_low, state: None }
    }

    pub fn set(&mut self, on: bool) {
        self.gpio
            .lock()
            .expect("gpio lock poisoned")
            .write(self.pin, on != self.active_low);
        if self.state != Some(on) {
            tracing::debug!(pin = self.pin, on, "output transition");
        }
        self.state = Some(on);
    }

    pub fn is_on(&self) -> bool {
        self.state == Some(true)
    }
}
