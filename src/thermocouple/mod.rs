// src/thermocouple/mod.rs - MAX31855 thermocouple driver
pub mod bus;
pub mod decode;

use crate::config::{SpiKind, ThermocoupleConfig};
use crate::gpio::Gpio;
use bus::{BitBangBus, BusError, FrameBus};
use decode::FaultFlags;
use serde::Deserialize;
use std::sync::{Arc, Mutex};

/// Reporting scale for decoded temperatures. Config and profiles are
/// assumed to use the same scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TempScale {
    #[default]
    #[serde(alias = "c")]
    Celsius,
    #[serde(alias = "f")]
    Fahrenheit,
    #[serde(alias = "k")]
    Kelvin,
}

impl TempScale {
    pub fn from_celsius(&self, celsius: f64) -> f64 {
        match self {
            TempScale::Celsius => celsius,
            TempScale::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
            TempScale::Kelvin => celsius + 273.15,
        }
    }
}

/// One decoded reading: temperature in the configured scale plus the
/// fault classification for that frame.
#[derive(Debug, Clone, Copy)]
pub struct Reading {
    pub temperature: f64,
    pub faults: FaultFlags,
}

/// Cold-junction compensated thermocouple-to-digital converter driver.
///
/// Composes a frame bus strategy with the pure decoder. Linearization is
/// optional calibration: when enabled the NIST inverse polynomials correct
/// the chip's linear approximation.
pub struct Max31855 {
    bus: Box<dyn FrameBus>,
    scale: TempScale,
    linearize: bool,
}

impl Max31855 {
    pub fn new(bus: Box<dyn FrameBus>, scale: TempScale, linearize: bool) -> Self {
        Self { bus, scale, linearize }
    }

    /// Build the driver with the bus strategy named in config. Only the
    /// bit-banged bus can be raised from plain GPIO; hardware SPI needs the
    /// platform's byte-transfer peripheral wired through `ByteStreamBus`.
    pub fn from_config(
        cfg: &ThermocoupleConfig,
        scale: TempScale,
        gpio: Arc<Mutex<dyn Gpio>>,
    ) -> Result<Self, BusError> {
        match cfg.spi {
            SpiKind::Bitbang => {
                let bus = BitBangBus::new(gpio, cfg.sensor_cs, cfg.sensor_clock, cfg.sensor_data);
                Ok(Self::new(Box::new(bus), scale, cfg.linearize))
            }
            SpiKind::Hardware => Err(BusError::Transfer(
                "hardware SPI needs a platform byte-transfer".into(),
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        "MAX31855"
    }

    /// Read one frame and decode it.
    pub fn read(&mut self) -> Result<Reading, BusError> {
        let frame = self.bus.read_frame()?;
        let faults = FaultFlags::from_frame(frame);
        let celsius = if self.linearize {
            decode::linearized_temp_c(frame)
        } else {
            decode::thermocouple_temp_c(frame)
        };
        Ok(Reading { temperature: self.scale.from_celsius(celsius), faults })
    }

    /// Read one frame and decode the reference junction only.
    pub fn read_reference_junction(&mut self) -> Result<f64, BusError> {
        let frame = self.bus.read_frame()?;
        Ok(self.scale.from_celsius(decode::reference_junction_temp_c(frame)))
    }

    pub fn close(&mut self) {
        self.bus.close();
    }
}
