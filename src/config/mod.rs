// src/config/mod.rs - Controller configuration
use crate::thermocouple::TempScale;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Duty cycle of the whole system in seconds. Every tick a decision is
    /// made about switching the relay on and off and for how long; the
    /// thermocouple is read `temperature_average_samples` times across it.
    #[serde(default = "default_sensor_time_wait")]
    pub sensor_time_wait: f64,

    /// Abort the firing at or above this temperature. This only shuts the
    /// profile off; a failed-closed relay still needs a kiln sitter.
    #[serde(default = "default_emergency_shutoff_temp")]
    pub emergency_shutoff_temp: f64,

    /// Log emergencies but never force a reset.
    #[serde(default)]
    pub ignore_emergencies: bool,

    /// Freeze the schedule clock while the kiln lags or leads the target
    /// by more than `kiln_must_catch_up_max_error`.
    #[serde(default = "default_true")]
    pub kiln_must_catch_up: bool,

    #[serde(default = "default_catch_up_max_error")]
    pub kiln_must_catch_up_max_error: f64,

    #[serde(default)]
    pub temp_scale: TempScale,

    #[serde(default = "default_kwh_rate")]
    pub kwh_rate: f64,

    #[serde(default = "default_currency_type")]
    pub currency_type: String,

    /// Run against the thermal model instead of real hardware.
    #[serde(default)]
    pub simulated: bool,

    #[serde(default)]
    pub pid: PidConfig,

    #[serde(default)]
    pub outputs: OutputsConfig,

    #[serde(default)]
    pub thermocouple: ThermocoupleConfig,

    #[serde(default)]
    pub simulate: SimulateConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PidConfig {
    #[serde(default = "default_kp")]
    pub kp: f64,
    #[serde(default = "default_ki")]
    pub ki: f64,
    #[serde(default = "default_kd")]
    pub kd: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputsConfig {
    /// Master enable contactor pin.
    #[serde(default)]
    pub enable: u8,
    /// Zero-cross solid-state-relay pin.
    #[serde(default = "default_heat_pin")]
    pub heat: u8,
    #[serde(default)]
    pub active_low: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpiKind {
    #[default]
    Bitbang,
    Hardware,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThermocoupleConfig {
    #[serde(default)]
    pub spi: SpiKind,
    #[serde(default = "default_cs_pin")]
    pub sensor_cs: u8,
    #[serde(default = "default_clock_pin")]
    pub sensor_clock: u8,
    #[serde(default = "default_data_pin")]
    pub sensor_data: u8,
    /// Some kilns report spurious short errors at high temperature when
    /// plasma forms; leaving this off treats those reads as good.
    #[serde(default)]
    pub honour_short_errors: bool,
    #[serde(default = "default_average_samples")]
    pub temperature_average_samples: usize,
    /// Additive calibration correction for cheap thermocouples.
    #[serde(default)]
    pub offset: f64,
    #[serde(default = "default_true")]
    pub linearize: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulateConfig {
    /// Virtual clock rate: 1 is realtime, larger runs faster.
    #[serde(default = "default_sim_speed")]
    pub speed: f64,
    /// Environment temperature, deg C.
    #[serde(default = "default_t_env")]
    pub t_env: f64,
    /// Heat capacity of the heating element, J/K.
    #[serde(default = "default_c_heat")]
    pub c_heat: f64,
    /// Heat capacity of the oven cavity, J/K.
    #[serde(default = "default_c_oven")]
    pub c_oven: f64,
    /// Heating power, W.
    #[serde(default = "default_p_heat")]
    pub p_heat: f64,
    /// Thermal resistance oven -> environment, K/W.
    #[serde(default = "default_r_o_nocool")]
    pub r_o_nocool: f64,
    /// Thermal resistance element -> oven, K/W.
    #[serde(default = "default_r_ho_noair")]
    pub r_ho_noair: f64,
}

fn default_log_level() -> String { "info".to_string() }
fn default_sensor_time_wait() -> f64 { 2.0 }
fn default_emergency_shutoff_temp() -> f64 { 1250.0 }
fn default_true() -> bool { true }
fn default_catch_up_max_error() -> f64 { 5.0 }
fn default_kwh_rate() -> f64 { 0.30 }
fn default_currency_type() -> String { "$".to_string() }
fn default_kp() -> f64 { 25.0 }
fn default_ki() -> f64 { 0.005 }
fn default_kd() -> f64 { 200.0 }
fn default_heat_pin() -> u8 { 1 }
fn default_cs_pin() -> u8 { 27 }
fn default_clock_pin() -> u8 { 22 }
fn default_data_pin() -> u8 { 17 }
fn default_average_samples() -> usize { 40 }
fn default_sim_speed() -> f64 { 1.0 }
fn default_t_env() -> f64 { 21.0 }
fn default_c_heat() -> f64 { 100.0 }
fn default_c_oven() -> f64 { 5000.0 }
fn default_p_heat() -> f64 { 10000.0 }
fn default_r_o_nocool() -> f64 { 0.3 }
fn default_r_ho_noair() -> f64 { 0.1 }

impl Default for PidConfig {
    fn default() -> Self {
        Self { kp: default_kp(), ki: default_ki(), kd: default_kd() }
    }
}

impl Default for OutputsConfig {
    fn default() -> Self {
        Self { enable: 0, heat: default_heat_pin(), active_low: false }
    }
}

impl Default for ThermocoupleConfig {
    fn default() -> Self {
        Self {
            spi: SpiKind::default(),
            sensor_cs: default_cs_pin(),
            sensor_clock: default_clock_pin(),
            sensor_data: default_data_pin(),
            honour_short_errors: false,
            temperature_average_samples: default_average_samples(),
            offset: 0.0,
            linearize: true,
        }
    }
}

impl Default for SimulateConfig {
    fn default() -> Self {
        Self {
            speed: default_sim_speed(),
            t_env: default_t_env(),
            c_heat: default_c_heat(),
            c_oven: default_c_oven(),
            p_heat: default_p_heat(),
            r_o_nocool: default_r_o_nocool(),
            r_ho_noair: default_r_ho_noair(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str("").expect("empty config must deserialize from defaults")
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensor_time_wait <= 0.0 {
            return Err(ConfigError::Invalid("sensor_time_wait must be positive".into()));
        }
        if self.thermocouple.temperature_average_samples == 0 {
            return Err(ConfigError::Invalid(
                "temperature_average_samples must be at least 1".into(),
            ));
        }
        if self.kiln_must_catch_up_max_error <= 0.0 {
            return Err(ConfigError::Invalid(
                "kiln_must_catch_up_max_error must be positive".into(),
            ));
        }
        if self.pid.kp < 0.0 || self.pid.ki < 0.0 || self.pid.kd < 0.0 {
            return Err(ConfigError::Invalid("PID gains must not be negative".into()));
        }
        if self.simulate.speed <= 0.0 {
            return Err(ConfigError::Invalid("simulation speed must be positive".into()));
        }
        if self.simulate.c_heat <= 0.0 || self.simulate.c_oven <= 0.0 {
            return Err(ConfigError::Invalid("thermal capacities must be positive".into()));
        }
        if self.simulate.r_o_nocool <= 0.0 || self.simulate.r_ho_noair <= 0.0 {
            return Err(ConfigError::Invalid("thermal resistances must be positive".into()));
        }
        Ok(())
    }
}
