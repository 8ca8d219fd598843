// src/sensor/mod.rs - Temperature sensor actor
pub mod filter;

use crate::clock::Clock;
use crate::config::Config;
use crate::thermocouple::Max31855;
use crate::timer::Timer;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

/// Frozen snapshot of the sensor state, produced fresh per status query.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SensorStatus {
    pub temperature: f64,
    pub ok_count: u32,
    pub bad_count: u32,
    pub bad_percent: f64,
    pub no_connection: bool,
    pub short_to_ground: bool,
    pub short_to_vcc: bool,
    pub unknown_error: bool,
}

impl SensorStatus {
    pub fn any_fault(&self) -> bool {
        self.no_connection | self.short_to_ground | self.short_to_vcc | self.unknown_error
    }
}

/// Read interface shared by the real sensor actor and the simulated sensor.
/// All reads cross an actor boundary (or a lock); callers never see the
/// sensor's mutable state.
#[async_trait]
pub trait TemperatureSource: Send + Sync {
    async fn status(&self) -> SensorStatus;

    async fn temperature(&self) -> f64 {
        self.status().await.temperature
    }
}

/// Sensor for simulated ovens: just a shared value the thermal model
/// writes and everyone else reads.
#[derive(Debug, Clone, Default)]
pub struct SimulatedSensor {
    value: Arc<Mutex<f64>>,
}

impl SimulatedSensor {
    pub fn new(initial: f64) -> Self {
        Self { value: Arc::new(Mutex::new(initial)) }
    }

    pub fn set_temperature(&self, temperature: f64) {
        *self.value.lock().expect("sensor lock poisoned") = temperature;
    }
}

#[async_trait]
impl TemperatureSource for SimulatedSensor {
    async fn status(&self) -> SensorStatus {
        SensorStatus {
            temperature: *self.value.lock().expect("sensor lock poisoned"),
            ..SensorStatus::default()
        }
    }
}

#[derive(Debug)]
enum SensorMessage {
    SampleDue,
    GetStatus { respond_to: oneshot::Sender<SensorStatus> },
    Shutdown,
}

/// Handle to the sensor actor. Cheap to clone; every read is a
/// request/reply round trip through the actor's queue.
#[derive(Debug, Clone)]
pub struct TempSensorHandle {
    tx: UnboundedSender<SensorMessage>,
}

#[async_trait]
impl TemperatureSource for TempSensorHandle {
    async fn status(&self) -> SensorStatus {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(SensorMessage::GetStatus { respond_to: tx }).is_ok() {
            if let Ok(status) = rx.await {
                return status;
            }
        }
        // A dead sensor actor reads like a lost thermocouple.
        tracing::error!("temperature sensor actor is gone");
        SensorStatus { no_connection: true, ..SensorStatus::default() }
    }
}

impl TempSensorHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.send(SensorMessage::Shutdown);
    }
}

/// Spawn the sampling actor. It reads the thermocouple
/// `temperature_average_samples` times per control tick and keeps a
/// filtered moving average plus rolling fault statistics.
pub fn spawn(cfg: &Config, thermocouple: Max31855, clock: Clock) -> TempSensorHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let actor = TempSensorActor::new(cfg, thermocouple, clock, tx.clone(), rx);
    tokio::spawn(actor.run());
    TempSensorHandle { tx }
}

struct TempSensorActor {
    thermocouple: Max31855,
    rx: UnboundedReceiver<SensorMessage>,
    timer: Timer<SensorMessage>,
    clock: Clock,
    time_step: f64,
    sample_interval: f64,
    max_samples: usize,
    honour_short_errors: bool,
    offset: f64,
    window: Vec<f64>,
    temperature: f64,
    ok_count: u32,
    bad_count: u32,
    bad_percent: f64,
    bad_stamp: f64,
    no_connection: bool,
    short_to_ground: bool,
    short_to_vcc: bool,
    unknown_error: bool,
}

impl TempSensorActor {
    fn new(
        cfg: &Config,
        thermocouple: Max31855,
        clock: Clock,
        tx: UnboundedSender<SensorMessage>,
        rx: UnboundedReceiver<SensorMessage>,
    ) -> Self {
        let time_step = cfg.sensor_time_wait;
        let max_samples = cfg.thermocouple.temperature_average_samples;
        let bad_stamp = clock.now();
        Self {
            thermocouple,
            rx,
            timer: Timer::new(tx),
            clock,
            time_step,
            sample_interval: time_step / max_samples as f64,
            max_samples,
            honour_short_errors: cfg.thermocouple.honour_short_errors,
            offset: cfg.thermocouple.offset,
            window: Vec::new(),
            temperature: 0.0,
            ok_count: 0,
            bad_count: 0,
            bad_percent: 0.0,
            bad_stamp,
            no_connection: false,
            short_to_ground: false,
            short_to_vcc: false,
            unknown_error: false,
        }
    }

    async fn run(mut self) {
        tracing::info!(sensor = self.thermocouple.name(), "temperature sensor started");
        self.arm();
        while let Some(msg) = self.rx.recv().await {
            match msg {
                SensorMessage::SampleDue => {
                    self.take_sample();
                    self.arm();
                }
                SensorMessage::GetStatus { respond_to } => {
                    let _ = respond_to.send(self.status());
                }
                SensorMessage::Shutdown => {
                    tracing::info!("temperature sensor shutting down");
                    self.timer.stop();
                    self.thermocouple.close();
                    break;
                }
            }
        }
    }

    fn arm(&mut self) {
        self.timer
            .start(Duration::from_secs_f64(self.sample_interval), SensorMessage::SampleDue);
    }

    /// One sub-tick: read a frame, classify it, fold good values into the
    /// sliding window, and refresh the rolling error statistics.
    fn take_sample(&mut self) {
        self.roll_error_window();

        let reading = self.thermocouple.read();
        let (value, faults) = match reading {
            Ok(r) => (r.temperature, r.faults),
            Err(e) => {
                tracing::error!("thermocouple bus error: {e}");
                self.bad_count += 1;
                self.unknown_error = true;
                self.temperature = filter::filtered_mean(&self.window);
                return;
            }
        };

        self.no_connection = faults.no_connection;
        self.short_to_ground = faults.short_to_ground;
        self.short_to_vcc = faults.short_to_vcc;
        self.unknown_error = faults.unknown;

        let mut is_bad = self.no_connection | self.unknown_error;
        if self.honour_short_errors {
            is_bad |= self.short_to_ground | self.short_to_vcc;
        }

        if is_bad {
            tracing::error!(
                "Problem reading temp N/C:{} GND:{} VCC:{} ???:{}",
                self.no_connection,
                self.short_to_ground,
                self.short_to_vcc,
                self.unknown_error
            );
            self.bad_count += 1;
        } else {
            self.window.push(value);
            if self.window.len() > self.max_samples {
                self.window.remove(0);
            }
            self.ok_count += 1;
        }

        self.temperature = filter::filtered_mean(&self.window);
    }

    /// Reset the ok/bad counters every two control ticks, folding them
    /// into `bad_percent` first.
    fn roll_error_window(&mut self) {
        if self.clock.now() - self.bad_stamp > self.time_step * 2.0 {
            let total = self.bad_count + self.ok_count;
            self.bad_percent = if total > 0 {
                f64::from(self.bad_count) / f64::from(total) * 100.0
            } else {
                0.0
            };
            self.bad_count = 0;
            self.ok_count = 0;
            self.bad_stamp = self.clock.now();
        }
    }

    fn status(&self) -> SensorStatus {
        SensorStatus {
            temperature: self.temperature + self.offset,
            ok_count: self.ok_count,
            bad_count: self.bad_count,
            bad_percent: self.bad_percent,
            no_connection: self.no_connection,
            short_to_ground: self.short_to_ground,
            short_to_vcc: self.short_to_vcc,
            unknown_error: self.unknown_error,
        }
    }
}
