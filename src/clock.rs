// src/clock.rs - Speed-scalable virtual clock
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Virtual time source shared by the PID loop, the oven and the sensor.
///
/// Virtual time advances at `speed` times real time from a reference
/// instant. Changing the speed re-anchors the reference so elapsed virtual
/// time stays continuous across rate changes. Handles are cheap to clone and
/// all share the same timeline, so a simulated run at speed 10 sees every
/// timed computation (runtime accounting, PID derivatives) agree.
#[derive(Debug, Clone)]
pub struct Clock {
    inner: Arc<Mutex<ClockInner>>,
}

#[derive(Debug)]
struct ClockInner {
    speed: f64,
    reference_epoch: f64,
    reference_instant: Instant,
}

fn wall_epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

impl Clock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ClockInner {
                speed: 1.0,
                reference_epoch: wall_epoch_secs(),
                reference_instant: Instant::now(),
            })),
        }
    }

    /// Current virtual time as unix seconds.
    pub fn now(&self) -> f64 {
        let inner = self.inner.lock().expect("clock lock poisoned");
        inner.reference_epoch + inner.speed * inner.reference_instant.elapsed().as_secs_f64()
    }

    /// Change the clock rate. The reference is re-anchored at the current
    /// virtual time so `now()` never jumps.
    pub fn set_speed(&self, speed: f64) {
        let mut inner = self.inner.lock().expect("clock lock poisoned");
        let now = inner.reference_epoch + inner.speed * inner.reference_instant.elapsed().as_secs_f64();
        inner.reference_epoch = now;
        inner.reference_instant = Instant::now();
        inner.speed = speed;
    }

    pub fn speed(&self) -> f64 {
        self.inner.lock().expect("clock lock poisoned").speed
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
