// src/integration_test.rs - End-to-end tests of the simulated kiln stack
use crate::clock::Clock;
use crate::config::Config;
use crate::gpio::mock::MockGpio;
use crate::oven::{self, OvenHandle};
use crate::profile::Profile;
use crate::sensor;
use crate::thermocouple::Max31855;
use crate::watcher;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Simulation tuned so a short schedule finishes in well under a second
/// of wall time.
fn fast_config() -> Config {
    let mut cfg = Config::default();
    cfg.simulated = true;
    cfg.simulate.speed = 100.0;
    cfg.sensor_time_wait = 0.5;
    cfg.kiln_must_catch_up = false;
    cfg
}

async fn wait_for_state(oven: &OvenHandle, want: &str, max: Duration) -> bool {
    let deadline = Instant::now() + max;
    while Instant::now() < deadline {
        if let Some(snapshot) = oven.state().await {
            if snapshot.state == want {
                return true;
            }
        }
        sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn simulated_run_completes_and_resets() {
    let cfg = fast_config();
    let oven = oven::spawn_simulated(&cfg, Clock::new());

    // 30 virtual seconds, a gentle ramp near ambient.
    let profile = Profile::new("smoke".into(), vec![(0.0, 21.0), (30.0, 25.0)]).unwrap();
    oven.run_profile(profile, 0.0);

    assert!(
        wait_for_state(&oven, "Running", Duration::from_secs(5)).await,
        "run never started"
    );
    assert!(
        wait_for_state(&oven, "Idle", Duration::from_secs(10)).await,
        "run never finished"
    );

    // The ended run left no residue behind.
    let snapshot = oven.state().await.expect("oven alive");
    assert_eq!(snapshot.profile, None);
    assert_eq!(snapshot.runtime, 0.0);
    assert_eq!(snapshot.target, 0.0);
    oven.shutdown();
}

#[tokio::test]
async fn running_oven_reports_target_and_load() {
    let cfg = fast_config();
    let oven = oven::spawn_simulated(&cfg, Clock::new());

    let profile = Profile::new("hot".into(), vec![(0.0, 400.0), (600.0, 1000.0)]).unwrap();
    oven.run_profile(profile, 0.0);
    assert!(wait_for_state(&oven, "Running", Duration::from_secs(5)).await);

    // Give the control loop a few ticks, then look at what it reports.
    sleep(Duration::from_millis(100)).await;
    let snapshot = oven.state().await.expect("oven alive");
    if snapshot.state == "Running" {
        assert_eq!(snapshot.profile.as_deref(), Some("hot"));
        assert!(snapshot.target >= 400.0);
        // A cold kiln chasing 400 degC runs the element flat out.
        assert_eq!(snapshot.load_percent, 100.0);
        assert!(snapshot.temperature > 21.0, "kiln should be heating");
    }
    oven.shutdown();
}

#[tokio::test]
async fn overtemperature_aborts_the_run() {
    let mut cfg = fast_config();
    cfg.emergency_shutoff_temp = 30.0;
    let oven = oven::spawn_simulated(&cfg, Clock::new());

    // Long schedule: reaching Idle again within the timeout means the
    // shutoff fired, not that the schedule ran out.
    let profile = Profile::new("runaway".into(), vec![(0.0, 500.0), (6000.0, 500.0)]).unwrap();
    oven.run_profile(profile, 0.0);

    assert!(wait_for_state(&oven, "Running", Duration::from_secs(5)).await);
    assert!(
        wait_for_state(&oven, "Idle", Duration::from_secs(30)).await,
        "emergency shutoff never fired"
    );
    let snapshot = oven.state().await.expect("oven alive");
    assert_eq!(snapshot.profile, None);
    oven.shutdown();
}

#[tokio::test]
async fn abort_returns_to_idle() {
    let cfg = fast_config();
    let oven = oven::spawn_simulated(&cfg, Clock::new());

    let profile = Profile::new("aborted".into(), vec![(0.0, 300.0), (6000.0, 300.0)]).unwrap();
    oven.run_profile(profile, 0.0);
    assert!(wait_for_state(&oven, "Running", Duration::from_secs(5)).await);

    oven.abort();
    assert!(wait_for_state(&oven, "Idle", Duration::from_secs(5)).await);
    oven.shutdown();
}

#[tokio::test]
async fn real_stack_composes_from_config_over_gpio() {
    let mut cfg = Config::default();
    cfg.sensor_time_wait = 0.1;
    cfg.thermocouple.temperature_average_samples = 4;
    cfg.thermocouple.linearize = false;
    cfg.outputs.enable = 0;
    cfg.outputs.heat = 1;

    // The scripted converter clocks out a steady 100 degC, no faults.
    let raw: u32 = 0x0640_1900;
    let mut gpio = MockGpio::new();
    gpio.input_script = (0..32).rev().map(|i| raw >> i & 1 == 1).collect();
    let gpio = gpio.shared();

    let clock = Clock::new();
    let thermocouple =
        Max31855::from_config(&cfg.thermocouple, cfg.temp_scale, gpio.clone()).unwrap();
    let sensor = sensor::spawn(&cfg, thermocouple, clock.clone());
    let oven = oven::spawn_real(&cfg, clock.clone(), gpio.clone(), sensor.clone());

    // Holding 200 degC against a kiln stuck at 100 runs the element flat out.
    let profile = Profile::new("hold".into(), vec![(0.0, 200.0), (600.0, 200.0)]).unwrap();
    oven.run_profile(profile, 0.0);
    assert!(wait_for_state(&oven, "Running", Duration::from_secs(5)).await);

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut temperature = 0.0;
    let (mut master_on, mut heat_on) = (false, false);
    while Instant::now() < deadline {
        {
            let g = gpio.lock().unwrap();
            master_on = g.writes.iter().any(|&(pin, on)| pin == 0 && on);
            heat_on = g.writes.iter().any(|&(pin, on)| pin == 1 && on);
        }
        if let Some(snapshot) = oven.state().await {
            temperature = snapshot.temperature;
        }
        if master_on && heat_on && (temperature - 100.0).abs() < 1.0 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert!(master_on, "master contactor never energized");
    assert!(heat_on, "heating element never energized");
    assert!((temperature - 100.0).abs() < 1.0, "sensed {temperature}");

    oven.abort();
    assert!(wait_for_state(&oven, "Idle", Duration::from_secs(5)).await);
    oven.shutdown();
    sensor.shutdown();
}

#[tokio::test]
async fn watcher_feeds_observers_from_a_live_run() {
    let cfg = fast_config();
    let oven = oven::spawn_simulated(&cfg, Clock::new());
    let watcher = watcher::spawn(oven.clone(), Duration::from_millis(10));

    let profile = Profile::new("observed".into(), vec![(0.0, 300.0), (600.0, 300.0)]).unwrap();
    watcher.record(profile.clone());
    oven.run_profile(profile, 0.0);
    assert!(wait_for_state(&oven, "Running", Duration::from_secs(5)).await);

    let mut rx = watcher.add_observer();
    let backlog = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("backlog in time")
        .expect("watcher alive");
    assert_eq!(backlog["type"], "backlog");
    assert_eq!(backlog["profile"]["name"], "observed");

    let status = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("status in time")
        .expect("watcher alive");
    assert!(status["state"].is_string());
    assert!(status["temperature"].is_number());

    oven.shutdown();
    watcher.shutdown();
}
