// src/watcher.rs - Run recorder and observer broadcast
use crate::oven::{OvenHandle, OvenSnapshot};
use crate::profile::Profile;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Cap on the number of log points replayed to a freshly attached
/// observer; long runs are stride-sampled down to roughly this many.
const BACKLOG_MAX_POINTS: usize = 50;

#[derive(Debug)]
pub enum WatcherMessage {
    Record { profile: Profile },
    AddObserver { tx: UnboundedSender<Value> },
    Shutdown,
}

/// Handle to the watcher actor.
#[derive(Debug, Clone)]
pub struct WatcherHandle {
    tx: UnboundedSender<WatcherMessage>,
}

impl WatcherHandle {
    /// Start recording a new run. Clears the previous run's log.
    pub fn record(&self, profile: Profile) {
        let _ = self.tx.send(WatcherMessage::Record { profile });
    }

    /// Attach an observer. The first message it receives is a backlog of
    /// the run so far; after that it gets every status broadcast.
    pub fn add_observer(&self) -> UnboundedReceiver<Value> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = self.tx.send(WatcherMessage::AddObserver { tx });
        rx
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(WatcherMessage::Shutdown);
    }
}

/// Spawn the watcher. It polls the oven every `poll_interval` of wall
/// time and fans each snapshot out to all attached observers.
pub fn spawn(oven: OvenHandle, poll_interval: Duration) -> WatcherHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run(oven, poll_interval, rx));
    WatcherHandle { tx }
}

async fn run(oven: OvenHandle, poll_interval: Duration, mut rx: UnboundedReceiver<WatcherMessage>) {
    let mut state = WatcherState::new();
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match oven.state().await {
                    Some(snapshot) => state.observe(&snapshot),
                    // Nothing left to watch.
                    None => break,
                }
            }
            msg = rx.recv() => match msg {
                Some(WatcherMessage::Record { profile }) => {
                    state.record(profile);
                    // Seed the log with the state at the moment recording
                    // began so plots start from the first point.
                    if let Some(snapshot) = oven.state().await {
                        state.seed(&snapshot);
                    }
                }
                Some(WatcherMessage::AddObserver { tx }) => state.add_observer(tx),
                Some(WatcherMessage::Shutdown) | None => {
                    tracing::info!("oven watcher shutting down");
                    break;
                }
            }
        }
    }
}

struct WatcherState {
    last_profile: Option<Profile>,
    last_log: Vec<Value>,
    started: Option<chrono::DateTime<chrono::Local>>,
    recording: bool,
    observers: Vec<UnboundedSender<Value>>,
}

impl WatcherState {
    fn new() -> Self {
        Self {
            last_profile: None,
            last_log: Vec::new(),
            started: None,
            recording: false,
            observers: Vec::new(),
        }
    }

    fn record(&mut self, profile: Profile) {
        let started = chrono::Local::now();
        tracing::info!("watching run of {}, started {}", profile.name, started.to_rfc3339());
        self.last_profile = Some(profile);
        self.last_log.clear();
        self.started = Some(started);
        self.recording = true;
    }

    /// Log the state at the moment recording began, whatever it is.
    fn seed(&mut self, snapshot: &OvenSnapshot) {
        if let Ok(payload) = serde_json::to_value(snapshot) {
            self.last_log.push(payload);
        }
    }

    /// Fold one oven snapshot into the log (while a run is live) and
    /// broadcast it.
    ///
    /// Only runs announced through `record` are logged: a run started
    /// behind the watcher's back is broadcast but leaves no history, so a
    /// later `record` cannot inherit points from a run it never saw.
    fn observe(&mut self, snapshot: &OvenSnapshot) {
        let payload = match serde_json::to_value(snapshot) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("could not serialize oven state: {e}");
                return;
            }
        };
        if snapshot.state == "Running" {
            if self.recording {
                self.last_log.push(payload.clone());
            }
        } else {
            self.recording = false;
        }
        self.notify_all(payload);
    }

    fn add_observer(&mut self, tx: UnboundedSender<Value>) {
        let profile = self.last_profile.as_ref().map(|p| {
            json!({
                "name": p.name,
                "data": p.points,
                "type": "profile",
            })
        });
        let backlog = json!({
            "type": "backlog",
            "profile": profile,
            "log": self.lastlog_subset(),
        });
        if tx.send(backlog).is_ok() {
            self.observers.push(tx);
        }
        tracing::info!(observers = self.observers.len(), "observer attached");
    }

    /// The run log thinned to roughly `BACKLOG_MAX_POINTS` by taking every
    /// n-th point. Short logs are returned whole.
    fn lastlog_subset(&self) -> Vec<Value> {
        let total = self.last_log.len();
        if total <= BACKLOG_MAX_POINTS {
            return self.last_log.clone();
        }
        let every_nth = (total / (BACKLOG_MAX_POINTS - 1)).max(1);
        self.last_log.iter().step_by(every_nth).cloned().collect()
    }

    /// Send to every observer, silently dropping the ones that are gone.
    fn notify_all(&mut self, payload: Value) {
        self.observers.retain(|tx| tx.send(payload.clone()).is_ok());
    }
}
