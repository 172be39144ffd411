use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::mpsc;

use super::NetworkEvent;

/// One-shot timers the commissioning controller can ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerEvent {
    RetrySteering,
    Restart,
}

pub trait Scheduler {
    /// Fires `event` once after `delay`. Timers cannot be cancelled.
    fn schedule(&mut self, delay: Duration, event: TimerEvent);
}

/// Delivers timer events back into the network task's queue.
#[derive(Clone)]
pub struct TokioScheduler {
    events: mpsc::Sender<NetworkEvent>,
}

impl TokioScheduler {
    pub fn new(events: mpsc::Sender<NetworkEvent>) -> Self {
        Self { events }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, delay: Duration, event: TimerEvent) {
        debug!("Scheduling {:?} in {:?}", event, delay);
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if events.send(NetworkEvent::Timer(event)).await.is_err() {
                warn!("Network task gone, dropping {:?}", event);
            }
        });
    }
}

/// Records scheduled timers so they can be fired by hand.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    scheduled: Arc<Mutex<Vec<(Duration, TimerEvent)>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns everything scheduled so far.
    pub fn take(&self) -> Vec<(Duration, TimerEvent)> {
        match self.scheduled.lock() {
            Ok(mut scheduled) => std::mem::take(&mut *scheduled),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration, event: TimerEvent) {
        match self.scheduled.lock() {
            Ok(mut scheduled) => scheduled.push((delay, event)),
            Err(poisoned) => poisoned.into_inner().push((delay, event)),
        }
    }
}
