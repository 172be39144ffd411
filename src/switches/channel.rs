use anyhow::{anyhow, Error};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use log::trace;
use static_cell::StaticCell;

use super::InputEvent;

/// Events buffered between the pin interrupts and the debounce loop.
pub const EVENT_CHANNEL_CAPACITY: usize = 10;

/// Bounded queue of pin events. The sending half is safe to use from
/// interrupt context: it never blocks and never allocates.
pub struct EventChannel {
    inner: Channel<CriticalSectionRawMutex, InputEvent, EVENT_CHANNEL_CAPACITY>,
}

impl EventChannel {
    pub const fn new() -> Self {
        Self {
            inner: Channel::new(),
        }
    }

    pub fn sender(&self) -> InputEventSender<'_> {
        InputEventSender { channel: self }
    }

    pub fn receiver(&self) -> InputEventReceiver<'_> {
        InputEventReceiver { channel: self }
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy)]
pub struct InputEventSender<'ch> {
    channel: &'ch EventChannel,
}

impl InputEventSender<'_> {
    /// Queues an event. Returns false and drops it when the queue is full.
    pub fn send(&self, event: InputEvent) -> bool {
        match self.channel.inner.try_send(event) {
            Ok(()) => true,
            Err(_) => {
                trace!("Event channel full, dropping event for pin {}", event.pin);
                false
            }
        }
    }
}

pub struct InputEventReceiver<'ch> {
    channel: &'ch EventChannel,
}

impl InputEventReceiver<'_> {
    /// Waits for the next event, oldest first.
    pub async fn receive(&self) -> InputEvent {
        self.channel.inner.receive().await
    }

    pub fn try_receive(&self) -> Option<InputEvent> {
        self.channel.inner.try_receive().ok()
    }
}

static EVENT_CHANNEL: StaticCell<EventChannel> = StaticCell::new();

/// Creates the process-wide event channel. Only the first call succeeds.
pub fn init_event_channel() -> Result<&'static EventChannel, Error> {
    EVENT_CHANNEL
        .try_init(EventChannel::new())
        .map(|channel| &*channel)
        .ok_or_else(|| anyhow!("event channel already initialized"))
}
