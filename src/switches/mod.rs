//! Physical buttons: interrupt-fed event queue, debounce loop and the
//! mapping from confirmed presses to device actions.

use anyhow::{anyhow, Error};
use embedded_hal::digital::InputPin;
use embedded_hal_async::delay::DelayNs;
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::config::{DebounceConfig, Switch};

pub mod action;
pub mod channel;
pub mod debounce;

pub use action::{ActionRouter, FactoryReset, LogicalAction};
pub use channel::{init_event_channel, EventChannel, InputEventReceiver, InputEventSender};
pub use debounce::{DebounceCycle, DebounceState, Step, SwitchMonitor, TokioDelay};

/// Upper bound on buttons watched by one monitor.
pub const MAX_SWITCHES: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum SwitchFunction {
    FactoryReset,
}

/// A falling edge seen on a monitored pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputEvent {
    pub pin: u8,
    pub function: SwitchFunction,
}

/// An active-low input that can raise an interrupt on its falling edge.
pub trait InterruptPin: InputPin {
    /// Arranges for `event` to be pushed into `sender` on every falling edge
    /// while the interrupt is enabled.
    fn attach_falling_edge(&mut self, sender: InputEventSender<'static>, event: InputEvent);

    fn enable_interrupt(&mut self);

    fn disable_interrupt(&mut self);
}

pub struct MonitoredPin<P> {
    pub pin: u8,
    pub function: SwitchFunction,
    pub input: P,
}

/// Hooks every configured button up to the event channel and returns the
/// monitor that drains it.
pub fn init_switches<P, D, R>(
    channel: &'static EventChannel,
    switches: impl IntoIterator<Item = (Switch, P)>,
    delay: D,
    router: ActionRouter<R>,
    config: &DebounceConfig,
) -> Result<SwitchMonitor<'static, P, D, R>, Error>
where
    P: InterruptPin,
    D: DelayNs,
    R: FactoryReset,
{
    let mut pins = heapless::Vec::<MonitoredPin<P>, MAX_SWITCHES>::new();

    for (switch, mut input) in switches {
        let event = InputEvent {
            pin: switch.pin,
            function: switch.function,
        };
        input.attach_falling_edge(channel.sender(), event);
        input.enable_interrupt();

        info!("Switch on GPIO {} mapped to {:?}", switch.pin, switch.function);

        pins.push(MonitoredPin {
            pin: switch.pin,
            function: switch.function,
            input,
        })
        .map_err(|_| anyhow!("more than {} switches configured", MAX_SWITCHES))?;
    }

    Ok(SwitchMonitor::new(
        channel.receiver(),
        pins,
        delay,
        router,
        config,
    ))
}

/// Stops the node for good. Used when the input path cannot be set up.
pub fn halt(reason: &Error) -> ! {
    error!("Halting: {:#}", reason);
    loop {
        std::thread::park();
    }
}
