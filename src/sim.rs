//! Host-side stand-ins for the radio stack, the buttons and the LED, so the
//! node can run and be tested without hardware.

use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, Error};
use common::{
    signal::{SIGNAL_DEVICE_FIRST_START, SIGNAL_DEVICE_REBOOT, SIGNAL_SKIP_STARTUP, SIGNAL_STEERING},
    zcl::{AttributeUpdateMessage, CustomCommandMessage, EndpointList},
    JoinedNetwork, NetworkSignal, SignalPayload, Status,
};
use embedded_hal::digital::{ErrorType, InputPin};
use log::{debug, info};
use smart_leds::{SmartLedsWrite, RGB8};

use crate::{
    switches::{InputEvent, InputEventSender, InterruptPin},
    zigbee::{
        AttributeEventDispatcher, CommissioningMode, CoreAction, PlatformConfig, StackConfig,
        StackEventSink, ZigbeeStack,
    },
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Calls made into the simulated stack, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StackCall {
    ConfigurePlatform,
    Init,
    RegisterDevice,
    RegisterActionHandler,
    SetChannelMask(u32),
    Start(bool),
    Commission(CommissioningMode),
    RegisterIdentify(u8),
    FactoryReset,
    Restart,
}

struct SimState {
    factory_new: bool,
    joined: bool,
    steering_failures: u32,
    init_failures: u32,
    network: JoinedNetwork,
    sink: Option<StackEventSink>,
    dispatcher: Option<Arc<AttributeEventDispatcher>>,
    endpoints: Option<EndpointList>,
    identify_endpoint: Option<u8>,
    calls: Vec<StackCall>,
}

/// A stack that joins `network` after a configurable number of failed
/// steering attempts.
pub struct SimulatedStack {
    state: Mutex<SimState>,
}

impl SimulatedStack {
    pub fn new(network: JoinedNetwork) -> Self {
        Self {
            state: Mutex::new(SimState {
                factory_new: true,
                joined: false,
                steering_failures: 0,
                init_failures: 0,
                network,
                sink: None,
                dispatcher: None,
                endpoints: None,
                identify_endpoint: None,
                calls: Vec::new(),
            }),
        }
    }

    pub fn with_steering_failures(self, failures: u32) -> Self {
        lock(&self.state).steering_failures = failures;
        self
    }

    pub fn with_init_failures(self, failures: u32) -> Self {
        lock(&self.state).init_failures = failures;
        self
    }

    /// Starts out with stored credentials for the network.
    pub fn already_joined(self) -> Self {
        {
            let mut state = lock(&self.state);
            state.factory_new = false;
            state.joined = true;
        }
        self
    }

    pub fn calls(&self) -> Vec<StackCall> {
        lock(&self.state).calls.clone()
    }

    pub fn endpoints(&self) -> Option<EndpointList> {
        lock(&self.state).endpoints.clone()
    }

    /// Makes the next `failures` steering attempts fail.
    pub fn fail_next_steering(&self, failures: u32) {
        lock(&self.state).steering_failures = failures;
    }

    /// Raw identify notification, as a coordinator's Identify command would
    /// trigger. Returns false until the identify handler is registered.
    pub fn simulate_identify(&self, identifying: bool) -> bool {
        let state = lock(&self.state);
        match (&state.sink, state.identify_endpoint) {
            (Some(sink), Some(_)) => {
                sink.identify(identifying);
                true
            }
            _ => false,
        }
    }

    pub fn simulate_attribute_write(&self, message: &AttributeUpdateMessage) -> Status {
        match self.dispatcher() {
            Some(dispatcher) => dispatcher.dispatch(CoreAction::SetAttributeValue(message)),
            None => Status::InvalidState,
        }
    }

    pub fn simulate_custom_command(&self, message: &CustomCommandMessage) -> Status {
        match self.dispatcher() {
            Some(dispatcher) => dispatcher.dispatch(CoreAction::CustomClusterCommand(message)),
            None => Status::InvalidState,
        }
    }

    fn dispatcher(&self) -> Option<Arc<AttributeEventDispatcher>> {
        lock(&self.state).dispatcher.clone()
    }

    fn emit(state: &SimState, id: u32, status: Status, payload: SignalPayload) {
        match &state.sink {
            Some(sink) => sink.signal(NetworkSignal::from_raw(id, status, payload)),
            None => debug!("Stack not initialized, dropping signal 0x{:x}", id),
        }
    }
}

impl ZigbeeStack for SimulatedStack {
    fn configure_platform(&self, config: &PlatformConfig) -> Result<(), Error> {
        debug!("Platform config: {:?}", config);
        lock(&self.state).calls.push(StackCall::ConfigurePlatform);
        Ok(())
    }

    fn init(&self, config: &StackConfig, events: StackEventSink) -> Result<(), Error> {
        debug!("Stack config: {:?}", config);
        let mut state = lock(&self.state);
        state.calls.push(StackCall::Init);
        state.sink = Some(events);
        Ok(())
    }

    fn register_device(&self, endpoints: EndpointList) -> Result<(), Error> {
        let mut state = lock(&self.state);
        state.calls.push(StackCall::RegisterDevice);
        state.endpoints = Some(endpoints);
        Ok(())
    }

    fn register_action_handler(&self, dispatcher: Arc<AttributeEventDispatcher>) -> Result<(), Error> {
        let mut state = lock(&self.state);
        state.calls.push(StackCall::RegisterActionHandler);
        state.dispatcher = Some(dispatcher);
        Ok(())
    }

    fn set_primary_channel_mask(&self, mask: u32) -> Result<(), Error> {
        lock(&self.state).calls.push(StackCall::SetChannelMask(mask));
        Ok(())
    }

    fn start(&self, autostart: bool) -> Result<(), Error> {
        let mut state = lock(&self.state);
        state.calls.push(StackCall::Start(autostart));
        if state.sink.is_none() {
            return Err(anyhow!("stack started before init"));
        }
        Self::emit(&state, SIGNAL_SKIP_STARTUP, Status::Ok, SignalPayload::Empty);
        Ok(())
    }

    fn start_top_level_commissioning(&self, mode: CommissioningMode) -> Result<(), Error> {
        let mut state = lock(&self.state);
        state.calls.push(StackCall::Commission(mode));

        match mode {
            CommissioningMode::Initialization => {
                let id = if state.factory_new {
                    SIGNAL_DEVICE_FIRST_START
                } else {
                    SIGNAL_DEVICE_REBOOT
                };
                let status = if state.init_failures > 0 {
                    state.init_failures -= 1;
                    Status::Fail
                } else {
                    Status::Ok
                };
                Self::emit(&state, id, status, SignalPayload::Empty);
            }
            CommissioningMode::NetworkSteering => {
                if state.steering_failures > 0 {
                    state.steering_failures -= 1;
                    Self::emit(&state, SIGNAL_STEERING, Status::Timeout, SignalPayload::Empty);
                } else {
                    state.joined = true;
                    state.factory_new = false;
                    let network = state.network;
                    Self::emit(
                        &state,
                        SIGNAL_STEERING,
                        Status::Ok,
                        SignalPayload::Network(network),
                    );
                }
            }
            other => return Err(anyhow!("{:?} commissioning not supported", other)),
        }

        Ok(())
    }

    fn register_identify_handler(&self, endpoint: u8) {
        let mut state = lock(&self.state);
        state.calls.push(StackCall::RegisterIdentify(endpoint));
        state.identify_endpoint = Some(endpoint);
    }

    fn is_factory_new(&self) -> bool {
        lock(&self.state).factory_new
    }

    fn is_joined(&self) -> bool {
        lock(&self.state).joined
    }

    fn network_info(&self) -> JoinedNetwork {
        lock(&self.state).network
    }

    fn factory_reset(&self) {
        {
            let mut state = lock(&self.state);
            state.calls.push(StackCall::FactoryReset);
            state.factory_new = true;
            state.joined = false;
            info!("Simulated stack: persisted network state erased");
        }
        self.restart();
    }

    fn restart(&self) {
        let mut state = lock(&self.state);
        state.calls.push(StackCall::Restart);
        state.identify_endpoint = None;
        info!("Simulated stack: restarting");
        Self::emit(&state, SIGNAL_SKIP_STARTUP, Status::Ok, SignalPayload::Empty);
    }
}

#[derive(Default)]
struct PinState {
    low: bool,
    irq_enabled: bool,
    isr: Option<(InputEventSender<'static>, InputEvent)>,
}

/// Active-low button with a pull-up. Clones share the same pin.
#[derive(Clone, Default)]
pub struct SimulatedPin {
    state: Arc<Mutex<PinState>>,
}

impl SimulatedPin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pulls the pin low, firing the interrupt if it is enabled.
    pub fn press(&self) {
        let mut state = lock(&self.state);
        let falling = !state.low;
        state.low = true;

        if falling && state.irq_enabled {
            if let Some((sender, event)) = state.isr {
                if !sender.send(event) {
                    debug!("GPIO {} edge dropped, queue full", event.pin);
                }
            }
        }
    }

    pub fn release(&self) {
        lock(&self.state).low = false;
    }

    pub fn interrupt_enabled(&self) -> bool {
        lock(&self.state).irq_enabled
    }
}

impl ErrorType for SimulatedPin {
    type Error = Infallible;
}

impl InputPin for SimulatedPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(!lock(&self.state).low)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(lock(&self.state).low)
    }
}

impl InterruptPin for SimulatedPin {
    fn attach_falling_edge(&mut self, sender: InputEventSender<'static>, event: InputEvent) {
        lock(&self.state).isr = Some((sender, event));
    }

    fn enable_interrupt(&mut self) {
        lock(&self.state).irq_enabled = true;
    }

    fn disable_interrupt(&mut self) {
        lock(&self.state).irq_enabled = false;
    }
}

/// An LED that only logs what it is told to show.
#[derive(Debug, Default)]
pub struct LogLed {
    last: Vec<RGB8>,
}

impl LogLed {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SmartLedsWrite for LogLed {
    type Error = Infallible;
    type Color = RGB8;

    fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        let colors: Vec<RGB8> = iterator.into_iter().map(Into::into).collect();
        if colors != self.last {
            debug!("LED: {:?}", colors);
            self.last = colors;
        }
        Ok(())
    }
}
