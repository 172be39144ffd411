//! The Zigbee side of the node: device setup, the network task and the
//! commissioning state machine it runs.

use std::sync::Arc;

use anyhow::Error;
use common::{
    zcl::{AttributeUpdateMessage, ClusterList, CustomCommandMessage},
    JoinedNetwork, NetworkSignal, Status,
};
use log::{info, warn};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

use crate::{
    config::{CommissioningConfig, Config, ZigbeeConfig},
    switches::FactoryReset,
};

pub mod clusters;
pub mod controller;
pub mod dispatch;
pub mod identify;
pub mod stack;
pub mod timer;

pub use controller::{CommissioningController, RetryState};
pub use dispatch::{AttributeEventDispatcher, CoreAction, EventCategory, HandlerRegistry};
pub use identify::{IdentifyEdge, IdentifyEdgeDetector};
pub use stack::{CommissioningMode, PlatformConfig, StackConfig, ZigbeeStack};
pub use timer::{ManualScheduler, Scheduler, TimerEvent, TokioScheduler};

pub const NETWORK_QUEUE_CAPACITY: usize = 32;

/// Everything the network task reacts to.
#[derive(Debug)]
pub enum NetworkEvent {
    Signal(NetworkSignal),
    /// Raw identify notification from the stack, repeated values included.
    Identify(bool),
    Timer(TimerEvent),
    FactoryReset,
}

/// The stack's way back into the network task.
#[derive(Clone)]
pub struct StackEventSink {
    events: mpsc::Sender<NetworkEvent>,
}

impl StackEventSink {
    pub fn new(events: mpsc::Sender<NetworkEvent>) -> Self {
        Self { events }
    }

    pub fn signal(&self, signal: NetworkSignal) {
        if let Err(e) = self.events.try_send(NetworkEvent::Signal(signal)) {
            warn!("Dropping stack signal: {}", e);
        }
    }

    pub fn identify(&self, identifying: bool) {
        if let Err(e) = self.events.try_send(NetworkEvent::Identify(identifying)) {
            warn!("Dropping identify notification: {}", e);
        }
    }
}

/// A sensor device that has not been started yet. Handlers are registered
/// here; `start` hands everything to the network task.
pub struct ZigbeeDevice<S> {
    stack: Arc<S>,
    config: ZigbeeConfig,
    commissioning: CommissioningConfig,
    handlers: HandlerRegistry,
    events_tx: mpsc::Sender<NetworkEvent>,
    events_rx: mpsc::Receiver<NetworkEvent>,
    status_tx: watch::Sender<Option<JoinedNetwork>>,
}

impl<S: ZigbeeStack> ZigbeeDevice<S> {
    pub fn new(stack: Arc<S>, config: &Config) -> Self {
        let (events_tx, events_rx) = mpsc::channel(NETWORK_QUEUE_CAPACITY);
        let (status_tx, _) = watch::channel(None);

        Self {
            stack,
            config: config.zigbee.clone(),
            commissioning: config.commissioning.clone(),
            handlers: HandlerRegistry::new(),
            events_tx,
            events_rx,
            status_tx,
        }
    }

    pub fn set_on_create_clusters(&mut self, handler: impl Fn(&mut ClusterList) + Send + Sync + 'static) {
        self.handlers.set_on_create_clusters(handler);
    }

    pub fn set_on_attribute_updated(
        &mut self,
        handler: impl Fn(&AttributeUpdateMessage) -> Status + Send + Sync + 'static,
    ) {
        self.handlers.set_on_attribute_updated(handler);
    }

    pub fn set_on_custom_command(
        &mut self,
        handler: impl Fn(&CustomCommandMessage) -> Status + Send + Sync + 'static,
    ) {
        self.handlers.set_on_custom_command(handler);
    }

    pub fn set_on_identify(&mut self, handler: impl Fn(bool) + Send + Sync + 'static) {
        self.handlers.set_on_identify(handler);
    }

    pub fn handle(&self) -> ZigbeeHandle {
        ZigbeeHandle {
            events: self.events_tx.clone(),
            status: self.status_tx.subscribe(),
        }
    }

    /// Configures the platform and spawns the network task.
    pub fn start(self) -> Result<JoinHandle<()>, Error> {
        self.stack.configure_platform(&PlatformConfig::default())?;

        let dispatcher = Arc::new(AttributeEventDispatcher::new(self.handlers));
        let controller = CommissioningController::new(
            self.stack.clone(),
            TokioScheduler::new(self.events_tx.clone()),
            self.config.endpoint,
            &self.commissioning,
            self.status_tx,
        );

        let task = NetworkTask {
            stack: self.stack,
            config: self.config,
            sink: StackEventSink::new(self.events_tx),
            events: self.events_rx,
            controller,
            identify: IdentifyEdgeDetector::new(),
            dispatcher,
        };

        Ok(tokio::spawn(task.run()))
    }
}

struct NetworkTask<S: ZigbeeStack> {
    stack: Arc<S>,
    config: ZigbeeConfig,
    sink: StackEventSink,
    events: mpsc::Receiver<NetworkEvent>,
    controller: CommissioningController<S, TokioScheduler>,
    identify: IdentifyEdgeDetector,
    dispatcher: Arc<AttributeEventDispatcher>,
}

impl<S: ZigbeeStack> NetworkTask<S> {
    async fn run(mut self) {
        info!("Zigbee network task started");

        if let Err(e) = self.setup() {
            self.controller.setup_failed(&e);
        }

        while let Some(event) = self.events.recv().await {
            match event {
                NetworkEvent::Signal(signal) => self.controller.handle_signal(&signal),
                NetworkEvent::Identify(identifying) => {
                    if let Some(edge) = self.identify.on_raw_signal(identifying) {
                        self.dispatcher.identify(edge);
                    }
                }
                NetworkEvent::Timer(timer) => self.controller.on_timer(timer),
                NetworkEvent::FactoryReset => self.controller.factory_reset(),
            }
        }
    }

    fn setup(&mut self) -> Result<(), Error> {
        self.stack
            .init(&StackConfig::end_device(&self.config), self.sink.clone())?;

        let endpoints = clusters::create_sensor_endpoint(&self.config, &self.dispatcher)?;
        self.stack.register_device(endpoints)?;
        self.stack.register_action_handler(self.dispatcher.clone())?;
        self.stack.set_primary_channel_mask(self.config.channel_mask)?;
        self.stack.start(false)
    }
}

/// Cheap handle for talking to a running device.
#[derive(Clone)]
pub struct ZigbeeHandle {
    events: mpsc::Sender<NetworkEvent>,
    status: watch::Receiver<Option<JoinedNetwork>>,
}

impl ZigbeeHandle {
    /// The network the device is currently joined to.
    pub fn network_status(&self) -> Option<JoinedNetwork> {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<JoinedNetwork>> {
        self.status.clone()
    }
}

impl FactoryReset for ZigbeeHandle {
    fn factory_reset(&self) {
        if let Err(e) = self.events.try_send(NetworkEvent::FactoryReset) {
            warn!("Could not queue factory reset: {}", e);
        }
    }
}
