use std::sync::Arc;

use anyhow::Error;
use env_logger::Env;
use log::{error, info};
use zigbee_sensor_node::common::{
    zcl::{describe_value, AttributeUpdateMessage, CustomCommandMessage},
    ExtendedPanId, JoinedNetwork, Status,
};
use zigbee_sensor_node::console::Console;
use zigbee_sensor_node::prelude::*;
use zigbee_sensor_node::sim::{LogLed, SimulatedPin, SimulatedStack};

/// The network the simulated coordinator hands out.
const DEMO_NETWORK: JoinedNetwork = JoinedNetwork {
    extended_pan_id: ExtendedPanId([0x2b, 0x4f, 0x11, 0xfe, 0xff, 0x8c, 0x21, 0x74]),
    pan_id: 0x1a62,
    channel: 15,
    short_address: 0x4f2b,
};

fn on_attribute_updated(message: &AttributeUpdateMessage) -> Status {
    if !message.status.is_success() {
        error!("Received message: error status({})", message.status);
    } else {
        info!(
            "Received message: endpoint({}), cluster(0x{:x}), attribute(0x{:x}), data size({}) [{}]",
            message.endpoint,
            message.cluster,
            message.attribute,
            message.value.size,
            describe_value(&message.value)
        );
    }
    Status::Ok
}

fn on_custom_command(message: &CustomCommandMessage) -> Status {
    info!("Received custom cluster command: 0x{:x}", message.command);
    Status::Ok
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Starting config...");
    let config = Config::load_or_default()?;

    let channel = match init_event_channel() {
        Ok(channel) => channel,
        Err(e) => halt(&e),
    };

    // Buttons, the identify LED and the radio are all simulated on the host
    let buttons: Vec<(Switch, SimulatedPin)> = config
        .switches
        .iter()
        .map(|switch| (*switch, SimulatedPin::new()))
        .collect();
    let indicator = IdentifyIndicator::new(LogLed::new(), &config.identify);
    let stack = Arc::new(SimulatedStack::new(DEMO_NETWORK).with_steering_failures(1));

    info!("Starting Zigbee device...");
    let mut device = ZigbeeDevice::new(stack.clone(), &config);
    device.set_on_attribute_updated(on_attribute_updated);
    device.set_on_custom_command(on_custom_command);
    let identify = indicator.clone();
    device.set_on_identify(move |identifying| identify.set_identifying(identifying));
    let handle = device.handle();

    info!("Starting switches...");
    let mut monitor = match init_switches(
        channel,
        buttons.clone(),
        TokioDelay,
        ActionRouter::new(handle.clone()),
        &config.debounce,
    ) {
        Ok(monitor) => monitor,
        Err(e) => halt(&e),
    };

    let _network_task = device.start()?;

    let console = Console::new(
        stack,
        buttons
            .into_iter()
            .map(|(switch, pin)| (switch.pin, pin))
            .collect(),
        handle,
        config.zigbee.endpoint,
    );
    tokio::spawn(console.run());

    loop {
        monitor.poll().await;
    }
}
