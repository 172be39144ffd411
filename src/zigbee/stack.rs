use std::sync::Arc;

use anyhow::Error;
use common::{zcl::EndpointList, JoinedNetwork};

use super::{dispatch::AttributeEventDispatcher, StackEventSink};
use crate::config::ZigbeeConfig;

/// Commissioning steps understood by the stack. Values are the BDB mode bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CommissioningMode {
    Initialization = 0x00,
    Touchlink = 0x01,
    NetworkSteering = 0x02,
    NetworkFormation = 0x04,
    FindingAndBinding = 0x08,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceRole {
    Coordinator,
    Router,
    EndDevice,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RadioMode {
    /// The radio sits on the same chip as the application.
    Native,
    /// Radio co-processor reached over a UART.
    UartRcp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostConnectionMode {
    None,
    CliUart,
    RcpUart,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlatformConfig {
    pub radio_mode: RadioMode,
    pub host_connection: HostConnectionMode,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            radio_mode: RadioMode::Native,
            host_connection: HostConnectionMode::None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackConfig {
    pub role: DeviceRole,
    pub install_code_policy: bool,
    pub ed_aging_timeout_minutes: u16,
    pub keep_alive_ms: u32,
}

impl StackConfig {
    pub fn end_device(config: &ZigbeeConfig) -> Self {
        Self {
            role: DeviceRole::EndDevice,
            install_code_policy: config.install_code_policy,
            ed_aging_timeout_minutes: config.ed_aging_timeout_minutes,
            keep_alive_ms: config.keep_alive_ms,
        }
    }
}

/// The radio and network protocol stack as seen by the device. The stack
/// reports progress asynchronously through the `StackEventSink` handed to
/// `init`, and calls back into the dispatcher for inbound ZCL traffic.
pub trait ZigbeeStack: Send + Sync + 'static {
    fn configure_platform(&self, config: &PlatformConfig) -> Result<(), Error>;

    fn init(&self, config: &StackConfig, events: StackEventSink) -> Result<(), Error>;

    fn register_device(&self, endpoints: EndpointList) -> Result<(), Error>;

    fn register_action_handler(&self, dispatcher: Arc<AttributeEventDispatcher>) -> Result<(), Error>;

    fn set_primary_channel_mask(&self, mask: u32) -> Result<(), Error>;

    /// Starts the stack. With `autostart` false the stack only reports
    /// `StackReady` and waits to be told which commissioning step to run.
    fn start(&self, autostart: bool) -> Result<(), Error>;

    fn start_top_level_commissioning(&self, mode: CommissioningMode) -> Result<(), Error>;

    fn register_identify_handler(&self, endpoint: u8);

    fn is_factory_new(&self) -> bool;

    fn is_joined(&self) -> bool;

    fn network_info(&self) -> JoinedNetwork;

    /// Erases persisted network state and restarts.
    fn factory_reset(&self);

    fn restart(&self);
}
