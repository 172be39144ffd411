use alloc::vec::Vec;
use core::fmt;

use serde::{Deserialize, Serialize};

use crate::status::Status;

// Raw application signal ids as reported by the stack.
pub const SIGNAL_DEFAULT_START: u32 = 0x00;
pub const SIGNAL_SKIP_STARTUP: u32 = 0x01;
pub const SIGNAL_DEVICE_ANNCE: u32 = 0x02;
pub const SIGNAL_LEAVE: u32 = 0x03;
pub const SIGNAL_ERROR: u32 = 0x04;
pub const SIGNAL_DEVICE_FIRST_START: u32 = 0x05;
pub const SIGNAL_DEVICE_REBOOT: u32 = 0x06;
pub const SIGNAL_TOUCHLINK_NWK_STARTED: u32 = 0x07;
pub const SIGNAL_TOUCHLINK_NWK_JOINED_ROUTER: u32 = 0x08;
pub const SIGNAL_TOUCHLINK: u32 = 0x09;
pub const SIGNAL_STEERING: u32 = 0x0a;
pub const SIGNAL_FORMATION: u32 = 0x0b;
pub const SIGNAL_PRODUCTION_CONFIG_READY: u32 = 0x14;
pub const SIGNAL_CAN_SLEEP: u32 = 0x16;

/// The signal kinds the commissioning controller reacts to. Anything else is
/// carried through as `Other` with its raw id so it can still be logged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    /// The stack finished initialising and skipped its own startup sequence.
    StackReady,
    /// The device booted, either factory-new or with stored credentials.
    FirstStartOrReboot,
    /// A network steering attempt finished.
    SteeringResult,
    Other(u32),
}

impl SignalKind {
    pub const fn from_raw(id: u32) -> Self {
        match id {
            SIGNAL_SKIP_STARTUP => SignalKind::StackReady,
            SIGNAL_DEVICE_FIRST_START | SIGNAL_DEVICE_REBOOT => SignalKind::FirstStartOrReboot,
            SIGNAL_STEERING => SignalKind::SteeringResult,
            other => SignalKind::Other(other),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            SignalKind::StackReady => signal_name(SIGNAL_SKIP_STARTUP),
            SignalKind::FirstStartOrReboot => "BDB_SIGNAL_DEVICE_FIRST_START_OR_REBOOT",
            SignalKind::SteeringResult => signal_name(SIGNAL_STEERING),
            SignalKind::Other(id) => signal_name(id),
        }
    }
}

/// Human readable name for a raw signal id.
pub const fn signal_name(id: u32) -> &'static str {
    match id {
        SIGNAL_DEFAULT_START => "ZDO_SIGNAL_DEFAULT_START",
        SIGNAL_SKIP_STARTUP => "ZDO_SIGNAL_SKIP_STARTUP",
        SIGNAL_DEVICE_ANNCE => "ZDO_SIGNAL_DEVICE_ANNCE",
        SIGNAL_LEAVE => "ZDO_SIGNAL_LEAVE",
        SIGNAL_ERROR => "ZDO_SIGNAL_ERROR",
        SIGNAL_DEVICE_FIRST_START => "BDB_SIGNAL_DEVICE_FIRST_START",
        SIGNAL_DEVICE_REBOOT => "BDB_SIGNAL_DEVICE_REBOOT",
        SIGNAL_TOUCHLINK_NWK_STARTED => "BDB_SIGNAL_TOUCHLINK_NWK_STARTED",
        SIGNAL_TOUCHLINK_NWK_JOINED_ROUTER => "BDB_SIGNAL_TOUCHLINK_NWK_JOINED_ROUTER",
        SIGNAL_TOUCHLINK => "BDB_SIGNAL_TOUCHLINK",
        SIGNAL_STEERING => "BDB_SIGNAL_STEERING",
        SIGNAL_FORMATION => "BDB_SIGNAL_FORMATION",
        SIGNAL_PRODUCTION_CONFIG_READY => "ZDO_SIGNAL_PRODUCTION_CONFIG_READY",
        SIGNAL_CAN_SLEEP => "COMMON_SIGNAL_CAN_SLEEP",
        _ => "UNKNOWN_SIGNAL",
    }
}

/// 64-bit extended PAN identifier, stored little-endian as the stack hands it
/// over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtendedPanId(pub [u8; 8]);

impl fmt::Display for ExtendedPanId {
    /// Most significant byte first, colon separated.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().rev().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Identifiers of the network the device joined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedNetwork {
    pub extended_pan_id: ExtendedPanId,
    pub pan_id: u16,
    pub channel: u8,
    pub short_address: u16,
}

impl fmt::Display for JoinedNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Extended PAN ID: {}, PAN ID: 0x{:04x}, Channel: {}, Short Address: 0x{:04x}",
            self.extended_pan_id, self.pan_id, self.channel, self.short_address
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalPayload {
    #[default]
    Empty,
    Network(JoinedNetwork),
    Raw(Vec<u8>),
}

/// A signal emitted by the stack. Consumed once by the controller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSignal {
    pub kind: SignalKind,
    pub status: Status,
    pub payload: SignalPayload,
}

impl NetworkSignal {
    pub fn new(kind: SignalKind, status: Status) -> Self {
        Self {
            kind,
            status,
            payload: SignalPayload::Empty,
        }
    }

    pub fn from_raw(id: u32, status: Status, payload: SignalPayload) -> Self {
        Self {
            kind: SignalKind::from_raw(id),
            status,
            payload,
        }
    }

    pub fn with_payload(mut self, payload: SignalPayload) -> Self {
        self.payload = payload;
        self
    }

    /// The joined network carried by the signal, if the stack attached one.
    pub fn network(&self) -> Option<JoinedNetwork> {
        match self.payload {
            SignalPayload::Network(network) => Some(network),
            _ => None,
        }
    }
}
