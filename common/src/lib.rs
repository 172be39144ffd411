//! Types shared between the node firmware and anything that talks to the
//! Zigbee stack on its behalf: result codes, stack signals and the small
//! slice of the ZCL data model the node registers.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod signal;
pub mod status;
pub mod zcl;

pub use signal::{ExtendedPanId, JoinedNetwork, NetworkSignal, SignalKind, SignalPayload};
pub use status::{Status, ZclStatus};
