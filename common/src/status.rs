use core::fmt;

use serde::{Deserialize, Serialize};

/// Result codes exchanged with the Zigbee stack.
///
/// These mirror the numeric error codes the stack itself uses, so a handler
/// result can be handed back without translation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Ok,
    Fail,
    NoMem,
    InvalidArg,
    InvalidState,
    InvalidSize,
    NotFound,
    NotSupported,
    Timeout,
}

impl Status {
    pub const fn code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Fail => -1,
            Status::NoMem => 0x101,
            Status::InvalidArg => 0x102,
            Status::InvalidState => 0x103,
            Status::InvalidSize => 0x104,
            Status::NotFound => 0x105,
            Status::NotSupported => 0x106,
            Status::Timeout => 0x107,
        }
    }

    /// Maps a raw code back to a status. Unknown codes collapse to `Fail`.
    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => Status::Ok,
            0x101 => Status::NoMem,
            0x102 => Status::InvalidArg,
            0x103 => Status::InvalidState,
            0x104 => Status::InvalidSize,
            0x105 => Status::NotFound,
            0x106 => Status::NotSupported,
            0x107 => Status::Timeout,
            _ => Status::Fail,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Status::Ok => "ESP_OK",
            Status::Fail => "ESP_FAIL",
            Status::NoMem => "ESP_ERR_NO_MEM",
            Status::InvalidArg => "ESP_ERR_INVALID_ARG",
            Status::InvalidState => "ESP_ERR_INVALID_STATE",
            Status::InvalidSize => "ESP_ERR_INVALID_SIZE",
            Status::NotFound => "ESP_ERR_NOT_FOUND",
            Status::NotSupported => "ESP_ERR_NOT_SUPPORTED",
            Status::Timeout => "ESP_ERR_TIMEOUT",
        }
    }

    pub const fn is_ok(self) -> bool {
        matches!(self, Status::Ok)
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Ok
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Status {}

/// Status byte carried inside ZCL messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZclStatus(pub u8);

impl ZclStatus {
    pub const SUCCESS: Self = Self(0x00);
    pub const FAILURE: Self = Self(0x01);
    pub const UNSUP_ATTRIB: Self = Self(0x86);
    pub const INVALID_VALUE: Self = Self(0x87);

    pub const fn is_success(self) -> bool {
        self.0 == Self::SUCCESS.0
    }
}

impl Default for ZclStatus {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl fmt::Display for ZclStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}
