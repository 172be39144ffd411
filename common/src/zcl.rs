//! The small part of the Zigbee Cluster Library the node touches directly:
//! inbound attribute/command messages and the cluster list it registers.
//! Attribute values stay opaque blobs; decoding them is up to the handlers.

use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::status::{Status, ZclStatus};

pub const PROFILE_HOME_AUTOMATION: u16 = 0x0104;
pub const DEVICE_ID_CUSTOM_ATTR: u16 = 0xfff2;

pub const CLUSTER_BASIC: u16 = 0x0000;
pub const CLUSTER_IDENTIFY: u16 = 0x0003;

pub const ATTR_BASIC_ZCL_VERSION: u16 = 0x0000;
pub const ATTR_BASIC_MANUFACTURER_NAME: u16 = 0x0004;
pub const ATTR_BASIC_MODEL_IDENTIFIER: u16 = 0x0005;
pub const ATTR_BASIC_POWER_SOURCE: u16 = 0x0007;
pub const ATTR_IDENTIFY_IDENTIFY_TIME: u16 = 0x0000;

pub const BASIC_ZCL_VERSION_DEFAULT: u8 = 0x08;
pub const BASIC_POWER_SOURCE_DEFAULT: u8 = 0x00;
pub const IDENTIFY_TIME_DEFAULT: u16 = 0x0000;

pub const ZCL_TYPE_U8: u8 = 0x20;
pub const ZCL_TYPE_U16: u8 = 0x21;
pub const ZCL_TYPE_ENUM8: u8 = 0x30;
pub const ZCL_TYPE_CHAR_STRING: u8 = 0x42;

/// Longest payload a ZCL character string can hold; the length byte 0xff is
/// reserved for "invalid".
pub const ZCL_STRING_MAX_LEN: usize = 0xfe;

/// Raw attribute value as delivered by the stack: a ZCL type id, the declared
/// size and the bytes themselves.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub data_type: u8,
    pub size: u16,
    pub bytes: Vec<u8>,
}

impl AttributeValue {
    pub fn new(data_type: u8, bytes: Vec<u8>) -> Self {
        Self {
            data_type,
            size: bytes.len() as u16,
            bytes,
        }
    }

    /// Bytes within the declared size. A blob shorter than its declared size
    /// yields whatever is present.
    pub fn data(&self) -> &[u8] {
        let end = (self.size as usize).min(self.bytes.len());
        &self.bytes[..end]
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self.data() {
            [value] => Some(*value),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self.data() {
            [lo, hi] => Some(u16::from_le_bytes([*lo, *hi])),
            _ => None,
        }
    }
}

/// An attribute write delivered to the device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeUpdateMessage {
    pub status: ZclStatus,
    pub endpoint: u8,
    pub cluster: u16,
    pub attribute: u16,
    pub value: AttributeValue,
}

/// A command addressed to a custom (manufacturer specific) cluster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomCommandMessage {
    pub status: ZclStatus,
    pub endpoint: u8,
    pub cluster: u16,
    pub command: u8,
    pub data: AttributeValue,
}

/// Length-prefixed ZCL character string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZclString(Vec<u8>);

impl ZclString {
    pub fn new(value: &str) -> Result<Self, Status> {
        let bytes = value.as_bytes();
        if bytes.len() > ZCL_STRING_MAX_LEN {
            return Err(Status::InvalidSize);
        }

        let mut encoded = Vec::with_capacity(bytes.len() + 1);
        encoded.push(bytes.len() as u8);
        encoded.extend_from_slice(bytes);
        Ok(Self(encoded))
    }

    /// Encoded form, length byte included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0
            .get(1..)
            .and_then(|bytes| core::str::from_utf8(bytes).ok())
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttrValue {
    U8(u8),
    U16(u16),
    Enum8(u8),
    CharString(ZclString),
}

impl AttrValue {
    pub fn data_type(&self) -> u8 {
        match self {
            AttrValue::U8(_) => ZCL_TYPE_U8,
            AttrValue::U16(_) => ZCL_TYPE_U16,
            AttrValue::Enum8(_) => ZCL_TYPE_ENUM8,
            AttrValue::CharString(_) => ZCL_TYPE_CHAR_STRING,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: u16,
    pub value: AttrValue,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterRole {
    Server,
    Client,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: u16,
    pub role: ClusterRole,
    pub attributes: Vec<Attribute>,
}

impl Cluster {
    pub fn new(id: u16, role: ClusterRole) -> Self {
        Self {
            id,
            role,
            attributes: Vec::new(),
        }
    }

    /// Adds an attribute. Ids are unique within a cluster.
    pub fn add_attribute(&mut self, id: u16, value: AttrValue) -> Result<(), Status> {
        if self.attribute(id).is_some() {
            return Err(Status::InvalidArg);
        }
        self.attributes.push(Attribute { id, value });
        Ok(())
    }

    pub fn attribute(&self, id: u16) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .find(|attribute| attribute.id == id)
            .map(|attribute| &attribute.value)
    }
}

/// Clusters hosted on one endpoint. A cluster id may appear once per role.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterList {
    clusters: Vec<Cluster>,
}

impl ClusterList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, cluster: Cluster) -> Result<(), Status> {
        if self.get(cluster.id, cluster.role).is_some() {
            return Err(Status::InvalidArg);
        }
        self.clusters.push(cluster);
        Ok(())
    }

    pub fn get(&self, id: u16, role: ClusterRole) -> Option<&Cluster> {
        self.clusters
            .iter()
            .find(|cluster| cluster.id == id && cluster.role == role)
    }

    pub fn get_mut(&mut self, id: u16, role: ClusterRole) -> Option<&mut Cluster> {
        self.clusters
            .iter_mut()
            .find(|cluster| cluster.id == id && cluster.role == role)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub endpoint: u8,
    pub profile_id: u16,
    pub device_id: u16,
    pub device_version: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub config: EndpointConfig,
    pub clusters: ClusterList,
}

/// Everything the device registers with the stack.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointList {
    endpoints: Vec<Endpoint>,
}

impl EndpointList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, config: EndpointConfig, clusters: ClusterList) -> Result<(), Status> {
        if self.get(config.endpoint).is_some() {
            return Err(Status::InvalidArg);
        }
        self.endpoints.push(Endpoint { config, clusters });
        Ok(())
    }

    pub fn get(&self, endpoint: u8) -> Option<&Endpoint> {
        self.endpoints
            .iter()
            .find(|entry| entry.config.endpoint == endpoint)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Human readable attribute value, used when logging incoming writes.
pub fn describe_value(value: &AttributeValue) -> String {
    use core::fmt::Write;

    let mut out = String::new();
    for (i, byte) in value.data().iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zcl_string() {
        let name = ZclString::new("Zigbee Device").unwrap();
        assert_eq!(name.as_bytes()[0], 13);
        assert_eq!(&name.as_bytes()[1..], b"Zigbee Device");
        assert_eq!(name.as_str(), "Zigbee Device");

        let too_long = "x".repeat(ZCL_STRING_MAX_LEN + 1);
        assert_eq!(ZclString::new(&too_long), Err(Status::InvalidSize));
    }

    #[test]
    fn test_zcl_string_without_length_byte() {
        assert_eq!(ZclString(Vec::new()).as_str(), "");
        assert_eq!(ZclString(vec![2, 0xff, 0xfe]).as_str(), "");
        assert_eq!(ZclString::new("").unwrap().as_str(), "");
    }

    #[test]
    fn test_attribute_value_respects_declared_size() {
        let value = AttributeValue {
            data_type: ZCL_TYPE_U16,
            size: 2,
            bytes: vec![0x34, 0x12, 0xff],
        };
        assert_eq!(value.data(), &[0x34, 0x12]);
        assert_eq!(value.as_u16(), Some(0x1234));
        assert_eq!(value.as_u8(), None);
        assert_eq!(describe_value(&value), "34 12");

        let truncated = AttributeValue {
            data_type: ZCL_TYPE_U8,
            size: 4,
            bytes: vec![0x07],
        };
        assert_eq!(truncated.as_u8(), Some(0x07));
    }

    #[test]
    fn test_cluster_list_rejects_duplicates() {
        let mut clusters = ClusterList::new();
        clusters
            .add(Cluster::new(CLUSTER_IDENTIFY, ClusterRole::Server))
            .unwrap();
        clusters
            .add(Cluster::new(CLUSTER_IDENTIFY, ClusterRole::Client))
            .unwrap();

        assert_eq!(
            clusters.add(Cluster::new(CLUSTER_IDENTIFY, ClusterRole::Server)),
            Err(Status::InvalidArg)
        );
        assert_eq!(clusters.len(), 2);

        let mut basic = Cluster::new(CLUSTER_BASIC, ClusterRole::Server);
        basic
            .add_attribute(ATTR_BASIC_ZCL_VERSION, AttrValue::U8(BASIC_ZCL_VERSION_DEFAULT))
            .unwrap();
        assert_eq!(
            basic.add_attribute(ATTR_BASIC_ZCL_VERSION, AttrValue::U8(3)),
            Err(Status::InvalidArg)
        );
    }
}
