use anyhow::{Context, Error};
use common::zcl::{
    AttrValue, Cluster, ClusterList, ClusterRole, EndpointConfig, EndpointList, ZclString,
    ATTR_BASIC_MANUFACTURER_NAME, ATTR_BASIC_MODEL_IDENTIFIER, ATTR_BASIC_POWER_SOURCE,
    ATTR_BASIC_ZCL_VERSION, ATTR_IDENTIFY_IDENTIFY_TIME, BASIC_ZCL_VERSION_DEFAULT, CLUSTER_BASIC,
    CLUSTER_IDENTIFY, DEVICE_ID_CUSTOM_ATTR, IDENTIFY_TIME_DEFAULT, PROFILE_HOME_AUTOMATION,
};
use log::info;

use super::dispatch::AttributeEventDispatcher;
use crate::config::ZigbeeConfig;

/// Basic and Identify clusters every node carries.
pub fn create_basic_clusters(config: &ZigbeeConfig) -> Result<ClusterList, Error> {
    info!("Creating Basic & Identify clusters");

    let mut basic = Cluster::new(CLUSTER_BASIC, ClusterRole::Server);
    basic.add_attribute(ATTR_BASIC_ZCL_VERSION, AttrValue::U8(BASIC_ZCL_VERSION_DEFAULT))?;
    basic.add_attribute(ATTR_BASIC_POWER_SOURCE, AttrValue::Enum8(config.power_source))?;
    basic.add_attribute(
        ATTR_BASIC_MANUFACTURER_NAME,
        AttrValue::CharString(ZclString::new(&config.manufacturer_name).context("manufacturer name")?),
    )?;
    basic.add_attribute(
        ATTR_BASIC_MODEL_IDENTIFIER,
        AttrValue::CharString(ZclString::new(&config.model_identifier).context("model identifier")?),
    )?;

    let mut identify = Cluster::new(CLUSTER_IDENTIFY, ClusterRole::Server);
    identify.add_attribute(ATTR_IDENTIFY_IDENTIFY_TIME, AttrValue::U16(IDENTIFY_TIME_DEFAULT))?;

    let mut clusters = ClusterList::new();
    clusters.add(basic)?;
    clusters.add(identify)?;
    clusters.add(Cluster::new(CLUSTER_IDENTIFY, ClusterRole::Client))?;

    Ok(clusters)
}

/// The single sensor endpoint, with any clusters the application adds.
pub fn create_sensor_endpoint(
    config: &ZigbeeConfig,
    dispatcher: &AttributeEventDispatcher,
) -> Result<EndpointList, Error> {
    info!("Creating sensor endpoint {}", config.endpoint);

    let mut clusters = create_basic_clusters(config)?;
    dispatcher.create_clusters(&mut clusters);

    let mut endpoints = EndpointList::new();
    endpoints.add(
        EndpointConfig {
            endpoint: config.endpoint,
            profile_id: PROFILE_HOME_AUTOMATION,
            device_id: DEVICE_ID_CUSTOM_ATTR,
            device_version: 1,
        },
        clusters,
    )?;

    Ok(endpoints)
}
