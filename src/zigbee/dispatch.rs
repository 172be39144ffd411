use common::{
    zcl::{AttributeUpdateMessage, ClusterList, CustomCommandMessage},
    Status,
};
use log::{info, warn};

use super::identify::IdentifyEdge;

pub type CreateClustersHandler = Box<dyn Fn(&mut ClusterList) + Send + Sync>;
pub type AttributeUpdatedHandler = Box<dyn Fn(&AttributeUpdateMessage) -> Status + Send + Sync>;
pub type CustomCommandHandler = Box<dyn Fn(&CustomCommandMessage) -> Status + Send + Sync>;
pub type IdentifyHandler = Box<dyn Fn(bool) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventCategory {
    CreateClusters,
    AttributeUpdated,
    CustomCommand,
    Identify,
}

/// Application callbacks, at most one per category. Filled in before the
/// network task starts and never changed afterwards.
#[derive(Default)]
pub struct HandlerRegistry {
    create_clusters: Option<CreateClustersHandler>,
    attribute_updated: Option<AttributeUpdatedHandler>,
    custom_command: Option<CustomCommandHandler>,
    identify: Option<IdentifyHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_on_create_clusters(&mut self, handler: impl Fn(&mut ClusterList) + Send + Sync + 'static) {
        let handler: CreateClustersHandler = Box::new(handler);
        replace(&mut self.create_clusters, handler, EventCategory::CreateClusters);
    }

    pub fn set_on_attribute_updated(
        &mut self,
        handler: impl Fn(&AttributeUpdateMessage) -> Status + Send + Sync + 'static,
    ) {
        let handler: AttributeUpdatedHandler = Box::new(handler);
        replace(&mut self.attribute_updated, handler, EventCategory::AttributeUpdated);
    }

    pub fn set_on_custom_command(
        &mut self,
        handler: impl Fn(&CustomCommandMessage) -> Status + Send + Sync + 'static,
    ) {
        let handler: CustomCommandHandler = Box::new(handler);
        replace(&mut self.custom_command, handler, EventCategory::CustomCommand);
    }

    pub fn set_on_identify(&mut self, handler: impl Fn(bool) + Send + Sync + 'static) {
        let handler: IdentifyHandler = Box::new(handler);
        replace(&mut self.identify, handler, EventCategory::Identify);
    }

    pub fn is_registered(&self, category: EventCategory) -> bool {
        match category {
            EventCategory::CreateClusters => self.create_clusters.is_some(),
            EventCategory::AttributeUpdated => self.attribute_updated.is_some(),
            EventCategory::CustomCommand => self.custom_command.is_some(),
            EventCategory::Identify => self.identify.is_some(),
        }
    }
}

fn replace<T>(slot: &mut Option<T>, handler: T, category: EventCategory) {
    if slot.replace(handler).is_some() {
        warn!("Replacing existing {:?} handler", category);
    }
}

/// Inbound ZCL traffic as delivered by the stack's action callback.
#[derive(Debug)]
pub enum CoreAction<'a> {
    SetAttributeValue(&'a AttributeUpdateMessage),
    CustomClusterCommand(&'a CustomCommandMessage),
    ReadAttributeResponse,
    ReportAttribute,
    ReportConfigResponse,
    Other(u32),
}

/// Routes stack callbacks to the registered application handlers.
pub struct AttributeEventDispatcher {
    handlers: HandlerRegistry,
}

impl AttributeEventDispatcher {
    pub fn new(handlers: HandlerRegistry) -> Self {
        Self { handlers }
    }

    /// Lets the application add its own clusters before the endpoint is
    /// registered.
    pub fn create_clusters(&self, clusters: &mut ClusterList) {
        match &self.handlers.create_clusters {
            Some(handler) => {
                info!("Calling create clusters handler");
                handler(clusters);
            }
            None => info!("No create clusters handler, skipping"),
        }
    }

    /// Returns the handler's status untouched, or `Status::Ok` if there is
    /// nothing to call.
    pub fn dispatch(&self, action: CoreAction<'_>) -> Status {
        match action {
            CoreAction::SetAttributeValue(message) => {
                info!("Received action SET_ATTR_VALUE");
                self.handlers
                    .attribute_updated
                    .as_ref()
                    .map_or(Status::Ok, |handler| handler(message))
            }
            CoreAction::CustomClusterCommand(message) => {
                info!("Received action CUSTOM_CLUSTER_REQ");
                self.handlers
                    .custom_command
                    .as_ref()
                    .map_or(Status::Ok, |handler| handler(message))
            }
            CoreAction::ReadAttributeResponse => {
                info!("Received action READ_ATTR_RESP");
                Status::Ok
            }
            CoreAction::ReportAttribute => {
                info!("Received action REPORT_ATTR");
                Status::Ok
            }
            CoreAction::ReportConfigResponse => {
                info!("Received action REPORT_CONFIG_RESP");
                Status::Ok
            }
            CoreAction::Other(id) => {
                info!("Received action (0x{:x})", id);
                Status::Ok
            }
        }
    }

    pub fn identify(&self, edge: IdentifyEdge) {
        if let Some(handler) = &self.handlers.identify {
            handler(edge.is_identifying());
        }
    }
}
