pub use common;

pub mod config;
pub mod console;
pub mod indicator;
pub mod sim;
pub mod switches;
pub mod zigbee;

pub mod prelude {
    pub use crate::{config::*, indicator::*, switches::*, zigbee::*};
}
