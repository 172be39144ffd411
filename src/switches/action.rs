use log::info;

use super::SwitchFunction;

/// What a confirmed button press asks the device to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalAction {
    FactoryReset,
}

impl From<SwitchFunction> for LogicalAction {
    fn from(function: SwitchFunction) -> Self {
        match function {
            SwitchFunction::FactoryReset => LogicalAction::FactoryReset,
        }
    }
}

/// Anything that can wipe the network state and rejoin from scratch.
pub trait FactoryReset {
    fn factory_reset(&self);
}

impl<T: FactoryReset + ?Sized> FactoryReset for std::sync::Arc<T> {
    fn factory_reset(&self) {
        (**self).factory_reset()
    }
}

pub struct ActionRouter<R> {
    resetter: R,
}

impl<R: FactoryReset> ActionRouter<R> {
    pub fn new(resetter: R) -> Self {
        Self { resetter }
    }

    pub fn dispatch(&self, action: LogicalAction) {
        match action {
            LogicalAction::FactoryReset => {
                info!("Factory reset requested from button");
                self.resetter.factory_reset();
            }
        }
    }
}
