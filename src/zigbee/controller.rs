use std::sync::Arc;
use std::time::Duration;

use anyhow::Error;
use common::{signal::signal_name, JoinedNetwork, NetworkSignal, SignalKind};
use log::{debug, error, info, warn};
use tokio::sync::watch;

use super::{
    stack::{CommissioningMode, ZigbeeStack},
    timer::{Scheduler, TimerEvent},
};
use crate::config::CommissioningConfig;

/// Steering retries since the last successful join.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetryState {
    pub attempts: u32,
    /// A retry timer is armed and has not fired yet.
    pub pending: bool,
}

/// Drives the join lifecycle from the stack's signals.
pub struct CommissioningController<S, T> {
    stack: Arc<S>,
    scheduler: T,
    endpoint: u8,
    steering_retry: Duration,
    restart_delay: Duration,
    retry: Option<RetryState>,
    status: watch::Sender<Option<JoinedNetwork>>,
}

impl<S: ZigbeeStack, T: Scheduler> CommissioningController<S, T> {
    pub fn new(
        stack: Arc<S>,
        scheduler: T,
        endpoint: u8,
        config: &CommissioningConfig,
        status: watch::Sender<Option<JoinedNetwork>>,
    ) -> Self {
        Self {
            stack,
            scheduler,
            endpoint,
            steering_retry: Duration::from_millis(config.steering_retry_ms),
            restart_delay: Duration::from_millis(config.restart_delay_ms),
            retry: None,
            status,
        }
    }

    pub fn handle_signal(&mut self, signal: &NetworkSignal) {
        match signal.kind {
            SignalKind::StackReady => {
                info!("Zigbee stack initialized");
                self.commission(CommissioningMode::Initialization);
            }
            SignalKind::FirstStartOrReboot if signal.status.is_ok() => {
                let factory_new = self.stack.is_factory_new();
                info!(
                    "Device started up in {}factory-reset mode",
                    if factory_new { "" } else { "non " }
                );

                self.stack.register_identify_handler(self.endpoint);

                if factory_new {
                    info!("Start network steering");
                    self.commission(CommissioningMode::NetworkSteering);
                } else {
                    info!("Device rebooted");
                    if self.stack.is_joined() {
                        self.publish(self.stack.network_info());
                    }
                }
            }
            SignalKind::FirstStartOrReboot => {
                warn!("Failed to initialize Zigbee stack (status: {})", signal.status);
                self.schedule_restart();
            }
            SignalKind::SteeringResult if signal.status.is_ok() => {
                let network = signal
                    .network()
                    .unwrap_or_else(|| self.stack.network_info());
                info!("Joined network successfully ({})", network);
                self.publish(network);
            }
            SignalKind::SteeringResult => {
                info!("Network steering was not successful (status: {})", signal.status);
                self.schedule_retry();
            }
            SignalKind::Other(id) => {
                info!(
                    "ZDO signal: {} (0x{:x}), status: {}",
                    signal_name(id),
                    id,
                    signal.status
                );
            }
        }
    }

    pub fn on_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::RetrySteering => {
                if let Some(retry) = self.retry.as_mut() {
                    retry.pending = false;
                }

                if self.stack.is_joined() {
                    debug!("Already joined, dropping steering retry");
                    self.retry = None;
                    return;
                }

                info!("Retrying network steering");
                self.commission(CommissioningMode::NetworkSteering);
            }
            TimerEvent::Restart => {
                info!("Restarting");
                self.stack.restart();
            }
        }
    }

    /// Setup never reached the point where the stack reports signals.
    pub fn setup_failed(&mut self, err: &Error) {
        error!("Zigbee setup failed: {:#}", err);
        self.schedule_restart();
    }

    pub fn factory_reset(&mut self) {
        info!("Factory resetting Zigbee stack");
        self.clear_retry();
        self.status.send_replace(None);
        self.stack.factory_reset();
    }

    pub fn retry_state(&self) -> Option<RetryState> {
        self.retry
    }

    pub fn joined_network(&self) -> Option<JoinedNetwork> {
        *self.status.borrow()
    }

    fn commission(&mut self, mode: CommissioningMode) {
        if let Err(e) = self.stack.start_top_level_commissioning(mode) {
            error!("Failed to start {:?} commissioning: {:#}", mode, e);
            if mode == CommissioningMode::NetworkSteering {
                self.schedule_retry();
            }
        }
    }

    fn publish(&mut self, network: JoinedNetwork) {
        self.clear_retry();
        self.status.send_replace(Some(network));
    }

    /// Forgets past attempts. An armed timer cannot be cancelled, so its
    /// `pending` flag survives until it fires.
    fn clear_retry(&mut self) {
        self.retry = match self.retry {
            Some(retry) if retry.pending => Some(RetryState {
                attempts: 0,
                pending: true,
            }),
            _ => None,
        };
    }

    fn schedule_retry(&mut self) {
        let retry = self.retry.get_or_insert_with(RetryState::default);
        retry.attempts += 1;

        if retry.pending {
            debug!("Steering retry already pending (attempt {})", retry.attempts);
            return;
        }

        retry.pending = true;
        self.scheduler
            .schedule(self.steering_retry, TimerEvent::RetrySteering);
    }

    fn schedule_restart(&mut self) {
        self.scheduler.schedule(self.restart_delay, TimerEvent::Restart);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use anyhow::anyhow;
    use common::{
        signal::SIGNAL_LEAVE, zcl::EndpointList, ExtendedPanId, SignalPayload, Status,
    };

    use super::*;
    use crate::zigbee::{
        dispatch::AttributeEventDispatcher,
        stack::{PlatformConfig, StackConfig},
        timer::ManualScheduler,
        StackEventSink,
    };

    const NETWORK: JoinedNetwork = JoinedNetwork {
        extended_pan_id: ExtendedPanId([1, 2, 3, 4, 5, 6, 7, 8]),
        pan_id: 0x1a62,
        channel: 15,
        short_address: 0x4f2b,
    };

    #[derive(Default)]
    struct FakeStack {
        factory_new: AtomicBool,
        joined: AtomicBool,
        fail_commissioning: AtomicBool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeStack {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ZigbeeStack for FakeStack {
        fn configure_platform(&self, _config: &PlatformConfig) -> Result<(), Error> {
            Ok(())
        }

        fn init(&self, _config: &StackConfig, _events: StackEventSink) -> Result<(), Error> {
            Ok(())
        }

        fn register_device(&self, _endpoints: EndpointList) -> Result<(), Error> {
            Ok(())
        }

        fn register_action_handler(&self, _dispatcher: Arc<AttributeEventDispatcher>) -> Result<(), Error> {
            Ok(())
        }

        fn set_primary_channel_mask(&self, _mask: u32) -> Result<(), Error> {
            Ok(())
        }

        fn start(&self, _autostart: bool) -> Result<(), Error> {
            Ok(())
        }

        fn start_top_level_commissioning(&self, mode: CommissioningMode) -> Result<(), Error> {
            self.record(format!("commission {:?}", mode));
            if self.fail_commissioning.load(Ordering::SeqCst) {
                return Err(anyhow!("busy"));
            }
            Ok(())
        }

        fn register_identify_handler(&self, endpoint: u8) {
            self.record(format!("identify {}", endpoint));
        }

        fn is_factory_new(&self) -> bool {
            self.factory_new.load(Ordering::SeqCst)
        }

        fn is_joined(&self) -> bool {
            self.joined.load(Ordering::SeqCst)
        }

        fn network_info(&self) -> JoinedNetwork {
            NETWORK
        }

        fn factory_reset(&self) {
            self.record("factory_reset");
        }

        fn restart(&self) {
            self.record("restart");
        }
    }

    fn controller(
        stack: &Arc<FakeStack>,
    ) -> (
        CommissioningController<FakeStack, ManualScheduler>,
        ManualScheduler,
        watch::Receiver<Option<JoinedNetwork>>,
    ) {
        let scheduler = ManualScheduler::new();
        let (status_tx, status_rx) = watch::channel(None);
        let controller = CommissioningController::new(
            stack.clone(),
            scheduler.clone(),
            1,
            &CommissioningConfig::default(),
            status_tx,
        );
        (controller, scheduler, status_rx)
    }

    fn steering(status: Status) -> NetworkSignal {
        NetworkSignal::new(SignalKind::SteeringResult, status)
    }

    #[test]
    fn test_factory_new_boot_starts_steering() {
        let stack = Arc::new(FakeStack::default());
        stack.factory_new.store(true, Ordering::SeqCst);
        let (mut controller, scheduler, _status) = controller(&stack);

        controller.handle_signal(&NetworkSignal::new(SignalKind::StackReady, Status::Ok));
        controller.handle_signal(&NetworkSignal::new(SignalKind::FirstStartOrReboot, Status::Ok));

        assert_eq!(
            stack.calls(),
            vec!["commission Initialization", "identify 1", "commission NetworkSteering"]
        );
        assert!(scheduler.take().is_empty());
    }

    #[test]
    fn test_warm_reboot_publishes_existing_network() {
        let stack = Arc::new(FakeStack::default());
        stack.joined.store(true, Ordering::SeqCst);
        let (mut controller, _scheduler, status) = controller(&stack);

        controller.handle_signal(&NetworkSignal::new(SignalKind::FirstStartOrReboot, Status::Ok));

        assert_eq!(stack.calls(), vec!["identify 1"]);
        assert_eq!(*status.borrow(), Some(NETWORK));
    }

    #[test]
    fn test_init_failure_schedules_restart() {
        let stack = Arc::new(FakeStack::default());
        let (mut controller, scheduler, _status) = controller(&stack);

        controller.handle_signal(&NetworkSignal::new(SignalKind::FirstStartOrReboot, Status::Fail));
        assert!(stack.calls().is_empty());

        let scheduled = scheduler.take();
        assert_eq!(scheduled, vec![(Duration::from_millis(2000), TimerEvent::Restart)]);

        controller.on_timer(TimerEvent::Restart);
        assert_eq!(stack.calls(), vec!["restart"]);
    }

    #[test]
    fn test_retry_is_idempotent() {
        let stack = Arc::new(FakeStack::default());
        let (mut controller, scheduler, _status) = controller(&stack);

        controller.handle_signal(&steering(Status::Timeout));
        controller.handle_signal(&steering(Status::Timeout));
        controller.handle_signal(&steering(Status::Fail));

        assert_eq!(
            scheduler.take(),
            vec![(Duration::from_millis(1000), TimerEvent::RetrySteering)]
        );
        assert_eq!(
            controller.retry_state(),
            Some(RetryState {
                attempts: 3,
                pending: true
            })
        );

        controller.on_timer(TimerEvent::RetrySteering);
        assert_eq!(stack.calls(), vec!["commission NetworkSteering"]);

        // Next failure arms a fresh timer.
        controller.handle_signal(&steering(Status::Fail));
        assert_eq!(scheduler.take().len(), 1);
        assert_eq!(controller.retry_state().map(|r| r.attempts), Some(4));
    }

    #[test]
    fn test_join_clears_retry_and_late_timer_is_noop() {
        let stack = Arc::new(FakeStack::default());
        let (mut controller, scheduler, status) = controller(&stack);

        controller.handle_signal(&steering(Status::Fail));
        assert_eq!(scheduler.take().len(), 1);

        stack.joined.store(true, Ordering::SeqCst);
        controller.handle_signal(
            &steering(Status::Ok).with_payload(SignalPayload::Network(NETWORK)),
        );
        assert_eq!(controller.retry_state().map(|r| r.attempts), Some(0));
        assert_eq!(*status.borrow(), Some(NETWORK));
        assert_eq!(controller.joined_network(), Some(NETWORK));

        controller.on_timer(TimerEvent::RetrySteering);
        assert!(stack.calls().is_empty());
        assert!(scheduler.take().is_empty());
        assert_eq!(controller.retry_state(), None);
    }

    #[test]
    fn test_failed_steering_request_rearms_retry() {
        let stack = Arc::new(FakeStack::default());
        stack.fail_commissioning.store(true, Ordering::SeqCst);
        let (mut controller, scheduler, _status) = controller(&stack);

        controller.handle_signal(&steering(Status::Fail));
        assert_eq!(scheduler.take().len(), 1);

        controller.on_timer(TimerEvent::RetrySteering);
        assert_eq!(
            scheduler.take(),
            vec![(Duration::from_millis(1000), TimerEvent::RetrySteering)]
        );
    }

    #[test]
    fn test_other_signals_ignored() {
        let stack = Arc::new(FakeStack::default());
        let (mut controller, scheduler, status) = controller(&stack);

        controller.handle_signal(&NetworkSignal::from_raw(
            SIGNAL_LEAVE,
            Status::Ok,
            SignalPayload::Empty,
        ));

        assert!(stack.calls().is_empty());
        assert!(scheduler.take().is_empty());
        assert_eq!(*status.borrow(), None);
    }

    #[test]
    fn test_factory_reset_clears_state() {
        let stack = Arc::new(FakeStack::default());
        let (mut controller, _scheduler, status) = controller(&stack);

        controller.handle_signal(&steering(Status::Ok).with_payload(SignalPayload::Network(NETWORK)));
        controller.handle_signal(&steering(Status::Fail));
        controller.factory_reset();

        assert_eq!(stack.calls(), vec!["factory_reset"]);
        assert_eq!(
            controller.retry_state(),
            Some(RetryState {
                attempts: 0,
                pending: true
            })
        );
        assert_eq!(*status.borrow(), None);
    }

    #[test]
    fn test_factory_reset_during_backoff_keeps_single_timer() {
        let stack = Arc::new(FakeStack::default());
        let (mut controller, scheduler, _status) = controller(&stack);

        controller.handle_signal(&steering(Status::Fail));
        controller.factory_reset();
        controller.handle_signal(&steering(Status::Fail));

        assert_eq!(
            scheduler.take(),
            vec![(Duration::from_millis(1000), TimerEvent::RetrySteering)]
        );
        assert_eq!(controller.retry_state().map(|r| r.attempts), Some(1));

        // The surviving timer fires and the next failure arms exactly one more.
        controller.on_timer(TimerEvent::RetrySteering);
        controller.handle_signal(&steering(Status::Fail));
        assert_eq!(scheduler.take().len(), 1);
    }

    #[test]
    fn test_setup_failure_schedules_restart() {
        let stack = Arc::new(FakeStack::default());
        let (mut controller, scheduler, _status) = controller(&stack);

        controller.setup_failed(&anyhow!("no radio"));
        assert_eq!(scheduler.take()[0].1, TimerEvent::Restart);
    }
}
