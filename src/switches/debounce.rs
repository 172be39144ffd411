use std::time::Duration;

use embedded_hal_async::delay::DelayNs;
use log::{debug, warn};

use super::{
    action::{ActionRouter, FactoryReset, LogicalAction},
    channel::InputEventReceiver,
    InputEvent, InterruptPin, MonitoredPin, MAX_SWITCHES,
};
use crate::config::DebounceConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    PressDetected,
    ReleaseDetected,
}

/// Outcome of feeding one sample into a cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Keep sampling.
    Pending,
    /// A full press and release was seen.
    Confirmed,
    /// The cycle ended without a press.
    Idle,
}

/// State of one debounce pass over a pin, from the first sample until it
/// settles back to idle.
#[derive(Clone, Debug)]
pub struct DebounceCycle {
    state: DebounceState,
    held: u32,
    min_press_samples: u32,
}

impl DebounceCycle {
    pub fn new(min_press_samples: u32) -> Self {
        Self {
            state: DebounceState::Idle,
            held: 0,
            min_press_samples: min_press_samples.max(1),
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn sample(&mut self, pressed: bool) -> Step {
        match self.state {
            DebounceState::Idle => {
                if pressed {
                    self.state = DebounceState::PressDetected;
                    self.held = 1;
                    Step::Pending
                } else {
                    Step::Idle
                }
            }
            DebounceState::PressDetected => {
                if pressed {
                    self.held = self.held.saturating_add(1);
                    Step::Pending
                } else if self.held >= self.min_press_samples {
                    self.state = DebounceState::ReleaseDetected;
                    Step::Pending
                } else {
                    debug!("Press released after {} samples, ignoring", self.held);
                    self.state = DebounceState::Idle;
                    Step::Idle
                }
            }
            DebounceState::ReleaseDetected => {
                self.state = DebounceState::Idle;
                Step::Confirmed
            }
        }
    }
}

/// Drains the event channel and turns each burst of edges into at most one
/// action.
pub struct SwitchMonitor<'ch, P, D, R> {
    receiver: InputEventReceiver<'ch>,
    pins: heapless::Vec<MonitoredPin<P>, MAX_SWITCHES>,
    delay: D,
    router: ActionRouter<R>,
    sample_interval_ms: u32,
    min_press_samples: u32,
}

impl<'ch, P, D, R> SwitchMonitor<'ch, P, D, R>
where
    P: InterruptPin,
    D: DelayNs,
    R: FactoryReset,
{
    pub fn new(
        receiver: InputEventReceiver<'ch>,
        pins: heapless::Vec<MonitoredPin<P>, MAX_SWITCHES>,
        delay: D,
        router: ActionRouter<R>,
        config: &DebounceConfig,
    ) -> Self {
        Self {
            receiver,
            pins,
            delay,
            router,
            sample_interval_ms: config.sample_interval_ms,
            min_press_samples: config.min_press_samples,
        }
    }

    /// Waits for the next pin event and debounces it.
    pub async fn poll(&mut self) -> Option<LogicalAction> {
        let event = self.receiver.receive().await;
        self.debounce(event).await
    }

    pub async fn debounce(&mut self, event: InputEvent) -> Option<LogicalAction> {
        let Some(index) = self.pins.iter().position(|pin| pin.pin == event.pin) else {
            warn!("Event for unmonitored GPIO {}", event.pin);
            return None;
        };

        self.set_interrupts(false);

        let mut cycle = DebounceCycle::new(self.min_press_samples);
        let action = loop {
            let pressed = self.is_pressed(index);
            match cycle.sample(pressed) {
                Step::Confirmed => {
                    let action = LogicalAction::from(event.function);
                    debug!("GPIO {} confirmed: {:?}", event.pin, action);
                    self.router.dispatch(action);
                    break Some(action);
                }
                Step::Idle => break None,
                Step::Pending => {}
            }
            self.delay.delay_ms(self.sample_interval_ms).await;
        };

        self.set_interrupts(true);
        action
    }

    fn is_pressed(&mut self, index: usize) -> bool {
        let pin = &mut self.pins[index];
        match pin.input.is_low() {
            Ok(low) => low,
            Err(e) => {
                warn!("Failed to sample GPIO {}: {:?}", pin.pin, e);
                false
            }
        }
    }

    fn set_interrupts(&mut self, enabled: bool) {
        for pin in self.pins.iter_mut() {
            if enabled {
                pin.input.enable_interrupt();
            } else {
                pin.input.disable_interrupt();
            }
        }
    }
}

/// Sample delay backed by the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioDelay;

impl DelayNs for TokioDelay {
    async fn delay_ns(&mut self, ns: u32) {
        tokio::time::sleep(Duration::from_nanos(ns as u64)).await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        tokio::time::sleep(Duration::from_millis(ms as u64)).await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use embedded_hal::digital::{ErrorType, InputPin};

    use super::*;
    use crate::switches::{channel::EventChannel, InputEventSender, SwitchFunction};

    /// Plays back a fixed list of levels (true = pressed), then holds the last.
    struct ScriptedPin {
        levels: VecDeque<bool>,
        last: bool,
        irq_log: Arc<Mutex<Vec<bool>>>,
    }

    impl ScriptedPin {
        fn new(levels: &[bool], irq_log: Arc<Mutex<Vec<bool>>>) -> Self {
            Self {
                levels: levels.iter().copied().collect(),
                last: false,
                irq_log,
            }
        }
    }

    impl ErrorType for ScriptedPin {
        type Error = Infallible;
    }

    impl InputPin for ScriptedPin {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            self.is_low().map(|low| !low)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            if let Some(level) = self.levels.pop_front() {
                self.last = level;
            }
            Ok(self.last)
        }
    }

    impl InterruptPin for ScriptedPin {
        fn attach_falling_edge(&mut self, _sender: InputEventSender<'static>, _event: InputEvent) {}

        fn enable_interrupt(&mut self) {
            self.irq_log.lock().unwrap().push(true);
        }

        fn disable_interrupt(&mut self) {
            self.irq_log.lock().unwrap().push(false);
        }
    }

    #[derive(Default)]
    struct CountingReset(AtomicUsize);

    impl FactoryReset for CountingReset {
        fn factory_reset(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    const EVENT: InputEvent = InputEvent {
        pin: 9,
        function: SwitchFunction::FactoryReset,
    };

    fn monitor<'ch>(
        channel: &'ch EventChannel,
        levels: &[bool],
        min_press_samples: u32,
    ) -> (
        SwitchMonitor<'ch, ScriptedPin, TokioDelay, Arc<CountingReset>>,
        Arc<CountingReset>,
        Arc<Mutex<Vec<bool>>>,
    ) {
        let irq_log = Arc::new(Mutex::new(Vec::new()));
        let resetter = Arc::new(CountingReset::default());

        let mut pins = heapless::Vec::new();
        let _ = pins.push(MonitoredPin {
            pin: EVENT.pin,
            function: EVENT.function,
            input: ScriptedPin::new(levels, irq_log.clone()),
        });

        let config = DebounceConfig {
            min_press_samples,
            ..Default::default()
        };
        let monitor = SwitchMonitor::new(
            channel.receiver(),
            pins,
            TokioDelay,
            ActionRouter::new(resetter.clone()),
            &config,
        );
        (monitor, resetter, irq_log)
    }

    #[test]
    fn test_cycle_states() {
        let mut cycle = DebounceCycle::new(1);
        assert_eq!(cycle.sample(true), Step::Pending);
        assert_eq!(cycle.state(), DebounceState::PressDetected);
        assert_eq!(cycle.sample(true), Step::Pending);
        assert_eq!(cycle.sample(false), Step::Pending);
        assert_eq!(cycle.state(), DebounceState::ReleaseDetected);
        assert_eq!(cycle.sample(false), Step::Confirmed);
        assert_eq!(cycle.state(), DebounceState::Idle);

        let mut cycle = DebounceCycle::new(1);
        assert_eq!(cycle.sample(false), Step::Idle);
    }

    #[test]
    fn test_short_press_below_minimum() {
        let mut cycle = DebounceCycle::new(3);
        assert_eq!(cycle.sample(true), Step::Pending);
        assert_eq!(cycle.sample(true), Step::Pending);
        assert_eq!(cycle.sample(false), Step::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_press_and_release_confirms_once() {
        let channel = EventChannel::new();
        let (mut monitor, resetter, irq_log) = monitor(&channel, &[true, true, false], 1);

        assert!(channel.sender().send(EVENT));
        let start = tokio::time::Instant::now();
        assert_eq!(monitor.poll().await, Some(LogicalAction::FactoryReset));

        assert_eq!(resetter.0.load(Ordering::SeqCst), 1);
        // Four samples, three waits between them.
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(start.elapsed() < Duration::from_millis(40));
        assert_eq!(*irq_log.lock().unwrap(), vec![false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_glitch_without_press() {
        let channel = EventChannel::new();
        let (mut monitor, resetter, irq_log) = monitor(&channel, &[false], 1);

        assert_eq!(monitor.debounce(EVENT).await, None);
        assert_eq!(resetter.0.load(Ordering::SeqCst), 0);
        assert_eq!(*irq_log.lock().unwrap(), vec![false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_action_without_release() {
        let channel = EventChannel::new();
        let (mut monitor, resetter, irq_log) = monitor(&channel, &[true], 1);

        let held = tokio::time::timeout(Duration::from_secs(5), monitor.debounce(EVENT)).await;

        assert!(held.is_err());
        assert_eq!(resetter.0.load(Ordering::SeqCst), 0);
        // Still gated while the button is held.
        assert_eq!(*irq_log.lock().unwrap(), vec![false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_pin_ignored() {
        let channel = EventChannel::new();
        let (mut monitor, resetter, irq_log) = monitor(&channel, &[true, false], 1);

        let event = InputEvent { pin: 2, ..EVENT };
        assert_eq!(monitor.debounce(event).await, None);
        assert_eq!(resetter.0.load(Ordering::SeqCst), 0);
        assert!(irq_log.lock().unwrap().is_empty());
    }
}
