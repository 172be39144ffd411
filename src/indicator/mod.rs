use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{error, info};
use smart_leds::{
    brightness,
    hsv::{hsv2rgb, Hsv},
    SmartLedsWrite, RGB8,
};

use crate::config::IdentifyConfig;

/// Hue step per frame, a full turn of the colour wheel takes 64 frames.
const HUE_STEP: u8 = 4;

/// Status LED that cycles through the colour wheel while the device is
/// being identified.
pub struct IdentifyIndicator<L> {
    led: Arc<Mutex<L>>,
    active: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    brightness: u8,
    frame_interval: Duration,
}

impl<L> Clone for IdentifyIndicator<L> {
    fn clone(&self) -> Self {
        Self {
            led: self.led.clone(),
            active: self.active.clone(),
            generation: self.generation.clone(),
            brightness: self.brightness,
            frame_interval: self.frame_interval,
        }
    }
}

impl<L> IdentifyIndicator<L>
where
    L: SmartLedsWrite<Color = RGB8> + Send + 'static,
    L::Error: Debug,
{
    pub fn new(led: L, config: &IdentifyConfig) -> Self {
        Self {
            led: Arc::new(Mutex::new(led)),
            active: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            brightness: config.brightness,
            frame_interval: Duration::from_millis(config.frame_interval_ms),
        }
    }

    pub fn is_identifying(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Starts or stops the animation. Must be called from within a tokio
    /// runtime.
    pub fn set_identifying(&self, identifying: bool) {
        if !identifying {
            if self.active.swap(false, Ordering::SeqCst) {
                info!("Identify stopped");
            }
            return;
        }

        if self.active.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Identify started");

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let indicator = self.clone();
        tokio::spawn(async move { indicator.animate(generation).await });
    }

    async fn animate(self, generation: u64) {
        let mut hue: u8 = 0;

        while self.is_current(generation) {
            let color = hsv2rgb(Hsv {
                hue,
                sat: 255,
                val: 255,
            });
            self.show(color);
            hue = hue.wrapping_add(HUE_STEP);
            tokio::time::sleep(self.frame_interval).await;
        }

        // A newer animation owns the LED now.
        if self.generation.load(Ordering::SeqCst) == generation {
            self.show(RGB8::default());
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.active.load(Ordering::SeqCst) && self.generation.load(Ordering::SeqCst) == generation
    }

    fn show(&self, color: RGB8) {
        let mut led = self.led.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = led.write(brightness([color].into_iter(), self.brightness)) {
            error!("Failed to write LED: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;

    #[derive(Clone, Default)]
    struct RecordingLed {
        frames: Arc<Mutex<Vec<RGB8>>>,
    }

    impl SmartLedsWrite for RecordingLed {
        type Error = Infallible;
        type Color = RGB8;

        fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
        where
            T: IntoIterator<Item = I>,
            I: Into<Self::Color>,
        {
            let mut frames = self.frames.lock().unwrap();
            frames.extend(iterator.into_iter().map(Into::into));
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_animates_until_stopped() {
        let led = RecordingLed::default();
        let frames = led.frames.clone();
        let indicator = IdentifyIndicator::new(led, &IdentifyConfig::default());

        indicator.set_identifying(true);
        indicator.set_identifying(true);
        tokio::time::sleep(Duration::from_millis(120)).await;
        indicator.set_identifying(false);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let frames = frames.lock().unwrap().clone();
        assert!(frames.len() >= 3);
        assert_ne!(frames[0], RGB8::default());
        assert_ne!(frames[0], frames[1]);
        assert_eq!(frames.last(), Some(&RGB8::default()));
        assert!(!indicator.is_identifying());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_without_start_leaves_led_alone() {
        let led = RecordingLed::default();
        let frames = led.frames.clone();
        let indicator = IdentifyIndicator::new(led, &IdentifyConfig::default());

        indicator.set_identifying(false);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(frames.lock().unwrap().is_empty());
    }
}
