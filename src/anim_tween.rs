use std::time::Duration;

use async_trait::async_trait;
use tokio::{
    sync::watch,
    time::{Instant, MissedTickBehavior},
};
use tracing::debug;

use crate::anim_ease::{Ease, lerp};

/// Parts of the loading overlay the exit sequence animates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    ProgressText,
    ProgressBar,
    Overlay,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    Opacity,
    OffsetY,
    ScaleX,
}

/// Animate one numeric property from `from` to `to`.
#[derive(Clone, Debug, PartialEq)]
pub struct Tween {
    pub element: Element,
    pub property: Property,
    pub from: f64,
    pub to: f64,
    pub duration: Duration,
    pub ease: Ease,
}

impl Tween {
    pub fn new(element: Element, property: Property, from: f64, to: f64) -> Self {
        Self {
            element,
            property,
            from,
            to,
            duration: Duration::ZERO,
            ease: Ease::Linear,
        }
    }

    pub fn over(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn eased(mut self, ease: Ease) -> Self {
        self.ease = ease;
        self
    }

    pub fn value_at(&self, elapsed: Duration) -> f64 {
        lerp(self.from, self.to, self.ease.at(elapsed, self.duration))
    }
}

/// Plays tweens. Implementations decide how values reach the screen.
///
/// `animate` resolves once the property holds its final value.
#[async_trait]
pub trait TweenEngine: Send + Sync {
    async fn animate(&self, tween: Tween);
}

/// Animated properties of the loading overlay.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct OverlayStyle {
    pub text_opacity: f64,
    pub text_offset_y: f64,
    pub bar_scale_x: f64,
    pub overlay_opacity: f64,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            text_opacity: 1.0,
            text_offset_y: 0.0,
            bar_scale_x: 1.0,
            overlay_opacity: 1.0,
        }
    }
}

impl OverlayStyle {
    /// Writes `value` into the matching field. Returns false for a pairing the
    /// overlay does not have, leaving the style untouched.
    pub fn set(&mut self, element: Element, property: Property, value: f64) -> bool {
        let slot = match (element, property) {
            (Element::ProgressText, Property::Opacity) => &mut self.text_opacity,
            (Element::ProgressText, Property::OffsetY) => &mut self.text_offset_y,
            (Element::ProgressBar, Property::ScaleX) => &mut self.bar_scale_x,
            (Element::Overlay, Property::Opacity) => &mut self.overlay_opacity,
            _ => return false,
        };
        *slot = value;
        true
    }

    pub fn is_hidden(&self) -> bool {
        self.overlay_opacity <= 0.0
    }
}

/// Timer-driven engine that samples tweens once per frame into an [`OverlayStyle`].
pub struct ClockTweenEngine {
    style: watch::Sender<OverlayStyle>,
    frame: Duration,
}

impl ClockTweenEngine {
    pub fn new(frame: Duration) -> Self {
        Self {
            style: watch::Sender::new(OverlayStyle::default()),
            frame: frame.max(Duration::from_millis(1)),
        }
    }

    pub fn style(&self) -> OverlayStyle {
        *self.style.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<OverlayStyle> {
        self.style.subscribe()
    }
}

#[async_trait]
impl TweenEngine for ClockTweenEngine {
    async fn animate(&self, tween: Tween) {
        let start = Instant::now();
        let mut ticker = tokio::time::interval(self.frame);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let elapsed = start.elapsed();
            let done = elapsed >= tween.duration;
            let value = if done {
                tween.to
            } else {
                tween.value_at(elapsed)
            };
            let applied = self
                .style
                .send_if_modified(|s| s.set(tween.element, tween.property, value));
            if !applied && done {
                debug!(element = ?tween.element, property = ?tween.property, "tween target not on overlay");
            }
            if done {
                break;
            }
        }
    }
}
