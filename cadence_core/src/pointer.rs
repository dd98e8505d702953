// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pointer-rate strategies: from pointer motion to a repaint period.
//!
//! A pointer-rate leaf ([`SchedTree::ui_scheduler`](crate::tree::SchedTree::ui_scheduler))
//! asks its [`PointerRate`] strategy for a period whenever a pointer sample
//! arrives, and calls [`relax`](PointerRate::relax) on ticks that saw no new
//! sample. Fast motion asks for short periods (more frequent repaints), slow
//! or idle motion for long ones.
//!
//! Both strategies interpolate linearly between a *slow* period (long) and a
//! *fast* period (short):
//!
//! ```text
//!   period
//!   slow |-------.
//!        |        \
//!   fast |         `-------
//!        +-------+---+------> speed or distance
//!               low high
//! ```

use core::fmt;

use kurbo::Point;

use crate::time::{Duration, HostTime};

/// One pointer sample as delivered by the host toolkit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    /// Position in canvas coordinates.
    pub position: Point,
    /// Time the sample was taken.
    pub time: HostTime,
    /// Host button mask.
    pub buttons: u16,
    /// Host modifier mask.
    pub modifiers: u16,
}

impl PointerEvent {
    /// A sample with no buttons or modifiers held.
    #[must_use]
    pub const fn at(position: Point, time: HostTime) -> Self {
        Self {
            position,
            time,
            buttons: 0,
            modifiers: 0,
        }
    }
}

/// Maps pointer motion to a desired scheduling period.
pub trait PointerRate: fmt::Debug {
    /// Starts tracking at `event` and returns the initial period.
    fn init(&mut self, event: &PointerEvent) -> Duration;

    /// Feeds one sample and returns the period to use from now on.
    fn map(&mut self, event: &PointerEvent) -> Duration;

    /// Called when a tick passed without new samples; drifts back toward the
    /// slow period and returns the new one.
    fn relax(&mut self) -> Duration;

    /// The period last returned.
    fn period(&self) -> Duration;
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "interpolated periods lie between two u64 microsecond values"
)]
fn interpolate(value: f64, low: f64, high: f64, slow: Duration, fast: Duration) -> Duration {
    if value <= low {
        return slow;
    }
    if value >= high || high <= low {
        return fast;
    }
    let t = (value - low) / (high - low);
    let slow_us = slow.micros() as f64;
    let fast_us = fast.micros() as f64;
    Duration::from_micros((slow_us + (fast_us - slow_us) * t) as u64)
}

/// Moves `period` part of the way back toward `slow`, rounding up so the
/// drift always makes progress.
fn relax_toward(period: Duration, slow: Duration, numer: u64, denom: u64) -> Duration {
    if period >= slow {
        return slow;
    }
    let gap = slow.micros() - period.micros();
    let step = (gap * numer).div_ceil(denom);
    Duration::from_micros((period.micros() + step).min(slow.micros()))
}

// ---------------------------------------------------------------------------
// Speed
// ---------------------------------------------------------------------------

/// Thresholds for [`SpeedRate`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpeedConfig {
    /// Period used at or below `low_speed`.
    pub slow_period: Duration,
    /// Period used at or above `high_speed`.
    pub fast_period: Duration,
    /// Pixels per second below which motion counts as slow.
    pub low_speed: f64,
    /// Pixels per second above which motion counts as fast.
    pub high_speed: f64,
    /// Fraction of the remaining gap to the slow period closed per relax
    /// step, numerator.
    pub relax_numer: u64,
    /// Denominator of the relax fraction.
    pub relax_denom: u64,
}

impl SpeedConfig {
    /// Defaults tuned for mouse dragging on a desktop display.
    #[must_use]
    pub const fn desktop() -> Self {
        Self {
            slow_period: Duration::from_millis(100),
            fast_period: Duration::from_millis(20),
            low_speed: 250.0,
            high_speed: 2000.0,
            relax_numer: 1,
            relax_denom: 2,
        }
    }
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self::desktop()
    }
}

/// Period from instantaneous pointer speed.
///
/// Speed is the Euclidean distance between consecutive samples over their
/// time difference. Within one burst of motion the period only ever
/// shortens; it lengthens again only through [`relax`](PointerRate::relax).
#[derive(Clone, Debug)]
pub struct SpeedRate {
    config: SpeedConfig,
    last: Option<(Point, HostTime)>,
    period: Duration,
}

impl SpeedRate {
    /// Creates a speed-based strategy.
    ///
    /// # Panics
    ///
    /// Panics if the relax denominator is zero.
    #[must_use]
    pub fn new(config: SpeedConfig) -> Self {
        assert!(config.relax_denom > 0, "relax denominator must be non-zero");
        Self {
            config,
            last: None,
            period: config.slow_period,
        }
    }

    /// Speed of the most recent motion, in pixels per second.
    fn speed(from: (Point, HostTime), to: &PointerEvent) -> Option<f64> {
        let dt = to.time.saturating_duration_since(from.1).micros();
        if dt == 0 {
            return None;
        }
        Some(from.0.distance(to.position) * 1_000_000.0 / dt as f64)
    }
}

impl Default for SpeedRate {
    fn default() -> Self {
        Self::new(SpeedConfig::default())
    }
}

impl PointerRate for SpeedRate {
    fn init(&mut self, event: &PointerEvent) -> Duration {
        self.last = Some((event.position, event.time));
        self.period = self.config.slow_period;
        self.period
    }

    fn map(&mut self, event: &PointerEvent) -> Duration {
        let Some(last) = self.last else {
            return self.init(event);
        };
        if let Some(speed) = Self::speed(last, event) {
            let c = &self.config;
            let wanted = interpolate(
                speed,
                c.low_speed,
                c.high_speed,
                c.slow_period,
                c.fast_period,
            );
            self.period = self.period.min(wanted);
            self.last = Some((event.position, event.time));
        }
        self.period
    }

    fn relax(&mut self) -> Duration {
        let c = &self.config;
        self.period = relax_toward(self.period, c.slow_period, c.relax_numer, c.relax_denom);
        self.period
    }

    fn period(&self) -> Duration {
        self.period
    }
}

// ---------------------------------------------------------------------------
// Distance
// ---------------------------------------------------------------------------

/// Which displacement a [`DistanceRate`] measures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Horizontal displacement only.
    X,
    /// Vertical displacement only.
    Y,
    /// Euclidean displacement.
    #[default]
    Both,
}

/// Thresholds for [`DistanceRate`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceConfig {
    /// Period used at or below `near`.
    pub slow_period: Duration,
    /// Period used at or beyond `far`.
    pub fast_period: Duration,
    /// Displacement in pixels below which the gesture is still exploratory.
    pub near: f64,
    /// Displacement in pixels beyond which the gesture is committed.
    pub far: f64,
    /// Axis measured.
    pub axis: Axis,
    /// Relax fraction numerator.
    pub relax_numer: u64,
    /// Relax fraction denominator.
    pub relax_denom: u64,
}

impl DistanceConfig {
    /// Defaults for dragging on a desktop display.
    #[must_use]
    pub const fn desktop() -> Self {
        Self {
            slow_period: Duration::from_millis(100),
            fast_period: Duration::from_millis(20),
            near: 4.0,
            far: 64.0,
            axis: Axis::Both,
            relax_numer: 1,
            relax_denom: 2,
        }
    }
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self::desktop()
    }
}

/// Period from displacement since the gesture started.
///
/// Small jitter at the start of a drag keeps the slow period; once the
/// pointer has moved far enough the period shortens. Like [`SpeedRate`] the
/// period only shortens until relaxed.
#[derive(Clone, Debug)]
pub struct DistanceRate {
    config: DistanceConfig,
    origin: Option<Point>,
    period: Duration,
}

impl DistanceRate {
    /// Creates a distance-based strategy.
    ///
    /// # Panics
    ///
    /// Panics if the relax denominator is zero.
    #[must_use]
    pub fn new(config: DistanceConfig) -> Self {
        assert!(config.relax_denom > 0, "relax denominator must be non-zero");
        Self {
            config,
            origin: None,
            period: config.slow_period,
        }
    }

    fn displacement(&self, origin: Point, to: Point) -> f64 {
        match self.config.axis {
            Axis::X => (to.x - origin.x).abs(),
            Axis::Y => (to.y - origin.y).abs(),
            Axis::Both => origin.distance(to),
        }
    }
}

impl Default for DistanceRate {
    fn default() -> Self {
        Self::new(DistanceConfig::default())
    }
}

impl PointerRate for DistanceRate {
    fn init(&mut self, event: &PointerEvent) -> Duration {
        self.origin = Some(event.position);
        self.period = self.config.slow_period;
        self.period
    }

    fn map(&mut self, event: &PointerEvent) -> Duration {
        let Some(origin) = self.origin else {
            return self.init(event);
        };
        let d = self.displacement(origin, event.position);
        let c = &self.config;
        let wanted = interpolate(d, c.near, c.far, c.slow_period, c.fast_period);
        self.period = self.period.min(wanted);
        self.period
    }

    fn relax(&mut self) -> Duration {
        let c = &self.config;
        self.period = relax_toward(self.period, c.slow_period, c.relax_numer, c.relax_denom);
        self.period
    }

    fn period(&self) -> Duration {
        self.period
    }
}
