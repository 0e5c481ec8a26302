//! Playback clock and the drivers that move it.
//!
//! The clock owns one normalised progress value. A bound video publishes
//! `currentTime / duration` on every time update; without a video a timer
//! advances one point per tick. Drivers are attached through
//! [`Subscription`]s, which detach when dropped.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::debug;

use crate::interpolate::{bracket, clamp_progress};

/// Detaches a listener or stops a timer when dropped.
#[must_use = "dropping a Subscription detaches it immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// A playable media element that reports `(current_time, duration)` in
/// seconds on every time update.
pub trait MediaSource {
    fn on_time_update(&self, listener: Box<dyn FnMut(f64, f64)>) -> Subscription;
}

/// Periodic callbacks.
pub trait Scheduler {
    fn every(&self, period: Duration, tick: Box<dyn FnMut()>) -> Subscription;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackClock {
    progress: f64,
    point_count: usize,
    playing: bool,
}

impl PlaybackClock {
    pub fn new(point_count: usize) -> Self {
        Self {
            progress: 0.0,
            point_count,
            playing: false,
        }
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn point_count(&self) -> usize {
        self.point_count
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Back to the start of a (possibly different) track, paused.
    pub fn reset(&mut self, point_count: usize) {
        *self = Self::new(point_count);
    }

    /// Keep the position but change how many points the timer steps over.
    pub fn set_point_count(&mut self, point_count: usize) {
        self.point_count = point_count;
    }

    pub fn last_index(&self) -> usize {
        self.point_count.saturating_sub(1)
    }

    /// Lower bracket index of the current progress.
    pub fn current_index(&self) -> usize {
        bracket(self.point_count, self.progress).map_or(0, |(lower, _, _)| lower)
    }

    pub fn seek_progress(&mut self, progress: f64) {
        self.progress = clamp_progress(progress);
    }

    /// Jump to a point index (scrub control), clamped to the last index.
    pub fn seek_index(&mut self, index: usize) {
        let last = self.last_index();
        self.progress = if last == 0 {
            0.0
        } else {
            index.min(last) as f64 / last as f64
        };
    }

    /// Video driver: publish `current / duration`. Ignored unless the
    /// duration is positive and finite.
    pub fn on_time_update(&mut self, current_time: f64, duration: f64) -> Option<f64> {
        if !(duration > 0.0) || !duration.is_finite() || !current_time.is_finite() {
            return None;
        }
        self.seek_progress(current_time / duration);
        Some(self.progress)
    }

    pub fn play(&mut self) {
        self.playing = self.current_index() < self.last_index();
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Timer driver: advance one point while playing. Pauses on reaching
    /// the last point. Returns whether the clock moved.
    pub fn tick(&mut self) -> bool {
        if !self.playing {
            return false;
        }
        let next = self.current_index() + 1;
        if next > self.last_index() {
            self.playing = false;
            return false;
        }
        self.seek_index(next);
        if next == self.last_index() {
            self.playing = false;
        }
        true
    }
}

/// Feed a media source's time updates into the clock until the returned
/// subscription is dropped.
pub fn bind_media<M: MediaSource + ?Sized>(
    clock: &Rc<RefCell<PlaybackClock>>,
    source: &M,
) -> Subscription {
    let clock = Rc::downgrade(clock);
    source.on_time_update(Box::new(move |current, duration| {
        if let Some(clock) = clock.upgrade() {
            clock.borrow_mut().on_time_update(current, duration);
        }
    }))
}

/// Tick the clock every `period` until the returned subscription is dropped.
pub fn start_timer<S: Scheduler + ?Sized>(
    clock: &Rc<RefCell<PlaybackClock>>,
    scheduler: &S,
    period: Duration,
) -> Subscription {
    let clock: Weak<RefCell<PlaybackClock>> = Rc::downgrade(clock);
    debug!(period_ms = period.as_millis() as u64, "starting playback timer");
    scheduler.every(
        period,
        Box::new(move || {
            if let Some(clock) = clock.upgrade() {
                clock.borrow_mut().tick();
            }
        }),
    )
}
