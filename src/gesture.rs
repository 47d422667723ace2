//! Gesture state machines, independent of any UI framework.
//!
//! `GestureTracker` turns a press/drag stream over discrete targets into
//! note-on triggers, suppressing retriggers while the pointer stays on the
//! same target. `SustainTracker` keeps the set of engaged sustained voices
//! and reports which ones to start and stop as a touch slides across them.

use std::collections::BTreeSet;
use std::fmt::Debug;

use log::trace;

use crate::layout::{HitTest, Point};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DragState<T> {
    #[default]
    Idle,
    Dragging { last: Option<T> },
}

#[derive(Debug, Clone, Default)]
pub struct GestureTracker<T> {
    state: DragState<T>,
}

impl<T: Clone + PartialEq + Debug> GestureTracker<T> {
    pub fn new() -> Self {
        GestureTracker {
            state: DragState::Idle,
        }
    }

    pub fn state(&self) -> &DragState<T> {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    pub fn last_triggered(&self) -> Option<&T> {
        match &self.state {
            DragState::Dragging { last } => last.as_ref(),
            DragState::Idle => None,
        }
    }

    /// A fresh press always triggers its target.
    pub fn press_start(&mut self, target: T) -> T {
        trace!(target: "gesture", "press start on {target:?}");
        self.state = DragState::Dragging {
            last: Some(target.clone()),
        };
        target
    }

    /// The pointer is over `target` (or over nothing). Returns the target to
    /// trigger, if any. Only acts while dragging; staying on the last
    /// triggered target and passing over empty space are both no-ops.
    pub fn press_move(&mut self, target: Option<T>) -> Option<T> {
        let DragState::Dragging { last } = &mut self.state else {
            return None;
        };
        let target = target?;
        if last.as_ref() == Some(&target) {
            return None;
        }
        trace!(target: "gesture", "glissando to {target:?}");
        *last = Some(target.clone());
        Some(target)
    }

    /// Touch move: resolve the target under the finger, then as `press_move`.
    pub fn touch_move<H: HitTest<T> + ?Sized>(&mut self, at: Point, hit: &H) -> Option<T> {
        if !self.is_dragging() {
            return None;
        }
        self.press_move(hit.target_at(at))
    }

    /// Ends the gesture wherever the release happened.
    pub fn press_end(&mut self) {
        if self.is_dragging() {
            trace!(target: "gesture", "press end");
        }
        self.state = DragState::Idle;
    }
}

/// What a sustain gesture asks the caller to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<T> {
    pub release: Option<T>,
    pub engage: Option<T>,
}

#[derive(Debug, Clone, Default)]
pub struct SustainTracker<T: Ord> {
    engaged: BTreeSet<T>,
    touch: Option<T>,
}

impl<T: Ord + Clone + Debug> SustainTracker<T> {
    pub fn new() -> Self {
        SustainTracker {
            engaged: BTreeSet::new(),
            touch: None,
        }
    }

    /// Returns false when `voice` was already engaged.
    pub fn engage(&mut self, voice: T) -> bool {
        self.engaged.insert(voice)
    }

    /// Returns false when `voice` was not engaged.
    pub fn release(&mut self, voice: &T) -> bool {
        if self.touch.as_ref() == Some(voice) {
            self.touch = None;
        }
        self.engaged.remove(voice)
    }

    pub fn is_engaged(&self, voice: &T) -> bool {
        self.engaged.contains(voice)
    }

    pub fn engaged(&self) -> impl Iterator<Item = &T> {
        self.engaged.iter()
    }

    /// The finger is now over `target`. Sliding onto a new voice releases
    /// the one it left and engages the new one.
    pub fn touch_over(&mut self, target: Option<T>) -> Transition<T> {
        if self.touch == target {
            return Transition {
                release: None,
                engage: None,
            };
        }
        let release = self.touch.take().filter(|v| self.engaged.remove(v));
        let engage = target.filter(|v| self.engaged.insert(v.clone()));
        self.touch = engage.clone();
        trace!(target: "gesture", "touch voices: release {release:?}, engage {engage:?}");
        Transition { release, engage }
    }

    /// Touch lifted: every voice the touch engaged is released.
    pub fn touch_end(&mut self) -> Option<T> {
        self.touch.take().filter(|v| self.engaged.remove(v))
    }

    /// Release everything, e.g. on mute or teardown.
    pub fn release_all(&mut self) -> Vec<T> {
        self.touch = None;
        std::mem::take(&mut self.engaged).into_iter().collect()
    }
}
