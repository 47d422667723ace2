//! Visual feedback for the presentation layer: floating note labels and the
//! pressed-key highlight.
//!
//! Labels are never removed by a timer. Each read sweeps out the ones whose
//! lifetime has passed, so expiry is deterministic under an injected clock.

use std::time::Duration;

use serde::Serialize;

use crate::layout::Point;
use crate::notes::KeyId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloatingLabel {
    pub id: u64,
    pub text: String,
    pub x: f64,
    pub y: f64,
    #[serde(skip)]
    pub created: Duration,
}

#[derive(Debug, Clone)]
pub struct FeedbackEmitter {
    lifetime: Duration,
    labels: Vec<FloatingLabel>,
    next_id: u64,
    pressed: Option<KeyId>,
}

impl FeedbackEmitter {
    pub fn new(lifetime: Duration) -> Self {
        FeedbackEmitter {
            lifetime,
            labels: Vec::new(),
            next_id: 1,
            pressed: None,
        }
    }

    pub fn emit_label(&mut self, text: &str, at: Point, now: Duration) -> u64 {
        self.sweep(now);
        let id = self.next_id;
        self.next_id += 1;
        self.labels.push(FloatingLabel {
            id,
            text: text.to_string(),
            x: at.x,
            y: at.y,
            created: now,
        });
        id
    }

    /// Labels still alive at `now`, oldest first.
    pub fn active(&mut self, now: Duration) -> &[FloatingLabel] {
        self.sweep(now);
        &self.labels
    }

    fn sweep(&mut self, now: Duration) {
        let lifetime = self.lifetime;
        self.labels.retain(|l| now < l.created.saturating_add(lifetime));
    }

    pub fn set_pressed(&mut self, key: KeyId) {
        self.pressed = Some(key);
    }

    pub fn clear_pressed(&mut self) {
        self.pressed = None;
    }

    pub fn pressed(&self) -> Option<KeyId> {
        self.pressed
    }
}
