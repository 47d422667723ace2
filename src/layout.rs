//! Screen geometry and hit-testing.
//!
//! Touch-move events keep targeting the element where the touch began, so
//! the tracker resolves the target under the finger itself through a
//! `HitTest`. Hosts with their own element lookup can pass a closure.

use serde::{Deserialize, Serialize};

use crate::notes::{KeyId, PitchClass};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

/// Axis-aligned rectangle, half-open on the right and bottom edges.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.x + self.width && p.y >= self.y && p.y < self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

pub trait HitTest<T> {
    fn target_at(&self, point: Point) -> Option<T>;
}

impl<T, F> HitTest<T> for F
where
    F: Fn(Point) -> Option<T>,
{
    fn target_at(&self, point: Point) -> Option<T> {
        self(point)
    }
}

/// Horizontal position of each black key's centre, as a fraction of its octave.
const BLACK_KEY_CENTERS: [(PitchClass, f64); 5] = [
    (PitchClass::DoSharp, 0.1428),
    (PitchClass::ReSharp, 0.2857),
    (PitchClass::FaSharp, 0.5714),
    (PitchClass::SolSharp, 0.7142),
    (PitchClass::LaSharp, 0.8571),
];
const BLACK_KEY_WIDTH: f64 = 0.10;
const BLACK_KEY_HEIGHT: f64 = 0.62;

#[derive(Debug, Clone, PartialEq)]
pub struct KeyRect {
    pub key: KeyId,
    pub rect: Rect,
    pub black: bool,
}

/// Piano keyboard of whole octaves laid side by side in `bounds`.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyboardLayout {
    bounds: Rect,
    /// Black keys first so they win overlapping hits.
    keys: Vec<KeyRect>,
}

impl KeyboardLayout {
    pub fn new(bounds: Rect, octaves: i32) -> Self {
        let octaves = octaves.max(1);
        let octave_width = bounds.width / octaves as f64;
        let white_width = octave_width / PitchClass::WHITE.len() as f64;

        let mut keys = Vec::with_capacity(12 * octaves as usize);
        for octave in 0..octaves {
            let left = bounds.x + octave as f64 * octave_width;
            for (pitch, center) in BLACK_KEY_CENTERS {
                let width = octave_width * BLACK_KEY_WIDTH;
                keys.push(KeyRect {
                    key: KeyId::new(pitch, octave),
                    rect: Rect::new(
                        left + center * octave_width - width / 2.0,
                        bounds.y,
                        width,
                        bounds.height * BLACK_KEY_HEIGHT,
                    ),
                    black: true,
                });
            }
        }
        for octave in 0..octaves {
            let left = bounds.x + octave as f64 * octave_width;
            for (i, pitch) in PitchClass::WHITE.into_iter().enumerate() {
                keys.push(KeyRect {
                    key: KeyId::new(pitch, octave),
                    rect: Rect::new(
                        left + i as f64 * white_width,
                        bounds.y,
                        white_width,
                        bounds.height,
                    ),
                    black: false,
                });
            }
        }

        KeyboardLayout { bounds, keys }
    }

    /// The separator's keyboard: two octaves starting at middle C.
    pub fn two_octaves(bounds: Rect) -> Self {
        KeyboardLayout::new(bounds, 2)
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn keys(&self) -> &[KeyRect] {
        &self.keys
    }

    pub fn rect_of(&self, key: KeyId) -> Option<Rect> {
        self.keys.iter().find(|k| k.key == key).map(|k| k.rect)
    }
}

impl HitTest<KeyId> for KeyboardLayout {
    fn target_at(&self, point: Point) -> Option<KeyId> {
        self.keys.iter().find(|k| k.rect.contains(point)).map(|k| k.key)
    }
}

/// Choir singers in equal-width columns.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceRowLayout {
    bounds: Rect,
    voices: usize,
}

impl VoiceRowLayout {
    pub fn new(bounds: Rect, voices: usize) -> Self {
        VoiceRowLayout { bounds, voices }
    }

    pub fn rect_of(&self, voice: usize) -> Option<Rect> {
        if voice >= self.voices {
            return None;
        }
        let width = self.bounds.width / self.voices as f64;
        Some(Rect::new(
            self.bounds.x + voice as f64 * width,
            self.bounds.y,
            width,
            self.bounds.height,
        ))
    }
}

impl HitTest<usize> for VoiceRowLayout {
    fn target_at(&self, point: Point) -> Option<usize> {
        if self.voices == 0 || !self.bounds.contains(point) {
            return None;
        }
        let col = ((point.x - self.bounds.x) / self.bounds.width * self.voices as f64) as usize;
        Some(col.min(self.voices - 1))
    }
}
