//! Pitch classes, key identifiers and equal-tempered frequencies.
//!
//! Octave offset 0 is the octave starting at middle C (`do` = C4).

use std::fmt;
use std::str::FromStr;

use crate::error::KeyParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PitchClass {
    Do,
    DoSharp,
    Re,
    ReSharp,
    Mi,
    Fa,
    FaSharp,
    Sol,
    SolSharp,
    La,
    LaSharp,
    Si,
}

const SOLFEGE: [&str; 12] = [
    "do", "do#", "re", "re#", "mi", "fa", "fa#", "sol", "sol#", "la", "la#", "si",
];

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::Do,
        PitchClass::DoSharp,
        PitchClass::Re,
        PitchClass::ReSharp,
        PitchClass::Mi,
        PitchClass::Fa,
        PitchClass::FaSharp,
        PitchClass::Sol,
        PitchClass::SolSharp,
        PitchClass::La,
        PitchClass::LaSharp,
        PitchClass::Si,
    ];

    pub const WHITE: [PitchClass; 7] = [
        PitchClass::Do,
        PitchClass::Re,
        PitchClass::Mi,
        PitchClass::Fa,
        PitchClass::Sol,
        PitchClass::La,
        PitchClass::Si,
    ];

    /// Semitones above `do`.
    pub fn semitone(self) -> i32 {
        self as i32
    }

    pub fn from_semitone(semitone: i32) -> PitchClass {
        PitchClass::ALL[semitone.rem_euclid(12) as usize]
    }

    pub fn name(self) -> &'static str {
        SOLFEGE[self as usize]
    }

    pub fn is_sharp(self) -> bool {
        matches!(
            self,
            PitchClass::DoSharp
                | PitchClass::ReSharp
                | PitchClass::FaSharp
                | PitchClass::SolSharp
                | PitchClass::LaSharp
        )
    }

    /// Frequency in the reference octave, given the pitch of `la` there.
    pub fn base_frequency(self, tuning_pitch: f64) -> f64 {
        tuning_pitch * 2f64.powf((self.semitone() - PitchClass::La.semitone()) as f64 / 12.0)
    }

    /// Exact power-of-two octave scaling of the base frequency.
    pub fn frequency(self, octave: i32, tuning_pitch: f64) -> f64 {
        self.base_frequency(tuning_pitch) * 2f64.powi(octave)
    }

    /// Parse a spelled pitch, returning the pitch class and the octave shift
    /// its spelling implies: `Cb` is the `si` below and `B#` the `do` above.
    /// Solfège (`do`, `sol#`) or letter names (`C`, `F#`, `Bb`), any case.
    pub fn parse_spelled(s: &str) -> Result<(PitchClass, i32), KeyParseError> {
        let lower = s.trim().to_ascii_lowercase();
        if let Some(idx) = SOLFEGE.iter().position(|&n| n == lower) {
            return Ok((PitchClass::ALL[idx], 0));
        }

        let err = || KeyParseError {
            input: s.to_string(),
        };
        let mut chars = lower.chars();
        let natural = match chars.next().ok_or_else(err)? {
            'c' => 0,
            'd' => 2,
            'e' => 4,
            'f' => 5,
            'g' => 7,
            'a' => 9,
            'b' => 11,
            _ => return Err(err()),
        };
        let accidental = match chars.as_str() {
            "" => 0,
            "#" => 1,
            "b" => -1,
            _ => return Err(err()),
        };
        let semitone = natural + accidental;
        Ok((PitchClass::from_semitone(semitone), semitone.div_euclid(12)))
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PitchClass {
    type Err = KeyParseError;

    /// The pitch class alone; see `parse_spelled` for the octave shift.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PitchClass::parse_spelled(s).map(|(pitch, _)| pitch)
    }
}

/// Stable identifier of one key on the keyboard: `"{pitch}-{octave}"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId {
    pub pitch: PitchClass,
    pub octave: i32,
}

impl KeyId {
    pub fn new(pitch: PitchClass, octave: i32) -> Self {
        KeyId { pitch, octave }
    }

    pub fn frequency(&self, tuning_pitch: f64) -> f64 {
        self.pitch.frequency(self.octave, tuning_pitch)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.pitch, self.octave)
    }
}

impl FromStr for KeyId {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || KeyParseError {
            input: s.to_string(),
        };
        let (pitch, octave) = s.split_once('-').ok_or_else(err)?;
        let (pitch, shift) = PitchClass::parse_spelled(pitch).map_err(|_| err())?;
        let octave: i32 = octave.trim().parse().map_err(|_| err())?;
        Ok(KeyId {
            pitch,
            octave: octave + shift,
        })
    }
}
