//! Melodies the buzzer can play

use iot_shared::limits::{MELODY_MAX, MELODY_MIN};
use std::fmt;
use std::time::Duration;

// Note frequencies in Hz
const DO: f64 = 261.63;
const RE: f64 = 293.66;
const MI: f64 = 329.63;
const FA: f64 = 349.23;
const SOL: f64 = 391.00;
const LA: f64 = 440.00;
const SI: f64 = 493.88;
const DO_H: f64 = 523.25;
const REST: f64 = 0.0;

const SCHOOL_BELL: [f64; 32] = [
    SOL, SOL, LA, LA, SOL, SOL, MI, MI, //
    SOL, SOL, MI, MI, RE, RE, RE, REST, //
    SOL, SOL, LA, LA, SOL, SOL, MI, MI, //
    SOL, MI, RE, MI, DO, DO, DO, REST,
];

const TWINKLE_STAR: [f64; 48] = [
    DO, DO, SOL, SOL, LA, LA, SOL, REST, //
    FA, FA, MI, MI, RE, RE, DO, REST, //
    SOL, SOL, FA, FA, MI, MI, RE, REST, //
    SOL, SOL, FA, FA, MI, MI, RE, REST, //
    DO, DO, SOL, SOL, LA, LA, SOL, REST, //
    FA, FA, MI, MI, RE, RE, DO, REST,
];

const HAPPY_BIRTHDAY: [f64; 28] = [
    SOL, SOL, LA, SOL, DO_H, SI, REST, //
    SOL, SOL, LA, SOL, RE, DO_H, REST, //
    SOL, SOL, SOL, MI, DO_H, SI, LA, REST, //
    FA, FA, MI, DO_H, RE, DO_H,
];

const BUTTERFLY: [f64; 32] = [
    DO, RE, MI, FA, MI, RE, DO, REST, //
    MI, FA, SOL, SOL, MI, FA, SOL, SOL, //
    DO_H, SOL, MI, SOL, FA, MI, RE, DO, //
    DO, RE, MI, FA, MI, RE, DO, REST,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Melody {
    SchoolBell,
    TwinkleStar,
    HappyBirthday,
    Butterfly,
}

impl Melody {
    /// Look up a melody by its menu number
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(Melody::SchoolBell),
            2 => Some(Melody::TwinkleStar),
            3 => Some(Melody::HappyBirthday),
            4 => Some(Melody::Butterfly),
            _ => None,
        }
    }

    /// Look up a melody, falling back to the school bell for unknown ids
    ///
    /// Out-of-range ids are not an error: the buzzer plays melody 1 instead.
    pub fn from_id_or_default(id: i32) -> Self {
        if !(MELODY_MIN..=MELODY_MAX).contains(&id) {
            return Melody::SchoolBell;
        }
        Self::from_id(id).unwrap_or(Melody::SchoolBell)
    }

    pub fn id(self) -> i32 {
        match self {
            Melody::SchoolBell => 1,
            Melody::TwinkleStar => 2,
            Melody::HappyBirthday => 3,
            Melody::Butterfly => 4,
        }
    }

    /// Note frequencies in Hz; 0 is a rest
    pub fn notes(self) -> &'static [f64] {
        match self {
            Melody::SchoolBell => &SCHOOL_BELL,
            Melody::TwinkleStar => &TWINKLE_STAR,
            Melody::HappyBirthday => &HAPPY_BIRTHDAY,
            Melody::Butterfly => &BUTTERFLY,
        }
    }

    /// How long each note is held
    pub fn tempo(self) -> Duration {
        match self {
            Melody::HappyBirthday => Duration::from_millis(350),
            _ => Duration::from_millis(280),
        }
    }

    /// Total playing time
    pub fn duration(self) -> Duration {
        self.tempo() * self.notes().len() as u32
    }
}

impl fmt::Display for Melody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Melody::SchoolBell => "School Bell",
            Melody::TwinkleStar => "Twinkle Star",
            Melody::HappyBirthday => "Happy Birthday",
            Melody::Butterfly => "Butterfly",
        };
        f.write_str(name)
    }
}
