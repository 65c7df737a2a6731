//! Music utilities
//!
//! Note-name parsing, key transposition, and musical interval durations.
//! Triggered notes are written as scientific pitch names ("C4", "Eb3") and
//! transposed into the engine's global key before synthesis.

/// Semitone offset from C for a key name ("C", "C#", "Eb", "Bb", ...)
///
/// Unknown keys map to 0 (no transposition) rather than erroring.
pub fn key_offset(key: &str) -> i32 {
    let mut chars = key.trim().chars().peekable();
    let base = match chars.next().map(|c| c.to_ascii_uppercase()) {
        Some('C') => 0,
        Some('D') => 2,
        Some('E') => 4,
        Some('F') => 5,
        Some('G') => 7,
        Some('A') => 9,
        Some('B') => 11,
        _ => return 0,
    };
    match chars.peek() {
        Some('#') => (base + 1) % 12,
        Some('b') => (base + 11) % 12,
        _ => base,
    }
}

/// A parsed note: semitone within the octave plus octave number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    /// Semitone offset from C (0..12)
    pub semitone: u8,
    /// Octave in scientific pitch notation (A4 = 440 Hz)
    pub octave: i8,
}

impl Note {
    /// Parse a note name like "C4", "F#3", "Bb2"
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let mut chars = s.chars().peekable();
        let base = match chars.next()?.to_ascii_uppercase() {
            'C' => 0u8,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return None,
        };
        let semitone = match chars.peek() {
            Some('#') => {
                chars.next();
                (base + 1) % 12
            }
            Some('b') => {
                chars.next();
                (base + 11) % 12
            }
            _ => base,
        };
        let octave: String = chars.collect();
        let octave: i8 = octave.parse().ok()?;
        Some(Self { semitone, octave })
    }

    /// MIDI note number (C4 = 60)
    pub fn midi(&self) -> i32 {
        (self.octave as i32 + 1) * 12 + self.semitone as i32
    }

    /// Frequency in Hz (equal temperament, A4 = 440)
    pub fn frequency(&self) -> f32 {
        440.0 * 2f32.powf((self.midi() - 69) as f32 / 12.0)
    }

    /// Transpose by a signed number of semitones
    pub fn transposed(&self, semitones: i32) -> Self {
        let midi = self.midi() + semitones;
        Self {
            semitone: midi.rem_euclid(12) as u8,
            octave: (midi.div_euclid(12) - 1) as i8,
        }
    }
}

/// Frequency for a note name transposed into the given key
///
/// Unparseable note names fall back to C4 so a bad trigger still makes a
/// sound instead of failing the call.
pub fn note_frequency(name: &str, key: &str) -> f32 {
    let note = Note::parse(name).unwrap_or(Note {
        semitone: 0,
        octave: 4,
    });
    note.transposed(key_offset(key)).frequency()
}

/// A musical interval relative to the transport tempo
///
/// Mirrors the duration vocabulary the engine's callers use: whole measures
/// ("1m"), and 1/n note divisions ("4n", "8n").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    /// Whole measures (4 beats each)
    Measures(u32),
    /// 1/n note: a quarter note ("4n") is one beat
    Division(u32),
}

impl Interval {
    /// Parse a duration string: "1m", "2m", "4n", "8n", "16n"
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(digits) = s.strip_suffix('m') {
            return Self::count(digits).map(Interval::Measures);
        }
        if let Some(digits) = s.strip_suffix('n') {
            return Self::count(digits).map(Interval::Division);
        }
        None
    }

    fn count(digits: &str) -> Option<u32> {
        match digits.parse() {
            Ok(n) if n > 0 => Some(n),
            _ => None,
        }
    }

    /// Duration in seconds at the given tempo (4/4 time)
    pub fn seconds(&self, bpm: f64) -> f64 {
        let beat = 60.0 / bpm;
        match self {
            Interval::Measures(m) => beat * 4.0 * *m as f64,
            Interval::Division(n) => beat * 4.0 / *n as f64,
        }
    }
}

impl Default for Interval {
    /// One measure, the default loop cycle
    fn default() -> Self {
        Interval::Measures(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_offsets() {
        assert_eq!(key_offset("C"), 0);
        assert_eq!(key_offset("C#"), 1);
        assert_eq!(key_offset("Eb"), 3);
        assert_eq!(key_offset("G"), 7);
        assert_eq!(key_offset("Bb"), 10);
        assert_eq!(key_offset("B"), 11);
        assert_eq!(key_offset("X"), 0);
    }

    #[test]
    fn test_note_parse_and_frequency() {
        let a4 = Note::parse("A4").unwrap();
        assert_eq!(a4.midi(), 69);
        assert!((a4.frequency() - 440.0).abs() < 1e-3);

        let c4 = Note::parse("C4").unwrap();
        assert_eq!(c4.midi(), 60);
        assert!((c4.frequency() - 261.626).abs() < 0.01);

        assert_eq!(Note::parse("F#3").unwrap().semitone, 6);
        assert_eq!(Note::parse("Bb2").unwrap().semitone, 10);
        assert!(Note::parse("H4").is_none());
        assert!(Note::parse("C").is_none());
    }

    #[test]
    fn test_transpose_wraps_octave() {
        let b4 = Note::parse("B4").unwrap();
        let up = b4.transposed(2);
        assert_eq!(up.semitone, 1);
        assert_eq!(up.octave, 5);

        // Transposing into key G shifts C4 up 7 semitones
        let g = note_frequency("C4", "G");
        let expect = Note::parse("G4").unwrap().frequency();
        assert!((g - expect).abs() < 1e-3);
    }

    #[test]
    fn test_interval_seconds() {
        // 120 bpm: beat = 0.5s, measure = 2s
        assert!((Interval::parse("1m").unwrap().seconds(120.0) - 2.0).abs() < 1e-9);
        assert!((Interval::parse("4n").unwrap().seconds(120.0) - 0.5).abs() < 1e-9);
        assert!((Interval::parse("8n").unwrap().seconds(120.0) - 0.25).abs() < 1e-9);
        assert!(Interval::parse("0m").is_none());
        assert!(Interval::parse("xyz").is_none());
        // Multi-byte trailing characters must parse as garbage, not panic
        assert!(Interval::parse("1µ").is_none());
        assert!(Interval::parse("µm").is_none());
    }
}
