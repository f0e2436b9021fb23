// Note - Pitch/duration pair placed at fractional positions inside a measure

/// An abstract note: a pitch offset plus an informational duration
///
/// `semitone` is a signed offset from whatever reference pitch the sound
/// backend uses; `duration_secs` travels with the note but plays no part in
/// scheduling math.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Note {
    pub semitone: i32,
    pub duration_secs: f64,
}

impl Note {
    /// Creates a note with zero duration
    pub fn new(semitone: i32) -> Self {
        Self {
            semitone,
            duration_secs: 0.0,
        }
    }

    /// Creates a note carrying an explicit duration
    pub fn with_duration(semitone: i32, duration_secs: f64) -> Self {
        Self {
            semitone,
            duration_secs,
        }
    }

    /// Resampling factor a sample-playback backend applies to sound this
    /// note's pitch: 2^(semitone/12)
    pub fn playback_rate(&self) -> f64 {
        (self.semitone as f64 / 12.0).exp2()
    }
}

/// A note placed inside a measure at a fractional position in [0, 1]
///
/// The position invariant is enforced by `Measure::add_note`, which clamps
/// on insertion.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScheduledNote {
    pub note: Note,
    pub relative_start_time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_creation() {
        let note = Note::new(-12);
        assert_eq!(note.semitone, -12);
        assert_eq!(note.duration_secs, 0.0);

        let note = Note::with_duration(7, 0.25);
        assert_eq!(note.semitone, 7);
        assert_eq!(note.duration_secs, 0.25);
    }

    #[test]
    fn test_playback_rate() {
        assert_eq!(Note::new(0).playback_rate(), 1.0);
        assert_eq!(Note::new(12).playback_rate(), 2.0);
        assert_eq!(Note::new(-12).playback_rate(), 0.5);
        assert_eq!(Note::new(24).playback_rate(), 4.0);

        // One semitone up is the twelfth root of two
        let rate = Note::new(1).playback_rate();
        assert!((rate - 2f64.powf(1.0 / 12.0)).abs() < 1e-12);
    }

    #[test]
    fn test_serde_round_trip() {
        let scheduled = ScheduledNote {
            note: Note::with_duration(3, 0.5),
            relative_start_time: 0.75,
        };
        let json = serde_json::to_string(&scheduled).unwrap();
        let back: ScheduledNote = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scheduled);
    }
}
