// Timeline - Musical time primitives
// Time signature and tempo, and the conversion from measures to seconds

use std::fmt;

/// Time signature (numerator/denominator)
/// Example: 4/4 time = TimeSignature { numerator: 4, denominator: 4 }
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,   // Beats per measure (typically 3, 4, 5, 6, 7)
    pub denominator: u8, // Note value (4 = quarter note, 8 = eighth note)
}

impl TimeSignature {
    /// Creates a new time signature
    pub fn new(numerator: u8, denominator: u8) -> Self {
        assert!(numerator > 0, "Time signature numerator must be > 0");
        assert!(
            denominator.is_power_of_two(),
            "Time signature denominator must be power of 2"
        );
        Self {
            numerator,
            denominator,
        }
    }

    /// Common 4/4 time signature
    pub fn four_four() -> Self {
        Self::new(4, 4)
    }

    /// Common 3/4 time signature (waltz)
    pub fn three_four() -> Self {
        Self::new(3, 4)
    }

    /// Common 6/8 time signature
    pub fn six_eight() -> Self {
        Self::new(6, 8)
    }

    /// Beat duration relative to quarter note
    /// Example: 4/4 = 1.0, 6/8 = 0.5 (eighth notes)
    fn note_factor(&self) -> f64 {
        self.denominator as f64 / 4.0
    }

    /// Duration in seconds of `num_measures` measures played at `tempo`
    pub fn duration_secs(&self, num_measures: f64, tempo: Tempo) -> f64 {
        self.numerator as f64 / (tempo.bpm() / 60.0) / self.note_factor() * num_measures
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::four_four()
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// Lowest supported tempo
    pub const MIN_BPM: f64 = 20.0;

    /// Highest supported tempo
    pub const MAX_BPM: f64 = 999.0;

    /// Creates a new tempo
    /// BPM must be in range [20.0, 999.0]
    pub fn new(bpm: f64) -> Self {
        assert!(
            (Self::MIN_BPM..=Self::MAX_BPM).contains(&bpm),
            "BPM must be between 20 and 999"
        );
        Self { bpm }
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_secs(&self) -> f64 {
        60.0 / self.bpm
    }

    /// A tempo nudged by `delta` BPM, clamped into the valid range.
    /// Live tempo controls must stay total, so out-of-range nudges saturate.
    pub fn shifted(&self, delta: f64) -> Self {
        Self {
            bpm: (self.bpm + delta).clamp(Self::MIN_BPM, Self::MAX_BPM),
        }
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(120.0)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_signature() {
        let ts = TimeSignature::four_four();
        assert_eq!(ts.numerator, 4);
        assert_eq!(ts.denominator, 4);
        assert_eq!(ts.to_string(), "4/4");
    }

    #[test]
    fn test_duration_formula() {
        // durationSecs(1, bpm) == numerator / (bpm/60) / (denominator/4)
        let ts = TimeSignature::four_four();
        let tempo = Tempo::new(120.0);
        assert_eq!(ts.duration_secs(1.0, tempo), 4.0 / 2.0 / 1.0);

        let ts = TimeSignature::new(2, 4);
        assert_eq!(ts.duration_secs(1.0, tempo), 2.0 / 2.0 / 1.0);

        let ts = TimeSignature::six_eight();
        let tempo = Tempo::new(60.0);
        assert_eq!(ts.duration_secs(1.0, tempo), 6.0 / 1.0 / 2.0);

        // Scales linearly with the number of measures
        let ts = TimeSignature::four_four();
        assert_eq!(
            ts.duration_secs(3.0, tempo),
            3.0 * ts.duration_secs(1.0, tempo)
        );
    }

    #[test]
    fn test_tempo() {
        let tempo = Tempo::new(120.0);
        assert_eq!(tempo.bpm(), 120.0);
        assert_eq!(tempo.beat_duration_secs(), 0.5);
        assert_eq!(tempo.to_string(), "120.0 BPM");
    }

    #[test]
    fn test_tempo_shift_saturates() {
        let tempo = Tempo::new(990.0);
        assert_eq!(tempo.shifted(50.0).bpm(), Tempo::MAX_BPM);

        let tempo = Tempo::new(25.0);
        assert_eq!(tempo.shifted(-50.0).bpm(), Tempo::MIN_BPM);

        let tempo = Tempo::new(120.0);
        assert_eq!(tempo.shifted(5.0).bpm(), 125.0);
    }

    #[test]
    #[should_panic(expected = "BPM must be between 20 and 999")]
    fn test_invalid_tempo() {
        Tempo::new(0.0);
    }

    #[test]
    #[should_panic(expected = "denominator must be power of 2")]
    fn test_invalid_time_signature() {
        TimeSignature::new(4, 3);
    }

    #[test]
    fn test_serde_round_trip() {
        let ts = TimeSignature::new(7, 8);
        let json = serde_json::to_string(&ts).unwrap();
        let back: TimeSignature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);

        let tempo = Tempo::new(134.5);
        let json = serde_json::to_string(&tempo).unwrap();
        let back: Tempo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tempo);
    }
}
