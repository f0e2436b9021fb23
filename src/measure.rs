// Measure - One time-signature cycle of notes at fractional positions
// Notes are kept sorted by position; queries return -1.0 when nothing matches

use crate::note::{Note, ScheduledNote};
use crate::timeline::{Tempo, TimeSignature};

/// Sentinel returned by note-time queries when no note matches
pub const NO_NOTE: f64 = -1.0;

/// An ordered collection of notes within one measure
///
/// The time signature is a snapshot taken when the measure is created, not a
/// live reference; a sequence's measures all share the snapshot it was built
/// with.
#[derive(Debug, Clone)]
pub struct Measure {
    time_signature: TimeSignature,
    notes: Vec<ScheduledNote>,
}

impl Measure {
    pub fn new(time_signature: TimeSignature) -> Self {
        Self {
            time_signature,
            notes: Vec::new(),
        }
    }

    /// The time-signature snapshot this measure was created with
    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    /// All notes, sorted by relative start time
    pub fn notes(&self) -> &[ScheduledNote] {
        &self.notes
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn clear(&mut self) {
        self.notes.clear();
    }

    /// Duration of this measure in seconds at the given tempo
    pub fn duration_secs(&self, tempo: Tempo) -> f64 {
        self.time_signature.duration_secs(1.0, tempo)
    }

    /// Insert a note at a fractional position within the measure
    ///
    /// The position is clamped to [0, 1]; insertion keeps the note list
    /// sorted, with ties landing after existing notes at the same position.
    pub fn add_note(&mut self, relative_start_time: f64, note: Note) {
        let relative_start_time = relative_start_time.clamp(0.0, 1.0);
        let insert_pos = self
            .notes
            .partition_point(|n| n.relative_start_time <= relative_start_time);
        self.notes.insert(
            insert_pos,
            ScheduledNote {
                note,
                relative_start_time,
            },
        );
    }

    /// Position of the earliest note, optionally restricted to one semitone
    pub fn first_relative_note_time(&self, matching_semitone: Option<i32>) -> f64 {
        for scheduled in &self.notes {
            if semitone_matches(scheduled, matching_semitone) {
                return scheduled.relative_start_time;
            }
        }
        NO_NOTE
    }

    /// Position of the latest note, optionally restricted to one semitone
    pub fn last_relative_note_time(&self, matching_semitone: Option<i32>) -> f64 {
        for scheduled in self.notes.iter().rev() {
            if semitone_matches(scheduled, matching_semitone) {
                return scheduled.relative_start_time;
            }
        }
        NO_NOTE
    }

    /// Position of the first note after `after` (or at it, when `allow_equal`)
    pub fn next_relative_note_time(
        &self,
        after: f64,
        allow_equal: bool,
        matching_semitone: Option<i32>,
    ) -> f64 {
        for scheduled in &self.notes {
            let rel_start = scheduled.relative_start_time;
            let time_crit = if allow_equal {
                rel_start >= after
            } else {
                rel_start > after
            };
            if time_crit && semitone_matches(scheduled, matching_semitone) {
                return rel_start;
            }
        }
        NO_NOTE
    }

    /// Position of the last note before `before` (or at it, when `allow_equal`)
    pub fn previous_relative_note_time(
        &self,
        before: f64,
        allow_equal: bool,
        matching_semitone: Option<i32>,
    ) -> f64 {
        for scheduled in self.notes.iter().rev() {
            let rel_start = scheduled.relative_start_time;
            let time_crit = if allow_equal {
                rel_start <= before
            } else {
                rel_start < before
            };
            if time_crit && semitone_matches(scheduled, matching_semitone) {
                return rel_start;
            }
        }
        NO_NOTE
    }
}

fn semitone_matches(scheduled: &ScheduledNote, matching_semitone: Option<i32>) -> bool {
    match matching_semitone {
        Some(semitone) => scheduled.note.semitone == semitone,
        None => true,
    }
}
