// Listener - Derives playback-position signals for visualization
// Re-derives elapsed time against scheduler and sequence state each frame;
// purely a consumer of the read API

use std::cell::Cell;
use std::rc::Rc;

use crate::scheduler::Scheduler;
use crate::sequence::SequenceId;

/// Tracks where a sequence is relative to its notes
///
/// `update` once per host frame, then read the normalized signals: which
/// note last sounded, how far playback is through the sequence, and how far
/// it is toward the next note. Degenerate ratios (no notes, coincident
/// notes, empty sequences) resolve to safe constants instead of NaN.
pub struct SequenceNoteOnListener {
    sequence_id: SequenceId,
    previous_start_time: Rc<Cell<f64>>,
    note_start_time_secs: f64,
    note_start_sequence_relative: f64,
    note_distance_secs: f64,
    fractional_sequence_time: f64,
}

impl SequenceNoteOnListener {
    /// Attach a listener to a sequence. Registers a before-schedule hook so
    /// the previous window start survives rescheduling. Returns None for an
    /// unknown sequence id.
    pub fn new(scheduler: &mut Scheduler, sequence_id: SequenceId) -> Option<Self> {
        let sequence = scheduler.sequence_mut(sequence_id)?;
        let previous_start_time = Rc::new(Cell::new(sequence.start_time()));

        let hook_previous = Rc::clone(&previous_start_time);
        sequence.add_before_schedule_task(move |sequence, _next_start_time| {
            hook_previous.set(sequence.start_time());
        });

        Some(Self {
            sequence_id,
            previous_start_time,
            note_start_time_secs: 0.0,
            note_start_sequence_relative: -1.0,
            note_distance_secs: 0.0,
            fractional_sequence_time: 0.0,
        })
    }

    /// Sequence-relative position of the note that last sounded, -1 when
    /// stopped or unknown
    pub fn active_note(&self, scheduler: &Scheduler) -> f64 {
        if scheduler.is_playing() {
            self.note_start_sequence_relative
        } else {
            -1.0
        }
    }

    /// Normalized position through the full sequence in [0, 1]
    pub fn t_sequence(&self, scheduler: &Scheduler) -> f64 {
        let Some(sequence) = scheduler.sequence(self.sequence_id) else {
            return 0.0;
        };
        let actual = sequence.actual_num_measures();
        if actual == 0 {
            return 0.0;
        }
        if scheduler.is_playing() {
            self.fractional_sequence_time
        } else {
            sequence.measure_offset() as f64 / actual as f64
        }
    }

    /// Normalized progress from the last note toward the next, in [0, 1]
    pub fn t_next_note(&self, scheduler: &Scheduler) -> f64 {
        if !scheduler.is_playing() {
            return 0.0;
        }
        let elapsed =
            (scheduler.current_time() - self.note_start_time_secs) / self.note_distance_secs;
        if elapsed.is_finite() {
            elapsed.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Normalized progress from the note at `note0` toward the next note of
    /// the same semitone; 1 when there is no such span
    pub fn t_note(&self, scheduler: &Scheduler, note0: f64, semitone: i32) -> f64 {
        if !scheduler.is_playing() {
            return 1.0;
        }
        let Some(sequence) = scheduler.sequence(self.sequence_id) else {
            return 1.0;
        };

        let position =
            sequence.subsection_relative_current_time(scheduler.tempo(), scheduler.current_time());
        let num_measures = sequence.actual_num_measures() as f64;

        if position > num_measures {
            return 1.0;
        }
        if position == note0 {
            return 0.0;
        }

        let note1 = sequence.next_relative_note_time(note0, false, Some(semitone));
        if note1 == -1.0 {
            return 1.0;
        }

        let relative_distance = sequence.relative_note_distance(note0, note1);
        let numerator = if position < note0 {
            if note1 > note0 {
                return 1.0;
            }
            position + num_measures - note0
        } else {
            position - note0
        };

        if relative_distance > 0.0 {
            numerator / relative_distance
        } else {
            0.0
        }
    }

    /// Re-derive the note span containing the current playback position
    pub fn update(&mut self, scheduler: &Scheduler) {
        let Some(sequence) = scheduler.sequence(self.sequence_id) else {
            return;
        };
        let tempo = scheduler.tempo();
        let now = scheduler.current_time();

        let measure_duration = sequence.measure_duration_secs(tempo);
        let sequence_duration = sequence.subsection_duration_secs(tempo);
        if measure_duration == 0.0 {
            return;
        }

        let measure_offset = sequence.measure_offset() as f64;
        // A window that has not begun is still audibly inside the previous
        // one; measure against the start recorded by the hook.
        let start_time = if now >= sequence.start_time() {
            sequence.start_time()
        } else {
            self.previous_start_time.get()
        };

        let fractional_time = (now - start_time) / measure_duration + measure_offset;
        let note0 = sequence.previous_relative_note_time(fractional_time, true, None);
        let note1 = sequence.next_relative_note_time(note0, false, None);
        let note_distance =
            scheduler.relative_time_to_secs(sequence.relative_note_distance(note0, note1));

        let note0_time = scheduler.relative_time_to_secs(note0) - measure_offset * measure_duration;
        let mut note0_start = start_time + note0_time;
        if note0 > fractional_time {
            // The span's note sounded in the previous window pass
            note0_start = start_time - (sequence_duration - note0_time);
        }

        self.note_start_sequence_relative = note0;
        self.note_start_time_secs = note0_start;
        self.note_distance_secs = note_distance;
        self.fractional_sequence_time =
            (fractional_time / sequence.actual_num_measures() as f64).clamp(0.0, 1.0);
    }
}
