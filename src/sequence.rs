// Sequence - Ordered measures plus the playback-window state
// Subsections designate a contiguous measure range as the looping window;
// position/duration queries take tempo and clock time as explicit inputs

use crate::measure::{Measure, NO_NOTE};
use crate::note::{Note, ScheduledNote};
use crate::timeline::{Tempo, TimeSignature};

/// Process-unique sequence identifier, allocated by the scheduler
pub type SequenceId = u64;

/// Hook fired immediately before a new scheduling window is committed
///
/// Receives the sequence (with its previous window start still in place) and
/// the absolute start time of the window about to be committed. Hooks must
/// not call back into the scheduler.
pub type BeforeScheduleHook = Box<dyn FnMut(&Sequence, f64)>;

/// An ordered list of measures with loop, record, and subsection state
///
/// Sequences are created through `Scheduler::make_sequence` and addressed by
/// id. Queries that depend on playback time thread `Tempo` and the current
/// clock reading as parameters so the sequence itself stays free of shared
/// timing state.
pub struct Sequence {
    id: SequenceId,
    time_signature: TimeSignature,
    measures: Vec<Measure>,

    /// Whether the scheduler restarts the window when it finishes
    pub loop_enabled: bool,

    /// Whether live note marking is accepted
    pub allow_record: bool,

    start_time: f64,

    measure_offset: usize,
    reported_num_measures: usize,
    has_subsection: bool,

    before_schedule_hooks: Vec<BeforeScheduleHook>,
}

impl Sequence {
    pub(crate) fn new(id: SequenceId, time_signature: TimeSignature, start_time: f64) -> Self {
        Self {
            id,
            time_signature,
            measures: Vec::new(),
            loop_enabled: false,
            allow_record: false,
            start_time,
            measure_offset: 0,
            reported_num_measures: 0,
            has_subsection: false,
            before_schedule_hooks: Vec::new(),
        }
    }

    pub fn id(&self) -> SequenceId {
        self.id
    }

    /// The time-signature snapshot new measures are created with
    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    /// Absolute clock time at which the current scheduling window began
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub(crate) fn set_start_time(&mut self, start_time: f64) {
        self.start_time = start_time;
    }

    /// Window start adjusted for a window that has not begun yet: reports the
    /// start of the pass the sequence is audibly still inside
    pub fn effective_start_time(&self, tempo: Tempo, now: f64) -> f64 {
        if now >= self.start_time {
            self.start_time
        } else {
            self.start_time - self.subsection_duration_secs(tempo)
        }
    }

    //
    // Measures
    //

    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    pub fn measure(&self, index: usize) -> Option<&Measure> {
        self.measures.get(index)
    }

    pub fn measure_mut(&mut self, index: usize) -> Option<&mut Measure> {
        self.measures.get_mut(index)
    }

    /// Append one empty measure using the sequence's time signature
    pub fn add_measure(&mut self) {
        self.measures.push(Measure::new(self.time_signature));
    }

    /// Append `num_measures` empty measures
    pub fn add_measures(&mut self, num_measures: usize) {
        for _ in 0..num_measures {
            self.add_measure();
        }
    }

    /// Remove all notes from one measure. Out-of-range indices are rejected.
    pub fn clear_measure(&mut self, index: usize) -> bool {
        match self.measures.get_mut(index) {
            Some(measure) => {
                measure.clear();
                true
            }
            None => false,
        }
    }

    /// Remove one measure outright. Out-of-range indices are rejected.
    ///
    /// This only mutates the measure list; retracting outstanding note
    /// commitments is the scheduler's job (`remove_measure_in_sequence`).
    pub fn remove_measure(&mut self, index: usize) -> bool {
        if index >= self.measures.len() {
            return false;
        }
        self.measures.remove(index);
        true
    }

    /// Total number of measures, ignoring any subsection
    pub fn actual_num_measures(&self) -> usize {
        self.measures.len()
    }

    /// Number of measures in the current playback window
    pub fn num_measures(&self) -> usize {
        if self.has_subsection {
            self.reported_num_measures
        } else {
            self.measures.len()
        }
    }

    /// First measure of the current playback window
    pub fn measure_offset(&self) -> usize {
        self.measure_offset
    }

    pub fn is_subsectioned(&self) -> bool {
        self.has_subsection
    }

    /// Restrict the playback window to `num_measures` measures starting at
    /// `offset`. Out-of-range windows are rejected with no mutation.
    pub fn subsection(&mut self, offset: usize, num_measures: usize) -> bool {
        let actual = self.actual_num_measures();
        if offset < actual && num_measures <= actual {
            self.measure_offset = offset;
            self.reported_num_measures = num_measures;
            self.has_subsection = true;
            true
        } else {
            false
        }
    }

    /// Restore the playback window to the full sequence
    pub fn clear_subsection(&mut self) {
        self.has_subsection = false;
        self.measure_offset = 0;
        self.reported_num_measures = self.actual_num_measures();
    }

    //
    // Notes
    //

    /// Total note count across all measures
    pub fn count_notes(&self) -> usize {
        self.measures.iter().map(Measure::note_count).sum()
    }

    /// Copy every note into `into` with sequence-relative positions
    /// (measure index plus fractional position), reusing existing capacity.
    /// Returns the number of notes written.
    pub fn collect_scheduled_notes(&self, into: &mut Vec<ScheduledNote>) -> usize {
        let mut index = 0;
        for (measure_index, measure) in self.measures.iter().enumerate() {
            for scheduled in measure.notes() {
                let mut copied = *scheduled;
                copied.relative_start_time += measure_index as f64;
                if index < into.len() {
                    into[index] = copied;
                } else {
                    into.push(copied);
                }
                index += 1;
            }
        }
        index
    }

    /// Place a note at a sequence-relative position: the target measure is
    /// `floor(relative_time)` modulo the measure count. Negative positions
    /// and empty sequences are ignored.
    pub fn schedule_note_onset(&mut self, relative_time: f64, note: Note) {
        let actual = self.actual_num_measures();
        if actual == 0 || relative_time < 0.0 {
            return;
        }
        let measure_number = relative_time.floor();
        let measure_index = measure_number as usize % actual;
        self.measures[measure_index].add_note(relative_time - measure_number, note);
    }

    /// Live-record a note at the current playback position. No-ops unless
    /// recording is allowed and the window is non-empty.
    pub fn mark_note_onset(&mut self, note: Note, tempo: Tempo, now: f64) {
        if self.num_measures() == 0 || !self.allow_record {
            return;
        }

        let relative_time = self.subsection_relative_current_time(tempo, now);
        if relative_time < 0.0 {
            log::warn!("ignoring live note: playback position is undefined");
            return;
        }

        let current_measure = relative_time.floor() as usize % self.actual_num_measures();
        let relative_frac = relative_time - relative_time.floor();
        self.measures[current_measure].add_note(relative_frac, note);
    }

    //
    // Durations and playback position
    //

    /// Duration of one measure at `tempo`, 0 when the window is empty
    pub fn measure_duration_secs(&self, tempo: Tempo) -> f64 {
        if self.num_measures() == 0 {
            0.0
        } else {
            self.measures[0].duration_secs(tempo)
        }
    }

    /// Duration of the current playback window
    pub fn subsection_duration_secs(&self, tempo: Tempo) -> f64 {
        self.measure_duration_secs(tempo) * self.num_measures() as f64
    }

    /// Duration of the full sequence
    pub fn duration_secs(&self, tempo: Tempo) -> f64 {
        self.measure_duration_secs(tempo) * self.actual_num_measures() as f64
    }

    /// Seconds elapsed in the current window pass; a pass that has not begun
    /// yet reports time wrapped from the previous pass
    pub fn subsection_elapsed_time(&self, tempo: Tempo, now: f64) -> f64 {
        let elapsed = now - self.start_time;
        if elapsed < 0.0 {
            elapsed + self.subsection_duration_secs(tempo)
        } else {
            elapsed
        }
    }

    /// Like `subsection_elapsed_time` but wrapping over the full sequence
    pub fn elapsed_time(&self, tempo: Tempo, now: f64) -> f64 {
        let elapsed = now - self.start_time;
        if elapsed < 0.0 {
            elapsed + self.duration_secs(tempo)
        } else {
            elapsed
        }
    }

    /// Current playback position in measures, offset into the full sequence
    /// (window start included); -1 when the window is empty
    pub fn subsection_relative_current_time(&self, tempo: Tempo, now: f64) -> f64 {
        if self.num_measures() == 0 {
            return -1.0;
        }
        self.subsection_elapsed_time(tempo, now) / self.measure_duration_secs(tempo)
            + self.measure_offset as f64
    }

    /// Current playback position in measures over the full sequence; -1 when
    /// the sequence is empty
    pub fn relative_current_time(&self, tempo: Tempo, now: f64) -> f64 {
        if self.actual_num_measures() == 0 {
            return -1.0;
        }
        self.elapsed_time(tempo, now) / self.measure_duration_secs(tempo)
    }

    /// Index of the measure currently playing, None when the position is
    /// undefined
    pub fn current_measure_index(&self, tempo: Tempo, now: f64) -> Option<usize> {
        let actual = self.actual_num_measures();
        if actual == 0 {
            return None;
        }
        let relative = self.subsection_relative_current_time(tempo, now);
        if relative < 0.0 {
            return None;
        }
        Some(relative.floor() as usize % actual)
    }

    /// Index of the measure following the one containing `after`, wrapping
    /// within the playback window
    pub fn next_measure_index(&self, after: f64) -> Option<usize> {
        let num = self.num_measures() as i64;
        if num == 0 {
            return None;
        }
        let offset = self.measure_offset as i64;
        let next = (after.floor() as i64 - offset + 1).rem_euclid(num) + offset;
        Some(next as usize)
    }

    /// Map a sequence-relative time into the playback window, preserving the
    /// fractional position
    pub fn bound_relative_time(&self, relative_time: f64) -> f64 {
        let num = self.num_measures() as i64;
        if num == 0 {
            return relative_time;
        }
        let measure = relative_time.floor();
        let frac = relative_time - measure;
        let offset = self.measure_offset as i64;
        let bounded = (measure as i64 - offset).rem_euclid(num);
        (bounded + offset) as f64 + frac
    }

    //
    // Note queries over the playback window
    //

    /// Signed forward distance in measures from `a` to `b`, wrapping once
    /// around the playback window when `b` precedes `a`; -1 when the
    /// sequence is empty or either input is negative.
    ///
    /// Inputs must lie within one window cycle of each other; the wrap
    /// branch assumes a single wrap.
    pub fn relative_note_distance(&self, a: f64, b: f64) -> f64 {
        let actual = self.actual_num_measures();
        if actual == 0 || a < 0.0 || b < 0.0 {
            return -1.0;
        }

        let ind_a = (a.floor() as usize % actual) as f64;
        let ind_b = (b.floor() as usize % actual) as f64;
        let frac_a = a - a.floor();
        let frac_b = b - b.floor();

        if ind_b > ind_a || (ind_b == ind_a && frac_b > frac_a) {
            ind_b - ind_a + frac_b - frac_a
        } else {
            //  e.g., 1.25 -> 0.75 over 3 measures: 1.75 + 0.75
            let offset = self.measure_offset as f64;
            self.num_measures() as f64 - (ind_a + frac_a - offset) + (frac_b + ind_b - offset)
        }
    }

    /// Distance from `t` to the next note in the window; -1 when there is no
    /// next note
    pub fn relative_note_distance_to_next(&self, t: f64) -> f64 {
        self.relative_note_distance(t, self.next_relative_note_time(t, false, None))
    }

    /// Sequence-relative position of the earliest note in the playback
    /// window; -1 when the window holds no notes
    pub fn first_relative_note_time(&self) -> f64 {
        let actual = self.actual_num_measures();
        if actual == 0 {
            return NO_NOTE;
        }
        for i in 0..self.num_measures() {
            let index = (self.measure_offset + i) % actual;
            let rel = self.measures[index].first_relative_note_time(None);
            if rel != NO_NOTE {
                return rel + index as f64;
            }
        }
        NO_NOTE
    }

    /// Next note at or after `after`, searching outward from the containing
    /// measure and wrapping across the playback window; -1 when the window
    /// holds no matching note
    pub fn next_relative_note_time(
        &self,
        after: f64,
        allow_equal: bool,
        matching_semitone: Option<i32>,
    ) -> f64 {
        self.relative_note_time_before_or_after(after, 1, allow_equal, matching_semitone)
    }

    /// Previous note at or before `before`, wrapping across the playback
    /// window; -1 when the window holds no matching note
    pub fn previous_relative_note_time(
        &self,
        before: f64,
        allow_equal: bool,
        matching_semitone: Option<i32>,
    ) -> f64 {
        self.relative_note_time_before_or_after(before, -1, allow_equal, matching_semitone)
    }

    fn relative_note_time_before_or_after(
        &self,
        t: f64,
        direction: i64,
        allow_equal: bool,
        matching_semitone: Option<i32>,
    ) -> f64 {
        let num = self.num_measures() as i64;
        if num == 0 || t < 0.0 {
            return NO_NOTE;
        }

        let actual = self.actual_num_measures() as i64;
        let measure_floor = t.floor();
        let measure_frac = t - measure_floor;
        let original_index = measure_floor as i64 % actual;

        let offset = self.measure_offset as i64;
        let upper_limit = num + offset;
        let lower_bound = num - 1 + offset;

        let mut iters = 0;
        let mut measure_index = original_index;

        // The window is visited at most num+1 times: the containing measure
        // is re-checked once at the end without the time bound.
        while iters <= num {
            if measure_index < offset {
                measure_index = lower_bound;
            } else if measure_index >= upper_limit {
                measure_index = offset;
            }

            let measure = &self.measures[(measure_index % actual) as usize];
            let next = if iters < num && measure_index == original_index {
                if direction == 1 {
                    measure.next_relative_note_time(measure_frac, allow_equal, matching_semitone)
                } else {
                    measure.previous_relative_note_time(
                        measure_frac,
                        allow_equal,
                        matching_semitone,
                    )
                }
            } else if direction == 1 {
                measure.first_relative_note_time(matching_semitone)
            } else {
                measure.last_relative_note_time(matching_semitone)
            };

            if next != NO_NOTE {
                return next + measure_index as f64;
            }

            iters += 1;
            measure_index += direction;
        }

        NO_NOTE
    }

    //
    // Before-schedule hooks
    //

    /// Register a hook fired just before the scheduler commits a new window.
    /// Hooks run synchronously in registration order and receive the window's
    /// absolute start time.
    pub fn add_before_schedule_task<F>(&mut self, task: F)
    where
        F: FnMut(&Sequence, f64) + 'static,
    {
        self.before_schedule_hooks.push(Box::new(task));
    }

    pub fn clear_before_schedule_tasks(&mut self) {
        self.before_schedule_hooks.clear();
    }

    pub(crate) fn trigger_before_schedule_tasks(&mut self, next_start_time: f64) {
        let mut hooks = std::mem::take(&mut self.before_schedule_hooks);
        for hook in hooks.iter_mut() {
            hook(self, next_start_time);
        }
        let added = std::mem::replace(&mut self.before_schedule_hooks, hooks);
        self.before_schedule_hooks.extend(added);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn sequence_with_measures(n: usize) -> Sequence {
        let mut seq = Sequence::new(0, TimeSignature::four_four(), 0.0);
        seq.add_measures(n);
        seq
    }

    #[test]
    fn test_subsection_round_trip() {
        let mut seq = sequence_with_measures(5);
        assert!(seq.subsection(1, 2));
        assert!(seq.is_subsectioned());
        assert_eq!(seq.num_measures(), 2);
        assert_eq!(seq.measure_offset(), 1);
        assert_eq!(seq.actual_num_measures(), 5);

        seq.clear_subsection();
        assert!(!seq.is_subsectioned());
        assert_eq!(seq.num_measures(), 5);
        assert_eq!(seq.measure_offset(), 0);
    }

    #[test]
    fn test_subsection_rejection() {
        let mut seq = sequence_with_measures(5);
        assert!(!seq.subsection(10, 1));
        assert!(!seq.subsection(0, 6));
        assert!(!seq.is_subsectioned());
        assert_eq!(seq.num_measures(), 5);
        assert_eq!(seq.measure_offset(), 0);
    }

    #[test]
    fn test_subsection_duration_identity() {
        let tempo = Tempo::new(120.0);
        let mut seq = sequence_with_measures(5);

        assert_eq!(
            seq.subsection_duration_secs(tempo),
            seq.measure_duration_secs(tempo) * seq.num_measures() as f64
        );

        assert!(seq.subsection(2, 3));
        assert_eq!(
            seq.subsection_duration_secs(tempo),
            seq.measure_duration_secs(tempo) * 3.0
        );

        seq.clear_subsection();
        assert_eq!(
            seq.subsection_duration_secs(tempo),
            seq.measure_duration_secs(tempo) * 5.0
        );
    }

    #[test]
    fn test_schedule_note_onset_targets_measure() {
        let mut seq = sequence_with_measures(3);
        seq.schedule_note_onset(0.25, Note::new(1));
        seq.schedule_note_onset(2.5, Note::new(2));
        seq.schedule_note_onset(4.75, Note::new(3)); // wraps to measure 1
        seq.schedule_note_onset(-1.0, Note::new(4)); // rejected

        assert_eq!(seq.measure(0).unwrap().note_count(), 1);
        assert_eq!(seq.measure(1).unwrap().note_count(), 1);
        assert_eq!(seq.measure(2).unwrap().note_count(), 1);
        assert_eq!(seq.count_notes(), 3);

        assert_eq!(seq.measure(1).unwrap().notes()[0].note.semitone, 3);
        assert_eq!(seq.measure(1).unwrap().notes()[0].relative_start_time, 0.75);
    }

    #[test]
    fn test_relative_note_distance() {
        let seq = sequence_with_measures(3);

        // Forward distances
        assert_eq!(seq.relative_note_distance(0.25, 0.75), 0.5);
        assert_eq!(seq.relative_note_distance(0.5, 2.5), 2.0);

        // Wrap: 1.25 -> 0.75 over 3 measures is 1.75 + 0.75
        assert_eq!(seq.relative_note_distance(1.25, 0.75), 2.5);

        // Degenerate inputs
        assert_eq!(seq.relative_note_distance(-0.5, 0.5), -1.0);
        assert_eq!(seq.relative_note_distance(0.5, -0.5), -1.0);
        assert_eq!(
            sequence_with_measures(0).relative_note_distance(0.0, 0.5),
            -1.0
        );
    }

    #[test]
    fn test_relative_note_distance_in_subsection() {
        let mut seq = sequence_with_measures(4);
        assert!(seq.subsection(1, 2));

        // Window is measures 1..3; wrapping from 2.5 back to 1.25 crosses
        // the window boundary once.
        assert_eq!(seq.relative_note_distance(2.5, 1.25), 0.75);
        assert_eq!(seq.relative_note_distance(1.5, 2.25), 0.75);
    }

    #[test]
    fn test_next_note_wraps_window() {
        let mut seq = sequence_with_measures(3);
        seq.schedule_note_onset(0.25, Note::new(0));
        seq.schedule_note_onset(2.5, Note::new(7));

        assert_eq!(seq.next_relative_note_time(0.25, false, None), 2.5);
        assert_eq!(seq.next_relative_note_time(0.25, true, None), 0.25);
        // Past the last note the search wraps to the first
        assert_eq!(seq.next_relative_note_time(2.75, false, None), 0.25);
        // Semitone filter skips non-matching notes
        assert_eq!(seq.next_relative_note_time(0.0, true, Some(7)), 2.5);
        assert_eq!(seq.next_relative_note_time(0.0, true, Some(3)), -1.0);
    }

    #[test]
    fn test_previous_note_wraps_window() {
        let mut seq = sequence_with_measures(3);
        seq.schedule_note_onset(0.25, Note::new(0));
        seq.schedule_note_onset(2.5, Note::new(7));

        assert_eq!(seq.previous_relative_note_time(2.5, false, None), 0.25);
        assert_eq!(seq.previous_relative_note_time(2.5, true, None), 2.5);
        // Before the first note the search wraps to the last
        assert_eq!(seq.previous_relative_note_time(0.1, false, None), 2.5);
    }

    #[test]
    fn test_note_queries_respect_subsection() {
        let mut seq = sequence_with_measures(4);
        seq.schedule_note_onset(0.5, Note::new(0)); // outside the window
        seq.schedule_note_onset(1.25, Note::new(1));
        seq.schedule_note_onset(2.75, Note::new(2));
        assert!(seq.subsection(1, 2));

        assert_eq!(seq.first_relative_note_time(), 1.25);
        // The search never leaves the window, so measure 0's note is unseen
        assert_eq!(seq.next_relative_note_time(2.75, false, None), 1.25);
        assert_eq!(seq.previous_relative_note_time(1.25, false, None), 2.75);
    }

    #[test]
    fn test_first_relative_note_time_empty() {
        let seq = sequence_with_measures(3);
        assert_eq!(seq.first_relative_note_time(), -1.0);
        assert_eq!(sequence_with_measures(0).first_relative_note_time(), -1.0);
    }

    #[test]
    fn test_mark_note_onset_requires_record_flag() {
        let tempo = Tempo::new(120.0);
        let mut seq = sequence_with_measures(2);

        seq.mark_note_onset(Note::new(5), tempo, 1.0);
        assert_eq!(seq.count_notes(), 0);

        seq.allow_record = true;
        // One measure is 2 s; at t=1.0 the position is halfway into measure 0
        seq.mark_note_onset(Note::new(5), tempo, 1.0);
        assert_eq!(seq.measure(0).unwrap().note_count(), 1);
        assert_eq!(seq.measure(0).unwrap().notes()[0].relative_start_time, 0.5);
    }

    #[test]
    fn test_current_measure_index() {
        let tempo = Tempo::new(120.0);
        let mut seq = sequence_with_measures(3);

        // Measures are 2 s each, window starts at t=0
        assert_eq!(seq.current_measure_index(tempo, 1.0), Some(0));
        assert_eq!(seq.current_measure_index(tempo, 3.0), Some(1));
        assert_eq!(seq.current_measure_index(tempo, 5.9), Some(2));

        assert!(seq.subsection(1, 1));
        seq.set_start_time(0.0);
        assert_eq!(seq.current_measure_index(tempo, 0.5), Some(1));

        assert_eq!(
            sequence_with_measures(0).current_measure_index(tempo, 1.0),
            None
        );
    }

    #[test]
    fn test_bound_relative_time() {
        let mut seq = sequence_with_measures(4);
        assert!(seq.subsection(1, 2));

        // Positions map into measures 1..3, fractional part preserved
        assert_eq!(seq.bound_relative_time(1.25), 1.25);
        assert_eq!(seq.bound_relative_time(3.5), 1.5);
        assert_eq!(seq.bound_relative_time(0.75), 2.75);
    }

    #[test]
    fn test_next_measure_index_wraps() {
        let mut seq = sequence_with_measures(4);
        assert_eq!(seq.next_measure_index(0.5), Some(1));
        assert_eq!(seq.next_measure_index(3.5), Some(0));

        assert!(seq.subsection(1, 2));
        assert_eq!(seq.next_measure_index(1.5), Some(2));
        assert_eq!(seq.next_measure_index(2.5), Some(1));
    }

    #[test]
    fn test_collect_scheduled_notes() {
        let mut seq = sequence_with_measures(2);
        seq.schedule_note_onset(0.5, Note::new(1));
        seq.schedule_note_onset(1.25, Note::new(2));

        let mut buffer = Vec::new();
        assert_eq!(seq.collect_scheduled_notes(&mut buffer), 2);
        assert_eq!(buffer[0].relative_start_time, 0.5);
        assert_eq!(buffer[1].relative_start_time, 1.25);

        // The buffer is reused, not regrown
        assert_eq!(seq.collect_scheduled_notes(&mut buffer), 2);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_elapsed_time_wraps_before_window_start() {
        let tempo = Tempo::new(120.0);
        let mut seq = sequence_with_measures(2);
        seq.set_start_time(4.0);

        // A window scheduled in the future reports time from the previous pass
        assert_eq!(seq.subsection_elapsed_time(tempo, 3.0), 3.0);
        assert_eq!(seq.subsection_elapsed_time(tempo, 5.0), 1.0);
    }

    #[test]
    fn test_before_schedule_hooks_fire_in_order() {
        use std::cell::RefCell;

        let mut seq = sequence_with_measures(1);
        let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

        let first = Rc::clone(&log);
        seq.add_before_schedule_task(move |_, start| {
            assert_eq!(start, 8.0);
            first.borrow_mut().push("first");
        });

        let second = Rc::clone(&log);
        seq.add_before_schedule_task(move |seq, _| {
            // Fired before the new window start is committed
            assert_eq!(seq.start_time(), 0.0);
            second.borrow_mut().push("second");
        });

        seq.trigger_before_schedule_tasks(8.0);
        assert_eq!(*log.borrow(), vec!["first", "second"]);

        // Hooks persist across windows
        seq.trigger_before_schedule_tasks(8.0);
        assert_eq!(log.borrow().len(), 4);

        seq.clear_before_schedule_tasks();
        seq.trigger_before_schedule_tasks(8.0);
        assert_eq!(log.borrow().len(), 4);
    }
}
